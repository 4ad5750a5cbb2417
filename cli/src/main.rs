//! bankpdf CLI - bank statement PDF to CSV/JSON

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use bankpdf::{
    detect, Bank, BankPdf, BankPdfResult, ExtractOptions, ExtractionPipeline, JsonFormat,
    LineClass, PageSelection, TransactionType,
};

#[derive(Parser)]
#[command(name = "bankpdf")]
#[command(version)]
#[command(about = "Convert bank statement PDFs to CSV and JSON", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a statement to CSV
    Convert {
        #[command(flatten)]
        common: CommonArgs,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Omit the account metadata rows
        #[arg(long)]
        no_metadata: bool,
    },

    /// Convert a statement to JSON
    Json {
        #[command(flatten)]
        common: CommonArgs,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output compact JSON
        #[arg(long)]
        compact: bool,
    },

    /// Print the extracted text
    Text {
        #[command(flatten)]
        common: CommonArgs,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Show extraction and statement summary
    Info {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Show how every line was classified
    Debug {
        #[command(flatten)]
        common: CommonArgs,

        /// Only show lines that matched nothing
        #[arg(long)]
        unmatched: bool,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Input PDF file
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Bank layout (metro, hsbc, barclays); detected when omitted
    #[arg(short, long, env = "BANKPDF_BANK")]
    bank: Option<String>,

    /// Page range (e.g., "1-3", "1,3,5")
    #[arg(long)]
    pages: Option<String>,

    /// Use OCR instead of the text layer
    #[arg(long)]
    ocr: bool,

    /// Require statement vocabulary in extracted text
    #[arg(long)]
    strict: bool,
}

impl CommonArgs {
    fn extract_options(&self) -> Result<ExtractOptions, Box<dyn std::error::Error>> {
        let mut options = ExtractOptions::new();
        if let Some(ref pages) = self.pages {
            options = options.with_pages(PageSelection::parse(pages)?);
        }
        if self.strict {
            options = options.strict();
        }
        Ok(options)
    }

    fn builder(&self) -> Result<BankPdf, Box<dyn std::error::Error>> {
        let mut builder = BankPdf::new().with_extract_options(self.extract_options()?);
        if let Some(ref bank) = self.bank {
            builder = builder.with_bank(bank.parse::<Bank>()?);
        }
        if self.ocr {
            builder = builder.with_ocr();
        }
        Ok(builder)
    }

    fn run(&self, builder: BankPdf) -> Result<BankPdfResult, Box<dyn std::error::Error>> {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!("Reading {}...", self.input.display()));

        let result = builder.parse(&self.input);
        pb.finish_and_clear();

        let result = result?;
        for warning in &result.statement.warnings {
            eprintln!("{}: {}", "Warning".yellow().bold(), warning);
        }
        Ok(result)
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Convert {
            common,
            output,
            no_metadata,
        } => cmd_convert(&common, output.as_deref(), !no_metadata),
        Commands::Json {
            common,
            output,
            compact,
        } => cmd_json(&common, output.as_deref(), compact),
        Commands::Text { common, output } => cmd_text(&common, output.as_deref()),
        Commands::Info { common } => cmd_info(&common),
        Commands::Debug { common, unmatched } => cmd_debug(&common, unmatched),
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn write_output(output: Option<&Path>, content: &str) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = output {
        fs::write(path, content)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        print!("{}", content);
        if !content.ends_with('\n') {
            println!();
        }
    }
    Ok(())
}

fn cmd_convert(
    common: &CommonArgs,
    output: Option<&Path>,
    metadata: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = common.run(common.builder()?)?;
    let csv = result.to_csv(metadata)?;
    write_output(output, &csv)
}

fn cmd_json(
    common: &CommonArgs,
    output: Option<&Path>,
    compact: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let format = if compact {
        JsonFormat::Compact
    } else {
        JsonFormat::Pretty
    };

    let result = common.run(common.builder()?)?;
    let json = result.to_json(format)?;
    write_output(output, &json)
}

fn cmd_text(common: &CommonArgs, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = ExtractionPipeline::new(common.extract_options()?);
    let extraction = if common.ocr {
        pipeline.extract_ocr(&common.input)?
    } else {
        pipeline.extract_file(&common.input)?
    };

    eprintln!(
        "{} {} (score {:.2}{})",
        "Strategy:".cyan().bold(),
        extraction.strategy,
        extraction.report.score,
        if extraction.best_effort { ", best effort" } else { "" }
    );
    write_output(output, &extraction.text())
}

fn cmd_info(common: &CommonArgs) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(&common.input)?;
    let format = detect::inspect(&data)?;
    let result = common.run(common.builder()?)?;
    let statement = &result.statement;
    let report = &result.extraction.report;

    println!("{}", "Document".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "File".bold(), common.input.display());
    println!("{}: {}", "Format".bold(), format);
    println!(
        "{}: {}",
        "Fonts".bold(),
        match (format.has_fonts, format.has_tounicode) {
            (true, true) => "embedded, with ToUnicode maps",
            (true, false) => "embedded, no ToUnicode maps",
            _ => "none",
        }
    );
    println!("{}: {}", "Strategy".bold(), result.extraction.strategy);
    println!(
        "{}: {:.2} ({} of {} chars readable){}",
        "Readability".bold(),
        report.score,
        report.readable_chars,
        report.total_chars,
        if result.extraction.best_effort {
            " best effort".yellow().to_string()
        } else {
            String::new()
        }
    );
    println!("{}: {}", "Pages".bold(), result.extraction.pages.len());

    println!();
    println!("{}", "Statement".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "Bank".bold(), statement.bank);
    let fields = [
        ("Account holder", &statement.account_holder),
        ("Account number", &statement.account_number),
        ("Sort code", &statement.sort_code),
        ("Period", &statement.statement_period),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            println!("{}: {}", label.bold(), value);
        }
    }
    if let Some(opening) = statement.opening_balance {
        println!("{}: {}", "Opening balance".bold(), opening);
    }
    if let Some(closing) = statement.closing_balance {
        println!("{}: {}", "Closing balance".bold(), closing);
    }

    let count = |kind: TransactionType| {
        statement
            .transactions
            .iter()
            .filter(|t| t.kind == kind)
            .count()
    };
    println!(
        "{}: {} ({} debits, {} credits)",
        "Transactions".bold(),
        statement.transactions.len(),
        count(TransactionType::Debit),
        count(TransactionType::Credit)
    );
    println!("{}: {}", "Total out".bold(), statement.total_debits());
    println!("{}: {}", "Total in".bold(), statement.total_credits());
    match statement.reconciles() {
        Some(true) => println!("{}: {}", "Reconciles".bold(), "yes".green()),
        Some(false) => println!("{}: {}", "Reconciles".bold(), "no".red()),
        None => {}
    }

    Ok(())
}

fn cmd_debug(common: &CommonArgs, unmatched_only: bool) -> Result<(), Box<dyn std::error::Error>> {
    let result = common.run(common.builder()?.with_debug())?;

    for line in &result.debug {
        if unmatched_only && line.class != LineClass::Unmatched {
            continue;
        }
        let class = match line.class {
            LineClass::Header => "header".blue(),
            LineClass::Parsed => "parsed".green(),
            LineClass::Continuation => "cont".cyan(),
            LineClass::Skipped => "skip".dimmed(),
            LineClass::Unmatched => "unmatched".red(),
        };
        println!(
            "{:>3}:{:<4} {:<10} {}",
            line.page, line.line_number, class, line.text
        );
    }

    println!(
        "\n{} {} transactions from {} lines",
        "Done!".green().bold(),
        result.statement.transactions.len(),
        result.debug.len()
    );
    Ok(())
}
