//! Rendering parsed statements to output formats.

mod csv;
mod json;

pub use self::csv::{to_csv, write_csv, CSV_HEADER};
pub use self::json::{to_json, JsonFormat};
