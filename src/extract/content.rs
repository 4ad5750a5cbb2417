//! Raw content-stream decoding.
//!
//! Works directly on stream bytes without a PDF object model: inflate,
//! tokenize, then walk text objects and turn text-showing operators into
//! lines. Nothing in here returns an error; a stream that cannot be read
//! simply yields no lines.

use std::io::Read;

use flate2::read::ZlibDecoder;

use super::cmap::CMap;

/// Inflate a Flate-compressed stream, or return the bytes unchanged.
///
/// A truncated stream that inflated partially keeps the partial output.
pub fn inflate(data: &[u8]) -> Vec<u8> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    match decoder.read_to_end(&mut out) {
        Ok(_) => out,
        Err(_) if !out.is_empty() => out,
        Err(_) => data.to_vec(),
    }
}

/// Inflate and decode one stream into trimmed, non-empty lines.
pub fn decode_stream(data: &[u8], cmap: Option<&CMap>) -> Vec<String> {
    extract_lines(&inflate(data), cmap)
}

/// Decode already-decompressed content into lines.
///
/// Text objects (`BT`..`ET`) are walked in order. When the stream has no
/// text object at all, every text-showing operator in it is used instead.
pub fn extract_lines(content: &[u8], cmap: Option<&CMap>) -> Vec<String> {
    let ops = parse_operations(content);
    let has_text_objects = ops.iter().any(|op| op.operator == "BT");

    let mut walker = TextWalker::new(cmap, !has_text_objects);
    for op in &ops {
        walker.apply(op);
    }
    walker.finish()
}

/// A content-stream operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Number(f32),
    Str(Vec<u8>),
    Name(String),
    Array(Vec<Operand>),
    Other,
}

impl Operand {
    fn as_number(&self) -> Option<f32> {
        match self {
            Operand::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// An operator with the operands that preceded it.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub operator: String,
    pub operands: Vec<Operand>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f32),
    Str(Vec<u8>),
    Name(String),
    ArrayStart,
    ArrayEnd,
    DictStart,
    DictEnd,
    Keyword(String),
}

/// Byte-level tokenizer for content streams.
struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c' | b'\0')
}

fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

impl<'a> Lexer<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(b) = self.peek() {
            if is_whitespace(b) {
                self.pos += 1;
            } else if b == b'%' {
                while let Some(c) = self.peek() {
                    if c == b'\n' || c == b'\r' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Option<Token> {
        loop {
            self.skip_whitespace_and_comments();
            let b = self.peek()?;
            match b {
                b'(' => {
                    self.pos += 1;
                    return Some(Token::Str(self.read_literal_string()));
                }
                b'<' => {
                    if self.data.get(self.pos + 1) == Some(&b'<') {
                        self.pos += 2;
                        return Some(Token::DictStart);
                    }
                    self.pos += 1;
                    return Some(Token::Str(self.read_hex_string()));
                }
                b'>' => {
                    if self.data.get(self.pos + 1) == Some(&b'>') {
                        self.pos += 2;
                        return Some(Token::DictEnd);
                    }
                    self.pos += 1;
                }
                b'[' => {
                    self.pos += 1;
                    return Some(Token::ArrayStart);
                }
                b']' => {
                    self.pos += 1;
                    return Some(Token::ArrayEnd);
                }
                b'/' => {
                    self.pos += 1;
                    let word = self.read_regular();
                    return Some(Token::Name(String::from_utf8_lossy(word).into_owned()));
                }
                b'{' | b'}' | b')' => {
                    self.pos += 1;
                }
                _ => {
                    let word = self.read_regular();
                    if word.is_empty() {
                        self.pos += 1;
                        continue;
                    }
                    let text = String::from_utf8_lossy(word).into_owned();
                    if looks_numeric(word) {
                        if let Ok(n) = text.parse::<f32>() {
                            return Some(Token::Number(n));
                        }
                    }
                    return Some(Token::Keyword(text));
                }
            }
        }
    }

    fn read_regular(&mut self) -> &'a [u8] {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_whitespace(b) || is_delimiter(b) {
                break;
            }
            self.pos += 1;
        }
        &self.data[start..self.pos]
    }

    /// Read a `(...)` string; the opening paren is already consumed.
    fn read_literal_string(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut depth = 1usize;

        while let Some(b) = self.peek() {
            self.pos += 1;
            match b {
                b'\\' => {
                    let Some(next) = self.peek() else { break };
                    self.pos += 1;
                    match next {
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0c),
                        b'(' | b')' | b'\\' => out.push(next),
                        b'0'..=b'7' => {
                            let mut value = u32::from(next - b'0');
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(d @ b'0'..=b'7') => {
                                        value = value * 8 + u32::from(d - b'0');
                                        self.pos += 1;
                                    }
                                    _ => break,
                                }
                            }
                            out.push((value & 0xFF) as u8);
                        }
                        // Line continuation
                        b'\r' => {
                            if self.peek() == Some(b'\n') {
                                self.pos += 1;
                            }
                        }
                        b'\n' => {}
                        // Unknown escape: keep the character
                        other => out.push(other),
                    }
                }
                b'(' => {
                    depth += 1;
                    out.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    out.push(b);
                }
                _ => out.push(b),
            }
        }

        out
    }

    /// Read a `<...>` string; the opening bracket is already consumed.
    fn read_hex_string(&mut self) -> Vec<u8> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            self.pos += 1;
            if b == b'>' {
                let hex = String::from_utf8_lossy(&self.data[start..self.pos - 1]);
                return super::cmap::hex_to_bytes(&hex);
            }
        }
        super::cmap::hex_to_bytes(&String::from_utf8_lossy(&self.data[start..]))
    }

    /// Skip inline image data after `ID` up to the matching `EI`.
    fn skip_inline_image(&mut self) {
        // One whitespace byte separates ID from the data.
        self.pos += 1;
        while self.pos + 1 < self.data.len() {
            let at_ei = self.data[self.pos] == b'E'
                && self.data[self.pos + 1] == b'I'
                && self.pos > 0
                && is_whitespace(self.data[self.pos - 1])
                && self
                    .data
                    .get(self.pos + 2)
                    .map_or(true, |&b| is_whitespace(b));
            if at_ei {
                self.pos += 2;
                return;
            }
            self.pos += 1;
        }
        self.pos = self.data.len();
    }
}

fn looks_numeric(word: &[u8]) -> bool {
    word.iter()
        .all(|&b| b.is_ascii_digit() || b == b'.' || b == b'-' || b == b'+')
        && word.iter().any(u8::is_ascii_digit)
}

/// Tokenize a content stream into operations.
///
/// Dictionary operands (marked-content properties) are reduced to
/// [`Operand::Other`]; unbalanced brackets are tolerated.
pub fn parse_operations(content: &[u8]) -> Vec<Operation> {
    let mut lexer = Lexer::new(content);
    let mut ops = Vec::new();
    let mut operands: Vec<Operand> = Vec::new();
    let mut arrays: Vec<Vec<Operand>> = Vec::new();
    let mut dict_depth = 0usize;

    while let Some(token) = lexer.next_token() {
        if dict_depth > 0 {
            match token {
                Token::DictStart => dict_depth += 1,
                Token::DictEnd => {
                    dict_depth -= 1;
                    if dict_depth == 0 {
                        push_operand(&mut operands, &mut arrays, Operand::Other);
                    }
                }
                _ => {}
            }
            continue;
        }

        match token {
            Token::Number(n) => push_operand(&mut operands, &mut arrays, Operand::Number(n)),
            Token::Str(s) => push_operand(&mut operands, &mut arrays, Operand::Str(s)),
            Token::Name(n) => push_operand(&mut operands, &mut arrays, Operand::Name(n)),
            Token::ArrayStart => arrays.push(Vec::new()),
            Token::ArrayEnd => {
                if let Some(items) = arrays.pop() {
                    push_operand(&mut operands, &mut arrays, Operand::Array(items));
                }
            }
            Token::DictStart => dict_depth = 1,
            Token::DictEnd => {}
            Token::Keyword(word) => {
                // An operator inside an unterminated array closes it.
                while let Some(items) = arrays.pop() {
                    push_operand(&mut operands, &mut arrays, Operand::Array(items));
                }
                if word == "ID" {
                    lexer.skip_inline_image();
                    operands.clear();
                    continue;
                }
                ops.push(Operation {
                    operator: word,
                    operands: std::mem::take(&mut operands),
                });
            }
        }
    }

    ops
}

fn push_operand(operands: &mut Vec<Operand>, arrays: &mut [Vec<Operand>], operand: Operand) {
    match arrays.last_mut() {
        Some(array) => array.push(operand),
        None => operands.push(operand),
    }
}

/// Vertical distance below which two runs share a line.
const SAME_LINE_EPSILON: f32 = 0.5;
const DEFAULT_LEADING: f32 = 12.0;

/// Line assembly state for one stream.
struct TextWalker<'a> {
    cmap: Option<&'a CMap>,
    in_text: bool,
    always_in_text: bool,
    /// Start of the current text line (line matrix translation).
    line_x: f32,
    line_y: f32,
    leading: f32,
    /// Y of the line being assembled, if any text was shown on it.
    current_y: Option<f32>,
    pending_space: bool,
    current: String,
    lines: Vec<String>,
}

impl<'a> TextWalker<'a> {
    fn new(cmap: Option<&'a CMap>, always_in_text: bool) -> Self {
        Self {
            cmap,
            in_text: always_in_text,
            always_in_text,
            line_x: 0.0,
            line_y: 0.0,
            leading: DEFAULT_LEADING,
            current_y: None,
            pending_space: false,
            current: String::new(),
            lines: Vec::new(),
        }
    }

    fn apply(&mut self, op: &Operation) {
        let nums: Vec<f32> = op.operands.iter().filter_map(Operand::as_number).collect();
        match op.operator.as_str() {
            "BT" => {
                self.in_text = true;
                self.line_x = 0.0;
                self.line_y = 0.0;
            }
            "ET" => {
                self.in_text = self.always_in_text;
                if !self.current.is_empty() {
                    self.pending_space = true;
                }
            }
            "TL" => {
                if let Some(&l) = nums.first() {
                    self.leading = l;
                }
            }
            "Td" | "TD" => {
                if nums.len() >= 2 {
                    if op.operator == "TD" {
                        self.leading = -nums[1];
                    }
                    self.move_to(self.line_x + nums[0], self.line_y + nums[1]);
                }
            }
            "Tm" => {
                if nums.len() >= 6 {
                    self.move_to(nums[4], nums[5]);
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(Operand::Str(bytes)) = op.operands.first() {
                    self.show(bytes);
                }
            }
            "TJ" => {
                if let Some(Operand::Array(items)) = op.operands.first() {
                    let mut text = String::new();
                    for item in items {
                        if let Operand::Str(bytes) = item {
                            text.push_str(&decode_text_bytes(bytes, self.cmap));
                        }
                    }
                    self.show_text(text);
                }
            }
            "'" => {
                self.next_line();
                if let Some(Operand::Str(bytes)) = op.operands.last() {
                    self.show(bytes);
                }
            }
            "\"" => {
                self.next_line();
                if let Some(Operand::Str(bytes)) = op.operands.get(2) {
                    self.show(bytes);
                }
            }
            _ => {}
        }
    }

    fn move_to(&mut self, x: f32, y: f32) {
        let moved_down = self
            .current_y
            .map_or(false, |cy| (cy - y).abs() > SAME_LINE_EPSILON);
        if moved_down {
            self.break_line();
        } else if !self.current.is_empty() {
            self.pending_space = true;
        }
        self.line_x = x;
        self.line_y = y;
    }

    fn next_line(&mut self) {
        self.break_line();
        self.line_y -= self.leading;
    }

    fn show(&mut self, bytes: &[u8]) {
        let text = decode_text_bytes(bytes, self.cmap);
        self.show_text(text);
    }

    fn show_text(&mut self, text: String) {
        if !self.in_text || text.is_empty() {
            return;
        }
        if self.pending_space && !self.current.ends_with(' ') && !text.starts_with(' ') {
            self.current.push(' ');
        }
        self.pending_space = false;
        self.current.push_str(&text);
        self.current_y = Some(self.line_y);
    }

    fn break_line(&mut self) {
        let line = self.current.trim();
        if !line.is_empty() {
            self.lines.push(line.to_string());
        }
        self.current.clear();
        self.current_y = None;
        self.pending_space = false;
    }

    fn finish(mut self) -> Vec<String> {
        self.break_line();
        self.lines
    }
}

/// Decode a string operand.
///
/// Order: document CMap, then UTF-16BE (BOM or mostly-ASCII code units),
/// then single-byte pass-through with control characters removed.
pub fn decode_text_bytes(bytes: &[u8], cmap: Option<&CMap>) -> String {
    if let Some(cmap) = cmap.filter(|c| !c.is_empty()) {
        let text = cmap.decode(bytes);
        if !text.trim().is_empty() {
            return text;
        }
    }

    if let Some(text) = decode_utf16_guess(bytes) {
        return text;
    }

    bytes
        .iter()
        .filter_map(|&b| single_byte_char(b))
        .collect()
}

fn decode_utf16_guess(bytes: &[u8]) -> Option<String> {
    let body = if bytes.starts_with(&[0xFE, 0xFF]) {
        &bytes[2..]
    } else {
        if bytes.len() < 2 || bytes.len() % 2 != 0 {
            return None;
        }
        let zero_high = bytes.chunks(2).filter(|c| c[0] == 0).count();
        if zero_high * 2 < bytes.len() / 2 {
            return None;
        }
        bytes
    };

    let units = body
        .chunks(2)
        .filter(|c| c.len() == 2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]));
    let text: String = char::decode_utf16(units)
        .filter_map(|r| r.ok())
        .filter(|c| !c.is_control() || *c == '\t')
        .collect();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Latin-1 with the WinAnsi characters that show up on statements.
fn single_byte_char(b: u8) -> Option<char> {
    match b {
        b'\t' => Some(' '),
        0x20..=0x7E => Some(b as char),
        0x80 => Some('€'),
        0x91 | 0x92 => Some('\''),
        0x93 | 0x94 => Some('"'),
        0x95 => Some('•'),
        0x96 | 0x97 => Some('-'),
        0xA0..=0xFF => Some(b as char),
        _ => None,
    }
}
