// parser.rs

use thiserror::Error;

use crate::decode::Flavor;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unable to parse opcodes")]
    BadOpcodes,

    #[error("unknown flavor")]
    UnknownFlavor,

    #[error("bitness must be 16, 32 or 64")]
    BadBitness,

    #[error("couldn't set an option")]
    UnknownOption,

    #[error("create needs a file path")]
    MissingPath,
}

/// A completed input line, classified.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Quit,
    ShowHistory,
    Create(String),
    Set(Setting),
    Opcodes(Vec<u8>),
}

#[derive(Debug, PartialEq, Eq)]
pub enum Setting {
    Json,
    Colors,
    Flavor(Flavor),
    Output(String),
    Bits(u32),
}

pub fn parse(line: &str) -> Result<Command, ParseError> {
    let line = line.trim();
    match line {
        "quit" | "q" => return Ok(Command::Quit),
        "history" => return Ok(Command::ShowHistory),
        _ => {}
    }
    if line == "create" || line.starts_with("create ") {
        let path = line["create".len()..].trim();
        if path.is_empty() {
            return Err(ParseError::MissingPath);
        }
        return Ok(Command::Create(path.to_string()));
    }
    if line == "set" || line.starts_with("set ") {
        return parse_set(line).map(Command::Set);
    }
    parse_opcodes(line).map(Command::Opcodes)
}

// `set json` and `set colors` are bare toggles; the rest take `key=value`.
fn parse_set(line: &str) -> Result<Setting, ParseError> {
    match line.split_once('=') {
        None => match line {
            "set json" => Ok(Setting::Json),
            "set colors" => Ok(Setting::Colors),
            _ => Err(ParseError::UnknownOption),
        },
        Some((key, value)) => match key.trim_end() {
            "set flavor" => Flavor::from_name(value.trim())
                .map(Setting::Flavor)
                .ok_or(ParseError::UnknownFlavor),
            "set output" => {
                let path = value.trim();
                if path.is_empty() {
                    return Err(ParseError::MissingPath);
                }
                Ok(Setting::Output(path.to_string()))
            }
            "set bits" => match value.trim() {
                "16" => Ok(Setting::Bits(16)),
                "32" => Ok(Setting::Bits(32)),
                "64" => Ok(Setting::Bits(64)),
                _ => Err(ParseError::BadBitness),
            },
            _ => Err(ParseError::UnknownOption),
        },
    }
}

/// Parses an even-length run of hex digit pairs into raw bytes.
pub fn parse_opcodes(s: &str) -> Result<Vec<u8>, ParseError> {
    if s.is_empty() || s.len() % 2 != 0 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ParseError::BadOpcodes);
    }
    s.as_bytes()
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).map_err(|_| ParseError::BadOpcodes)?;
            u8::from_str_radix(pair, 16).map_err(|_| ParseError::BadOpcodes)
        })
        .collect()
}
