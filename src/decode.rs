// decode.rs — front-end over the external instruction decoder (iced-x86)

use iced_x86::{
    Decoder, DecoderOptions, Formatter, GasFormatter, Instruction, IntelFormatter, MasmFormatter,
    NasmFormatter,
};
use itertools::Itertools;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("wrong or invalid opcode")]
    InvalidOpcode,

    #[error("unsupported bitness: {0}")]
    UnsupportedBitness(u32),
}

/// Output syntax flavor, selected with `set flavor=<name>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flavor {
    #[default]
    Intel, // mov eax, [rbx+4]
    Att,  // movl 4(%rbx), %eax
    Nasm, // mov eax, dword [rbx+4]
    Masm, // mov eax, DWORD PTR [rbx+4]
}

impl Flavor {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "intel" => Some(Self::Intel),
            "att" | "gas" => Some(Self::Att),
            "nasm" => Some(Self::Nasm),
            "masm" => Some(Self::Masm),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Intel => "intel",
            Self::Att => "att",
            Self::Nasm => "nasm",
            Self::Masm => "masm",
        }
    }

    fn formatter(self) -> Box<dyn Formatter> {
        match self {
            Self::Intel => Box::new(IntelFormatter::new()),
            Self::Att => Box::new(GasFormatter::new()),
            Self::Nasm => Box::new(NasmFormatter::new()),
            Self::Masm => Box::new(MasmFormatter::new()),
        }
    }
}

/// One successfully decoded instruction.
pub struct Decoded {
    instruction: Instruction,
    pub length: usize,
}

/// Decodes the first instruction in `bytes` at the given bitness
/// (16/32/64). Bytes past the first instruction are ignored.
pub fn decode_one(bytes: &[u8], bitness: u32) -> Result<Decoded, DecodeError> {
    let mut decoder = Decoder::try_with_ip(bitness, bytes, 0, DecoderOptions::NONE)
        .map_err(|_| DecodeError::UnsupportedBitness(bitness))?;
    let instruction = decoder.decode();
    if instruction.is_invalid() {
        return Err(DecodeError::InvalidOpcode);
    }
    Ok(Decoded {
        length: instruction.len(),
        instruction,
    })
}

impl Decoded {
    /// Renders the instruction in the requested dialect.
    pub fn format(&self, flavor: Flavor) -> String {
        let mut out = String::new();
        flavor.formatter().format(&self.instruction, &mut out);
        out
    }

    /// Renders with the mnemonic in blue and the operands in red.
    pub fn format_colored(&self, flavor: Flavor) -> String {
        let text = self.format(flavor);
        match text.split_once(' ') {
            Some((mnemonic, operands)) => {
                format!("\x1b[34m{mnemonic} \x1b[31m{operands}\x1b[0m")
            }
            None => format!("\x1b[34m{text}\x1b[0m"),
        }
    }

    /// The JSON record printed in `set json` mode.
    pub fn record(&self, flavor: Flavor) -> OpcodeRecord {
        let mut formatter = flavor.formatter();
        let mut mnemonic = String::new();
        formatter.format_mnemonic(&self.instruction, &mut mnemonic);
        let mut operands = String::new();
        formatter.format_all_operands(&self.instruction, &mut operands);
        let args = if operands.is_empty() {
            Vec::new()
        } else {
            operands.split(',').map(|a| a.trim().to_string()).collect()
        };
        OpcodeRecord {
            length: self.length,
            instruction: mnemonic,
            args,
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct OpcodeRecord {
    pub length: usize,
    pub instruction: String,
    pub args: Vec<String>,
}

/// Space-separated uppercase hex listing of a byte payload, for echoing
/// what was appended to an image.
pub fn byte_listing(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).join(" ")
}
