// repl.rs

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use anyhow::Result;

use crate::decode::{self, Flavor};
use crate::editor::{LineEditor, RawModeGuard};
use crate::elf::Image;
use crate::history::History;
use crate::parser::{self, Command, Setting};

const PROMPT: &str = "> ";

/// Mutable session configuration, owned by the loop and threaded through
/// every iteration rather than living in globals.
pub struct Session {
    flavor: Flavor,
    json: bool,
    colors: bool,
    bitness: u32,
    output: Option<File>,
    image: Option<Image>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            flavor: Flavor::default(),
            json: false,
            colors: false,
            bitness: 64,
            output: None,
            image: None,
        }
    }
}

pub fn run(history: &mut History) -> Result<()> {
    let mut session = Session::default();

    loop {
        history.reset_cursor();
        let line = {
            // Raw mode only for the duration of the read; command output
            // goes out with the terminal back in cooked mode. Fails on a
            // non-terminal stdin, where line input works without it.
            let _raw = RawModeGuard::new().ok();
            let mut editor = LineEditor::new(io::stdin(), io::stdout(), PROMPT);
            match editor.read_line(history) {
                Ok(line) => line,
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(err) => return Err(err.into()),
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        history.append(line);

        match parser::parse(line) {
            Ok(Command::Quit) => break,
            Ok(Command::ShowHistory) => show_history(history),
            Ok(Command::Create(path)) => session.create_image(&path),
            Ok(Command::Set(setting)) => session.apply(setting),
            Ok(Command::Opcodes(bytes)) => session.handle_opcodes(&bytes),
            Err(err) => eprintln!("Error: {err}."),
        }
    }

    Ok(())
}

fn show_history(history: &History) {
    if history.is_empty() {
        println!("empty");
        return;
    }
    for (i, entry) in history.iter().enumerate() {
        println!("{i:>5}  {entry}");
    }
}

impl Session {
    /// Opens a fresh image at `path`, replacing (and thereby closing) any
    /// previous one.
    fn create_image(&mut self, path: &str) {
        match Image::create(Path::new(path)) {
            Ok(image) => {
                self.image = Some(image);
                println!("Custom ELF file '{path}' created. All written opcodes will go there!");
            }
            Err(err) => eprintln!("Error: {err}"),
        }
    }

    fn apply(&mut self, setting: Setting) {
        match setting {
            Setting::Json => self.json = !self.json,
            Setting::Colors => self.colors = !self.colors,
            Setting::Flavor(flavor) => self.flavor = flavor,
            Setting::Bits(bits) => self.bitness = bits,
            Setting::Output(path) => {
                match OpenOptions::new().create(true).append(true).open(&path) {
                    Ok(file) => self.output = Some(file),
                    Err(err) => eprintln!("Error: {err}"),
                }
            }
        }
    }

    /// Decodes a hex payload for display; on success the raw bytes are
    /// also appended to the active image, if any. A failed image write is
    /// reported and the iteration continues.
    fn handle_opcodes(&mut self, bytes: &[u8]) {
        let decoded = match decode::decode_one(bytes, self.bitness) {
            Ok(decoded) => decoded,
            Err(err) => {
                eprintln!("Error: {err}.");
                return;
            }
        };

        if let Some(image) = &mut self.image {
            if let Err(err) = image.append(bytes) {
                eprintln!("Error: unable to write to custom ELF: {err}");
            }
        }

        // Only the first instruction is displayed; the whole payload still
        // went to the image above.
        if decoded.length < bytes.len() {
            eprintln!(
                "Warning: trailing bytes not decoded: {}",
                decode::byte_listing(&bytes[decoded.length..])
            );
        }

        if self.json {
            match serde_json::to_string_pretty(&decoded.record(self.flavor)) {
                Ok(json) => println!("{json}"),
                Err(err) => eprintln!("Error: {err}"),
            }
            return;
        }

        let text = decoded.format(self.flavor);
        match &mut self.output {
            Some(file) => {
                if let Err(err) = writeln!(file, "{text}") {
                    eprintln!("Error: {err}");
                }
            }
            None if self.colors => println!("{}", decoded.format_colored(self.flavor)),
            None => println!("{text}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elf;

    #[test]
    fn toggles_flip_back_and_forth() {
        let mut session = Session::default();
        session.apply(Setting::Json);
        assert!(session.json);
        session.apply(Setting::Json);
        assert!(!session.json);
        session.apply(Setting::Colors);
        assert!(session.colors);
    }

    #[test]
    fn flavor_and_bits_are_assigned() {
        let mut session = Session::default();
        session.apply(Setting::Flavor(Flavor::Att));
        assert_eq!(session.flavor, Flavor::Att);
        session.apply(Setting::Bits(32));
        assert_eq!(session.bitness, 32);
    }

    #[test]
    fn decoded_payloads_accumulate_in_the_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");

        let mut session = Session::default();
        session.create_image(path.to_str().unwrap());
        session.handle_opcodes(&[0x31, 0xc0]); // xor eax, eax
        session.handle_opcodes(&[0x0f, 0x05]); // syscall

        let data = std::fs::read(&path).unwrap();
        assert_eq!(&data[elf::HEADER_SIZE..], &[0x31, 0xc0, 0x0f, 0x05]);
    }

    #[test]
    fn invalid_payloads_never_reach_the_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");

        let mut session = Session::default();
        session.create_image(path.to_str().unwrap());
        session.handle_opcodes(&[0x0f]); // incomplete opcode

        let data = std::fs::read(&path).unwrap();
        assert_eq!(data.len(), elf::HEADER_SIZE);
    }

    #[test]
    fn creating_again_starts_a_fresh_image() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.bin");
        let second = dir.path().join("second.bin");

        let mut session = Session::default();
        session.create_image(first.to_str().unwrap());
        session.handle_opcodes(&[0x90]);
        session.create_image(second.to_str().unwrap());
        session.handle_opcodes(&[0xc3]);

        let first_data = std::fs::read(&first).unwrap();
        let second_data = std::fs::read(&second).unwrap();
        assert_eq!(&first_data[elf::HEADER_SIZE..], &[0x90]);
        assert_eq!(&second_data[elf::HEADER_SIZE..], &[0xc3]);
    }

    #[test]
    fn redirected_output_receives_the_listing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("listing.txt");

        let mut session = Session::default();
        session.apply(Setting::Output(path.to_str().unwrap().to_string()));
        session.handle_opcodes(&[0x55]); // push rbp

        let listing = std::fs::read_to_string(&path).unwrap();
        assert!(listing.contains("push"), "got {listing:?}");
    }
}
