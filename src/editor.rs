// editor.rs

use std::io::{self, Read, Write};

use nix::sys::termios::{self, LocalFlags, SetArg, Termios};

use crate::history::History;

const ESC: u8 = 0x1b;
const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7f;

/// Puts stdin into raw mode (no line buffering, no local echo, no signal
/// characters) and restores the saved attributes when dropped, so every
/// exit path of the read loop leaves the terminal usable.
pub struct RawModeGuard {
    saved: Termios,
}

impl RawModeGuard {
    pub fn new() -> nix::Result<Self> {
        let saved = termios::tcgetattr(libc::STDIN_FILENO)?;
        let mut raw = saved.clone();
        raw.local_flags
            .remove(LocalFlags::ICANON | LocalFlags::ECHO | LocalFlags::ISIG);
        termios::tcsetattr(libc::STDIN_FILENO, SetArg::TCSANOW, &raw)?;
        Ok(Self { saved })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = termios::tcsetattr(libc::STDIN_FILENO, SetArg::TCSANOW, &self.saved);
    }
}

/// Single-threaded, byte-at-a-time line editor.
///
/// Generic over the byte source and sink so the state machine can be
/// driven from in-memory buffers in tests; the REPL wires it to
/// stdin/stdout under a `RawModeGuard`. The editor does its own echo and
/// redraws the whole line (`\r`, erase, prompt, buffer) after any edit
/// that can shorten or replace the visible text.
pub struct LineEditor<R, W> {
    input: R,
    output: W,
    prompt: &'static str,
}

impl<R: Read, W: Write> LineEditor<R, W> {
    pub fn new(input: R, output: W, prompt: &'static str) -> Self {
        Self {
            input,
            output,
            prompt,
        }
    }

    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.input.read(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    fn redraw(&mut self, buf: &str) -> io::Result<()> {
        write!(self.output, "\r\x1b[K{}{}", self.prompt, buf)?;
        self.output.flush()
    }

    /// Blocks until a full line is entered and returns it (without the
    /// terminating newline). The caller resets the history cursor before
    /// calling and appends the completed line afterwards.
    pub fn read_line(&mut self, history: &mut History) -> io::Result<String> {
        let mut buf = String::new();
        write!(self.output, "{}", self.prompt)?;
        self.output.flush()?;

        loop {
            let byte = match self.next_byte()? {
                Some(b) => b,
                None if !buf.is_empty() => break,
                None => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "end of input",
                    ))
                }
            };

            match byte {
                b'\n' | b'\r' => break,
                BACKSPACE | DELETE => {
                    if buf.pop().is_some() {
                        self.redraw(&buf)?;
                    }
                }
                ESC => {
                    // Arrow keys arrive as ESC [ A/B; everything else is
                    // absorbed (two bytes) and dropped.
                    let first = self.next_byte()?;
                    let second = self.next_byte()?;
                    match (first, second) {
                        (Some(b'['), Some(b'A')) if !history.is_empty() => {
                            buf.clear();
                            buf.push_str(history.up());
                            self.redraw(&buf)?;
                        }
                        (Some(b'['), Some(b'B')) if !history.is_empty() => {
                            buf.clear();
                            buf.push_str(history.down());
                            self.redraw(&buf)?;
                        }
                        _ => {}
                    }
                }
                0x20..=0x7e => {
                    buf.push(byte as char);
                    self.output.write_all(&[byte])?;
                    self.output.flush()?;
                }
                _ => {}
            }
        }

        self.output.write_all(b"\n")?;
        self.output.flush()?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read(input: &[u8], history: &mut History) -> String {
        history.reset_cursor();
        let mut out = Vec::new();
        let mut editor = LineEditor::new(Cursor::new(input.to_vec()), &mut out, "> ");
        editor.read_line(history).unwrap()
    }

    #[test]
    fn plain_typing_returns_the_line() {
        let mut h = History::in_memory();
        assert_eq!(read(b"31c0\n", &mut h), "31c0");
    }

    #[test]
    fn carriage_return_also_terminates() {
        let mut h = History::in_memory();
        assert_eq!(read(b"push rbp\r", &mut h), "push rbp");
    }

    #[test]
    fn backspace_removes_last_character() {
        let mut h = History::in_memory();
        assert_eq!(read(b"abx\x7fc\n", &mut h), "abc");
        assert_eq!(read(b"ab\x08\x08\x08cd\n", &mut h), "cd");
    }

    #[test]
    fn up_arrow_replaces_buffer_with_history_entry() {
        let mut h = History::in_memory();
        h.append("mov eax, ebx");
        h.append("push rbp");
        // half-typed text is discarded wholesale by navigation
        assert_eq!(read(b"90\x1b[A\n", &mut h), "mov eax, ebx");
    }

    #[test]
    fn down_arrow_walks_back_toward_newest() {
        let mut h = History::in_memory();
        h.append("a");
        h.append("b");
        h.append("c");
        assert_eq!(read(b"\x1b[A\x1b[A\x1b[B\n", &mut h), "b");
    }

    #[test]
    fn arrows_ignored_on_empty_history() {
        let mut h = History::in_memory();
        assert_eq!(read(b"\x1b[A\x1b[B90\n", &mut h), "90");
    }

    #[test]
    fn unknown_escape_sequences_are_absorbed() {
        let mut h = History::in_memory();
        h.append("noise");
        // right arrow (ESC [ C) has no effect and eats both bytes
        assert_eq!(read(b"\x1b[Cxy\n", &mut h), "xy");
    }

    #[test]
    fn non_printable_bytes_are_ignored() {
        let mut h = History::in_memory();
        assert_eq!(read(b"\x01\x02a\x03b\n", &mut h), "ab");
    }

    #[test]
    fn eof_with_pending_text_returns_it() {
        let mut h = History::in_memory();
        assert_eq!(read(b"cc", &mut h), "cc");
    }

    #[test]
    fn eof_with_empty_buffer_is_an_error() {
        let mut h = History::in_memory();
        let mut out = Vec::new();
        let mut editor = LineEditor::new(Cursor::new(Vec::new()), &mut out, "> ");
        let err = editor.read_line(&mut h).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn redraw_clears_the_line_before_reprinting() {
        let mut h = History::in_memory();
        h.append("push rbp");
        h.reset_cursor();
        let mut out = Vec::new();
        let mut editor = LineEditor::new(Cursor::new(b"\x1b[A\n".to_vec()), &mut out, "> ");
        editor.read_line(&mut h).unwrap();
        let rendered = String::from_utf8(out).unwrap();
        assert!(rendered.contains("\r\x1b[K> push rbp"));
    }
}
