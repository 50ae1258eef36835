// history.rs

use std::collections::VecDeque;
use std::env;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;

/// Upper bound on stored entries; the oldest entry is evicted first.
pub const MAX_HISTORY: usize = 200;

pub const HISTORY_FILENAME: &str = ".history_file";

/// Control words that never enter the history.
const DENYLIST: [&str; 3] = ["q", "quit", "history"];

/// Bounded, file-backed command history with a browse cursor.
///
/// The cursor only moves during `up`/`down` browsing; appends always go to
/// the end. The backing file is read once by `populate` and rewritten in
/// full by `save`; in between, the file and the in-memory log may diverge.
pub struct History {
    file: Option<File>,
    entries: VecDeque<String>,
    pos: usize,
}

fn backing_path() -> PathBuf {
    if let Some(home) = env::var_os("HOME") {
        if !home.is_empty() {
            return PathBuf::from(home).join(HISTORY_FILENAME);
        }
    }
    let tmp = env::temp_dir();
    if tmp.as_os_str().is_empty() {
        return Path::new(".").join(HISTORY_FILENAME);
    }
    tmp.join(HISTORY_FILENAME)
}

impl History {
    /// Opens the backing file at `$HOME/.history_file` (falling back to the
    /// temp dir, then the current directory), creating it if absent.
    /// Entries are not loaded until `populate` is called.
    pub fn open() -> anyhow::Result<Self> {
        Self::open_at(&backing_path())
    }

    pub fn open_at(path: &Path) -> anyhow::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .with_context(|| format!("cannot open history file {}", path.display()))?;
        Ok(Self {
            file: Some(file),
            entries: VecDeque::new(),
            pos: 0,
        })
    }

    /// A history with no backing file; `save` is a no-op. Used when the
    /// backing file cannot be opened so the session can still run.
    pub fn in_memory() -> Self {
        Self {
            file: None,
            entries: VecDeque::new(),
            pos: 0,
        }
    }

    /// Loads at most `MAX_HISTORY` lines from the backing file, oldest
    /// first. Lines are taken verbatim; anything past the cap is dropped.
    /// Leaves the cursor on the last entry.
    pub fn populate(&mut self) -> io::Result<()> {
        if let Some(file) = &mut self.file {
            file.rewind()?;
            let reader = BufReader::new(&*file);
            for line in reader.lines().take(MAX_HISTORY) {
                self.entries.push_back(line?);
            }
        }
        self.pos = self.entries.len().saturating_sub(1);
        Ok(())
    }

    /// Appends a line, evicting the oldest entry when at capacity.
    /// Denylisted control words are ignored. Returns the resulting length.
    /// The cursor is not moved.
    pub fn append(&mut self, line: &str) -> usize {
        if DENYLIST.contains(&line) {
            return self.entries.len();
        }
        if self.entries.len() == MAX_HISTORY {
            self.entries.pop_front();
        }
        self.entries.push_back(line.to_string());
        self.entries.len()
    }

    /// Moves the cursor one step toward the oldest entry and returns the
    /// entry there. Clamped at the first entry; empty history yields `""`.
    pub fn up(&mut self) -> &str {
        if self.entries.is_empty() {
            return "";
        }
        if self.pos >= 1 {
            self.pos -= 1;
        }
        &self.entries[self.pos]
    }

    /// Moves the cursor one step toward the newest entry and returns the
    /// entry there. Clamped at the last entry; empty history yields `""`.
    pub fn down(&mut self) -> &str {
        if self.entries.is_empty() {
            return "";
        }
        if self.pos + 1 < self.entries.len() {
            self.pos += 1;
        }
        &self.entries[self.pos]
    }

    /// Puts the cursor back on the last entry (0 when empty) and returns
    /// the new cursor. Called before every fresh prompt line.
    pub fn reset_cursor(&mut self) -> usize {
        self.pos = self.entries.len().saturating_sub(1);
        self.pos
    }

    /// Empties the in-memory log. The backing file is untouched until
    /// `save` runs.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.pos = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.entries.iter()
    }

    /// Truncates the backing file and rewrites every entry in order, one
    /// per line, then releases the handle. The single reconciliation point
    /// between memory and disk; expected to run once, at shutdown.
    pub fn save(mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.set_len(0)?;
            file.rewind()?;
            for entry in &self.entries {
                writeln!(file, "{entry}")?;
            }
            file.flush()?;
        }
        Ok(())
    }
}
