use anyhow::Result;

mod decode;
mod editor;
mod elf;
mod history;
mod parser;
mod repl;

use history::History;

fn main() -> Result<()> {
    // A history that cannot be opened is not fatal; the session just runs
    // with an empty, unsaved one.
    let mut history = match History::open() {
        Ok(history) => history,
        Err(err) => {
            eprintln!("Error: {err}; history will not be saved");
            History::in_memory()
        }
    };
    if let Err(err) = history.populate() {
        eprintln!("Error: cannot read history: {err}");
    }

    repl::run(&mut history)?;

    if let Err(err) = history.save() {
        eprintln!("Error: cannot save history: {err}");
    }
    Ok(())
}
