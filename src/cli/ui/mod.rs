mod output;
mod terminal;

pub use output::Output;
pub use terminal::TerminalUi;
