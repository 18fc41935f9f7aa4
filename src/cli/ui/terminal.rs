//! Terminal interview sink
//!
//! Assistant text goes to stdout as it streams; answers are read line by line
//! from stdin. Ctrl-C or end of input cancels the conversation at the next
//! prompt.

use std::io::Write;

use async_trait::async_trait;
use console::style;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::{Mutex, watch};
use tracing::debug;

use crate::discovery::UserInterface;
use crate::types::{DocflowError, Result};

pub struct TerminalUi {
    lines: Mutex<Lines<BufReader<Stdin>>>,
    interrupted: watch::Receiver<bool>,
}

impl TerminalUi {
    /// Must be called inside a tokio runtime; installs the Ctrl-C listener
    pub fn new() -> Self {
        let (tx, interrupted) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(true);
            }
        });
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
            interrupted,
        }
    }

    fn flush() {
        let _ = std::io::stdout().flush();
    }
}

#[async_trait]
impl UserInterface for TerminalUi {
    async fn prompt_text(&self, label: &str) -> Result<String> {
        let mut interrupted = self.interrupted.clone();
        if *interrupted.borrow() {
            return Err(DocflowError::Cancelled);
        }

        print!("{} ", style(format!("{} ›", label)).green().bold());
        Self::flush();

        let mut lines = self.lines.lock().await;
        // A listener that failed to install drops the sender; that branch is then disabled
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => Ok(line),
                None => {
                    debug!("End of input");
                    println!();
                    Err(DocflowError::Cancelled)
                }
            },
            Ok(()) = interrupted.changed() => {
                println!();
                Err(DocflowError::Cancelled)
            }
        }
    }

    fn begin_assistant(&self, header: &str) {
        print!("\n{} ", style(format!("{}:", header)).cyan().bold());
        Self::flush();
    }

    fn assistant_chunk(&self, chunk: &str) {
        print!("{}", chunk);
        Self::flush();
    }

    fn end_assistant(&self) {
        println!();
        Self::flush();
    }
}
