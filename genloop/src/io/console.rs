//! Operator-facing console I/O.
//!
//! Menus, questions and confirmations go through [`Console`] so steps stay
//! testable with scripted answers. Diagnostics go through tracing instead.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result, bail};

pub trait Console {
    /// Print a line for the operator.
    fn say(&self, text: &str);

    /// Print `prompt` and read one line, without the trailing newline.
    fn ask(&self, prompt: &str) -> Result<String>;
}

/// Console over the process stdin/stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdConsole;

impl Console for StdConsole {
    fn say(&self, text: &str) {
        println!("{text}");
    }

    fn ask(&self, prompt: &str) -> Result<String> {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{prompt}").context("write prompt")?;
        stdout.flush().context("flush stdout")?;
        drop(stdout);

        let mut line = String::new();
        let read = io::stdin()
            .lock()
            .read_line(&mut line)
            .context("read operator input")?;
        if read == 0 {
            bail!("operator input closed");
        }
        Ok(line.trim_end_matches(['\n', '\r']).to_string())
    }
}
