//! Sample output.
//!
//! The samples write their narrative through a [`Console`]. With `--json`
//! the models they fetch are also printed as pretty JSON after the line
//! that introduces them.

use crate::DemoError;
use serde::Serialize;
use std::io::{self, Write};

/// Writer for the sample narrative
pub struct Console<W> {
    out: W,
    json: bool,
}

impl<W: Write> Console<W> {
    /// Console that prints the narrative only
    pub fn new(out: W) -> Self {
        Self { out, json: false }
    }

    /// Print fetched models as JSON as well
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn json(&self) -> bool {
        self.json
    }

    /// Print `model` as JSON when JSON output is enabled
    pub fn model<T: Serialize + ?Sized>(&mut self, model: &T) -> Result<(), DemoError> {
        if self.json {
            let rendered = serde_json::to_string_pretty(model)?;
            writeln!(self.out, "{}", rendered)?;
        }
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Write for Console<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.out.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

#[cfg(test)]
#[path = "console_tests.rs"]
mod tests;
