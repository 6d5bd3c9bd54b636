use std::io::{self, BufRead, Write};

use faltung_core::{parse, Sequence};

/// Line based question and answer on a terminal.
pub struct Prompt<R, W> {
    input: R,
    output: W,
}

impl Prompt<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn ask(&mut self, question: &str) -> anyhow::Result<String> {
        write!(self.output, "{question}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            anyhow::bail!("input closed while waiting for: {}", question.trim());
        }

        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    pub fn pause(&mut self, message: &str) -> anyhow::Result<()> {
        self.ask(message).map(|_| ())
    }

    /// Reads a sequence and the index of its element at axis zero.
    pub fn sequence(&mut self, name: &str) -> anyhow::Result<Sequence> {
        let values = self.ask(&format!("Enter the {name} vector (separate with space): "))?;
        let offset = self.ask("Enter the element's index which located at (x-axis 0): ")?;

        let offset = parse::integer(&offset)?;
        Ok(parse::sequence(&values, offset)?)
    }

    pub fn integer_or<T: std::str::FromStr>(
        &mut self,
        question: &str,
        default: T,
    ) -> anyhow::Result<T> {
        let answer = self.ask(question)?;
        Ok(parse::integer_or(&answer, default)?)
    }

    pub fn say(&mut self, message: impl std::fmt::Display) -> anyhow::Result<()> {
        writeln!(self.output, "{message}")?;
        Ok(())
    }
}
