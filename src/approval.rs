//! Operator confirmation for the verify workflow.

use std::{collections::VecDeque, io::{self, BufRead, Write}};

pub const CONFIRM_OPTIONS: &str = "[y/N/a(bort)]";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Approval { Yes, No, Abort }

impl Approval {
    /// `y…` / `n…` or empty / `a…`; anything else is not an answer.
    pub fn parse(answer: &str) -> Option<Self> {
        let answer = answer.trim().to_lowercase();
        if answer.starts_with('y') {
            Some(Self::Yes)
        } else if answer.is_empty() || answer.starts_with('n') {
            Some(Self::No)
        } else if answer.starts_with('a') {
            Some(Self::Abort)
        } else {
            None
        }
    }
}

pub trait ApprovalProvider {
    fn ask(&mut self, prompt: &str) -> io::Result<Approval>;
}

/// Blocks on a line reader until it gets a recognised answer.
pub struct TerminalApproval<R, W> {
    input: R,
    output: W,
}

impl TerminalApproval<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self { input: io::stdin().lock(), output: io::stdout() }
    }
}

impl<R: BufRead, W: Write> TerminalApproval<R, W> {
    pub fn new(input: R, output: W) -> Self { Self { input, output } }
}

impl<R: BufRead, W: Write> ApprovalProvider for TerminalApproval<R, W> {
    fn ask(&mut self, prompt: &str) -> io::Result<Approval> {
        loop {
            write!(self.output, "{prompt} {CONFIRM_OPTIONS}: ")?;
            self.output.flush()?;
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed while waiting for an answer"));
            }
            match Approval::parse(&line) {
                Some(a) => return Ok(a),
                None => writeln!(self.output, "Invalid input. Please enter 'y', 'n', or 'a'.")?,
            }
        }
    }
}

/// Replays a fixed list of answers and records every prompt it was shown.
#[derive(Debug, Default)]
pub struct ScriptedApproval {
    answers: VecDeque<Approval>,
    pub asked: Vec<String>,
}

impl ScriptedApproval {
    pub fn new(answers: impl IntoIterator<Item = Approval>) -> Self {
        Self { answers: answers.into_iter().collect(), asked: vec![] }
    }
}

impl ApprovalProvider for ScriptedApproval {
    fn ask(&mut self, prompt: &str) -> io::Result<Approval> {
        self.asked.push(prompt.to_string());
        self.answers.pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, format!("no scripted answer for: {prompt}")))
    }
}
