//! Operator interaction.
//!
//! The [`Operator`] trait decouples recovery decisions from the terminal.
//! Every prompt has a defined non-interactive answer ([`Headless`]): default
//! orientation, first schema in sorted order, and abort on any recovery
//! question.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::core::frame::Orientation;
use crate::core::types::Facing;

/// Operator answer to a recovery prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The condition was resolved by hand; try again.
    Retry,
    /// Stop now, where the agent stands.
    Abort,
    /// Give up on the current step, count it as failed and carry on.
    Cancel,
}

impl Decision {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "retry" | "r" | "y" | "yes" | "continue" => Some(Decision::Retry),
            "abort" | "a" | "q" | "quit" => Some(Decision::Abort),
            "cancel" | "c" | "n" | "no" => Some(Decision::Cancel),
            _ => None,
        }
    }
}

pub trait Operator {
    /// Ask for a recovery decision.
    fn decide(&mut self, prompt: &str) -> Decision;

    /// Ask which world direction the agent currently faces.
    fn choose_facing(&mut self, default: Facing) -> Facing;

    /// Ask which side of the agent the structure extends to.
    fn choose_orientation(&mut self, default: Orientation) -> Orientation;

    /// Ask which schema file to use. `candidates` is sorted.
    fn choose_schema(&mut self, candidates: &[PathBuf]) -> Option<PathBuf>;

    /// Yes/no question; `false` unless the operator explicitly agrees.
    fn confirm(&mut self, prompt: &str) -> bool;

    /// Show a diagnostic and wait until it has been seen.
    fn acknowledge(&mut self, message: &str);
}

/// Non-interactive fallback answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Headless;

impl Operator for Headless {
    fn decide(&mut self, prompt: &str) -> Decision {
        warn!(prompt, "no operator available, aborting");
        Decision::Abort
    }

    fn choose_facing(&mut self, default: Facing) -> Facing {
        default
    }

    fn choose_orientation(&mut self, default: Orientation) -> Orientation {
        default
    }

    fn choose_schema(&mut self, candidates: &[PathBuf]) -> Option<PathBuf> {
        candidates.first().cloned()
    }

    fn confirm(&mut self, _prompt: &str) -> bool {
        false
    }

    fn acknowledge(&mut self, message: &str) {
        warn!(message, "unacknowledged diagnostic");
    }
}

/// Line-oriented prompts over any reader/writer pair.
pub struct LineOperator<R, W> {
    input: R,
    output: W,
    max_invalid: u32,
}

impl LineOperator<io::StdinLock<'static>, io::Stderr> {
    /// Prompts on stderr, answers from stdin.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> LineOperator<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            max_invalid: 3,
        }
    }

    /// Print `prompt` and read one trimmed line; `None` on EOF or I/O error.
    fn ask(&mut self, prompt: &str) -> Option<String> {
        // Prompt output is best effort: a closed terminal reads as EOF below.
        let _ = write!(self.output, "{prompt} ");
        let _ = self.output.flush();
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }

    /// Ask until `parse` accepts the answer, an empty answer picks `default`.
    fn ask_parsed<T, F>(&mut self, prompt: &str, default: T, parse: F) -> T
    where
        F: Fn(&str) -> Option<T>,
    {
        for _ in 0..self.max_invalid {
            let Some(answer) = self.ask(prompt) else {
                return default;
            };
            if answer.is_empty() {
                return default;
            }
            if let Some(value) = parse(&answer) {
                return value;
            }
            let _ = writeln!(self.output, "unrecognised answer '{answer}'");
        }
        default
    }
}

impl<R: BufRead, W: Write> Operator for LineOperator<R, W> {
    fn decide(&mut self, prompt: &str) -> Decision {
        let _ = writeln!(self.output, "{prompt}");
        for _ in 0..self.max_invalid {
            let Some(answer) = self.ask("[retry/abort/cancel]>") else {
                return Decision::Abort;
            };
            if let Some(decision) = Decision::parse(&answer) {
                debug!(?decision, "operator decision");
                return decision;
            }
            let _ = writeln!(self.output, "unrecognised answer '{answer}'");
        }
        Decision::Abort
    }

    fn choose_facing(&mut self, default: Facing) -> Facing {
        let prompt = format!("Which way is the agent facing? [north/east/south/west] ({default})>");
        self.ask_parsed(&prompt, default, Facing::parse)
    }

    fn choose_orientation(&mut self, default: Orientation) -> Orientation {
        let prompt = "Build to the agent's right or left? [right/left]>";
        self.ask_parsed(prompt, default, Orientation::parse)
    }

    fn choose_schema(&mut self, candidates: &[PathBuf]) -> Option<PathBuf> {
        let first = candidates.first()?.clone();
        for (i, path) in candidates.iter().enumerate() {
            let _ = writeln!(self.output, "  {}) {}", i + 1, path.display());
        }
        let count = candidates.len();
        let index = self.ask_parsed("Schema number (1)>", 0, |raw| {
            raw.parse::<usize>()
                .ok()
                .filter(|n| (1..=count).contains(n))
                .map(|n| n - 1)
        });
        Some(candidates.get(index).cloned().unwrap_or(first))
    }

    fn confirm(&mut self, prompt: &str) -> bool {
        let prompt = format!("{prompt} [y/N]>");
        self.ask_parsed(&prompt, false, |raw| match raw.to_ascii_lowercase().as_str() {
            "y" | "yes" => Some(true),
            "n" | "no" => Some(false),
            _ => None,
        })
    }

    fn acknowledge(&mut self, message: &str) {
        let _ = writeln!(self.output, "{message}");
        let _ = self.ask("Press enter to continue>");
    }
}

/// Interactive operator when stdin is a terminal, [`Headless`] otherwise.
pub fn default_operator() -> Box<dyn Operator> {
    if io::stdin().is_terminal() {
        Box::new(LineOperator::stdio())
    } else {
        Box::new(Headless)
    }
}
