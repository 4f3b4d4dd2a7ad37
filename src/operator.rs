//! Operator interaction.
//!
//! Destructive steps are gated on typed tokens rather than yes/no answers.
//! [`ask_token`] keeps asking until one of the two accepted tokens is typed.

use anyhow::Result;
use colored::Colorize;
use dialoguer::Input;
use tracing::debug;

/// Source of operator input lines.
pub trait Operator {
    fn read_line(&mut self, prompt: &str) -> Result<String>;
}

/// Operator decision at a confirmation gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Abort,
}

/// Ask until the operator types `proceed` or `abort` (case-insensitive).
///
/// There is no default: empty or unrecognized input re-prompts.
pub fn ask_token<O: Operator + ?Sized>(
    operator: &mut O,
    prompt: &str,
    proceed: &str,
    abort: &str,
) -> Result<Decision> {
    let mut prompt = prompt.to_string();
    loop {
        let answer = operator.read_line(&prompt)?;
        match parse_token(&answer, proceed, abort) {
            Some(decision) => {
                debug!("Operator answered {:?}", decision);
                return Ok(decision);
            }
            None => {
                prompt = format!("Please type '{}' or '{}'", proceed, abort);
            }
        }
    }
}

/// Match an answer against the two accepted tokens.
pub fn parse_token(answer: &str, proceed: &str, abort: &str) -> Option<Decision> {
    let answer = answer.trim();
    if answer.eq_ignore_ascii_case(proceed) {
        Some(Decision::Proceed)
    } else if answer.eq_ignore_ascii_case(abort) {
        Some(Decision::Abort)
    } else {
        None
    }
}

/// Terminal operator backed by dialoguer.
pub struct TerminalOperator;

impl Operator for TerminalOperator {
    fn read_line(&mut self, prompt: &str) -> Result<String> {
        let answer: String = Input::new()
            .with_prompt(format!("{}", prompt.bold()))
            .allow_empty(true)
            .interact_text()?;
        Ok(answer)
    }
}
