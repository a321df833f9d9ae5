use std::io::{self, BufRead, Write};

/// Asks the operator a yes/no question.
pub trait Confirm {
    /// Blocks until answered. `default` is taken for an empty answer; without
    /// one the question is repeated.
    fn confirm(&mut self, message: &str, default: Option<bool>) -> io::Result<bool>;
}

/// Prompts on stderr and reads answers from stdin.
#[derive(Debug, Default)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&mut self, message: &str, default: Option<bool>) -> io::Result<bool> {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        ask(&mut input, &mut io::stderr(), message, default)
    }
}

/// Answers yes to everything, for unattended runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&mut self, _message: &str, _default: Option<bool>) -> io::Result<bool> {
        Ok(true)
    }
}

fn ask<R: BufRead, W: Write>(
    input: &mut R,
    prompt: &mut W,
    message: &str,
    default: Option<bool>,
) -> io::Result<bool> {
    let choices = match default {
        Some(true) => "(Y/n)",
        Some(false) => "(y/N)",
        None => "(y/n)",
    };

    loop {
        write!(prompt, "{} {}: ", message, choices)?;
        prompt.flush()?;

        let mut answer = String::new();
        if input.read_line(&mut answer)? == 0 {
            // closed input
            return Ok(default.unwrap_or(false));
        }

        match answer.trim().to_ascii_uppercase().as_str() {
            "Y" | "YES" => return Ok(true),
            "N" | "NO" => return Ok(false),
            "" if default.is_some() => return Ok(default.unwrap_or(false)),
            _ => {}
        }
    }
}
