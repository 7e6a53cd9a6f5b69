// SPDX-License-Identifier: GPL-3.0-or-later
use std::collections::VecDeque;
use std::io::BufRead;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// The operator abandoned a prompt. Aborts the whole run, not just one tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PromptError {
    #[error("prompt cancelled by operator")]
    Cancelled,
}

pub type AnswerCheck = dyn Fn(&str) -> bool + Send + Sync;

/// Human interaction boundary.
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Free-text answer; an empty answer falls back to `default`, or to an empty string.
    async fn ask_string(&self, question: &str, default: Option<&str>)
        -> Result<String, PromptError>;

    async fn ask_yes_no(&self, question: &str, default: bool) -> Result<bool, PromptError>;

    /// Ask until the answer is blank or passes `is_valid`. Blank answers come back empty so
    /// callers can treat them as an explicit skip.
    async fn ask_until_valid(
        &self,
        question: &str,
        is_valid: &AnswerCheck,
        invalid_hint: &str,
    ) -> Result<String, PromptError> {
        loop {
            let answer = self.ask_string(question, None).await?;
            if let Some(answer) = accept(&answer, is_valid, invalid_hint) {
                return Ok(answer);
            }
        }
    }
}

fn accept(answer: &str, is_valid: &AnswerCheck, invalid_hint: &str) -> Option<String> {
    let trimmed = answer.trim();
    if trimmed.is_empty() || is_valid(trimmed) {
        return Some(trimmed.to_string());
    }
    warn!(target: "prompt", answer = trimmed, "{invalid_hint}");
    None
}

/// Questions on stdout, answers from stdin.
///
/// Lines are read on a plain OS thread and handed over through a channel, so a pending prompt
/// can be abandoned without leaving a runtime task blocked on the terminal. One question holds
/// the input for all of its retries; questions from concurrent tracker runs never interleave.
/// Closed input or Ctrl+C while waiting counts as cancellation.
pub struct TerminalPrompter {
    answers: Mutex<mpsc::Receiver<String>>,
}

impl TerminalPrompter {
    pub fn new() -> Self {
        let (lines, answers) = mpsc::channel(1);
        std::thread::spawn(move || forward_stdin(lines));
        Self::with_input(answers)
    }

    /// Answers come from `answers`; the prompt is cancelled once every sender is gone.
    pub fn with_input(answers: mpsc::Receiver<String>) -> Self {
        Self {
            answers: Mutex::new(answers),
        }
    }
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

fn forward_stdin(lines: mpsc::Sender<String>) {
    for line in std::io::stdin().lock().lines() {
        let Ok(line) = line else {
            break;
        };
        if lines.blocking_send(line).is_err() {
            break;
        }
    }
    debug!(target: "prompt", "terminal input closed");
}

async fn read_answer(
    answers: &mut mpsc::Receiver<String>,
    prompt: &str,
) -> Result<String, PromptError> {
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(prompt.as_bytes())
        .await
        .map_err(|_| PromptError::Cancelled)?;
    stdout.flush().await.map_err(|_| PromptError::Cancelled)?;

    tokio::select! {
        line = answers.recv() => line
            .map(|line| line.trim_end_matches('\r').to_string())
            .ok_or(PromptError::Cancelled),
        _ = tokio::signal::ctrl_c() => Err(PromptError::Cancelled),
    }
}

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn ask_string(
        &self,
        question: &str,
        default: Option<&str>,
    ) -> Result<String, PromptError> {
        let prompt = match default {
            Some(default) => format!("{question} [{default}]: "),
            None => format!("{question} "),
        };
        let mut answers = self.answers.lock().await;
        let answer = read_answer(&mut answers, &prompt).await?;
        if answer.trim().is_empty() {
            return Ok(default.unwrap_or_default().to_string());
        }
        Ok(answer)
    }

    async fn ask_yes_no(&self, question: &str, default: bool) -> Result<bool, PromptError> {
        let prompt = format!("{question} {}: ", if default { "[Y/n]" } else { "[y/N]" });
        let mut answers = self.answers.lock().await;
        loop {
            let answer = read_answer(&mut answers, &prompt).await?;
            match parse_yes_no(&answer) {
                Some(choice) => return Ok(choice),
                None if answer.trim().is_empty() => return Ok(default),
                None => warn!(target: "prompt", "please answer y or n"),
            }
        }
    }

    async fn ask_until_valid(
        &self,
        question: &str,
        is_valid: &AnswerCheck,
        invalid_hint: &str,
    ) -> Result<String, PromptError> {
        let prompt = format!("{question} ");
        let mut answers = self.answers.lock().await;
        loop {
            let answer = read_answer(&mut answers, &prompt).await?;
            if let Some(answer) = accept(&answer, is_valid, invalid_hint) {
                return Ok(answer);
            }
        }
    }
}

fn parse_yes_no(answer: &str) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// One pre-recorded answer for [`ScriptedPrompter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedAnswer {
    Text(String),
    Yes,
    No,
    /// Take the prompt's default.
    Default,
    Cancel,
}

/// Answers prompts from a fixed script and records every question it was asked.
///
/// Running out of answers is treated as the operator walking away.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: StdMutex<VecDeque<ScriptedAnswer>>,
    asked: StdMutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = ScriptedAnswer>) -> Self {
        Self {
            answers: StdMutex::new(answers.into_iter().collect()),
            asked: StdMutex::new(Vec::new()),
        }
    }

    pub fn questions(&self) -> Vec<String> {
        self.asked.lock().expect("Failed to acquire lock").clone()
    }

    pub fn remaining(&self) -> usize {
        self.answers.lock().expect("Failed to acquire lock").len()
    }

    fn next(&self, question: &str) -> ScriptedAnswer {
        self.asked
            .lock()
            .expect("Failed to acquire lock")
            .push(question.to_string());
        self.answers
            .lock()
            .expect("Failed to acquire lock")
            .pop_front()
            .unwrap_or(ScriptedAnswer::Cancel)
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn ask_string(
        &self,
        question: &str,
        default: Option<&str>,
    ) -> Result<String, PromptError> {
        match self.next(question) {
            ScriptedAnswer::Text(text) => Ok(text),
            ScriptedAnswer::Yes => Ok("y".to_string()),
            ScriptedAnswer::No => Ok("n".to_string()),
            ScriptedAnswer::Default => Ok(default.unwrap_or_default().to_string()),
            ScriptedAnswer::Cancel => Err(PromptError::Cancelled),
        }
    }

    async fn ask_yes_no(&self, question: &str, default: bool) -> Result<bool, PromptError> {
        match self.next(question) {
            ScriptedAnswer::Yes => Ok(true),
            ScriptedAnswer::No => Ok(false),
            ScriptedAnswer::Default => Ok(default),
            ScriptedAnswer::Text(text) => Ok(parse_yes_no(&text).unwrap_or(default)),
            ScriptedAnswer::Cancel => Err(PromptError::Cancelled),
        }
    }
}
