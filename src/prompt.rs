// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! User confirmation.
//!
//! Workflows that destroy data ask before doing so. How the question reaches
//! the user is up to the [`Prompter`] in use.

use inquire::Confirm;

/// Ask the user a yes or no question.
pub trait Prompter {
    /// Block until the user answers yes or no.
    ///
    /// Anything short of a clear yes means no.
    fn confirm(&mut self, message: &str) -> Result<bool>;
}

/// Prompt through the terminal.
///
/// Unrecognized answers are asked again, an empty answer means no.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn confirm(&mut self, message: &str) -> Result<bool> {
        Ok(Confirm::new(message).with_default(false).prompt()?)
    }
}

/// Prompt error types.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    /// Terminal prompt failed or was interrupted.
    #[error(transparent)]
    Inquire(#[from] inquire::InquireError),
}

/// Friendly result alias :3
pub type Result<T, E = PromptError> = std::result::Result<T, E>;
