//! Interactive prompts using dialoguer
//!
//! Passwords are read hidden. Destructive actions ask first unless `--yes`
//! was given; without a terminal they refuse instead of guessing.

use crate::error::{GatewayError, Result, VocalistError};
use dialoguer::{theme::ColorfulTheme, Confirm, Password, Select};
use std::io::IsTerminal;

/// Environment variable that supplies the account password non-interactively
pub const PASSWORD_ENV: &str = "VOCALIST_PASSWORD";

/// Shared theme for all prompts
fn theme() -> ColorfulTheme {
    ColorfulTheme::default()
}

fn prompt_error(e: dialoguer::Error) -> VocalistError {
    VocalistError::Io(std::io::Error::other(e))
}

/// Whether prompts can be shown (stdin and stdout are terminals)
pub fn is_interactive() -> bool {
    std::io::stdin().is_terminal() && std::io::stdout().is_terminal()
}

/// The account password, from the environment or a hidden prompt.
/// `confirm` asks twice, for new accounts.
pub fn account_password(confirm: bool) -> Result<String> {
    account_password_with(|key| std::env::var(key).ok(), confirm, is_interactive())
}

fn account_password_with(
    lookup: impl Fn(&str) -> Option<String>,
    confirm: bool,
    interactive: bool,
) -> Result<String> {
    if let Some(password) = lookup(PASSWORD_ENV) {
        return Ok(password);
    }
    if !interactive {
        return Err(GatewayError::Validation(format!(
            "No terminal to ask for a password. Set {} instead.",
            PASSWORD_ENV
        ))
        .into());
    }

    let theme = theme();
    let mut prompt = Password::with_theme(&theme).with_prompt("Password");
    if confirm {
        prompt = prompt.with_confirmation("Confirm password", "Passwords do not match");
    }
    prompt.interact().map_err(prompt_error)
}

/// Yes/no question with a default
pub fn confirm(prompt: &str, default: bool) -> Result<bool> {
    Confirm::with_theme(&theme())
        .with_prompt(prompt)
        .default(default)
        .interact()
        .map_err(prompt_error)
}

/// Pick one of `items` with the arrow keys
pub fn select(prompt: &str, items: &[&str], default: usize) -> Result<usize> {
    Select::with_theme(&theme())
        .with_prompt(prompt)
        .items(items)
        .default(default)
        .interact()
        .map_err(prompt_error)
}

/// Ask before deleting `what`. `--yes` skips the question.
pub fn confirm_delete(what: &str, yes: bool) -> Result<bool> {
    confirm_delete_with(yes, is_interactive(), || {
        confirm(&format!("Delete {}? This cannot be undone.", what), false)
    })
}

fn confirm_delete_with(
    yes: bool,
    interactive: bool,
    ask: impl FnOnce() -> Result<bool>,
) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    if !interactive {
        return Err(GatewayError::Validation(
            "Refusing to delete without confirmation. Pass --yes to skip the question.".to_string(),
        )
        .into());
    }
    ask()
}
