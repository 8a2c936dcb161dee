//! Interactive menu and secret/passphrase prompts, built on `inquire`.

use std::path::PathBuf;

use anyhow::{Result, anyhow, ensure};
use inquire::{Confirm, Password, PasswordDisplayMode, Select, Text};

use crate::types::MenuState;

/// Action chosen from either the unauthenticated or authenticated menu.
pub enum MenuAction {
    Register,
    Login,
    List,
    Upload,
    Download,
    Rename,
    Size,
    Delete,
    Mkdir,
    Rmdir,
    Cwd,
    Pwd,
    Logout,
    Quit,
}

const SECRET_MIN_LENGTH: usize = 8;

pub struct Prompt;

impl Prompt {
    pub fn new() -> Self {
        Self
    }

    /// Renders the menu appropriate to `state` and returns the chosen action
    /// as an already-disambiguated enum rather than a raw string.
    pub fn menu(&self, state: &MenuState) -> Result<MenuAction> {
        match state {
            MenuState::Unauth => {
                let choice = Select::new("menu", vec!["Register", "Log in", "Quit"]).prompt().map_err(|e| anyhow!("menu selection failed: {e}"))?;
                Ok(match choice {
                    "Register" => MenuAction::Register,
                    "Log in" => MenuAction::Login,
                    _ => MenuAction::Quit,
                })
            }
            MenuState::Auth => {
                let items =
                    vec!["List", "Upload", "Download", "Rename", "Size", "Delete", "Mkdir", "Rmdir", "Cd", "Pwd", "Logout"];
                let choice = Select::new("menu", items).prompt().map_err(|e| anyhow!("menu selection failed: {e}"))?;
                Ok(match choice {
                    "List" => MenuAction::List,
                    "Upload" => MenuAction::Upload,
                    "Download" => MenuAction::Download,
                    "Rename" => MenuAction::Rename,
                    "Size" => MenuAction::Size,
                    "Delete" => MenuAction::Delete,
                    "Mkdir" => MenuAction::Mkdir,
                    "Rmdir" => MenuAction::Rmdir,
                    "Cd" => MenuAction::Cwd,
                    "Pwd" => MenuAction::Pwd,
                    _ => MenuAction::Logout,
                })
            }
        }
    }

    /// Prompts for a new account's username.
    pub fn prompt_username(&self) -> Result<String> {
        Text::new("Username").prompt().map_err(|e| anyhow!("username input failed: {e}"))
    }

    /// Prompts for the shared secret twice and checks they match. Used at
    /// registration, since a typo here locks the account out permanently.
    pub fn prompt_secret_with_confirmation(&self) -> Result<String> {
        let secret = self.prompt_secret("Enter secret")?;
        let confirmation = self.prompt_secret("Confirm secret")?;
        ensure!(secret == confirmation, "secrets do not match");
        Ok(secret)
    }

    /// Prompts for the shared secret once, for login.
    pub fn prompt_secret_for_login(&self) -> Result<String> {
        self.prompt_secret("Enter secret")
    }

    fn prompt_secret(&self, prompt: &str) -> Result<String> {
        Password::new(prompt)
            .with_display_mode(PasswordDisplayMode::Masked)
            .without_confirmation()
            .with_validator(move |input: &str| {
                if input.len() < SECRET_MIN_LENGTH {
                    Ok(inquire::validator::Validation::Invalid(format!("must be at least {SECRET_MIN_LENGTH} characters").into()))
                } else {
                    Ok(inquire::validator::Validation::Valid)
                }
            })
            .prompt()
            .map_err(|e| anyhow!("secret input failed: {e}"))
    }

    pub fn prompt_remote_path(&self, label: &str) -> Result<String> {
        Text::new(label).prompt().map_err(|e| anyhow!("path input failed: {e}"))
    }

    pub fn prompt_local_path(&self, label: &str) -> Result<PathBuf> {
        let s = Text::new(label).prompt().map_err(|e| anyhow!("path input failed: {e}"))?;
        Ok(PathBuf::from(s))
    }

    pub fn confirm(&self, prompt: &str) -> Result<bool> {
        Confirm::new(prompt).with_default(false).prompt().map_err(|e| anyhow!("confirmation failed: {e}"))
    }
}

impl Default for Prompt {
    fn default() -> Self {
        Self::new()
    }
}
