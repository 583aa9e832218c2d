//! Thin wrappers over dialoguer so the wizard code reads linearly.

use anyhow::Result;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, FuzzySelect, Input, Select};

/// Plain list menu. Returns the index of the chosen item.
pub fn select<T: ToString>(prompt: &str, items: &[T]) -> Result<usize> {
    let idx = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(items)
        .default(0)
        .interact()?;
    Ok(idx)
}

/// Searchable list for long ones (shared overlays, sif images).
/// The cursor starts on `default` so enter picks the suggested item.
pub fn search_select<T: ToString>(prompt: &str, items: &[T], default: usize) -> Result<usize> {
    let idx = FuzzySelect::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(items)
        .default(default)
        .interact()?;
    Ok(idx)
}

pub fn input_with_default(prompt: &str, default: &str) -> Result<String> {
    let value = Input::<String>::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(default.to_string())
        .interact_text()?;
    Ok(value)
}

/// Free-form input where an empty answer is meaningful.
pub fn input_allow_empty(prompt: &str) -> Result<String> {
    let value = Input::<String>::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;
    Ok(value)
}

pub fn confirm(prompt: &str, default: bool) -> Result<bool> {
    let yes = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(default)
        .interact()?;
    Ok(yes)
}
