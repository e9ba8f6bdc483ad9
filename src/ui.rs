// Terminal interaction: credential prompts through `dialoguer` when the
// configuration does not provide them, and the optional well progress bar.

use crate::api::Credentials;
use crate::config::ServerConfig;
use crate::Result;
use dialoguer::{Input, Password};
use indicatif::{ProgressBar, ProgressStyle};

/// Credentials from the configuration, prompting for whatever is missing.
pub fn resolve_credentials(server: &ServerConfig) -> Result<Credentials> {
    let username = match &server.username {
        Some(u) => u.clone(),
        None => Input::<String>::new()
            .with_prompt(format!("Username for {}", server.url))
            .interact_text()?,
    };
    // `Password` hides input in terminal.
    let password = match &server.password {
        Some(p) => p.clone(),
        None => Password::new().with_prompt("Password").interact()?,
    };
    Ok(Credentials { username, password })
}

/// Progress bar over `wells`; hidden unless `enabled`.
pub fn well_progress(wells: usize, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(wells as u64);
    let style = ProgressStyle::with_template("{bar:40} {pos}/{len} wells {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}
