use std::path::PathBuf;

use anyhow::{Context, Result};

pub fn expand_home(raw: &str) -> Result<PathBuf> {
    let rest = match raw.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return Ok(PathBuf::from(raw)),
    };
    let home = dirs::home_dir().context("unable to resolve home directory")?;
    if rest.is_empty() {
        Ok(home)
    } else {
        Ok(home.join(rest))
    }
}
