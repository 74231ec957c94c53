//! Host-signal scripts: one JSON signal per line.
//!
//! Blank lines and lines starting with `#` are skipped.

use anyhow::{Context, Result};
use feedwarden_core::HostSignal;

pub fn parse_script(text: &str) -> Result<Vec<HostSignal>> {
    text.lines()
        .enumerate()
        .map(|(n, line)| (n + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(n, line)| {
            serde_json::from_str(line).with_context(|| format!("line {n}: invalid signal"))
        })
        .collect()
}
