//! Recorded page sessions, one JSON value per line:
//!
//! ```text
//! {"deliver": [{"to_address_hash": "0xA", "fee_payment_html": "<tr>..</tr>"}]}
//! {"page": {"items": [], "beyondPageOne": true}}
//! "disconnect"
//! "navigate_away"
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.

#![forbid(unsafe_code)]

use std::io::BufRead;

use livefeed_core::{Action, LedgerMessage, PageMeta};
use serde::{Deserialize, Serialize};

use crate::{TransportError, TransportResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptLine {
    /// One transport delivery (already grouped).
    Deliver(Vec<LedgerMessage>),
    /// The list store loads another page.
    Page(PageMeta),
    Disconnect,
    NavigateAway,
    /// A raw reducer action, dispatched as-is.
    Action(Action),
}

/// Parse a script. Errors carry the 1-based line number.
pub fn read_script<R: BufRead>(reader: R) -> TransportResult<Vec<ScriptLine>> {
    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let parsed: ScriptLine = serde_json::from_str(trimmed).map_err(|e| {
            TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("line {}: {}", idx + 1, e),
            ))
        })?;
        out.push(parsed);
    }
    Ok(out)
}
