//! Stop-hook wire format: a JSON payload on stdin, one decision on stdout.

use std::io::{Read, Write};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Hook metadata sent by the caller. The gate reads its documents from disk,
/// so every field is optional and only logged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HookInput {
    pub session_id: Option<String>,
    pub transcript_path: Option<String>,
    pub hook_event_name: Option<String>,
    pub stop_hook_active: Option<bool>,
}

/// Read the hook payload. Empty or malformed input yields defaults.
pub fn read_hook_input<R: Read>(mut reader: R) -> HookInput {
    let mut raw = String::new();
    if let Err(err) = reader.read_to_string(&mut raw) {
        debug!(err = %err, "cannot read hook input");
        return HookInput::default();
    }
    if raw.trim().is_empty() {
        return HookInput::default();
    }
    serde_json::from_str(&raw).unwrap_or_else(|err| {
        debug!(err = %err, "hook input is not a recognised payload");
        HookInput::default()
    })
}

/// Outcome of the gate for one stop request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Block { reason: String },
}

impl Decision {
    pub fn block(reason: impl Into<String>) -> Self {
        Self::Block {
            reason: reason.into(),
        }
    }

    pub fn is_approve(&self) -> bool {
        matches!(self, Self::Approve)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Approve => None,
            Self::Block { reason } => Some(reason),
        }
    }
}

/// Write the decision as a single JSON line.
pub fn write_decision<W: Write>(mut writer: W, decision: &Decision) -> Result<()> {
    let mut payload = serde_json::to_string(decision).context("serialize decision")?;
    payload.push('\n');
    writer
        .write_all(payload.as_bytes())
        .context("write decision")?;
    writer.flush().context("flush decision")
}
