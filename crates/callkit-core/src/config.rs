// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::VibrationPattern;

/// What to do when a call is reported while another one is still live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupersedePolicy {
    /// End the old session and alert for the new one.
    Replace,
    /// Refuse the new report with `CallInProgress`.
    Reject,
}

/// Settings for the signaling controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallKitConfig {
    /// Name of the ringtone bundled with the host app. `None` always uses the
    /// platform default.
    pub tone_resource: Option<String>,
    /// Vibration waveform used while ringing.
    pub vibration: VibrationPattern,
    /// Body text of the missed-call notification.
    pub missed_call_text: String,
    /// Title used when a notification is requested for an unknown call.
    pub unknown_caller: String,
    /// Policy for a second incoming call.
    pub supersede: SupersedePolicy,
    /// How many ended sessions to remember for late `endCall` requests.
    pub history_capacity: usize,
    /// Buffered call events per subscriber before old ones are dropped.
    pub event_capacity: usize,
}

impl Default for CallKitConfig {
    fn default() -> Self {
        Self {
            tone_resource: Some("ringtone".into()),
            vibration: VibrationPattern::ringing(),
            missed_call_text: "Missed call".into(),
            unknown_caller: "Unknown caller".into(),
            supersede: SupersedePolicy::Replace,
            history_capacity: 16,
            event_capacity: 64,
        }
    }
}

impl CallKitConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Like [`load`](Self::load) but falls back to defaults on any error.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "using default config");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
