// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the CallKit bridge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{CallKitError, Result};

/// Unique identifier for a call session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an identifier handed back by the hybrid shell.
    ///
    /// Only the shape is checked; the id does not have to name a live call.
    pub fn parse(raw: &str) -> Result<Self> {
        Uuid::parse_str(raw.trim())
            .map(Self)
            .map_err(|_| CallKitError::MalformedIdentifier(raw.to_string()))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which side placed the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallDirection {
    /// Reported by the shell via `reportIncomingCall`.
    Incoming,
    /// Placed by the user via `startCall`.
    Outgoing,
}

/// Lifecycle phase of a call session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallPhase {
    Uninitialized,
    /// Alerting (incoming) or dialing (outgoing).
    Ringing,
    /// The shell reported that media is flowing.
    Connected,
    /// Torn down by `finishRing`, `endCall` or a newer call.
    Ended,
}

impl CallPhase {
    /// Ringing or connected: the session still owns the alert.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Ringing | Self::Connected)
    }
}

/// Platform ringer mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RingerPolicy {
    Normal,
    VibrateOnly,
    Silent,
}

impl std::str::FromStr for RingerPolicy {
    type Err = CallKitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "normal" | "ring" => Ok(Self::Normal),
            "vibrate" | "vibrate_only" | "vibrate-only" => Ok(Self::VibrateOnly),
            "silent" | "mute" => Ok(Self::Silent),
            other => Err(CallKitError::InvalidArguments(format!(
                "unknown ringer policy {other:?}"
            ))),
        }
    }
}

/// Where the ring tone comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToneSource {
    /// A sound bundled with the host application, addressed by the
    /// platform-specific locator the bridge resolved (e.g. an
    /// `android.resource://` URI).
    Resource(String),
    /// The system default ringtone.
    PlatformDefault,
}

/// Opaque handle to a prepared tone, issued by an `AlertDevice`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ToneHandle(pub u64);

/// An on/off vibration waveform in milliseconds, starting with an "off"
/// segment. `repeat` is the index to loop back to, or `None` to play once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VibrationPattern {
    pub timings_ms: Vec<u64>,
    pub repeat: Option<usize>,
}

impl VibrationPattern {
    /// Silence 0ms, vibrate 1s, pause 1s, loop until cancelled.
    pub fn ringing() -> Self {
        Self {
            timings_ms: vec![0, 1000, 1000],
            repeat: Some(0),
        }
    }

    /// Whether the pattern would ever actually vibrate.
    pub fn is_audible(&self) -> bool {
        self.timings_ms.iter().skip(1).step_by(2).any(|&on| on > 0)
    }
}

impl Default for VibrationPattern {
    fn default() -> Self {
        Self::ringing()
    }
}

/// Identity of a missed-call notification.
///
/// Derived from the session id so that re-posting for the same call replaces
/// the existing notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationKey {
    /// Lowercase hex of the first 8 bytes of SHA-256(session id).
    pub tag: String,
    /// First 4 bytes of the same digest, big-endian.
    pub id: i32,
}

impl NotificationKey {
    pub fn for_session(session: &SessionId) -> Self {
        let digest = Sha256::digest(session.to_string().as_bytes());
        let id = i32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
        Self {
            tag: hex::encode(&digest[..8]),
            id,
        }
    }
}

/// One call's alerting lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSession {
    pub id: SessionId,
    pub display_name: String,
    pub has_video: bool,
    pub direction: CallDirection,
    pub phase: CallPhase,
    pub created_at: DateTime<Utc>,
    pub connected_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl CallSession {
    /// A freshly reported incoming call, already ringing.
    pub fn incoming(display_name: impl Into<String>, has_video: bool) -> Self {
        Self::new(display_name.into(), has_video, CallDirection::Incoming)
    }

    /// A call placed by the user.
    pub fn outgoing(display_name: impl Into<String>, has_video: bool) -> Self {
        Self::new(display_name.into(), has_video, CallDirection::Outgoing)
    }

    fn new(display_name: String, has_video: bool, direction: CallDirection) -> Self {
        Self {
            id: SessionId::new(),
            display_name,
            has_video,
            direction,
            phase: CallPhase::Ringing,
            created_at: Utc::now(),
            connected_at: None,
            ended_at: None,
        }
    }

    /// Move to `Connected`. Returns false if the session had already ended.
    pub fn mark_connected(&mut self) -> bool {
        match self.phase {
            CallPhase::Ringing => {
                self.phase = CallPhase::Connected;
                self.connected_at = Some(Utc::now());
                true
            }
            CallPhase::Connected => true,
            CallPhase::Uninitialized | CallPhase::Ended => false,
        }
    }

    /// Move to `Ended`. Returns false if it already was.
    pub fn mark_ended(&mut self) -> bool {
        if self.phase == CallPhase::Ended {
            return false;
        }
        self.phase = CallPhase::Ended;
        self.ended_at = Some(Utc::now());
        true
    }

    /// Time spent connected, up to the end of the call or now.
    pub fn duration(&self) -> chrono::Duration {
        match self.connected_at {
            Some(start) => self.ended_at.unwrap_or_else(Utc::now) - start,
            None => chrono::Duration::zero(),
        }
    }

    pub fn snapshot(&self) -> CallSnapshot {
        CallSnapshot {
            callback_type: CallSnapshot::CALLBACK_TYPE.to_string(),
            uuid: self.id.to_string(),
            handle: self.display_name.clone(),
            is_outgoing: self.direction == CallDirection::Outgoing,
            has_video: self.has_video,
            has_started_connecting: self.direction == CallDirection::Outgoing
                || self.connected_at.is_some(),
            has_connected: self.connected_at.is_some(),
            has_ended: self.phase == CallPhase::Ended,
            connecting_date: match self.direction {
                CallDirection::Outgoing => Some(self.created_at),
                CallDirection::Incoming => self.connected_at,
            },
            connect_date: self.connected_at,
            end_date: self.ended_at,
            duration: self.duration().num_milliseconds() as f64 / 1000.0,
        }
    }
}

/// Serializable view of a session, in the shape the hybrid shell's
/// `callChanged` listeners consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSnapshot {
    pub callback_type: String,
    pub uuid: String,
    pub handle: String,
    pub is_outgoing: bool,
    pub has_video: bool,
    pub has_started_connecting: bool,
    pub has_connected: bool,
    pub has_ended: bool,
    pub connecting_date: Option<DateTime<Utc>>,
    pub connect_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Seconds connected.
    pub duration: f64,
}

impl CallSnapshot {
    pub const CALLBACK_TYPE: &'static str = "callChanged";
}
