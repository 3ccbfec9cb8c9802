// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Call change events pushed to the hybrid shell.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use callkit_core::types::CallSnapshot;

/// Non-call message about the audio side of alerting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioNotice {
    pub callback_type: String,
    pub message: String,
}

impl AudioNotice {
    pub const CALLBACK_TYPE: &'static str = "audioSystem";

    pub fn new(message: impl Into<String>) -> Self {
        Self {
            callback_type: Self::CALLBACK_TYPE.to_string(),
            message: message.into(),
        }
    }
}

/// Something the shell's persistent listener should hear about.
///
/// Both variants carry their own `callbackType` field, so the untagged
/// serialization is what listeners switch on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CallEvent {
    CallChanged(CallSnapshot),
    AudioSystem(AudioNotice),
}

/// Broadcast fan-out of [`CallEvent`]s. Publishing never blocks; slow
/// subscribers lose the oldest events.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CallEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: CallEvent) {
        // No receivers is not an error.
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
