// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Best-effort outcomes.
//
// A call alert that shows up imperfectly beats one that fails to dispatch, so
// cosmetic steps never turn into an `Err`. Their failures are collected here
// instead, next to the value the operation produced.

use crate::error::CallKitError;

/// A cosmetic step of the alerting sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertStep {
    RingerPolicy,
    VibrateSetting,
    StopTone,
    ReleaseTone,
    PlayTone,
    Vibrate,
    CancelVibration,
    Notify,
}

impl std::fmt::Display for AlertStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::RingerPolicy => "ringer policy lookup",
            Self::VibrateSetting => "vibrate-while-ringing lookup",
            Self::StopTone => "stop tone",
            Self::ReleaseTone => "release tone",
            Self::PlayTone => "play tone",
            Self::Vibrate => "vibrate",
            Self::CancelVibration => "cancel vibration",
            Self::Notify => "missed-call notification",
        };
        f.write_str(name)
    }
}

/// A failure that was logged and suppressed.
#[derive(Debug)]
pub struct SoftFailure {
    pub step: AlertStep,
    pub error: CallKitError,
}

/// The value of a successful operation plus whatever was suppressed on the way.
#[derive(Debug)]
#[must_use]
pub struct Delivered<T> {
    pub value: T,
    pub suppressed: Vec<SoftFailure>,
}

impl<T> Delivered<T> {
    pub fn clean(value: T) -> Self {
        Self {
            value,
            suppressed: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.suppressed.is_empty()
    }

    /// Whether a given step was suppressed.
    pub fn suppressed_step(&self, step: AlertStep) -> bool {
        self.suppressed.iter().any(|f| f.step == step)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Delivered<U> {
        Delivered {
            value: f(self.value),
            suppressed: self.suppressed,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Collector for soft failures during one operation.
#[derive(Debug, Default)]
pub struct Suppressed(Vec<SoftFailure>);

impl Suppressed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unwrap a best-effort step, logging and keeping its error.
    pub fn absorb<T>(&mut self, step: AlertStep, result: crate::error::Result<T>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(error) => {
                tracing::warn!(%step, error = %error, "best-effort step failed, continuing");
                self.0.push(SoftFailure { step, error });
                None
            }
        }
    }

    pub fn deliver<T>(self, value: T) -> Delivered<T> {
        Delivered {
            value,
            suppressed: self.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorb_keeps_errors_and_passes_values() {
        let mut s = Suppressed::new();
        assert_eq!(s.absorb(AlertStep::PlayTone, Ok(7)), Some(7));
        let missing: Option<()> =
            s.absorb(AlertStep::Vibrate, Err(CallKitError::PlatformUnavailable));
        assert!(missing.is_none());

        let d = s.deliver("id");
        assert_eq!(d.value, "id");
        assert!(!d.is_clean());
        assert!(d.suppressed_step(AlertStep::Vibrate));
        assert!(!d.suppressed_step(AlertStep::PlayTone));
    }

    #[test]
    fn map_keeps_suppressed() {
        let mut s = Suppressed::new();
        let _: Option<()> = s.absorb(AlertStep::Notify, Err(CallKitError::Bridge("x".into())));
        let d = s.deliver(1).map(|n| n + 1);
        assert_eq!(d.value, 2);
        assert_eq!(d.suppressed.len(), 1);
    }
}
