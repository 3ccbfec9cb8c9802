// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub bridge for desktop/CI builds where native mobile APIs are unavailable.
//
// Every trait method returns `PlatformUnavailable` — real implementations live
// in the `ios` and `android` modules.

use callkit_core::error::{CallKitError, Result};
use callkit_core::types::{NotificationKey, RingerPolicy, ToneHandle, ToneSource, VibrationPattern};

use crate::traits::*;

/// No-op bridge returned on non-mobile platforms.
pub struct StubBridge;

impl PlatformBridge for StubBridge {
    fn platform_name(&self) -> &str {
        "Desktop (stub)"
    }
}

impl AlertDevice for StubBridge {
    fn locate_tone(&self, _name: &str) -> Option<ToneSource> {
        None
    }

    fn prepare(&self, _source: &ToneSource) -> Result<ToneHandle> {
        tracing::warn!("AlertDevice::prepare called on stub bridge");
        Err(CallKitError::PlatformUnavailable)
    }

    fn play(&self, _tone: ToneHandle) -> Result<()> {
        Err(CallKitError::PlatformUnavailable)
    }

    fn stop(&self, _tone: ToneHandle) -> Result<()> {
        Err(CallKitError::PlatformUnavailable)
    }

    fn is_playing(&self, _tone: ToneHandle) -> Result<bool> {
        Err(CallKitError::PlatformUnavailable)
    }

    fn vibrate(&self, _pattern: &VibrationPattern) -> Result<()> {
        Err(CallKitError::PlatformUnavailable)
    }

    fn cancel_vibration(&self) -> Result<()> {
        Err(CallKitError::PlatformUnavailable)
    }

    fn ringer_policy(&self) -> Result<RingerPolicy> {
        Err(CallKitError::PlatformUnavailable)
    }

    fn vibrate_while_ringing(&self) -> Result<bool> {
        Err(CallKitError::PlatformUnavailable)
    }
}

impl PresentationSurface for StubBridge {
    fn bring_to_foreground(&self) -> Result<()> {
        tracing::warn!("PresentationSurface::bring_to_foreground called on stub bridge");
        Err(CallKitError::PlatformUnavailable)
    }

    fn set_bypass_flags(&self) -> Result<()> {
        Err(CallKitError::PlatformUnavailable)
    }

    fn clear_bypass_flags(&self) -> Result<()> {
        Err(CallKitError::PlatformUnavailable)
    }
}

impl Notifier for StubBridge {
    fn post(&self, _key: &NotificationKey, _title: &str, _body: &str) -> Result<()> {
        tracing::warn!("Notifier::post called on stub bridge");
        Err(CallKitError::PlatformUnavailable)
    }
}
