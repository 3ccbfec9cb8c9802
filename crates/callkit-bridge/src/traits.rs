// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for the native call-UI capabilities.
//
// The signaling controller never owns a platform object; it borrows these
// capabilities through `Arc<dyn ...>` and drives them from a single lock.

use callkit_core::error::Result;
use callkit_core::types::{NotificationKey, RingerPolicy, ToneHandle, ToneSource, VibrationPattern};

/// Unified bridge that groups all native capabilities.
///
/// Platforms that lack a capability return
/// `CallKitError::PlatformUnavailable` from the affected methods.
pub trait PlatformBridge: AlertDevice + PresentationSurface + Notifier {
    /// Human-readable platform name (e.g. "iOS 17", "Android 14").
    fn platform_name(&self) -> &str;
}

/// Ring tone playback, vibration and the ringer settings that gate them.
pub trait AlertDevice: Send + Sync {
    /// Resolve a tone bundled with the host app by name.
    /// Returns `None` if the app ships no such sound.
    fn locate_tone(&self, name: &str) -> Option<ToneSource>;

    /// Load a tone and return a handle for the other calls.
    /// Failure here means the audio subsystem is unreachable.
    fn prepare(&self, source: &ToneSource) -> Result<ToneHandle>;

    fn play(&self, tone: ToneHandle) -> Result<()>;

    fn stop(&self, tone: ToneHandle) -> Result<()>;

    fn is_playing(&self, tone: ToneHandle) -> Result<bool>;

    /// Free a tone that will not be used again. The handle is invalid
    /// afterwards.
    fn release(&self, _tone: ToneHandle) -> Result<()> {
        Ok(())
    }

    /// Start vibrating. Repeating patterns run until [`cancel_vibration`](Self::cancel_vibration).
    fn vibrate(&self, pattern: &VibrationPattern) -> Result<()>;

    fn cancel_vibration(&self) -> Result<()>;

    /// Current ringer mode of the device.
    fn ringer_policy(&self) -> Result<RingerPolicy>;

    /// The user's "also vibrate for calls" setting.
    fn vibrate_while_ringing(&self) -> Result<bool>;
}

/// The host application's window.
///
/// Implementations may assume they are called from the UI thread.
pub trait PresentationSurface: Send + Sync {
    /// Relaunch / raise the host app.
    fn bring_to_foreground(&self) -> Result<()>;

    /// Show over the lock screen, turn the screen on and keep it on.
    fn set_bypass_flags(&self) -> Result<()>;

    /// Undo [`set_bypass_flags`](Self::set_bypass_flags).
    fn clear_bypass_flags(&self) -> Result<()>;
}

/// User-visible notifications.
pub trait Notifier: Send + Sync {
    /// Post (or replace, if `key` is already showing) a notification.
    fn post(&self, key: &NotificationKey, title: &str, body: &str) -> Result<()>;
}
