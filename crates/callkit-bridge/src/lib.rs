// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! CallKit — Native platform bridge abstractions.
//!
//! Defines the capability traits the signaling controller drives (tone and
//! vibration, window presentation, notifications) and the per-OS
//! implementations behind them: Android through JNI, iOS through `objc2`, and
//! a stub for everything else. The `simulated` bridge is available on every
//! platform for tests and desktop runs.

use std::sync::Arc;

pub mod simulated;
pub mod traits;

#[cfg(target_os = "ios")]
pub mod ios;

#[cfg(target_os = "android")]
pub mod android;

#[cfg(not(any(target_os = "ios", target_os = "android")))]
pub mod stub;

use traits::{AlertDevice, Notifier, PlatformBridge, PresentationSurface};

/// The three capabilities as separately shareable trait objects.
#[derive(Clone)]
pub struct Capabilities {
    pub platform: String,
    pub alert: Arc<dyn AlertDevice>,
    pub surface: Arc<dyn PresentationSurface>,
    pub notifier: Arc<dyn Notifier>,
}

impl Capabilities {
    /// Split one bridge into its capabilities, all backed by the same object.
    pub fn from_bridge<B: PlatformBridge + 'static>(bridge: Arc<B>) -> Self {
        Self {
            platform: bridge.platform_name().to_string(),
            alert: bridge.clone(),
            surface: bridge.clone(),
            notifier: bridge,
        }
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}

/// Capabilities of the bridge for the target operating system.
pub fn platform_capabilities() -> Capabilities {
    #[cfg(target_os = "ios")]
    {
        // iOS: AudioToolbox system sounds and UIKit via `objc2`.
        Capabilities::from_bridge(Arc::new(ios::IosBridge::new()))
    }
    #[cfg(target_os = "android")]
    {
        // Android: Uses `jni-rs` to invoke methods on the JVM/ART.
        Capabilities::from_bridge(Arc::new(android::AndroidBridge::new()))
    }
    #[cfg(not(any(target_os = "ios", target_os = "android")))]
    {
        // DESKTOP/CI: every capability reports PlatformUnavailable.
        Capabilities::from_bridge(Arc::new(stub::StubBridge))
    }
}
