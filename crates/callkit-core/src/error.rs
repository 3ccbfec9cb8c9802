// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for CallKit.

use thiserror::Error;

/// Top-level error type for all CallKit operations.
#[derive(Debug, Error)]
pub enum CallKitError {
    // -- Signaling errors (surfaced to the hybrid shell) --
    #[error("alert configuration failed: {0}")]
    Configuration(String),

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("malformed call identifier: {0:?}")]
    MalformedIdentifier(String),

    #[error("another call is already in progress: {0}")]
    CallInProgress(String),

    // -- Command dispatch --
    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Platform bridge --
    #[error("platform bridge error: {0}")]
    Bridge(String),

    #[error("feature not available on this platform")]
    PlatformUnavailable,
}

impl CallKitError {
    /// Whether this error must be reported to the caller as a failed
    /// operation. Everything else is only ever seen inside best-effort paths.
    pub fn is_hard(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_)
                | Self::Precondition(_)
                | Self::MalformedIdentifier(_)
                | Self::CallInProgress(_)
                | Self::UnknownAction(_)
                | Self::InvalidArguments(_)
        )
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CallKitError>;
