// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// CallKit — Call signaling: turns the hybrid shell's call commands into
// ringing, vibration, window presentation and missed-call notifications.

pub mod command;
pub mod controller;
pub mod events;
pub mod policy;
pub mod ui;

pub use command::{CallRef, CallRequest, Command, EndCallRequest, Reply};
pub use controller::{CallSignalingController, ControllerState};
pub use events::{AudioNotice, CallEvent, EventBus};
pub use policy::AlertPlan;
pub use ui::UiExecutor;
