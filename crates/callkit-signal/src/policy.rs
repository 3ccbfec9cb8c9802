// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ringer policy evaluation: what an incoming call is allowed to do.

use callkit_bridge::traits::AlertDevice;
use callkit_core::best_effort::{AlertStep, Suppressed};
use callkit_core::types::RingerPolicy;

/// Which alerts an incoming call should raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlertPlan {
    pub ring: bool,
    pub vibrate: bool,
}

impl AlertPlan {
    pub const NONE: Self = Self {
        ring: false,
        vibrate: false,
    };

    /// Normal rings (and vibrates if the user asked for it), vibrate-only
    /// vibrates, silent does neither.
    pub fn for_policy(policy: RingerPolicy, vibrate_while_ringing: bool) -> Self {
        match policy {
            RingerPolicy::Normal => Self {
                ring: true,
                vibrate: vibrate_while_ringing,
            },
            RingerPolicy::VibrateOnly => Self {
                ring: false,
                vibrate: true,
            },
            RingerPolicy::Silent => Self::NONE,
        }
    }

    pub fn is_silent(&self) -> bool {
        !self.ring && !self.vibrate
    }
}

/// Ask the device for its settings and build a plan.
///
/// The vibrate-while-ringing setting is only read when it matters. A failed
/// ringer lookup yields a silent plan; a failed setting lookup just drops the
/// vibration.
pub fn evaluate(device: &dyn AlertDevice, suppressed: &mut Suppressed) -> AlertPlan {
    let Some(policy) = suppressed.absorb(AlertStep::RingerPolicy, device.ringer_policy()) else {
        return AlertPlan::NONE;
    };
    let vibrate_setting = match policy {
        RingerPolicy::Normal => suppressed
            .absorb(AlertStep::VibrateSetting, device.vibrate_while_ringing())
            .unwrap_or(false),
        RingerPolicy::VibrateOnly | RingerPolicy::Silent => false,
    };
    let plan = AlertPlan::for_policy(policy, vibrate_setting);
    tracing::debug!(?policy, ring = plan.ring, vibrate = plan.vibrate, "alert plan");
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use callkit_bridge::simulated::{DeviceCall, Fault, SimulatedBridge};

    #[test]
    fn policy_table() {
        assert_eq!(
            AlertPlan::for_policy(RingerPolicy::Normal, false),
            AlertPlan { ring: true, vibrate: false }
        );
        assert_eq!(
            AlertPlan::for_policy(RingerPolicy::Normal, true),
            AlertPlan { ring: true, vibrate: true }
        );
        assert_eq!(
            AlertPlan::for_policy(RingerPolicy::VibrateOnly, false),
            AlertPlan { ring: false, vibrate: true }
        );
        assert!(AlertPlan::for_policy(RingerPolicy::Silent, true).is_silent());
    }

    #[test]
    fn setting_not_read_unless_normal() {
        let sim = SimulatedBridge::new();
        sim.set_ringer_policy(RingerPolicy::VibrateOnly);
        let mut s = Suppressed::new();
        let plan = evaluate(&sim, &mut s);
        assert!(plan.vibrate && !plan.ring);
        assert_eq!(sim.count(|c| matches!(c, DeviceCall::VibrateSetting)), 0);
    }

    #[test]
    fn failed_ringer_lookup_is_silent_and_suppressed() {
        let sim = SimulatedBridge::new();
        sim.inject_fault(Fault::RingerPolicy);
        let mut s = Suppressed::new();
        assert!(evaluate(&sim, &mut s).is_silent());
        assert!(s.deliver(()).suppressed_step(AlertStep::RingerPolicy));
    }

    #[test]
    fn failed_setting_lookup_still_rings() {
        let sim = SimulatedBridge::new();
        sim.inject_fault(Fault::VibrateSetting);
        let mut s = Suppressed::new();
        let plan = evaluate(&sim, &mut s);
        assert_eq!(plan, AlertPlan { ring: true, vibrate: false });
        assert!(s.deliver(()).suppressed_step(AlertStep::VibrateSetting));
    }
}
