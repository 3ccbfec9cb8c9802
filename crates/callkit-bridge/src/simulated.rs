// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory bridge that behaves like a phone without touching any hardware.
//
// Used by the desktop host (`callkit --simulate`) and by tests: it keeps the
// observable device state (tone playing, vibrating, bypass flags, posted
// notifications), records every capability call in order, and can be told to
// fail individual capabilities.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use callkit_core::error::{CallKitError, Result};
use callkit_core::types::{NotificationKey, RingerPolicy, ToneHandle, ToneSource, VibrationPattern};

use crate::traits::*;

/// One recorded capability invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    LocateTone(String),
    Prepare(ToneSource),
    Play(ToneHandle),
    Stop(ToneHandle),
    IsPlaying(ToneHandle),
    Release(ToneHandle),
    Vibrate(VibrationPattern),
    CancelVibration,
    RingerPolicy,
    VibrateSetting,
    BringToForeground,
    SetBypassFlags,
    ClearBypassFlags,
    Post {
        key: NotificationKey,
        title: String,
        body: String,
    },
}

/// Capabilities that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    Prepare,
    Play,
    Stop,
    Vibrate,
    CancelVibration,
    RingerPolicy,
    VibrateSetting,
    Foreground,
    BypassFlags,
    Notify,
}

#[derive(Debug)]
struct SimState {
    ringer: RingerPolicy,
    vibrate_while_ringing: bool,
    bundled_tones: HashSet<String>,
    faults: HashSet<Fault>,
    next_handle: u64,
    prepared: HashSet<ToneHandle>,
    playing: HashSet<ToneHandle>,
    vibrating: bool,
    bypass: bool,
    notifications: HashMap<NotificationKey, (String, String)>,
    calls: Vec<DeviceCall>,
}

/// A phone simulated in memory.
#[derive(Debug)]
pub struct SimulatedBridge {
    state: Mutex<SimState>,
}

impl Default for SimulatedBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBridge {
    /// Ringer set to normal, vibrate-while-ringing off, no bundled tones.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState {
                ringer: RingerPolicy::Normal,
                vibrate_while_ringing: false,
                bundled_tones: HashSet::new(),
                faults: HashSet::new(),
                next_handle: 1,
                prepared: HashSet::new(),
                playing: HashSet::new(),
                vibrating: false,
                bypass: false,
                notifications: HashMap::new(),
                calls: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // -- Settings ------------------------------------------------------------

    pub fn set_ringer_policy(&self, policy: RingerPolicy) {
        self.lock().ringer = policy;
    }

    pub fn set_vibrate_while_ringing(&self, enabled: bool) {
        self.lock().vibrate_while_ringing = enabled;
    }

    /// Pretend the host app ships a sound called `name`.
    pub fn bundle_tone(&self, name: &str) {
        self.lock().bundled_tones.insert(name.to_string());
    }

    pub fn inject_fault(&self, fault: Fault) {
        self.lock().faults.insert(fault);
    }

    pub fn clear_fault(&self, fault: Fault) {
        self.lock().faults.remove(&fault);
    }

    // -- Observation ---------------------------------------------------------

    /// Every capability call so far, oldest first.
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.lock().calls.clone()
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&DeviceCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn is_tone_playing(&self) -> bool {
        !self.lock().playing.is_empty()
    }

    /// Tones prepared and not yet released.
    pub fn prepared_tones(&self) -> usize {
        self.lock().prepared.len()
    }

    pub fn is_vibrating(&self) -> bool {
        self.lock().vibrating
    }

    pub fn bypass_flags_set(&self) -> bool {
        self.lock().bypass
    }

    /// Notifications currently showing, keyed by identity.
    pub fn notifications(&self) -> HashMap<NotificationKey, (String, String)> {
        self.lock().notifications.clone()
    }
}

impl SimState {
    /// Record `call`, then fail if `fault` is armed.
    fn enter(&mut self, call: DeviceCall, fault: Fault) -> Result<()> {
        self.calls.push(call);
        if self.faults.contains(&fault) {
            return Err(CallKitError::Bridge(format!("simulated {fault:?} failure")));
        }
        Ok(())
    }

    fn known(&self, tone: ToneHandle) -> Result<()> {
        if self.prepared.contains(&tone) {
            Ok(())
        } else {
            Err(CallKitError::Bridge(format!("unknown tone handle {}", tone.0)))
        }
    }
}

impl PlatformBridge for SimulatedBridge {
    fn platform_name(&self) -> &str {
        "Simulated"
    }
}

impl AlertDevice for SimulatedBridge {
    fn locate_tone(&self, name: &str) -> Option<ToneSource> {
        let mut st = self.lock();
        st.calls.push(DeviceCall::LocateTone(name.to_string()));
        st.bundled_tones
            .contains(name)
            .then(|| ToneSource::Resource(format!("sim://tones/{name}")))
    }

    fn prepare(&self, source: &ToneSource) -> Result<ToneHandle> {
        let mut st = self.lock();
        st.enter(DeviceCall::Prepare(source.clone()), Fault::Prepare)?;
        let handle = ToneHandle(st.next_handle);
        st.next_handle += 1;
        st.prepared.insert(handle);
        tracing::debug!(handle = handle.0, ?source, "Simulated: tone prepared");
        Ok(handle)
    }

    fn play(&self, tone: ToneHandle) -> Result<()> {
        let mut st = self.lock();
        st.enter(DeviceCall::Play(tone), Fault::Play)?;
        st.known(tone)?;
        st.playing.insert(tone);
        tracing::info!(handle = tone.0, "Simulated: ringing");
        Ok(())
    }

    fn stop(&self, tone: ToneHandle) -> Result<()> {
        let mut st = self.lock();
        st.enter(DeviceCall::Stop(tone), Fault::Stop)?;
        st.known(tone)?;
        st.playing.remove(&tone);
        Ok(())
    }

    fn is_playing(&self, tone: ToneHandle) -> Result<bool> {
        let mut st = self.lock();
        st.calls.push(DeviceCall::IsPlaying(tone));
        st.known(tone)?;
        Ok(st.playing.contains(&tone))
    }

    fn release(&self, tone: ToneHandle) -> Result<()> {
        let mut st = self.lock();
        st.calls.push(DeviceCall::Release(tone));
        st.known(tone)?;
        st.prepared.remove(&tone);
        st.playing.remove(&tone);
        Ok(())
    }

    fn vibrate(&self, pattern: &VibrationPattern) -> Result<()> {
        let mut st = self.lock();
        st.enter(DeviceCall::Vibrate(pattern.clone()), Fault::Vibrate)?;
        st.vibrating = pattern.is_audible();
        tracing::info!(?pattern, "Simulated: vibrating");
        Ok(())
    }

    fn cancel_vibration(&self) -> Result<()> {
        let mut st = self.lock();
        st.enter(DeviceCall::CancelVibration, Fault::CancelVibration)?;
        st.vibrating = false;
        Ok(())
    }

    fn ringer_policy(&self) -> Result<RingerPolicy> {
        let mut st = self.lock();
        st.enter(DeviceCall::RingerPolicy, Fault::RingerPolicy)?;
        Ok(st.ringer)
    }

    fn vibrate_while_ringing(&self) -> Result<bool> {
        let mut st = self.lock();
        st.enter(DeviceCall::VibrateSetting, Fault::VibrateSetting)?;
        Ok(st.vibrate_while_ringing)
    }
}

impl PresentationSurface for SimulatedBridge {
    fn bring_to_foreground(&self) -> Result<()> {
        self.lock()
            .enter(DeviceCall::BringToForeground, Fault::Foreground)
    }

    fn set_bypass_flags(&self) -> Result<()> {
        let mut st = self.lock();
        st.enter(DeviceCall::SetBypassFlags, Fault::BypassFlags)?;
        st.bypass = true;
        Ok(())
    }

    fn clear_bypass_flags(&self) -> Result<()> {
        let mut st = self.lock();
        st.enter(DeviceCall::ClearBypassFlags, Fault::BypassFlags)?;
        st.bypass = false;
        Ok(())
    }
}

impl Notifier for SimulatedBridge {
    fn post(&self, key: &NotificationKey, title: &str, body: &str) -> Result<()> {
        let mut st = self.lock();
        st.enter(
            DeviceCall::Post {
                key: key.clone(),
                title: title.to_string(),
                body: body.to_string(),
            },
            Fault::Notify,
        )?;
        st.notifications
            .insert(key.clone(), (title.to_string(), body.to_string()));
        tracing::info!(tag = %key.tag, title, "Simulated: notification posted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callkit_core::types::SessionId;

    #[test]
    fn tone_plays_and_stops() {
        let sim = SimulatedBridge::new();
        let tone = sim.prepare(&ToneSource::PlatformDefault).expect("prepare");
        sim.play(tone).expect("play");
        assert!(sim.is_tone_playing());
        assert!(sim.is_playing(tone).expect("is_playing"));
        sim.stop(tone).expect("stop");
        assert!(!sim.is_tone_playing());
    }

    #[test]
    fn released_tone_is_forgotten() {
        let sim = SimulatedBridge::new();
        let tone = sim.prepare(&ToneSource::PlatformDefault).expect("prepare");
        sim.play(tone).expect("play");
        sim.release(tone).expect("release");
        assert_eq!(sim.prepared_tones(), 0);
        assert!(!sim.is_tone_playing());
        assert!(sim.play(tone).is_err());
        assert!(sim.release(tone).is_err());
    }

    #[test]
    fn unknown_handle_is_rejected() {
        let sim = SimulatedBridge::new();
        assert!(sim.play(ToneHandle(42)).is_err());
    }

    #[test]
    fn bundled_tone_is_located() {
        let sim = SimulatedBridge::new();
        assert_eq!(sim.locate_tone("ringtone"), None);
        sim.bundle_tone("ringtone");
        assert!(matches!(sim.locate_tone("ringtone"), Some(ToneSource::Resource(_))));
    }

    #[test]
    fn injected_fault_is_recorded_and_fails() {
        let sim = SimulatedBridge::new();
        sim.inject_fault(Fault::RingerPolicy);
        assert!(sim.ringer_policy().is_err());
        assert_eq!(sim.calls(), vec![DeviceCall::RingerPolicy]);
        sim.clear_fault(Fault::RingerPolicy);
        assert_eq!(sim.ringer_policy().expect("policy"), RingerPolicy::Normal);
    }

    #[test]
    fn same_key_replaces_notification() {
        let sim = SimulatedBridge::new();
        let key = NotificationKey::for_session(&SessionId::new());
        sim.post(&key, "Alice", "Missed call").expect("post");
        sim.post(&key, "Alice", "Missed call").expect("post");
        assert_eq!(sim.notifications().len(), 1);
        assert_eq!(sim.count(|c| matches!(c, DeviceCall::Post { .. })), 2);
    }

    #[test]
    fn vibration_tracks_pattern() {
        let sim = SimulatedBridge::new();
        sim.vibrate(&VibrationPattern::ringing()).expect("vibrate");
        assert!(sim.is_vibrating());
        sim.cancel_vibration().expect("cancel");
        assert!(!sim.is_vibrating());
    }
}
