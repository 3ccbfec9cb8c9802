// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Call signaling controller.
//
// Owns the single live call session, the prepared ring tone and the vibration
// state, and drives the platform capabilities from them. Every operation runs
// under one mutex. Presentation changes are handed to the UI executor and not
// awaited.
//
// Failure classes:
//   - hard (returned as `Err`): configuration unavailable at register,
//     alerting before register, malformed ids, a rejected second call;
//   - soft (logged, returned in `Delivered::suppressed`): anything that only
//     makes the alert less complete.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use callkit_bridge::Capabilities;
use callkit_bridge::traits::{AlertDevice, Notifier};
use callkit_core::best_effort::{AlertStep, Delivered, Suppressed};
use callkit_core::config::{CallKitConfig, SupersedePolicy};
use callkit_core::error::{CallKitError, Result};
use callkit_core::types::{CallPhase, CallSession, NotificationKey, SessionId, ToneHandle, ToneSource};

use crate::command::{Command, Reply};
use crate::events::{AudioNotice, CallEvent, EventBus};
use crate::policy;
use crate::ui::UiExecutor;

/// Coarse state of the controller as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// `register` has not succeeded yet.
    Uninitialized,
    /// Configured, no call seen yet.
    Idle,
    Ringing,
    Connected,
    /// The last call has ended.
    Ended,
}

/// Tone prepared by `register`.
#[derive(Debug, Clone)]
struct AlertConfiguration {
    source: ToneSource,
    tone: ToneHandle,
}

#[derive(Debug, Default)]
struct Inner {
    alert_config: Option<AlertConfiguration>,
    vibrating: bool,
    current: Option<CallSession>,
    history: VecDeque<CallSession>,
}

/// Mediates between the hybrid shell and the platform's call-UI capabilities.
pub struct CallSignalingController {
    config: CallKitConfig,
    platform: String,
    alert: Arc<dyn AlertDevice>,
    notifier: Arc<dyn Notifier>,
    ui: UiExecutor,
    events: EventBus,
    inner: Mutex<Inner>,
}

impl CallSignalingController {
    /// Build a controller over `caps`. Starts the UI executor thread.
    pub fn new(caps: Capabilities, config: CallKitConfig) -> Result<Self> {
        let ui = UiExecutor::spawn(caps.surface)?;
        let events = EventBus::new(config.event_capacity);
        info!(platform = %caps.platform, "call signaling controller created");
        Ok(Self {
            config,
            platform: caps.platform,
            alert: caps.alert,
            notifier: caps.notifier,
            ui,
            events,
            inner: Mutex::new(Inner::default()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Every mutation of `Inner` is a single assignment, so the state is
        // consistent even if a capability panicked mid-operation.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // -- Dispatch ------------------------------------------------------------

    /// Run one shell command.
    pub fn execute(&self, command: Command) -> Result<Delivered<Reply>> {
        debug!(action = command.action(), "executing command");
        match command {
            Command::Register => Ok(self.register()?.map(|()| Reply::Ok)),
            Command::ReportIncomingCall(req) => Ok(self
                .report_incoming_call(&req.display_name, req.has_video)?
                .map(Reply::SessionId)),
            Command::StartCall(req) => Ok(self
                .start_call(&req.display_name, req.has_video)
                .map(Reply::SessionId)),
            Command::CallConnected(r) => {
                Ok(self.call_connected(&r.session_id)?.map(|()| Reply::Ok))
            }
            Command::FinishRing(r) => Ok(self.finish_ring(&r.session_id)?.map(|()| Reply::Ok)),
            Command::EndCall(req) => Ok(self
                .end_call(&req.session_id, req.notify)?
                .map(|()| Reply::Ok)),
        }
    }

    // -- Operations ----------------------------------------------------------

    /// Prepare the ring tone and leave it stopped. Safe to call again; a
    /// previously prepared tone is stopped and replaced.
    pub fn register(&self) -> Result<Delivered<()>> {
        let mut inner = self.lock();
        let mut suppressed = Suppressed::new();

        if let Some(old) = inner.alert_config.take() {
            debug!(handle = old.tone.0, "replacing previously prepared tone");
            suppressed.absorb(AlertStep::StopTone, self.alert.stop(old.tone));
            suppressed.absorb(AlertStep::ReleaseTone, self.alert.release(old.tone));
        }

        let source = self
            .config
            .tone_resource
            .as_deref()
            .and_then(|name| self.alert.locate_tone(name))
            .unwrap_or(ToneSource::PlatformDefault);

        let tone = self.alert.prepare(&source).map_err(|e| {
            warn!(error = %e, "ring tone could not be prepared");
            CallKitError::Configuration(e.to_string())
        })?;
        suppressed.absorb(AlertStep::StopTone, self.alert.stop(tone));

        info!(?source, handle = tone.0, "alert device configured");
        inner.alert_config = Some(AlertConfiguration { source, tone });
        Ok(suppressed.deliver(()))
    }

    /// Start ringing for a new incoming call and return its id.
    pub fn report_incoming_call(
        &self,
        display_name: &str,
        has_video: bool,
    ) -> Result<Delivered<SessionId>> {
        let mut inner = self.lock();
        let mut suppressed = Suppressed::new();

        let live = inner
            .current
            .as_ref()
            .filter(|s| s.phase.is_live())
            .map(|s| s.id);
        if let Some(live) = live {
            match self.config.supersede {
                SupersedePolicy::Reject => {
                    warn!(%live, "incoming call rejected, another call is live");
                    return Err(CallKitError::CallInProgress(live.to_string()));
                }
                SupersedePolicy::Replace => {
                    warn!(%live, "incoming call replaces the live one");
                    self.silence(&mut inner, &mut suppressed);
                    self.end_current(&mut inner);
                }
            }
        }

        let session = CallSession::incoming(display_name, has_video);
        let id = session.id;
        info!(session = %id, caller = display_name, has_video, "incoming call");

        self.ui.raise(id);
        self.alert_for(&mut inner, &mut suppressed);

        self.events.publish(CallEvent::CallChanged(session.snapshot()));
        inner.current = Some(session);
        Ok(suppressed.deliver(id))
    }

    /// Record an outgoing call. Never alerts and never fails; a live call it
    /// supersedes is silenced first.
    pub fn start_call(&self, display_name: &str, has_video: bool) -> Delivered<SessionId> {
        let mut inner = self.lock();
        let mut suppressed = Suppressed::new();
        if inner.current.as_ref().is_some_and(|s| s.phase.is_live()) {
            self.silence(&mut inner, &mut suppressed);
            self.end_current(&mut inner);
        }
        let session = CallSession::outgoing(display_name, has_video);
        let id = session.id;
        info!(session = %id, callee = display_name, has_video, "outgoing call");
        self.events.publish(CallEvent::CallChanged(session.snapshot()));
        inner.current = Some(session);
        suppressed.deliver(id)
    }

    /// Acknowledge that the call's media is up.
    pub fn call_connected(&self, session_id: &str) -> Result<Delivered<()>> {
        let id = SessionId::parse(session_id)?;
        let mut inner = self.lock();
        let mut connected = None;
        if let Some(session) = inner.current.as_mut().filter(|s| s.id == id) {
            if session.mark_connected() {
                connected = Some(session.snapshot());
            }
        }
        match connected {
            Some(snapshot) => {
                info!(session = %id, "call connected");
                self.events.publish(CallEvent::CallChanged(snapshot));
            }
            None => debug!(session = %id, "connect for a call that is not live, ignoring"),
        }
        Ok(Delivered::clean(()))
    }

    /// Stop ringing and vibrating. Nothing alerting is not an error.
    pub fn finish_ring(&self, session_id: &str) -> Result<Delivered<()>> {
        let id = SessionId::parse(session_id)?;
        let mut inner = self.lock();
        Self::require_registered(&inner)?;

        let mut suppressed = Suppressed::new();
        self.silence(&mut inner, &mut suppressed);
        if inner.current.as_ref().is_some_and(|s| s.id == id) {
            self.end_current(&mut inner);
        }
        debug!(session = %id, "ring finished");
        Ok(suppressed.deliver(()))
    }

    /// Tear a call down: restore the window, stop alerting and optionally
    /// leave a missed-call notification.
    pub fn end_call(&self, session_id: &str, notify: bool) -> Result<Delivered<()>> {
        let id = SessionId::parse(session_id)?;
        let mut inner = self.lock();
        Self::require_registered(&inner)?;

        let mut suppressed = Suppressed::new();
        self.ui.restore(id);
        self.silence(&mut inner, &mut suppressed);
        if inner.current.as_ref().is_some_and(|s| s.id == id) {
            self.end_current(&mut inner);
        }

        if notify {
            let title = Self::find(&inner, &id)
                .map(|s| s.display_name.clone())
                .unwrap_or_else(|| self.config.unknown_caller.clone());
            let key = NotificationKey::for_session(&id);
            let posted = suppressed.absorb(
                AlertStep::Notify,
                self.notifier.post(&key, &title, &self.config.missed_call_text),
            );
            if posted.is_some() {
                info!(session = %id, tag = %key.tag, "missed-call notification posted");
            }
        }
        info!(session = %id, notify, "call ended");
        Ok(suppressed.deliver(()))
    }

    // -- Inspection ----------------------------------------------------------

    pub fn state(&self) -> ControllerState {
        let inner = self.lock();
        match inner.current.as_ref().map(|s| s.phase) {
            Some(CallPhase::Ringing) => ControllerState::Ringing,
            Some(CallPhase::Connected) => ControllerState::Connected,
            _ if inner.alert_config.is_none() => ControllerState::Uninitialized,
            Some(CallPhase::Ended) => ControllerState::Ended,
            _ if !inner.history.is_empty() => ControllerState::Ended,
            _ => ControllerState::Idle,
        }
    }

    /// The live (or most recent, if not yet superseded) session.
    pub fn current_session(&self) -> Option<CallSession> {
        self.lock().current.clone()
    }

    /// Look up a session that is current or still in the ended-call history.
    pub fn session(&self, id: &SessionId) -> Option<CallSession> {
        Self::find(&self.lock(), id).cloned()
    }

    /// The tone chosen at `register`, if any.
    pub fn tone_source(&self) -> Option<ToneSource> {
        self.lock().alert_config.as_ref().map(|c| c.source.clone())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.events.subscribe()
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// Wait until queued presentation changes have been applied.
    pub fn flush_presentation(&self) {
        self.ui.flush();
    }

    /// Presentation failures swallowed on the UI thread so far.
    pub fn suppressed_presentation_failures(&self) -> usize {
        self.ui.suppressed_count()
    }

    // -- Internals -----------------------------------------------------------

    fn require_registered(inner: &Inner) -> Result<()> {
        if inner.alert_config.is_none() {
            return Err(CallKitError::Precondition(
                "register must succeed before alerting can be controlled".into(),
            ));
        }
        Ok(())
    }

    fn find<'a>(inner: &'a Inner, id: &SessionId) -> Option<&'a CallSession> {
        inner
            .current
            .iter()
            .chain(inner.history.iter().rev())
            .find(|s| s.id == *id)
    }

    /// Ring and/or vibrate as the device's ringer settings allow.
    ///
    /// Without a prepared tone nothing alerts at all: neither `finishRing`
    /// nor `endCall` could stop it before `register`.
    fn alert_for(&self, inner: &mut Inner, suppressed: &mut Suppressed) {
        let Some(tone) = inner.alert_config.as_ref().map(|c| c.tone) else {
            suppressed.absorb::<()>(
                AlertStep::PlayTone,
                Err(CallKitError::Precondition(
                    "register has not prepared a ring tone".into(),
                )),
            );
            self.events
                .publish(CallEvent::AudioSystem(AudioNotice::new("ring tone unavailable")));
            return;
        };

        if suppressed.absorb(AlertStep::StopTone, self.alert.is_playing(tone)) == Some(true) {
            suppressed.absorb(AlertStep::StopTone, self.alert.stop(tone));
        }

        let plan = policy::evaluate(self.alert.as_ref(), suppressed);
        if plan.is_silent() {
            debug!("ringer is silent, not alerting");
        }

        if plan.ring
            && suppressed
                .absorb(AlertStep::PlayTone, self.alert.play(tone))
                .is_none()
        {
            self.events
                .publish(CallEvent::AudioSystem(AudioNotice::new("ring tone unavailable")));
        }

        if plan.vibrate {
            let pattern = &self.config.vibration;
            if suppressed
                .absorb(AlertStep::Vibrate, self.alert.vibrate(pattern))
                .is_some()
            {
                inner.vibrating = true;
            }
        } else if inner.vibrating {
            // Left over from a replaced call whose cancel failed.
            if suppressed
                .absorb(AlertStep::CancelVibration, self.alert.cancel_vibration())
                .is_some()
            {
                inner.vibrating = false;
            }
        }
    }

    /// Stop the tone if it is playing and cancel vibration if active.
    fn silence(&self, inner: &mut Inner, suppressed: &mut Suppressed) {
        if let Some(tone) = inner.alert_config.as_ref().map(|c| c.tone) {
            match suppressed.absorb(AlertStep::StopTone, self.alert.is_playing(tone)) {
                Some(false) => {}
                // Unknown state: stopping an idle tone is harmless.
                Some(true) | None => {
                    suppressed.absorb(AlertStep::StopTone, self.alert.stop(tone));
                }
            }
        }
        if inner.vibrating
            && suppressed
                .absorb(AlertStep::CancelVibration, self.alert.cancel_vibration())
                .is_some()
        {
            inner.vibrating = false;
        }
    }

    /// Move the current session to the ended-call history.
    fn end_current(&self, inner: &mut Inner) {
        let Some(mut session) = inner.current.take() else {
            return;
        };
        if session.mark_ended() {
            debug!(session = %session.id, "session ended");
            self.events.publish(CallEvent::CallChanged(session.snapshot()));
        }
        inner.history.push_back(session);
        while inner.history.len() > self.config.history_capacity.max(1) {
            inner.history.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use callkit_bridge::simulated::{DeviceCall, Fault, SimulatedBridge};
    use callkit_core::types::RingerPolicy;
    use serde_json::json;
    use tokio::sync::broadcast::error::TryRecvError;

    /// Helper: controller over a fresh simulated phone.
    fn controller_with(config: CallKitConfig) -> (Arc<SimulatedBridge>, CallSignalingController) {
        let sim = Arc::new(SimulatedBridge::new());
        let ctl = CallSignalingController::new(Capabilities::from_bridge(sim.clone()), config)
            .expect("controller");
        (sim, ctl)
    }

    fn controller() -> (Arc<SimulatedBridge>, CallSignalingController) {
        controller_with(CallKitConfig::default())
    }

    fn registered() -> (Arc<SimulatedBridge>, CallSignalingController) {
        let (sim, ctl) = controller();
        let _ = ctl.register().expect("register");
        sim.clear_calls();
        (sim, ctl)
    }

    fn plays(c: &DeviceCall) -> bool {
        matches!(c, DeviceCall::Play(_))
    }

    fn vibrates(c: &DeviceCall) -> bool {
        matches!(c, DeviceCall::Vibrate(_))
    }

    // -- register --------------------------------------------------------------

    #[test]
    fn register_twice_leaves_device_stopped() {
        let (sim, ctl) = controller();
        let _ = ctl.register().expect("first register");
        assert!(!sim.is_tone_playing());
        let _ = ctl.register().expect("second register");
        assert!(!sim.is_tone_playing());
        assert_eq!(sim.count(|c| matches!(c, DeviceCall::Prepare(_))), 2);
        assert_eq!(ctl.state(), ControllerState::Idle);
    }

    #[test]
    fn register_again_releases_replaced_tone() {
        let (sim, ctl) = controller();
        for _ in 0..5 {
            let delivered = ctl.register().expect("register");
            assert!(delivered.is_clean());
        }
        assert_eq!(sim.prepared_tones(), 1);
        assert_eq!(sim.count(|c| matches!(c, DeviceCall::Release(_))), 4);
    }

    #[test]
    fn register_prefers_bundled_tone() {
        let (sim, ctl) = controller();
        sim.bundle_tone("ringtone");
        let _ = ctl.register().expect("register");
        assert!(matches!(ctl.tone_source(), Some(ToneSource::Resource(_))));
    }

    #[test]
    fn register_falls_back_to_platform_default() {
        let (_sim, ctl) = controller();
        let _ = ctl.register().expect("register");
        assert_eq!(ctl.tone_source(), Some(ToneSource::PlatformDefault));
    }

    #[test]
    fn register_without_audio_is_configuration_error() {
        let (sim, ctl) = controller();
        sim.inject_fault(Fault::Prepare);
        let err = ctl.register().expect_err("should fail");
        assert!(matches!(err, CallKitError::Configuration(_)));
        assert_eq!(ctl.state(), ControllerState::Uninitialized);
    }

    // -- reportIncomingCall ----------------------------------------------------

    #[test]
    fn incoming_ids_are_unique() {
        let (_sim, ctl) = registered();
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let id = ctl
                .report_incoming_call("Alice", false)
                .expect("report")
                .into_value();
            assert!(!id.to_string().is_empty());
            assert!(seen.insert(id), "duplicate id {id}");
        }
    }

    #[test]
    fn silent_ringer_neither_plays_nor_vibrates() {
        let (sim, ctl) = registered();
        sim.set_ringer_policy(RingerPolicy::Silent);
        sim.set_vibrate_while_ringing(true);
        let delivered = ctl.report_incoming_call("Alice", false).expect("report");
        assert!(delivered.is_clean());
        assert_eq!(sim.count(plays), 0);
        assert_eq!(sim.count(vibrates), 0);
        assert_eq!(ctl.state(), ControllerState::Ringing);
    }

    #[test]
    fn normal_ringer_with_vibrate_setting_does_both_once() {
        let (sim, ctl) = registered();
        sim.set_vibrate_while_ringing(true);
        let _ = ctl.report_incoming_call("Alice", false).expect("report");
        assert_eq!(sim.count(plays), 1);
        assert_eq!(sim.count(vibrates), 1);
        assert!(sim.is_tone_playing());
        assert!(sim.is_vibrating());
    }

    #[test]
    fn normal_ringer_without_vibrate_setting_only_plays() {
        let (sim, ctl) = registered();
        let _ = ctl.report_incoming_call("Alice", false).expect("report");
        assert_eq!(sim.count(plays), 1);
        assert_eq!(sim.count(vibrates), 0);
    }

    #[test]
    fn vibrate_only_uses_ringing_pattern() {
        let (sim, ctl) = registered();
        sim.set_ringer_policy(RingerPolicy::VibrateOnly);
        let _ = ctl.report_incoming_call("Alice", false).expect("report");
        assert_eq!(sim.count(plays), 0);
        assert_eq!(
            sim.calls()
                .into_iter()
                .filter(vibrates)
                .collect::<Vec<_>>(),
            vec![DeviceCall::Vibrate(callkit_core::types::VibrationPattern::ringing())]
        );
    }

    #[test]
    fn incoming_call_raises_presentation() {
        let (sim, ctl) = registered();
        let _ = ctl.report_incoming_call("Alice", false).expect("report");
        ctl.flush_presentation();
        assert_eq!(sim.count(|c| matches!(c, DeviceCall::BringToForeground)), 1);
        assert!(sim.bypass_flags_set());
    }

    #[test]
    fn settings_failures_do_not_block_the_id() {
        let (sim, ctl) = registered();
        sim.inject_fault(Fault::RingerPolicy);
        let delivered = ctl.report_incoming_call("Alice", false).expect("report");
        assert!(delivered.suppressed_step(AlertStep::RingerPolicy));
        assert_eq!(sim.count(plays), 0);
        assert_eq!(ctl.current_session().map(|s| s.id), Some(delivered.value));
    }

    #[test]
    fn play_failure_is_suppressed_and_announced() {
        let (sim, ctl) = registered();
        sim.inject_fault(Fault::Play);
        let mut rx = ctl.subscribe();
        let delivered = ctl.report_incoming_call("Alice", false).expect("report");
        assert!(delivered.suppressed_step(AlertStep::PlayTone));
        assert!(matches!(rx.try_recv(), Ok(CallEvent::AudioSystem(_))));
        assert!(matches!(rx.try_recv(), Ok(CallEvent::CallChanged(_))));
    }

    #[test]
    fn incoming_before_register_still_returns_id() {
        let (sim, ctl) = controller();
        sim.set_vibrate_while_ringing(true);
        let delivered = ctl.report_incoming_call("Alice", false).expect("report");
        assert!(delivered.suppressed_step(AlertStep::PlayTone));
        assert_eq!(delivered.suppressed.len(), 1);
        assert_eq!(sim.count(plays), 0);
        assert_eq!(sim.count(vibrates), 0);
        assert_eq!(ctl.current_session().map(|s| s.id), Some(delivered.value));
    }

    #[test]
    fn incoming_before_register_never_vibrates() {
        let (sim, ctl) = controller();
        sim.set_ringer_policy(RingerPolicy::VibrateOnly);
        let id = ctl.report_incoming_call("Alice", false).expect("report").into_value();
        assert!(!sim.is_vibrating());
        assert_eq!(sim.count(|c| matches!(c, DeviceCall::RingerPolicy)), 0);

        // Nothing left running that the unregistered teardown calls would
        // have to stop.
        assert!(ctl.finish_ring(&id.to_string()).is_err());
        assert!(ctl.end_call(&id.to_string(), false).is_err());
        assert!(!sim.is_vibrating());
        assert!(!sim.is_tone_playing());
    }

    #[test]
    fn second_incoming_replaces_first_by_default() {
        let (sim, ctl) = registered();
        sim.set_vibrate_while_ringing(true);
        let first = ctl.report_incoming_call("Alice", false).expect("first").into_value();
        let second = ctl.report_incoming_call("Bob", true).expect("second").into_value();

        assert_ne!(first, second);
        assert_eq!(ctl.session(&first).map(|s| s.phase), Some(CallPhase::Ended));
        assert_eq!(ctl.current_session().map(|s| s.id), Some(second));
        assert!(sim.is_tone_playing());
        assert_eq!(sim.count(plays), 2);
    }

    #[test]
    fn second_incoming_rejected_under_reject_policy() {
        let (_sim, ctl) = controller_with(CallKitConfig {
            supersede: SupersedePolicy::Reject,
            ..CallKitConfig::default()
        });
        let _ = ctl.register().expect("register");
        let first = ctl.report_incoming_call("Alice", false).expect("first").into_value();
        let err = ctl.report_incoming_call("Bob", false).expect_err("busy");
        assert!(matches!(err, CallKitError::CallInProgress(ref id) if *id == first.to_string()));

        let _ = ctl.end_call(&first.to_string(), false).expect("end");
        let _ = ctl.report_incoming_call("Bob", false).expect("accepted after end");
    }

    // -- startCall / callConnected --------------------------------------------

    #[test]
    fn start_call_silences_live_incoming_call() {
        let (sim, ctl) = registered();
        sim.set_vibrate_while_ringing(true);
        let alice = ctl.report_incoming_call("Alice", false).expect("report").into_value();
        assert!(sim.is_tone_playing() && sim.is_vibrating());

        let bob = ctl.start_call("Bob", false);
        assert!(bob.is_clean());
        assert_eq!(ctl.session(&alice).map(|s| s.phase), Some(CallPhase::Ended));
        assert!(!sim.is_tone_playing());
        assert!(!sim.is_vibrating());
        assert_eq!(sim.count(|c| matches!(c, DeviceCall::CancelVibration)), 1);
        assert_eq!(ctl.current_session().map(|s| s.id), Some(bob.value));
    }

    #[test]
    fn start_call_never_alerts() {
        let (sim, ctl) = controller();
        let id = ctl.start_call("Carol", true).into_value();
        assert!(sim.calls().is_empty());
        let session = ctl.session(&id).expect("session");
        assert_eq!(session.phase, CallPhase::Ringing);
        assert!(session.snapshot().is_outgoing);
    }

    #[test]
    fn call_connected_validates_shape_only() {
        let (_sim, ctl) = registered();
        let err = ctl.call_connected("definitely-not-a-uuid").expect_err("malformed");
        assert!(matches!(err, CallKitError::MalformedIdentifier(_)));
        let delivered = ctl
            .call_connected(&SessionId::new().to_string())
            .expect("unknown but well-formed id is fine");
        assert!(delivered.is_clean());
    }

    #[test]
    fn call_connected_moves_live_session() {
        let (_sim, ctl) = registered();
        let id = ctl.report_incoming_call("Alice", false).expect("report").into_value();
        let _ = ctl.call_connected(&id.to_string()).expect("connected");
        assert_eq!(ctl.state(), ControllerState::Connected);
        assert!(ctl.current_session().and_then(|s| s.connected_at).is_some());
    }

    // -- finishRing ------------------------------------------------------------

    #[test]
    fn finish_ring_before_register_is_precondition_error() {
        let (sim, ctl) = controller();
        let err = ctl.finish_ring(&SessionId::new().to_string()).expect_err("unregistered");
        assert!(matches!(err, CallKitError::Precondition(_)));
        assert!(sim.calls().is_empty());
    }

    #[test]
    fn finish_ring_on_idle_device_is_quiet() {
        let (sim, ctl) = registered();
        let delivered = ctl.finish_ring(&SessionId::new().to_string()).expect("finish");
        assert!(delivered.is_clean());
        assert_eq!(sim.count(|c| matches!(c, DeviceCall::Stop(_))), 0);
        assert_eq!(sim.count(|c| matches!(c, DeviceCall::CancelVibration)), 0);
    }

    #[test]
    fn finish_ring_stops_alerting_but_keeps_presentation() {
        let (sim, ctl) = registered();
        sim.set_vibrate_while_ringing(true);
        let id = ctl.report_incoming_call("Alice", false).expect("report").into_value();
        let _ = ctl.finish_ring(&id.to_string()).expect("finish");
        ctl.flush_presentation();

        assert!(!sim.is_tone_playing());
        assert!(!sim.is_vibrating());
        assert!(sim.bypass_flags_set());
        assert_eq!(sim.count(|c| matches!(c, DeviceCall::ClearBypassFlags)), 0);
        assert_eq!(ctl.state(), ControllerState::Ended);

        // Idempotent.
        let _ = ctl.finish_ring(&id.to_string()).expect("finish again");
    }

    // -- endCall ---------------------------------------------------------------

    #[test]
    fn end_call_notifies_once_with_derived_key() {
        let (sim, ctl) = registered();
        let id = ctl.report_incoming_call("Alice", false).expect("report").into_value();
        let _ = ctl.end_call(&id.to_string(), true).expect("end");

        let posts: Vec<DeviceCall> = sim
            .calls()
            .into_iter()
            .filter(|c| matches!(c, DeviceCall::Post { .. }))
            .collect();
        assert_eq!(
            posts,
            vec![DeviceCall::Post {
                key: NotificationKey::for_session(&id),
                title: "Alice".into(),
                body: "Missed call".into(),
            }]
        );
    }

    #[test]
    fn repeated_end_call_reuses_key() {
        let (sim, ctl) = registered();
        let id = ctl.report_incoming_call("Alice", false).expect("report").into_value();
        let _ = ctl.end_call(&id.to_string(), true).expect("end");
        let _ = ctl.end_call(&id.to_string(), true).expect("end again");

        let keys: Vec<NotificationKey> = sim
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                DeviceCall::Post { key, title, .. } => {
                    assert_eq!(title, "Alice");
                    Some(key)
                }
                _ => None,
            })
            .collect();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0], keys[1]);
        assert_eq!(sim.notifications().len(), 1);
    }

    #[test]
    fn connected_call_ended_without_notify() {
        let (sim, ctl) = registered();
        let id = ctl.report_incoming_call("Alice", false).expect("report").into_value();
        let _ = ctl.call_connected(&id.to_string()).expect("connected");
        let _ = ctl.end_call(&id.to_string(), false).expect("end");
        ctl.flush_presentation();

        assert_eq!(sim.count(|c| matches!(c, DeviceCall::Post { .. })), 0);
        assert_eq!(sim.count(|c| matches!(c, DeviceCall::ClearBypassFlags)), 1);
        assert!(!sim.bypass_flags_set());
        assert!(!sim.is_tone_playing());
        let ended = ctl.session(&id).expect("in history");
        assert_eq!(ended.phase, CallPhase::Ended);
        assert!(ended.ended_at.is_some());
    }

    #[test]
    fn end_call_for_unknown_session_uses_fallback_title() {
        let (sim, ctl) = registered();
        let _ = ctl.end_call(&SessionId::new().to_string(), true).expect("end");
        assert!(sim.calls().iter().any(
            |c| matches!(c, DeviceCall::Post { title, .. } if title == "Unknown caller")
        ));
    }

    #[test]
    fn end_call_before_register_has_no_side_effects() {
        let (sim, ctl) = controller();
        let err = ctl.end_call(&SessionId::new().to_string(), true).expect_err("unregistered");
        assert!(matches!(err, CallKitError::Precondition(_)));
        ctl.flush_presentation();
        assert!(sim.calls().is_empty());
    }

    #[test]
    fn notify_failure_is_soft() {
        let (sim, ctl) = registered();
        sim.inject_fault(Fault::Notify);
        let id = ctl.report_incoming_call("Alice", false).expect("report").into_value();
        let delivered = ctl.end_call(&id.to_string(), true).expect("end");
        assert!(delivered.suppressed_step(AlertStep::Notify));
    }

    #[test]
    fn end_call_rejects_malformed_id() {
        let (sim, ctl) = registered();
        let err = ctl.end_call("42", true).expect_err("malformed");
        assert!(matches!(err, CallKitError::MalformedIdentifier(_)));
        ctl.flush_presentation();
        assert!(sim.calls().is_empty());
    }

    // -- history / events / dispatch -------------------------------------------

    #[test]
    fn history_is_bounded() {
        let (_sim, ctl) = controller_with(CallKitConfig {
            history_capacity: 2,
            ..CallKitConfig::default()
        });
        let _ = ctl.register().expect("register");
        let ids: Vec<SessionId> = (0..4)
            .map(|i| {
                let id = ctl
                    .report_incoming_call(&format!("caller {i}"), false)
                    .expect("report")
                    .into_value();
                let _ = ctl.end_call(&id.to_string(), false).expect("end");
                id
            })
            .collect();
        assert!(ctl.session(&ids[0]).is_none());
        assert!(ctl.session(&ids[1]).is_none());
        assert!(ctl.session(&ids[2]).is_some());
        assert!(ctl.session(&ids[3]).is_some());
    }

    #[test]
    fn lifecycle_publishes_call_changes() {
        let (_sim, ctl) = registered();
        let mut rx = ctl.subscribe();
        let id = ctl.report_incoming_call("Alice", false).expect("report").into_value();
        let _ = ctl.call_connected(&id.to_string()).expect("connected");
        let _ = ctl.end_call(&id.to_string(), false).expect("end");

        let mut phases = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(CallEvent::CallChanged(s)) => {
                    assert_eq!(s.uuid, id.to_string());
                    phases.push((s.has_connected, s.has_ended));
                }
                Ok(CallEvent::AudioSystem(_)) => {}
                Err(TryRecvError::Empty) => break,
                Err(e) => panic!("unexpected: {e}"),
            }
        }
        assert_eq!(phases, vec![(false, false), (true, false), (true, true)]);
    }

    #[test]
    fn execute_dispatches_parsed_commands() {
        let (sim, ctl) = controller();
        let reply = ctl
            .execute(Command::from_action("register", &json!([])).expect("parse"))
            .expect("register");
        assert_eq!(reply.value, Reply::Ok);

        let reply = ctl
            .execute(Command::from_action("reportIncomingCall", &json!(["Alice", false])).expect("parse"))
            .expect("report");
        let Reply::SessionId(id) = reply.value else {
            panic!("expected a session id");
        };

        let _ = ctl.execute(Command::from_action("endCall", &json!([id.to_string(), true])).expect("parse"))
            .expect("end");
        assert_eq!(sim.notifications().len(), 1);
    }
}
