// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// iOS platform bridge via objc2.
//
// Requires compilation with the iOS SDK (Xcode). This module is cfg-gated to
// `target_os = "ios"` and will not compile on other platforms.
//
// ## Mapping
//
// - Tones and vibration use AudioToolbox system sounds. System sounds play
//   once, so a ringing tone is a background thread that replays the sound
//   until stopped. `AudioServicesPlayAlertSound` honours the ring/silent
//   switch on its own, which is why `ringer_policy` reports `Normal`.
// - iOS has no lock-screen bypass for third-party apps; the closest
//   equivalent is keeping the screen awake with `idleTimerDisabled`, set on
//   the main queue via GCD. Apps cannot bring themselves to the foreground.
// - Missed calls are posted through `UNUserNotificationCenter` with the
//   notification tag as request identifier, so repeats replace.

#![cfg(target_os = "ios")]

use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use objc2::rc::Retained;
use objc2::runtime::{AnyObject, Bool};
use objc2::{MainThreadMarker, class, msg_send};
use objc2_foundation::NSString;
use objc2_ui_kit::UIApplication;

use callkit_core::error::{CallKitError, Result};
use callkit_core::types::{NotificationKey, RingerPolicy, ToneHandle, ToneSource, VibrationPattern};

use crate::traits::*;

// ---------------------------------------------------------------------------
// AudioToolbox / GCD FFI
// ---------------------------------------------------------------------------

type SystemSoundId = u32;

/// `kSystemSoundID_Vibrate`.
const SYSTEM_SOUND_VIBRATE: SystemSoundId = 4095;
/// Built-in tone used when the app bundles none.
const DEFAULT_RING_SOUND: SystemSoundId = 1005;
/// Gap between replays of a ringing tone.
const RING_INTERVAL: Duration = Duration::from_secs(3);
/// Extension of bundled ring tones.
const TONE_EXTENSION: &str = "caf";

#[link(name = "AudioToolbox", kind = "framework")]
unsafe extern "C" {
    fn AudioServicesCreateSystemSoundID(url: *const c_void, out_id: *mut SystemSoundId) -> i32;
    fn AudioServicesDisposeSystemSoundID(id: SystemSoundId) -> i32;
    fn AudioServicesPlayAlertSound(id: SystemSoundId);
    fn AudioServicesPlaySystemSound(id: SystemSoundId);
}

#[link(name = "UserNotifications", kind = "framework")]
unsafe extern "C" {}

unsafe extern "C" {
    static _dispatch_main_q: c_void;
    fn dispatch_async_f(
        queue: *const c_void,
        context: *mut c_void,
        work: extern "C" fn(*mut c_void),
    );
}

/// Run `f` on the main queue without waiting for it.
fn on_main_queue(f: impl FnOnce() + Send + 'static) {
    extern "C" fn trampoline(ctx: *mut c_void) {
        // SAFETY: `ctx` was produced by `Box::into_raw` below and is consumed
        // exactly once.
        let f: Box<Box<dyn FnOnce() + Send>> = unsafe { Box::from_raw(ctx.cast()) };
        f();
    }
    let boxed: Box<Box<dyn FnOnce() + Send>> = Box::new(Box::new(f));
    // SAFETY: `_dispatch_main_q` is the process-wide main queue object that
    // `dispatch_get_main_queue()` returns.
    unsafe {
        dispatch_async_f(
            &_dispatch_main_q as *const c_void,
            Box::into_raw(boxed).cast(),
            trampoline,
        );
    }
}

// ---------------------------------------------------------------------------
// Repeating playback
// ---------------------------------------------------------------------------

/// A background thread replaying a system sound until stopped.
struct Repeater {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Repeater {
    fn start(name: &str, period: Duration, tick: impl Fn() + Send + 'static) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let thread = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while !flag.load(Ordering::Acquire) {
                    tick();
                    std::thread::park_timeout(period);
                }
            })?;
        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    fn is_running(&self) -> bool {
        !self.stop.load(Ordering::Acquire)
    }
}

impl Drop for Repeater {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            let _ = thread.join();
        }
    }
}

/// Length of one loop of `pattern` starting at its repeat index.
fn loop_period(pattern: &VibrationPattern) -> Duration {
    let start = pattern.repeat.unwrap_or(0).min(pattern.timings_ms.len());
    let ms: u64 = pattern.timings_ms[start..].iter().sum();
    Duration::from_millis(ms.max(500))
}

// ---------------------------------------------------------------------------
// Bridge struct
// ---------------------------------------------------------------------------

#[derive(Default)]
struct IosState {
    sounds: HashMap<u64, SystemSoundId>,
    ringing: HashMap<u64, Repeater>,
    vibration: Option<Repeater>,
    next_tone: u64,
}

/// iOS implementation of the CallKit platform bridge.
pub struct IosBridge {
    state: Mutex<IosState>,
}

impl IosBridge {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(IosState {
                next_tone: 1,
                ..IosState::default()
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, IosState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_idle_timer_disabled(&self, disabled: bool) {
        on_main_queue(move || {
            let Some(mtm) = MainThreadMarker::new() else {
                tracing::error!("iOS: main queue block ran off the main thread");
                return;
            };
            let app = UIApplication::sharedApplication(mtm);
            // SAFETY: `setIdleTimerDisabled:` takes a BOOL and we are on the
            // main thread.
            let _: () = unsafe { msg_send![&app, setIdleTimerDisabled: Bool::new(disabled)] };
            tracing::debug!(disabled, "iOS: idle timer updated");
        });
    }
}

impl Default for IosBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformBridge for IosBridge {
    fn platform_name(&self) -> &str {
        "iOS"
    }
}

// ---------------------------------------------------------------------------
// AlertDevice — AudioToolbox
// ---------------------------------------------------------------------------

impl AlertDevice for IosBridge {
    /// `[[NSBundle mainBundle] pathForResource:name ofType:@"caf"]`.
    fn locate_tone(&self, name: &str) -> Option<ToneSource> {
        let ns_name = NSString::from_str(name);
        let ns_ext = NSString::from_str(TONE_EXTENSION);
        // SAFETY: standard NSBundle selectors; both return autoreleased
        // objects or nil.
        let path: Option<Retained<NSString>> = unsafe {
            let bundle: Option<Retained<AnyObject>> = msg_send![class!(NSBundle), mainBundle];
            let bundle = bundle?;
            msg_send![&bundle, pathForResource: &*ns_name, ofType: &*ns_ext]
        };
        path.map(|p| ToneSource::Resource(p.to_string()))
    }

    fn prepare(&self, source: &ToneSource) -> Result<ToneHandle> {
        let sound = match source {
            ToneSource::PlatformDefault => DEFAULT_RING_SOUND,
            ToneSource::Resource(path) => {
                let ns_path = NSString::from_str(path);
                let mut id: SystemSoundId = 0;
                // SAFETY: NSURL is toll-free bridged with CFURLRef; the URL
                // outlives the call.
                let status = unsafe {
                    let url: Option<Retained<AnyObject>> =
                        msg_send![class!(NSURL), fileURLWithPath: &*ns_path];
                    let url = url.ok_or_else(|| {
                        CallKitError::Bridge(format!("invalid tone path {path}"))
                    })?;
                    AudioServicesCreateSystemSoundID(
                        Retained::as_ptr(&url) as *const c_void,
                        &mut id,
                    )
                };
                if status != 0 {
                    return Err(CallKitError::Bridge(format!(
                        "AudioServicesCreateSystemSoundID failed: OSStatus {status}"
                    )));
                }
                id
            }
        };

        let mut st = self.lock();
        let handle = ToneHandle(st.next_tone);
        st.next_tone += 1;
        st.sounds.insert(handle.0, sound);
        tracing::info!(handle = handle.0, sound, "iOS: tone prepared");
        Ok(handle)
    }

    fn play(&self, tone: ToneHandle) -> Result<()> {
        let mut st = self.lock();
        let sound = *st
            .sounds
            .get(&tone.0)
            .ok_or_else(|| CallKitError::Bridge(format!("unknown tone handle {}", tone.0)))?;
        // SAFETY: plain C call with a sound id we created or a built-in one.
        let repeater = Repeater::start("callkit-ring", RING_INTERVAL, move || unsafe {
            AudioServicesPlayAlertSound(sound)
        })?;
        st.ringing.insert(tone.0, repeater);
        Ok(())
    }

    fn stop(&self, tone: ToneHandle) -> Result<()> {
        let repeater = self.lock().ringing.remove(&tone.0);
        drop(repeater);
        Ok(())
    }

    fn is_playing(&self, tone: ToneHandle) -> Result<bool> {
        Ok(self
            .lock()
            .ringing
            .get(&tone.0)
            .is_some_and(Repeater::is_running))
    }

    fn release(&self, tone: ToneHandle) -> Result<()> {
        let (repeater, sound) = {
            let mut st = self.lock();
            (st.ringing.remove(&tone.0), st.sounds.remove(&tone.0))
        };
        drop(repeater);
        let sound = sound
            .ok_or_else(|| CallKitError::Bridge(format!("unknown tone handle {}", tone.0)))?;
        if sound != DEFAULT_RING_SOUND {
            // SAFETY: created by AudioServicesCreateSystemSoundID in `prepare`
            // and no longer reachable from the map.
            unsafe { AudioServicesDisposeSystemSoundID(sound) };
        }
        Ok(())
    }

    fn vibrate(&self, pattern: &VibrationPattern) -> Result<()> {
        if !pattern.is_audible() {
            return Ok(());
        }
        let period = loop_period(pattern);
        let repeater = if pattern.repeat.is_some() {
            // SAFETY: plain C call with the built-in vibrate id.
            Some(Repeater::start("callkit-vibrate", period, || unsafe {
                AudioServicesPlaySystemSound(SYSTEM_SOUND_VIBRATE)
            })?)
        } else {
            // SAFETY: as above.
            unsafe { AudioServicesPlaySystemSound(SYSTEM_SOUND_VIBRATE) };
            None
        };
        let old = std::mem::replace(&mut self.lock().vibration, repeater);
        drop(old);
        Ok(())
    }

    fn cancel_vibration(&self) -> Result<()> {
        let old = self.lock().vibration.take();
        drop(old);
        Ok(())
    }

    fn ringer_policy(&self) -> Result<RingerPolicy> {
        Ok(RingerPolicy::Normal)
    }

    /// Not readable by apps; alert sounds vibrate on their own where the user
    /// enabled it.
    fn vibrate_while_ringing(&self) -> Result<bool> {
        Ok(false)
    }
}

impl Drop for IosBridge {
    fn drop(&mut self) {
        let st = self.state.get_mut().unwrap_or_else(|p| p.into_inner());
        st.ringing.clear();
        st.vibration = None;
        for (_, sound) in st.sounds.drain() {
            if sound != DEFAULT_RING_SOUND {
                // SAFETY: ids in the map other than the built-in were created
                // by AudioServicesCreateSystemSoundID.
                unsafe { AudioServicesDisposeSystemSoundID(sound) };
            }
        }
    }
}

// ---------------------------------------------------------------------------
// PresentationSurface — UIApplication
// ---------------------------------------------------------------------------

impl PresentationSurface for IosBridge {
    fn bring_to_foreground(&self) -> Result<()> {
        Err(CallKitError::PlatformUnavailable)
    }

    fn set_bypass_flags(&self) -> Result<()> {
        self.set_idle_timer_disabled(true);
        Ok(())
    }

    fn clear_bypass_flags(&self) -> Result<()> {
        self.set_idle_timer_disabled(false);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Notifier — UNUserNotificationCenter
// ---------------------------------------------------------------------------

impl Notifier for IosBridge {
    fn post(&self, key: &NotificationKey, title: &str, body: &str) -> Result<()> {
        let ns_title = NSString::from_str(title);
        let ns_body = NSString::from_str(body);
        let ns_id = NSString::from_str(&key.tag);

        // SAFETY: UserNotifications selectors with retained arguments; a nil
        // trigger delivers immediately and a nil completion handler is
        // allowed.
        unsafe {
            let content: Option<Retained<AnyObject>> =
                msg_send![class!(UNMutableNotificationContent), new];
            let content = content
                .ok_or_else(|| CallKitError::Bridge("UNMutableNotificationContent alloc failed".into()))?;
            let _: () = msg_send![&content, setTitle: &*ns_title];
            let _: () = msg_send![&content, setBody: &*ns_body];

            let request: Option<Retained<AnyObject>> = msg_send![
                class!(UNNotificationRequest),
                requestWithIdentifier: &*ns_id,
                content: &*content,
                trigger: std::ptr::null::<AnyObject>()
            ];
            let request = request
                .ok_or_else(|| CallKitError::Bridge("UNNotificationRequest creation failed".into()))?;

            let center: Option<Retained<AnyObject>> =
                msg_send![class!(UNUserNotificationCenter), currentNotificationCenter];
            let center = center
                .ok_or_else(|| CallKitError::Bridge("no notification center".into()))?;
            let _: () = msg_send![
                &center,
                addNotificationRequest: &*request,
                withCompletionHandler: std::ptr::null::<c_void>()
            ];
        }

        tracing::info!(tag = %key.tag, "iOS: missed-call notification scheduled");
        Ok(())
    }
}
