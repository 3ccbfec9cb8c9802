// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Android platform bridge via JNI.
//
// Requires the Android NDK and targets `aarch64-linux-android` or
// `armv7-linux-androideabi`. Each trait method invokes the corresponding
// Android API through JNI calls into the ART runtime.
//
// ## Architecture notes
//
// Ringtone, Vibrator, AudioManager, Settings and NotificationManager calls are
// thread-agnostic and go straight through JNI.
//
// Window flags must be changed on the Android main thread, which native code
// cannot post to without a `Runnable`. The host app therefore ships a tiny
// glue class, `org.hyperpolymath.callkit.CallKitGlue`, with a static
// `setWindowFlags(Activity, int, boolean)` that does the `runOnUiThread` hop.
// It is loaded through the Activity's class loader because the system loader
// attached to native threads cannot see application classes.

#![cfg(target_os = "android")]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

use jni::objects::{GlobalRef, JClass, JObject, JString, JValue};
use jni::{JNIEnv, JavaVM};

use callkit_core::error::{CallKitError, Result};
use callkit_core::types::{NotificationKey, RingerPolicy, ToneHandle, ToneSource, VibrationPattern};

use crate::traits::*;

// ---------------------------------------------------------------------------
// Android constants
// ---------------------------------------------------------------------------

/// `RingtoneManager.TYPE_RINGTONE`.
const TYPE_RINGTONE: i32 = 1;
/// `AudioAttributes.USAGE_NOTIFICATION_RINGTONE`.
const USAGE_NOTIFICATION_RINGTONE: i32 = 6;
/// `AudioAttributes.CONTENT_TYPE_SONIFICATION`.
const CONTENT_TYPE_SONIFICATION: i32 = 4;

/// `AudioManager.RINGER_MODE_*`.
const RINGER_MODE_SILENT: i32 = 0;
const RINGER_MODE_VIBRATE: i32 = 1;

/// Show over the keyguard, turn the screen on, dismiss the keyguard and keep
/// the screen on (`WindowManager.LayoutParams.FLAG_*`).
const BYPASS_FLAGS: i32 = 0x0008_0000 | 0x0020_0000 | 0x0040_0000 | 0x0000_0080;

const FLAG_ACTIVITY_NEW_TASK: i32 = 0x1000_0000;
const FLAG_ACTIVITY_REORDER_TO_FRONT: i32 = 0x0002_0000;
const PENDING_FLAG_UPDATE_CURRENT: i32 = 0x0800_0000;
const PENDING_FLAG_IMMUTABLE: i32 = 0x0400_0000;
/// `NotificationManager.IMPORTANCE_HIGH`.
const IMPORTANCE_HIGH: i32 = 4;

/// API level that introduced notification channels.
const ANDROID_O: i32 = 26;

/// Notification channel used for missed calls.
const MISSED_CALL_CHANNEL: &str = "callkit_missed_calls";
const MISSED_CALL_CHANNEL_NAME: &str = "Missed calls";

/// Host-provided glue class (binary name, dotted).
const GLUE_CLASS: &str = "org.hyperpolymath.callkit.CallKitGlue";

// ---------------------------------------------------------------------------
// JNI bootstrap helpers
// ---------------------------------------------------------------------------

static JAVA_VM: OnceLock<JavaVM> = OnceLock::new();

fn java_vm() -> Result<&'static JavaVM> {
    if let Some(vm) = JAVA_VM.get() {
        return Ok(vm);
    }
    let ctx = ndk_context::android_context();
    // SAFETY: `ctx.vm()` returns the `JavaVM*` set by the NDK glue code.
    // The pointer is guaranteed valid for the lifetime of the process.
    let vm = unsafe { JavaVM::from_raw(ctx.vm().cast()) }
        .map_err(|e| CallKitError::Bridge(format!("failed to obtain JavaVM: {e}")))?;
    Ok(JAVA_VM.get_or_init(|| vm))
}

/// Run `f` with a [`JNIEnv`] attached to the current thread.
///
/// The thread is detached again when `f` returns unless it was already
/// attached, in which case local references live until control returns to
/// Java.
fn with_env<T>(f: impl FnOnce(&mut JNIEnv<'_>) -> Result<T>) -> Result<T> {
    let vm = java_vm()?;
    let mut guard = vm
        .attach_current_thread()
        .map_err(|e| CallKitError::Bridge(format!("failed to attach JNI thread: {e}")))?;
    f(&mut guard)
}

/// Obtain the hosting Android `Activity` as a [`JObject`].
fn activity() -> Result<JObject<'static>> {
    let ctx = ndk_context::android_context();
    let ptr = ctx.context();
    if ptr.is_null() {
        return Err(CallKitError::Bridge(
            "Android context is null — native activity not initialised".into(),
        ));
    }
    // SAFETY: the NDK guarantees this pointer is a valid global jobject for
    // the hosting Activity.
    Ok(unsafe { JObject::from_raw(ptr.cast()) })
}

/// Convenience: map any `jni::errors::Error` into `CallKitError::Bridge`.
fn jni_err(context: &str, e: jni::errors::Error) -> CallKitError {
    CallKitError::Bridge(format!("{context}: {e}"))
}

/// `context.getSystemService(name)`.
fn system_service<'local>(
    env: &mut JNIEnv<'local>,
    context: &JObject<'_>,
    name: &str,
) -> Result<JObject<'local>> {
    let j_name = env
        .new_string(name)
        .map_err(|e| jni_err("new_string(service)", e))?;
    let service = env
        .call_method(
            context,
            "getSystemService",
            "(Ljava/lang/String;)Ljava/lang/Object;",
            &[JValue::Object(&j_name)],
        )
        .map_err(|e| jni_err("getSystemService", e))?
        .l()
        .map_err(|e| jni_err("getSystemService->l", e))?;
    if service.is_null() {
        return Err(CallKitError::Bridge(format!("system service {name} unavailable")));
    }
    Ok(service)
}

fn package_name(env: &mut JNIEnv<'_>, context: &JObject<'_>) -> Result<String> {
    let j_pkg = env
        .call_method(context, "getPackageName", "()Ljava/lang/String;", &[])
        .map_err(|e| jni_err("getPackageName", e))?
        .l()
        .map_err(|e| jni_err("getPackageName->l", e))?;
    let pkg: String = env
        .get_string(&JString::from(j_pkg))
        .map_err(|e| jni_err("get_string(packageName)", e))?
        .into();
    Ok(pkg)
}

/// `getResources().getIdentifier(name, kind, packageName)`; 0 when absent.
fn resource_id(env: &mut JNIEnv<'_>, context: &JObject<'_>, name: &str, kind: &str) -> Result<i32> {
    let pkg = package_name(env, context)?;
    let resources = env
        .call_method(context, "getResources", "()Landroid/content/res/Resources;", &[])
        .map_err(|e| jni_err("getResources", e))?
        .l()
        .map_err(|e| jni_err("getResources->l", e))?;
    let j_name = env.new_string(name).map_err(|e| jni_err("new_string(name)", e))?;
    let j_kind = env.new_string(kind).map_err(|e| jni_err("new_string(kind)", e))?;
    let j_pkg = env.new_string(&pkg).map_err(|e| jni_err("new_string(pkg)", e))?;
    env.call_method(
        &resources,
        "getIdentifier",
        "(Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;)I",
        &[
            JValue::Object(&j_name),
            JValue::Object(&j_kind),
            JValue::Object(&j_pkg),
        ],
    )
    .map_err(|e| jni_err("getIdentifier", e))?
    .i()
    .map_err(|e| jni_err("getIdentifier->i", e))
}

fn sdk_int(env: &mut JNIEnv<'_>) -> Result<i32> {
    env.get_static_field("android/os/Build$VERSION", "SDK_INT", "I")
        .map_err(|e| jni_err("Build.VERSION.SDK_INT", e))?
        .i()
        .map_err(|e| jni_err("SDK_INT->i", e))
}

/// `packageManager.getLaunchIntentForPackage(packageName)`.
fn launch_intent<'local>(env: &mut JNIEnv<'local>, context: &JObject<'_>) -> Result<JObject<'local>> {
    let pkg = package_name(env, context)?;
    let pm = env
        .call_method(
            context,
            "getPackageManager",
            "()Landroid/content/pm/PackageManager;",
            &[],
        )
        .map_err(|e| jni_err("getPackageManager", e))?
        .l()
        .map_err(|e| jni_err("getPackageManager->l", e))?;
    let j_pkg = env.new_string(&pkg).map_err(|e| jni_err("new_string(pkg)", e))?;
    let intent = env
        .call_method(
            &pm,
            "getLaunchIntentForPackage",
            "(Ljava/lang/String;)Landroid/content/Intent;",
            &[JValue::Object(&j_pkg)],
        )
        .map_err(|e| jni_err("getLaunchIntentForPackage", e))?
        .l()
        .map_err(|e| jni_err("getLaunchIntentForPackage->l", e))?;
    if intent.is_null() {
        return Err(CallKitError::Bridge(format!("{pkg} has no launch intent")));
    }
    Ok(intent)
}

/// Load an application class through the Activity's class loader.
fn load_app_class<'local>(
    env: &mut JNIEnv<'local>,
    activity: &JObject<'_>,
    name: &str,
) -> Result<JClass<'local>> {
    let loader = env
        .call_method(activity, "getClassLoader", "()Ljava/lang/ClassLoader;", &[])
        .map_err(|e| jni_err("getClassLoader", e))?
        .l()
        .map_err(|e| jni_err("getClassLoader->l", e))?;
    let j_name = env.new_string(name).map_err(|e| jni_err("new_string(class)", e))?;
    let class = env
        .call_method(
            &loader,
            "loadClass",
            "(Ljava/lang/String;)Ljava/lang/Class;",
            &[JValue::Object(&j_name)],
        )
        .map_err(|e| jni_err(&format!("loadClass({name})"), e))?
        .l()
        .map_err(|e| jni_err("loadClass->l", e))?;
    Ok(JClass::from(class))
}

// ---------------------------------------------------------------------------
// Bridge struct
// ---------------------------------------------------------------------------

/// Android implementation of the CallKit platform bridge.
///
/// Prepared `android.media.Ringtone` objects are pinned as global references
/// and addressed by [`ToneHandle`].
pub struct AndroidBridge {
    tones: Mutex<HashMap<u64, GlobalRef>>,
    next_tone: AtomicU64,
}

impl AndroidBridge {
    /// Create a new Android bridge.
    ///
    /// This does **not** touch JNI — the first JNI call happens lazily when
    /// a trait method is invoked.
    pub fn new() -> Self {
        Self {
            tones: Mutex::new(HashMap::new()),
            next_tone: AtomicU64::new(1),
        }
    }

    fn tone(&self, handle: ToneHandle) -> Result<GlobalRef> {
        let tones = self.tones.lock().unwrap_or_else(|p| p.into_inner());
        tones
            .get(&handle.0)
            .cloned()
            .ok_or_else(|| CallKitError::Bridge(format!("unknown tone handle {}", handle.0)))
    }

    fn set_window_flags(&self, set: bool) -> Result<()> {
        with_env(|env| {
            let activity = activity()?;
            let glue = load_app_class(env, &activity, GLUE_CLASS)?;
            env.call_static_method(
                &glue,
                "setWindowFlags",
                "(Landroid/app/Activity;IZ)V",
                &[
                    JValue::Object(&activity),
                    JValue::Int(BYPASS_FLAGS),
                    JValue::Bool(set as u8),
                ],
            )
            .map_err(|e| jni_err("CallKitGlue.setWindowFlags", e))?;
            tracing::debug!(set, "Android: window flag change posted to UI thread");
            Ok(())
        })
    }
}

impl Default for AndroidBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformBridge for AndroidBridge {
    fn platform_name(&self) -> &str {
        "Android"
    }
}

// ---------------------------------------------------------------------------
// AlertDevice — RingtoneManager / Vibrator / AudioManager
// ---------------------------------------------------------------------------

impl AlertDevice for AndroidBridge {
    /// Look for `res/raw/<name>` in the host app.
    fn locate_tone(&self, name: &str) -> Option<ToneSource> {
        let found = with_env(|env| {
            let activity = activity()?;
            let id = resource_id(env, &activity, name, "raw")?;
            if id == 0 {
                return Ok(None);
            }
            let pkg = package_name(env, &activity)?;
            Ok(Some(ToneSource::Resource(format!("android.resource://{pkg}/{id}"))))
        });
        match found {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!(name, error = %e, "Android: tone lookup failed");
                None
            }
        }
    }

    fn prepare(&self, source: &ToneSource) -> Result<ToneHandle> {
        let global = with_env(|env| {
            let activity = activity()?;

            let uri: JObject = match source {
                ToneSource::Resource(locator) => {
                    let j_uri = env
                        .new_string(locator)
                        .map_err(|e| jni_err("new_string(uri)", e))?;
                    env.call_static_method(
                        "android/net/Uri",
                        "parse",
                        "(Ljava/lang/String;)Landroid/net/Uri;",
                        &[JValue::Object(&j_uri)],
                    )
                    .map_err(|e| jni_err("Uri.parse", e))?
                    .l()
                    .map_err(|e| jni_err("Uri.parse->l", e))?
                }
                ToneSource::PlatformDefault => env
                    .call_static_method(
                        "android/media/RingtoneManager",
                        "getDefaultUri",
                        "(I)Landroid/net/Uri;",
                        &[JValue::Int(TYPE_RINGTONE)],
                    )
                    .map_err(|e| jni_err("RingtoneManager.getDefaultUri", e))?
                    .l()
                    .map_err(|e| jni_err("getDefaultUri->l", e))?,
            };

            let ringtone = env
                .call_static_method(
                    "android/media/RingtoneManager",
                    "getRingtone",
                    "(Landroid/content/Context;Landroid/net/Uri;)Landroid/media/Ringtone;",
                    &[JValue::Object(&activity), JValue::Object(&uri)],
                )
                .map_err(|e| jni_err("RingtoneManager.getRingtone", e))?
                .l()
                .map_err(|e| jni_err("getRingtone->l", e))?;
            if ringtone.is_null() {
                return Err(CallKitError::Bridge("RingtoneManager returned no ringtone".into()));
            }

            // new AudioAttributes.Builder().setUsage(..).setContentType(..).build()
            let builder = env
                .new_object("android/media/AudioAttributes$Builder", "()V", &[])
                .map_err(|e| jni_err("new AudioAttributes.Builder", e))?;
            env.call_method(
                &builder,
                "setUsage",
                "(I)Landroid/media/AudioAttributes$Builder;",
                &[JValue::Int(USAGE_NOTIFICATION_RINGTONE)],
            )
            .map_err(|e| jni_err("setUsage", e))?;
            env.call_method(
                &builder,
                "setContentType",
                "(I)Landroid/media/AudioAttributes$Builder;",
                &[JValue::Int(CONTENT_TYPE_SONIFICATION)],
            )
            .map_err(|e| jni_err("setContentType", e))?;
            let attributes = env
                .call_method(&builder, "build", "()Landroid/media/AudioAttributes;", &[])
                .map_err(|e| jni_err("AudioAttributes.build", e))?
                .l()
                .map_err(|e| jni_err("build->l", e))?;
            env.call_method(
                &ringtone,
                "setAudioAttributes",
                "(Landroid/media/AudioAttributes;)V",
                &[JValue::Object(&attributes)],
            )
            .map_err(|e| jni_err("Ringtone.setAudioAttributes", e))?;

            env.new_global_ref(&ringtone)
                .map_err(|e| jni_err("new_global_ref(ringtone)", e))
        })?;

        let handle = ToneHandle(self.next_tone.fetch_add(1, Ordering::Relaxed));
        self.tones
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(handle.0, global);
        tracing::info!(handle = handle.0, ?source, "Android: ringtone prepared");
        Ok(handle)
    }

    fn play(&self, tone: ToneHandle) -> Result<()> {
        let ringtone = self.tone(tone)?;
        with_env(|env| {
            env.call_method(ringtone.as_obj(), "play", "()V", &[])
                .map_err(|e| jni_err("Ringtone.play", e))?;
            Ok(())
        })
    }

    fn stop(&self, tone: ToneHandle) -> Result<()> {
        let ringtone = self.tone(tone)?;
        with_env(|env| {
            env.call_method(ringtone.as_obj(), "stop", "()V", &[])
                .map_err(|e| jni_err("Ringtone.stop", e))?;
            Ok(())
        })
    }

    /// Drops the pinned `Ringtone` global ref.
    fn release(&self, tone: ToneHandle) -> Result<()> {
        let removed = self
            .tones
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&tone.0);
        match removed {
            Some(_) => {
                tracing::debug!(handle = tone.0, "Android: ringtone released");
                Ok(())
            }
            None => Err(CallKitError::Bridge(format!("unknown tone handle {}", tone.0))),
        }
    }

    fn is_playing(&self, tone: ToneHandle) -> Result<bool> {
        let ringtone = self.tone(tone)?;
        with_env(|env| {
            env.call_method(ringtone.as_obj(), "isPlaying", "()Z", &[])
                .map_err(|e| jni_err("Ringtone.isPlaying", e))?
                .z()
                .map_err(|e| jni_err("isPlaying->z", e))
        })
    }

    /// `Vibrator.vibrate(long[] pattern, int repeat)`.
    fn vibrate(&self, pattern: &VibrationPattern) -> Result<()> {
        with_env(|env| {
            let activity = activity()?;
            let vibrator = system_service(env, &activity, "vibrator")?;

            let timings: Vec<i64> = pattern
                .timings_ms
                .iter()
                .map(|&ms| i64::try_from(ms).unwrap_or(i64::MAX))
                .collect();
            let len = i32::try_from(timings.len())
                .map_err(|_| CallKitError::Bridge("vibration pattern too long".into()))?;
            let j_timings = env
                .new_long_array(len)
                .map_err(|e| jni_err("new_long_array", e))?;
            env.set_long_array_region(&j_timings, 0, &timings)
                .map_err(|e| jni_err("set_long_array_region", e))?;
            let repeat = pattern
                .repeat
                .and_then(|i| i32::try_from(i).ok())
                .unwrap_or(-1);

            env.call_method(
                &vibrator,
                "vibrate",
                "([JI)V",
                &[JValue::Object(&j_timings), JValue::Int(repeat)],
            )
            .map_err(|e| jni_err("Vibrator.vibrate", e))?;
            tracing::debug!(repeat, "Android: vibration started");
            Ok(())
        })
    }

    fn cancel_vibration(&self) -> Result<()> {
        with_env(|env| {
            let activity = activity()?;
            let vibrator = system_service(env, &activity, "vibrator")?;
            env.call_method(&vibrator, "cancel", "()V", &[])
                .map_err(|e| jni_err("Vibrator.cancel", e))?;
            Ok(())
        })
    }

    fn ringer_policy(&self) -> Result<RingerPolicy> {
        with_env(|env| {
            let activity = activity()?;
            let audio = system_service(env, &activity, "audio")?;
            let mode = env
                .call_method(&audio, "getRingerMode", "()I", &[])
                .map_err(|e| jni_err("AudioManager.getRingerMode", e))?
                .i()
                .map_err(|e| jni_err("getRingerMode->i", e))?;
            Ok(match mode {
                RINGER_MODE_SILENT => RingerPolicy::Silent,
                RINGER_MODE_VIBRATE => RingerPolicy::VibrateOnly,
                _ => RingerPolicy::Normal,
            })
        })
    }

    /// `Settings.System.getInt(resolver, "vibrate_when_ringing", 0) == 1`.
    fn vibrate_while_ringing(&self) -> Result<bool> {
        with_env(|env| {
            let activity = activity()?;
            let resolver = env
                .call_method(
                    &activity,
                    "getContentResolver",
                    "()Landroid/content/ContentResolver;",
                    &[],
                )
                .map_err(|e| jni_err("getContentResolver", e))?
                .l()
                .map_err(|e| jni_err("getContentResolver->l", e))?;
            let j_key = env
                .new_string("vibrate_when_ringing")
                .map_err(|e| jni_err("new_string(setting)", e))?;
            let value = env
                .call_static_method(
                    "android/provider/Settings$System",
                    "getInt",
                    "(Landroid/content/ContentResolver;Ljava/lang/String;I)I",
                    &[JValue::Object(&resolver), JValue::Object(&j_key), JValue::Int(0)],
                )
                .map_err(|e| jni_err("Settings.System.getInt", e))?
                .i()
                .map_err(|e| jni_err("getInt->i", e))?;
            Ok(value == 1)
        })
    }
}

// ---------------------------------------------------------------------------
// PresentationSurface — launch intent / window flags
// ---------------------------------------------------------------------------

impl PresentationSurface for AndroidBridge {
    fn bring_to_foreground(&self) -> Result<()> {
        with_env(|env| {
            let activity = activity()?;
            let intent = launch_intent(env, &activity)?;
            env.call_method(
                &intent,
                "addFlags",
                "(I)Landroid/content/Intent;",
                &[JValue::Int(FLAG_ACTIVITY_NEW_TASK | FLAG_ACTIVITY_REORDER_TO_FRONT)],
            )
            .map_err(|e| jni_err("addFlags", e))?;
            env.call_method(
                &activity,
                "startActivity",
                "(Landroid/content/Intent;)V",
                &[JValue::Object(&intent)],
            )
            .map_err(|e| jni_err("startActivity(launch)", e))?;
            tracing::info!("Android: host activity brought to front");
            Ok(())
        })
    }

    fn set_bypass_flags(&self) -> Result<()> {
        self.set_window_flags(true)
    }

    fn clear_bypass_flags(&self) -> Result<()> {
        self.set_window_flags(false)
    }
}

// ---------------------------------------------------------------------------
// Notifier — NotificationManager
// ---------------------------------------------------------------------------

impl Notifier for AndroidBridge {
    /// Post via `NotificationManager.notify(tag, id, notification)` so that a
    /// repeated key replaces the existing entry.
    fn post(&self, key: &NotificationKey, title: &str, body: &str) -> Result<()> {
        with_env(|env| {
            let activity = activity()?;
            let manager = system_service(env, &activity, "notification")?;
            let sdk = sdk_int(env)?;
            let j_channel = env
                .new_string(MISSED_CALL_CHANNEL)
                .map_err(|e| jni_err("new_string(channel)", e))?;

            // -- Channel (API 26+) and builder ---------------------------------
            let builder = if sdk >= ANDROID_O {
                let j_channel_name = env
                    .new_string(MISSED_CALL_CHANNEL_NAME)
                    .map_err(|e| jni_err("new_string(channel name)", e))?;
                let channel = env
                    .new_object(
                        "android/app/NotificationChannel",
                        "(Ljava/lang/String;Ljava/lang/CharSequence;I)V",
                        &[
                            JValue::Object(&j_channel),
                            JValue::Object(&j_channel_name),
                            JValue::Int(IMPORTANCE_HIGH),
                        ],
                    )
                    .map_err(|e| jni_err("new NotificationChannel", e))?;
                env.call_method(
                    &manager,
                    "createNotificationChannel",
                    "(Landroid/app/NotificationChannel;)V",
                    &[JValue::Object(&channel)],
                )
                .map_err(|e| jni_err("createNotificationChannel", e))?;
                env.new_object(
                    "android/app/Notification$Builder",
                    "(Landroid/content/Context;Ljava/lang/String;)V",
                    &[JValue::Object(&activity), JValue::Object(&j_channel)],
                )
                .map_err(|e| jni_err("new Notification.Builder(channel)", e))?
            } else {
                env.new_object(
                    "android/app/Notification$Builder",
                    "(Landroid/content/Context;)V",
                    &[JValue::Object(&activity)],
                )
                .map_err(|e| jni_err("new Notification.Builder", e))?
            };

            // -- Content -------------------------------------------------------
            let j_title = env.new_string(title).map_err(|e| jni_err("new_string(title)", e))?;
            let j_body = env.new_string(body).map_err(|e| jni_err("new_string(body)", e))?;
            env.call_method(
                &builder,
                "setContentTitle",
                "(Ljava/lang/CharSequence;)Landroid/app/Notification$Builder;",
                &[JValue::Object(&j_title)],
            )
            .map_err(|e| jni_err("setContentTitle", e))?;
            env.call_method(
                &builder,
                "setContentText",
                "(Ljava/lang/CharSequence;)Landroid/app/Notification$Builder;",
                &[JValue::Object(&j_body)],
            )
            .map_err(|e| jni_err("setContentText", e))?;
            env.call_method(
                &builder,
                "setAutoCancel",
                "(Z)Landroid/app/Notification$Builder;",
                &[JValue::Bool(1)],
            )
            .map_err(|e| jni_err("setAutoCancel", e))?;

            // Prefer a dedicated drawable, fall back to the app icon.
            let mut icon = resource_id(env, &activity, "notification_icon", "drawable")?;
            if icon == 0 {
                let info = env
                    .call_method(
                        &activity,
                        "getApplicationInfo",
                        "()Landroid/content/pm/ApplicationInfo;",
                        &[],
                    )
                    .map_err(|e| jni_err("getApplicationInfo", e))?
                    .l()
                    .map_err(|e| jni_err("getApplicationInfo->l", e))?;
                icon = env
                    .get_field(&info, "icon", "I")
                    .map_err(|e| jni_err("ApplicationInfo.icon", e))?
                    .i()
                    .map_err(|e| jni_err("icon->i", e))?;
            }
            env.call_method(
                &builder,
                "setSmallIcon",
                "(I)Landroid/app/Notification$Builder;",
                &[JValue::Int(icon)],
            )
            .map_err(|e| jni_err("setSmallIcon", e))?;

            // Tapping the notification reopens the app.
            let intent = launch_intent(env, &activity)?;
            let pending = env
                .call_static_method(
                    "android/app/PendingIntent",
                    "getActivity",
                    "(Landroid/content/Context;ILandroid/content/Intent;I)Landroid/app/PendingIntent;",
                    &[
                        JValue::Object(&activity),
                        JValue::Int(key.id),
                        JValue::Object(&intent),
                        JValue::Int(PENDING_FLAG_UPDATE_CURRENT | PENDING_FLAG_IMMUTABLE),
                    ],
                )
                .map_err(|e| jni_err("PendingIntent.getActivity", e))?
                .l()
                .map_err(|e| jni_err("getActivity->l", e))?;
            env.call_method(
                &builder,
                "setContentIntent",
                "(Landroid/app/PendingIntent;)Landroid/app/Notification$Builder;",
                &[JValue::Object(&pending)],
            )
            .map_err(|e| jni_err("setContentIntent", e))?;

            let notification = env
                .call_method(&builder, "build", "()Landroid/app/Notification;", &[])
                .map_err(|e| jni_err("Notification.Builder.build", e))?
                .l()
                .map_err(|e| jni_err("build->l", e))?;

            // -- Post ----------------------------------------------------------
            let j_tag = env.new_string(&key.tag).map_err(|e| jni_err("new_string(tag)", e))?;
            env.call_method(
                &manager,
                "notify",
                "(Ljava/lang/String;ILandroid/app/Notification;)V",
                &[
                    JValue::Object(&j_tag),
                    JValue::Int(key.id),
                    JValue::Object(&notification),
                ],
            )
            .map_err(|e| jni_err("NotificationManager.notify", e))?;

            tracing::info!(tag = %key.tag, "Android: missed-call notification posted");
            Ok(())
        })
    }
}
