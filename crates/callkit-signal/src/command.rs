// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The six operations the hybrid shell can invoke, as typed commands.
//
// The shell speaks in action names plus a positional JSON argument array
// (`"reportIncomingCall", ["Alice", false]`). That string form is converted
// here, once; everything past this point matches on `Command`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use callkit_core::error::{CallKitError, Result};
use callkit_core::types::SessionId;

/// Arguments of `reportIncomingCall` / `startCall`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRequest {
    pub display_name: String,
    pub has_video: bool,
}

/// A session id as sent back by the shell. Validated by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRef {
    pub session_id: String,
}

/// Arguments of `endCall`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndCallRequest {
    pub session_id: String,
    pub notify: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Register,
    ReportIncomingCall(CallRequest),
    StartCall(CallRequest),
    CallConnected(CallRef),
    FinishRing(CallRef),
    EndCall(EndCallRequest),
}

impl Command {
    /// Parse the shell's action name and positional arguments.
    ///
    /// Strings are required. Booleans default to `false` when missing or
    /// null, as the shell omits trailing flags.
    pub fn from_action(action: &str, args: &Value) -> Result<Self> {
        let args = Args::new(action, args)?;
        let cmd = match action {
            "register" => Self::Register,
            "reportIncomingCall" => Self::ReportIncomingCall(CallRequest {
                display_name: args.string(0, "displayName")?,
                has_video: args.flag(1, "hasVideo")?,
            }),
            "startCall" => Self::StartCall(CallRequest {
                display_name: args.string(0, "displayName")?,
                has_video: args.flag(1, "hasVideo")?,
            }),
            "callConnected" => Self::CallConnected(CallRef {
                session_id: args.string(0, "uuid")?,
            }),
            "finishRing" => Self::FinishRing(CallRef {
                session_id: args.string(0, "uuid")?,
            }),
            "endCall" => Self::EndCall(EndCallRequest {
                session_id: args.string(0, "uuid")?,
                notify: args.flag(1, "notify")?,
            }),
            other => return Err(CallKitError::UnknownAction(other.to_string())),
        };
        Ok(cmd)
    }

    /// The shell-facing action name.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::ReportIncomingCall(_) => "reportIncomingCall",
            Self::StartCall(_) => "startCall",
            Self::CallConnected(_) => "callConnected",
            Self::FinishRing(_) => "finishRing",
            Self::EndCall(_) => "endCall",
        }
    }
}

/// What a successful command hands back to the shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    /// Plain success; serializes as `null`.
    Ok,
    /// A newly created session; serializes as the id string.
    SessionId(SessionId),
}

/// Positional argument reader.
struct Args<'a> {
    action: &'a str,
    items: &'a [Value],
}

impl<'a> Args<'a> {
    fn new(action: &'a str, args: &'a Value) -> Result<Self> {
        static EMPTY: [Value; 0] = [];
        let items: &'a [Value] = match args {
            Value::Array(items) => items,
            Value::Null => &EMPTY,
            _ => {
                return Err(CallKitError::InvalidArguments(format!(
                    "{action}: arguments must be an array"
                )));
            }
        };
        Ok(Self { action, items })
    }

    fn string(&self, idx: usize, name: &str) -> Result<String> {
        match self.items.get(idx) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Err(CallKitError::InvalidArguments(format!(
                "{}: {name} must be a string, got {other}",
                self.action
            ))),
            None => Err(CallKitError::InvalidArguments(format!(
                "{}: missing {name}",
                self.action
            ))),
        }
    }

    fn flag(&self, idx: usize, name: &str) -> Result<bool> {
        match self.items.get(idx) {
            Some(Value::Bool(b)) => Ok(*b),
            None | Some(Value::Null) => Ok(false),
            Some(other) => Err(CallKitError::InvalidArguments(format!(
                "{}: {name} must be a boolean, got {other}",
                self.action
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_every_action() {
        let id = "6f1b2c3d-0000-4000-8000-000000000001";
        let cases = [
            ("register", json!([]), Command::Register),
            (
                "reportIncomingCall",
                json!(["Alice", true]),
                Command::ReportIncomingCall(CallRequest {
                    display_name: "Alice".into(),
                    has_video: true,
                }),
            ),
            (
                "startCall",
                json!(["Bob", false]),
                Command::StartCall(CallRequest {
                    display_name: "Bob".into(),
                    has_video: false,
                }),
            ),
            (
                "callConnected",
                json!([id]),
                Command::CallConnected(CallRef { session_id: id.into() }),
            ),
            (
                "finishRing",
                json!([id]),
                Command::FinishRing(CallRef { session_id: id.into() }),
            ),
            (
                "endCall",
                json!([id, true]),
                Command::EndCall(EndCallRequest {
                    session_id: id.into(),
                    notify: true,
                }),
            ),
        ];
        for (action, args, expected) in cases {
            let cmd = Command::from_action(action, &args).expect(action);
            assert_eq!(cmd, expected);
            assert_eq!(cmd.action(), action);
        }
    }

    #[test]
    fn missing_flags_default_to_false() {
        let cmd = Command::from_action("reportIncomingCall", &json!(["Alice"])).expect("parse");
        assert_eq!(
            cmd,
            Command::ReportIncomingCall(CallRequest {
                display_name: "Alice".into(),
                has_video: false,
            })
        );
        assert_eq!(Command::from_action("register", &Value::Null).expect("parse"), Command::Register);
    }

    #[test]
    fn rejects_unknown_action() {
        let err = Command::from_action("askNotificationPermission", &json!([])).expect_err("unknown");
        assert!(matches!(err, CallKitError::UnknownAction(a) if a == "askNotificationPermission"));
    }

    #[test]
    fn rejects_wrong_shapes() {
        for (action, args) in [
            ("reportIncomingCall", json!([])),
            ("reportIncomingCall", json!([42, false])),
            ("endCall", json!(["id", "yes"])),
            ("finishRing", json!({"uuid": "id"})),
        ] {
            let err = Command::from_action(action, &args).expect_err(action);
            assert!(matches!(err, CallKitError::InvalidArguments(_)), "{action}: {err}");
        }
    }

    #[test]
    fn reply_serialization() {
        assert_eq!(serde_json::to_value(Reply::Ok).expect("json"), Value::Null);
        let id = SessionId::new();
        assert_eq!(
            serde_json::to_value(Reply::SessionId(id)).expect("json"),
            Value::String(id.to_string())
        );
    }
}
