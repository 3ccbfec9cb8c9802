// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Line protocol between the hybrid shell and the host.
//
// In:  {"action": "reportIncomingCall", "args": ["Alice", false]}
// Out: {"ok": true, "result": "<uuid>"}
//      {"ok": true, "result": null, "suppressed": ["play tone"]}
//      {"ok": false, "error": "precondition failed: ..."}
//      {"event": {"callbackType": "callChanged", ...}}

use serde::Deserialize;
use serde_json::{Map, Value, json};

use callkit_core::best_effort::Delivered;
use callkit_core::error::Result;
use callkit_signal::{CallEvent, Command, Reply};

/// One request line as sent by the shell.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub action: String,
    #[serde(default)]
    pub args: Value,
}

/// Decode a request line into a command.
pub fn parse_command(line: &str) -> Result<Command> {
    let envelope: Envelope = serde_json::from_str(line)?;
    Command::from_action(&envelope.action, &envelope.args)
}

/// Render the outcome of a command. Soft failures are listed by step so the
/// shell can tell a partial alert from a full one.
pub fn reply_line(outcome: &Result<Delivered<Reply>>) -> String {
    let line = match outcome {
        Ok(delivered) => {
            let mut obj = Map::new();
            obj.insert("ok".into(), Value::Bool(true));
            obj.insert("result".into(), reply_value(&delivered.value));
            if !delivered.is_clean() {
                let steps = delivered
                    .suppressed
                    .iter()
                    .map(|f| Value::String(f.step.to_string()))
                    .collect();
                obj.insert("suppressed".into(), Value::Array(steps));
            }
            Value::Object(obj)
        }
        Err(e) => json!({ "ok": false, "error": e.to_string() }),
    };
    line.to_string()
}

/// Render a call event for the shell's listener.
pub fn event_line(event: &CallEvent) -> String {
    match serde_json::to_value(event) {
        Ok(payload) => json!({ "event": payload }).to_string(),
        Err(e) => json!({ "ok": false, "error": format!("unrenderable event: {e}") }).to_string(),
    }
}

fn reply_value(reply: &Reply) -> Value {
    match reply {
        Reply::Ok => Value::Null,
        Reply::SessionId(id) => Value::String(id.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callkit_core::best_effort::{AlertStep, Suppressed};
    use callkit_core::error::CallKitError;
    use callkit_core::types::{CallSession, SessionId};
    use callkit_signal::CallRequest;

    fn parse(line: &str) -> Value {
        serde_json::from_str(line).expect("valid json")
    }

    #[test]
    fn parses_envelope() {
        let cmd = parse_command(r#"{"action":"startCall","args":["Bob",true]}"#).expect("parse");
        assert_eq!(
            cmd,
            Command::StartCall(CallRequest {
                display_name: "Bob".into(),
                has_video: true,
            })
        );
    }

    #[test]
    fn args_are_optional_for_register() {
        assert_eq!(parse_command(r#"{"action":"register"}"#).expect("parse"), Command::Register);
    }

    #[test]
    fn garbage_line_is_an_error() {
        assert!(matches!(parse_command("ring ring"), Err(CallKitError::Serialization(_))));
        assert!(matches!(
            parse_command(r#"{"action":"hangUp","args":[]}"#),
            Err(CallKitError::UnknownAction(_))
        ));
    }

    #[test]
    fn renders_session_id_reply() {
        let id = SessionId::new();
        let line = reply_line(&Ok(Delivered::clean(Reply::SessionId(id))));
        let v = parse(&line);
        assert_eq!(v["ok"], true);
        assert_eq!(v["result"], id.to_string());
        assert!(v.get("suppressed").is_none());
    }

    #[test]
    fn renders_suppressed_steps() {
        let mut s = Suppressed::new();
        let _: Option<()> = s.absorb(AlertStep::PlayTone, Err(CallKitError::PlatformUnavailable));
        let v = parse(&reply_line(&Ok(s.deliver(Reply::Ok))));
        assert_eq!(v["ok"], true);
        assert!(v["result"].is_null());
        assert_eq!(v["suppressed"], json!(["play tone"]));
    }

    #[test]
    fn renders_errors() {
        let err = CallKitError::Precondition("register first".into());
        let v = parse(&reply_line(&Err(err)));
        assert_eq!(v["ok"], false);
        assert_eq!(v["error"], "precondition failed: register first");
    }

    #[test]
    fn renders_events() {
        let call = CallSession::incoming("Alice", false);
        let v = parse(&event_line(&CallEvent::CallChanged(call.snapshot())));
        assert_eq!(v["event"]["callbackType"], "callChanged");
        assert_eq!(v["event"]["uuid"], call.id.to_string());
    }
}
