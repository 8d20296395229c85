//! Typed builders for common actions and response-status classification.
//!
//! Everything here is a convenience layer over
//! [`AmiClient::publish`](crate::AmiClient::publish) — the engine itself
//! moves opaque [`AmiMessage`] blocks and never consults these types.

use crate::error::{AmiError, AmiResult};
use crate::fields::CoreField;
use crate::message::AmiMessage;
use std::fmt;

const AUTH_TYPE_MD5: &str = "MD5";

/// Classification of a response block's `Response` field.
///
/// Asterisk answers `Success` or `Error` for most actions; `Logoff` answers
/// `Goodbye`. Comparison is case-insensitive, as the manager protocol treats
/// these values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResponseStatus {
    /// `Response: Success`.
    Success,
    /// `Response: Error`.
    Error,
    /// `Response: Goodbye` — the normal answer to `Logoff`.
    Goodbye,
    /// Anything else, including a missing `Response` field.
    Other,
}

impl ResponseStatus {
    /// Classify a response block.
    pub fn of(response: &AmiMessage) -> Self {
        match response.get(CoreField::Response) {
            Some(v) if v.eq_ignore_ascii_case("Success") => ResponseStatus::Success,
            Some(v) if v.eq_ignore_ascii_case("Error") => ResponseStatus::Error,
            Some(v) if v.eq_ignore_ascii_case("Goodbye") => ResponseStatus::Goodbye,
            _ => ResponseStatus::Other,
        }
    }
}

/// Pass a `Success` response through; turn anything else into an error.
///
/// `Response: Error` becomes [`AmiError::ActionFailed`] carrying the peer's
/// `Message` text; any other status becomes [`AmiError::UnexpectedResponse`].
pub fn require_success(response: AmiMessage) -> AmiResult<AmiMessage> {
    match ResponseStatus::of(&response) {
        ResponseStatus::Success => Ok(response),
        ResponseStatus::Error => Err(AmiError::ActionFailed {
            message: response
                .get(CoreField::Message)
                .unwrap_or("Error")
                .to_string(),
        }),
        _ => Err(AmiError::UnexpectedResponse {
            status: response
                .get(CoreField::Response)
                .unwrap_or("")
                .to_string(),
        }),
    }
}

/// Prebuilt actions for the handful of manager operations the crate drives
/// itself. Anything else is a plain [`AmiMessage`] assembled by the caller.
#[derive(Clone)]
#[non_exhaustive]
pub enum AmiAction {
    /// Liveness check; answered with `Ping: Pong`.
    Ping,
    /// First half of the MD5 handshake: ask for a challenge token.
    Challenge,
    /// Second half of the MD5 handshake: username plus hex digest of
    /// challenge + secret.
    Login { username: String, key: String },
    /// Single-step cleartext login.
    LoginPlain { username: String, secret: String },
    /// End the session; answered with `Response: Goodbye`.
    Logoff,
    /// Set the server-side event mask (`on`, `off`, or a category list).
    Events { event_mask: String },
    /// Run a CLI command; output comes back in the response block.
    Command { command: String },
}

impl fmt::Debug for AmiAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmiAction::Ping => write!(f, "Ping"),
            AmiAction::Challenge => write!(f, "Challenge"),
            AmiAction::Login { username, .. } => f
                .debug_struct("Login")
                .field("username", username)
                .field("key", &"[REDACTED]")
                .finish(),
            AmiAction::LoginPlain { username, .. } => f
                .debug_struct("LoginPlain")
                .field("username", username)
                .field("secret", &"[REDACTED]")
                .finish(),
            AmiAction::Logoff => write!(f, "Logoff"),
            AmiAction::Events { event_mask } => f
                .debug_struct("Events")
                .field("event_mask", event_mask)
                .finish(),
            AmiAction::Command { command } => f
                .debug_struct("Command")
                .field("command", command)
                .finish(),
        }
    }
}

impl AmiAction {
    /// Assemble the action's wire message. `ActionID` is not set here — the
    /// publish engine assigns it.
    pub fn into_message(self) -> AmiMessage {
        let mut msg = AmiMessage::new();
        match self {
            AmiAction::Ping => {
                msg.set(CoreField::Action, "Ping");
            }
            AmiAction::Challenge => {
                msg.set(CoreField::Action, "Challenge");
                msg.set(CoreField::AuthType, AUTH_TYPE_MD5);
            }
            AmiAction::Login { username, key } => {
                msg.set(CoreField::Action, "Login");
                msg.set(CoreField::AuthType, AUTH_TYPE_MD5);
                msg.set(CoreField::Username, username);
                msg.set(CoreField::Key, key);
            }
            AmiAction::LoginPlain { username, secret } => {
                msg.set(CoreField::Action, "Login");
                msg.set(CoreField::Username, username);
                msg.set(CoreField::Secret, secret);
            }
            AmiAction::Logoff => {
                msg.set(CoreField::Action, "Logoff");
            }
            AmiAction::Events { event_mask } => {
                msg.set(CoreField::Action, "Events");
                msg.set(CoreField::EventMask, event_mask);
            }
            AmiAction::Command { command } => {
                msg.set(CoreField::Action, "Command");
                msg.set(CoreField::Command, command);
            }
        }
        msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_wire_format() {
        let wire = AmiAction::Ping.into_message().to_wire_format().unwrap();
        assert_eq!(wire, "Action: Ping\r\n\r\n");
    }

    #[test]
    fn challenge_wire_format() {
        let wire = AmiAction::Challenge
            .into_message()
            .to_wire_format()
            .unwrap();
        assert_eq!(wire, "Action: Challenge\r\nAuthType: MD5\r\n\r\n");
    }

    #[test]
    fn md5_login_wire_format() {
        let msg = AmiAction::Login {
            username: "admin".to_string(),
            key: "0123abcd".to_string(),
        }
        .into_message();

        assert_eq!(msg.get("Action"), Some("Login"));
        assert_eq!(msg.get("AuthType"), Some("MD5"));
        assert_eq!(msg.get("Username"), Some("admin"));
        assert_eq!(msg.get("Key"), Some("0123abcd"));
        assert_eq!(msg.get("Secret"), None);
    }

    #[test]
    fn plain_login_wire_format() {
        let msg = AmiAction::LoginPlain {
            username: "admin".to_string(),
            secret: "hunter2".to_string(),
        }
        .into_message();

        assert_eq!(msg.get("Action"), Some("Login"));
        assert_eq!(msg.get("Secret"), Some("hunter2"));
        assert_eq!(msg.get("AuthType"), None);
    }

    #[test]
    fn events_and_command_wire_format() {
        let events = AmiAction::Events {
            event_mask: "call,log".to_string(),
        }
        .into_message();
        assert_eq!(events.get("EventMask"), Some("call,log"));

        let command = AmiAction::Command {
            command: "core show uptime".to_string(),
        }
        .into_message();
        assert_eq!(command.get("Command"), Some("core show uptime"));
    }

    #[test]
    fn debug_redacts_credentials() {
        let login = AmiAction::Login {
            username: "admin".to_string(),
            key: "deadbeef".to_string(),
        };
        let debug_str = format!("{:?}", login);
        assert!(!debug_str.contains("deadbeef"));
        assert!(debug_str.contains("REDACTED"));

        let plain = AmiAction::LoginPlain {
            username: "admin".to_string(),
            secret: "hunter2".to_string(),
        };
        let debug_str = format!("{:?}", plain);
        assert!(!debug_str.contains("hunter2"));
        assert!(debug_str.contains("admin"));
    }

    #[test]
    fn status_classification_case_insensitive() {
        let msg: AmiMessage = [("Response", "sUcCeSs")].into_iter().collect();
        assert_eq!(ResponseStatus::of(&msg), ResponseStatus::Success);

        let msg: AmiMessage = [("Response", "GOODBYE")].into_iter().collect();
        assert_eq!(ResponseStatus::of(&msg), ResponseStatus::Goodbye);

        let msg: AmiMessage = [("Event", "Newchannel")].into_iter().collect();
        assert_eq!(ResponseStatus::of(&msg), ResponseStatus::Other);
    }

    #[test]
    fn require_success_maps_error_to_action_failed() {
        let msg: AmiMessage = [("Response", "Error"), ("Message", "Permission denied")]
            .into_iter()
            .collect();
        let err = require_success(msg).unwrap_err();
        assert!(matches!(
            err,
            AmiError::ActionFailed { ref message } if message == "Permission denied"
        ));
    }

    #[test]
    fn require_success_rejects_goodbye() {
        let msg: AmiMessage = [("Response", "Goodbye")].into_iter().collect();
        assert!(matches!(
            require_success(msg),
            Err(AmiError::UnexpectedResponse { .. })
        ));
    }

    #[test]
    fn require_success_passes_response_through() {
        let msg: AmiMessage = [("Response", "Success"), ("Ping", "Pong")]
            .into_iter()
            .collect();
        let msg = require_success(msg).unwrap();
        assert_eq!(msg.get("Ping"), Some("Pong"));
    }
}
