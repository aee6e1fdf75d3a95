//! Request envelopes and reply outcomes

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use crate::ProtocolError;

/// Method name of the built-in status poll
pub const GET_TASK_METHOD: &str = "get_task";

/// Argument carrying the polled task id
pub const AGENT_TASK_ID_ARG: &str = "agent_task_id";

/// Exception text published when the long-running slot is occupied
pub const ALREADY_RUNNING: &str = "already running long running task";

/// Handler arguments, always a JSON object
pub type Arguments = serde_json::Map<String, Value>;

/// Inbound request envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message ID, also the name of the reply channel
    pub message_id: String,
    /// Method name (case-insensitive)
    pub method: String,
    /// Handler arguments
    #[serde(default, deserialize_with = "null_as_empty")]
    pub arguments: Arguments,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Arguments, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Arguments>::deserialize(deserializer)?.unwrap_or_default())
}

impl Envelope {
    /// Create an envelope
    pub fn new(message_id: impl Into<String>, method: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            message_id: message_id.into(),
            method: method.into(),
            arguments,
        }
    }

    /// Parse an envelope from raw JSON bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Serialize the envelope to JSON bytes
    pub fn to_bytes(&self) -> Result<Bytes, ProtocolError> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    /// Whether this envelope is a status poll
    pub fn is_status_poll(&self) -> bool {
        self.method.eq_ignore_ascii_case(GET_TASK_METHOD)
    }
}

/// Reply payload published on the reply channel.
///
/// Serializes as `{"value": ...}` or `{"exception": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Successful result
    Value(Value),
    /// Declared failure, with its description
    Exception(String),
}

impl Outcome {
    /// Create a value outcome
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    /// Create an exception outcome
    pub fn exception(message: impl Into<String>) -> Self {
        Self::Exception(message.into())
    }

    /// Acknowledgement for a freshly started long-running task
    pub fn task_started(task_id: &str) -> Self {
        Self::Value(json!({ "task_id": task_id }))
    }

    /// Status reply for a task that is still in flight
    pub fn task_running() -> Self {
        Self::Value(json!({ "state": "running" }))
    }

    /// Rejection for a long-running request while the slot is occupied
    pub fn already_running() -> Self {
        Self::Exception(ALREADY_RUNNING.to_string())
    }

    /// Reply for a poll naming no known task
    pub fn unknown_task(task_id: &str) -> Self {
        Self::Exception(format!("unknown agent task: {}", task_id))
    }

    /// Check if this is an exception
    pub fn is_exception(&self) -> bool {
        matches!(self, Self::Exception(_))
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<Bytes, ProtocolError> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    /// Parse from JSON bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Arguments of the `get_task` status poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetTaskArgs {
    /// Task being polled
    pub agent_task_id: String,
}

impl GetTaskArgs {
    /// Extract poll arguments from an envelope's argument map
    pub fn from_arguments(arguments: &Arguments) -> Result<Self, ProtocolError> {
        arguments
            .get(AGENT_TASK_ID_ARG)
            .and_then(Value::as_str)
            .map(|id| Self { agent_task_id: id.to_string() })
            .ok_or(ProtocolError::MissingArgument(AGENT_TASK_ID_ARG))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_envelope_parse() {
        let raw = br#"{"message_id":"m1","method":"echo","arguments":{"x":42}}"#;
        let envelope = Envelope::from_slice(raw).unwrap();

        assert_eq!(envelope.message_id, "m1");
        assert_eq!(envelope.method, "echo");
        assert_eq!(envelope.arguments.get("x"), Some(&json!(42)));
    }

    #[test]
    fn test_envelope_null_and_missing_arguments() {
        let null_args = Envelope::from_slice(br#"{"message_id":"m","method":"ping","arguments":null}"#).unwrap();
        assert!(null_args.arguments.is_empty());

        let no_args = Envelope::from_slice(br#"{"message_id":"m","method":"ping"}"#).unwrap();
        assert!(no_args.arguments.is_empty());
    }

    #[test]
    fn test_envelope_rejects_malformed() {
        assert!(matches!(
            Envelope::from_slice(b"not json"),
            Err(ProtocolError::Serialization(_))
        ));
        assert!(Envelope::from_slice(br#"{"method":"ping"}"#).is_err());
        assert!(Envelope::from_slice(br#"{"message_id":"m","method":"ping","arguments":[1]}"#).is_err());
    }

    #[test]
    fn test_status_poll_detection() {
        let poll = Envelope::new("m", "get_task", Arguments::new());
        assert!(poll.is_status_poll());

        let upper = Envelope::new("m", "GET_TASK", Arguments::new());
        assert!(upper.is_status_poll());

        let other = Envelope::new("m", "ping", Arguments::new());
        assert!(!other.is_status_poll());
    }

    #[test]
    fn test_outcome_wire_format() {
        let value = serde_json::to_value(Outcome::value(42)).unwrap();
        assert_eq!(value, json!({ "value": 42 }));

        let exception = serde_json::to_value(Outcome::exception("boom")).unwrap();
        assert_eq!(exception, json!({ "exception": "boom" }));

        let started = serde_json::to_value(Outcome::task_started("t-1")).unwrap();
        assert_eq!(started, json!({ "value": { "task_id": "t-1" } }));

        let running = serde_json::to_value(Outcome::task_running()).unwrap();
        assert_eq!(running, json!({ "value": { "state": "running" } }));
    }

    #[test]
    fn test_outcome_parse() {
        let outcome = Outcome::from_slice(br#"{"value":"done"}"#).unwrap();
        assert_eq!(outcome, Outcome::value("done"));

        let outcome = Outcome::from_slice(br#"{"exception":"already running long running task"}"#).unwrap();
        assert_eq!(outcome, Outcome::already_running());
        assert!(outcome.is_exception());
    }

    #[test]
    fn test_get_task_args() {
        let mut arguments = Arguments::new();
        arguments.insert(AGENT_TASK_ID_ARG.to_string(), json!("abc"));
        let args = GetTaskArgs::from_arguments(&arguments).unwrap();
        assert_eq!(args.agent_task_id, "abc");

        let missing = GetTaskArgs::from_arguments(&Arguments::new());
        assert!(matches!(missing, Err(ProtocolError::MissingArgument(AGENT_TASK_ID_ARG))));

        let mut wrong_type = Arguments::new();
        wrong_type.insert(AGENT_TASK_ID_ARG.to_string(), json!(7));
        assert!(GetTaskArgs::from_arguments(&wrong_type).is_err());
    }

    proptest! {
        #[test]
        fn test_envelope_preserves_ids(
            message_id in "[a-zA-Z0-9:_-]{1,40}",
            method in "[a-zA-Z_]{1,20}"
        ) {
            let envelope = Envelope::new(message_id.clone(), method.clone(), Arguments::new());
            let bytes = envelope.to_bytes().unwrap();
            let parsed = Envelope::from_slice(&bytes).unwrap();

            prop_assert_eq!(parsed.message_id, message_id);
            prop_assert_eq!(parsed.method, method);
        }
    }
}
