//! Worker Message Types
//!
//! Immutable values passed between callers and workers, plus the envelope
//! the runtime wraps around them for mailbox delivery.
//!
//! Workers match on [`WorkerMessage`] exhaustively; a variant a worker does
//! not handle goes through its explicit default arm and is reported as
//! unhandled instead of being dropped.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::oneshot;

/// Message trait for everything that can sit in a mailbox
pub trait ActorMessage: Send + fmt::Debug + 'static {
    /// Type name used in unhandled-message diagnostics
    fn message_type(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Payload carried by a one-shot request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    payload: String,
    id: u64,
}

impl Message {
    pub fn new(payload: impl Into<String>, id: u64) -> Self {
        Self {
            payload: payload.into(),
            id,
        }
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Message{{payload='{}', id={}}}", self.payload, self.id)
    }
}

/// Asks a counting worker to increment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Request;

/// Asks a counting worker to reply with its count
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Response;

/// Message alphabet shared by the built-in workers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerMessage {
    Deliver(Message),
    Request(Request),
    Response(Response),
}

impl ActorMessage for Message {
    fn message_type(&self) -> &'static str {
        "Message"
    }
}

impl ActorMessage for WorkerMessage {
    fn message_type(&self) -> &'static str {
        match self {
            WorkerMessage::Deliver(_) => "Message",
            WorkerMessage::Request(_) => "Request",
            WorkerMessage::Response(_) => "Response",
        }
    }
}

impl From<Message> for WorkerMessage {
    fn from(msg: Message) -> Self {
        WorkerMessage::Deliver(msg)
    }
}

impl From<Request> for WorkerMessage {
    fn from(msg: Request) -> Self {
        WorkerMessage::Request(msg)
    }
}

impl From<Response> for WorkerMessage {
    fn from(msg: Response) -> Self {
        WorkerMessage::Response(msg)
    }
}

impl fmt::Display for WorkerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerMessage::Deliver(msg) => write!(f, "{}", msg),
            WorkerMessage::Request(_) => write!(f, "Request"),
            WorkerMessage::Response(_) => write!(f, "Response"),
        }
    }
}

/// Mailbox envelope: the message plus the implicit reply channel of `ask`
#[derive(Debug)]
pub struct Envelope<M, R> {
    pub message: M,
    pub reply_to: Option<oneshot::Sender<R>>,
}

impl<M, R> Envelope<M, R> {
    /// Envelope for fire-and-forget delivery
    pub fn tell(message: M) -> Self {
        Self {
            message,
            reply_to: None,
        }
    }

    /// Envelope whose reply goes back to the asking party
    pub fn ask(message: M, reply_to: oneshot::Sender<R>) -> Self {
        Self {
            message,
            reply_to: Some(reply_to),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_value_equality() {
        assert_eq!(Message::new("a", 1), Message::new("a", 1));
        assert_ne!(Message::new("a", 1), Message::new("a", 2));
        assert_ne!(Message::new("a", 1), Message::new("b", 1));
    }

    #[test]
    fn test_message_display() {
        let msg = Message::new("async-non-blocking", 7);
        assert_eq!(msg.to_string(), "Message{payload='async-non-blocking', id=7}");
    }

    #[test]
    fn test_message_json_shape() {
        let json = serde_json::to_value(Message::new("x", 5)).unwrap();
        assert_eq!(json, serde_json::json!({ "payload": "x", "id": 5 }));
    }

    #[test]
    fn test_worker_message_types() {
        assert_eq!(WorkerMessage::from(Message::new("x", 0)).message_type(), "Message");
        assert_eq!(WorkerMessage::from(Request).message_type(), "Request");
        assert_eq!(WorkerMessage::from(Response).message_type(), "Response");
    }
}
