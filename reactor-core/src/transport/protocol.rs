//! Wire protocol message types
//!
//! Messages are internally tagged by `msg` and use camelCase field names.
//! Text frames carry JSON and binary frames carry MessagePack; the server
//! answers in the framing of the most recent client frame.
//!
//! ```json
//! // Client -> Server
//! {"msg": "join", "type": "x-todo-list", "props": {"showing": "all"}}
//! {"msg": "event", "targetId": "x-todo-list-1", "name": "add", "payload": {"new_item": "Milk"}}
//!
//! // Server -> Client
//! {"msg": "joined", "id": "x-todo-list-1", "markup": "<x-todo-list ...>"}
//! {"msg": "patch", "componentId": "x-todo-list-1", "patch": [{"op": "insert", ...}]}
//! {"msg": "error", "targetId": "nope", "kind": "UnknownComponent", "detail": "..."}
//! ```

use serde::{Deserialize, Serialize};
use tokio_tungstenite::tungstenite::Message;

use crate::component::{ComponentId, Payload, Props};
use crate::dispatch::{ComponentPatch, Event};
use crate::error::{ErrorKind, ReactorError, Result};
use crate::render::Patch;

/// Client-to-server message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Create a component and receive its initial markup
    Join {
        #[serde(rename = "type")]
        component_type: String,
        #[serde(default)]
        props: Props,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent: Option<ComponentId>,
    },
    /// Deliver an event to a component
    Event {
        target_id: ComponentId,
        name: String,
        #[serde(default)]
        payload: Payload,
    },
    /// Remove a component and its children
    Remove { id: ComponentId },
    /// End the session
    Leave,
    /// Ping to check connection
    Ping,
}

impl From<Event> for ClientMessage {
    fn from(event: Event) -> Self {
        Self::Event {
            target_id: event.target_id,
            name: event.name,
            payload: event.payload,
        }
    }
}

/// Server-to-client message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Initial markup of a joined component
    Joined { id: ComponentId, markup: String },
    /// Changes to one component's markup
    Patch {
        component_id: ComponentId,
        patch: Patch,
    },
    /// A recoverable failure; the session stays open
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_id: Option<ComponentId>,
        kind: ErrorKind,
        detail: String,
    },
    /// Components removed by a `remove` request
    Removed { ids: Vec<ComponentId> },
    /// Pong response
    Pong,
}

impl ServerMessage {
    pub fn error(target_id: Option<ComponentId>, err: &ReactorError) -> Self {
        Self::Error {
            target_id,
            kind: err.kind(),
            detail: err.to_string(),
        }
    }
}

impl From<ComponentPatch> for ServerMessage {
    fn from(patch: ComponentPatch) -> Self {
        Self::Patch {
            component_id: patch.component_id,
            patch: patch.patch,
        }
    }
}

/// Frame encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Codec {
    /// JSON in text frames
    #[default]
    Json,
    /// MessagePack in binary frames
    MessagePack,
}

impl Codec {
    pub fn encode<T: Serialize>(self, msg: &T) -> Result<Message> {
        Ok(match self {
            Codec::Json => Message::Text(serde_json::to_string(msg)?),
            Codec::MessagePack => Message::Binary(rmp_serde::to_vec_named(msg)?),
        })
    }

    pub fn decode<T: for<'de> Deserialize<'de>>(self, bytes: &[u8]) -> Result<T> {
        Ok(match self {
            Codec::Json => serde_json::from_slice(bytes)?,
            Codec::MessagePack => rmp_serde::from_slice(bytes)?,
        })
    }

    /// Decode a data frame. Control frames yield `None`.
    pub fn decode_frame(frame: &Message) -> Option<(Codec, Result<ClientMessage>)> {
        match frame {
            Message::Text(text) => Some((Codec::Json, Codec::Json.decode(text.as_bytes()))),
            Message::Binary(bytes) => Some((Codec::MessagePack, Codec::MessagePack.decode(bytes))),
            _ => None,
        }
    }
}

/// Turn a decode failure into a protocol error.
pub(crate) fn protocol_error(err: ReactorError) -> ReactorError {
    match err {
        ReactorError::Protocol(_) => err,
        other => ReactorError::Protocol(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn join_uses_type_and_defaults() {
        let msg: ClientMessage = serde_json::from_value(json!({"msg": "join", "type": "x-todo-list"})).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Join {
                component_type: "x-todo-list".into(),
                props: Props::new(),
                parent: None,
            }
        );
    }

    #[test]
    fn event_fields_are_camel_case() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "msg": "event",
            "targetId": "1",
            "name": "save",
            "payload": {"text": "x"}
        }))
        .unwrap();

        match msg {
            ClientMessage::Event { target_id, name, payload } => {
                assert_eq!(target_id, "1");
                assert_eq!(name, "save");
                assert_eq!(payload.get("text"), Some(&json!("x")));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn server_messages_serialize() {
        let joined = ServerMessage::Joined {
            id: "a".into(),
            markup: "<x-a></x-a>".into(),
        };
        assert_eq!(
            serde_json::to_value(&joined).unwrap(),
            json!({"msg": "joined", "id": "a", "markup": "<x-a></x-a>"})
        );

        let err = ServerMessage::error(None, &ReactorError::UnknownComponent { id: "z".into() });
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({"msg": "error", "kind": "UnknownComponent", "detail": "unknown component: z"})
        );

        let patch = ServerMessage::Patch {
            component_id: "a".into(),
            patch: Patch::replace_all("<p></p>"),
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({"msg": "patch", "componentId": "a", "patch": [{"op": "replace_all", "markup": "<p></p>"}]})
        );

        assert_eq!(serde_json::to_value(&ServerMessage::Pong).unwrap(), json!({"msg": "pong"}));
    }

    #[test]
    fn message_pack_frames_decode() {
        let msg = ClientMessage::Event {
            target_id: "a".into(),
            name: "flip".into(),
            payload: Payload::new(),
        };
        let frame = Codec::MessagePack.encode(&msg).unwrap();
        assert!(frame.is_binary());

        let (codec, decoded) = Codec::decode_frame(&frame).unwrap();
        assert_eq!(codec, Codec::MessagePack);
        assert_eq!(decoded.unwrap(), msg);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let (codec, decoded) = Codec::decode_frame(&Message::Text("{nope".into())).unwrap();
        assert_eq!(codec, Codec::Json);
        assert_eq!(protocol_error(decoded.unwrap_err()).kind(), ErrorKind::Protocol);
        assert!(Codec::decode_frame(&Message::Ping(Vec::new())).is_none());
    }
}
