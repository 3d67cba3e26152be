//! Wire protocol message types for broker IPC.
//!
//! All messages are MessagePack-encoded maps with at minimum `type` and `id`
//! fields. Requests carry a client-chosen `id` echoed in the matching
//! `response`. Unsolicited `render` and `update` frames flow broker → client
//! and use their own id space.

use serde::{Deserialize, Serialize};

use crate::clip::{Clip, Properties, ShareOption};

/// All wire protocol messages.
///
/// Serialized as a tagged union on the `type` field via MessagePack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Message {
    // -- Handshake --
    #[serde(rename = "hello")]
    Hello {
        id: u32,
        version: u32,
        app_id: String,
        /// Absent for local clients.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        device_id: Option<String>,
    },

    #[serde(rename = "hello_ack")]
    HelloAck {
        id: u32,
        status: Status,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    // -- Writes --
    #[serde(rename = "clear")]
    Clear { id: u32 },

    #[serde(rename = "set_clip")]
    SetClip { id: u32, clip: Clip },

    /// Publish a placeholder. The broker sends `render` to this
    /// connection when the first reader arrives.
    #[serde(rename = "set_delayed")]
    SetDelayed {
        id: u32,
        #[serde(default)]
        properties: Properties,
    },

    #[serde(rename = "set_share_option")]
    SetShareOption { id: u32, share_option: ShareOption },

    // -- Reads --
    /// Without `mime_type`, asks whether anything is visible.
    #[serde(rename = "has")]
    Has {
        id: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },

    #[serde(rename = "get_clip")]
    GetClip { id: u32 },

    #[serde(rename = "get_change_count")]
    GetChangeCount { id: u32 },

    // -- Events --
    #[serde(rename = "subscribe")]
    Subscribe { id: u32 },

    #[serde(rename = "unsubscribe")]
    Unsubscribe { id: u32 },

    /// Unsolicited (broker → subscriber): a write committed.
    #[serde(rename = "update")]
    Update { id: u32, change_count: u64 },

    // -- Delayed rendering --
    /// Unsolicited (broker → writer): produce the delayed clip.
    #[serde(rename = "render")]
    Render { id: u32 },

    /// Writer's answer to `render`, echoing its id.
    #[serde(rename = "rendered")]
    Rendered {
        id: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        clip: Option<Clip>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    // -- Generic response --
    #[serde(rename = "response")]
    Response {
        id: u32,
        status: Status,
        /// Machine-readable error code.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        /// Human-readable error detail.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        clip: Option<Clip>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        has: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        change_count: Option<u64>,
    },
}

impl Message {
    /// The `id` field common to every variant.
    pub fn id(&self) -> u32 {
        match self {
            Self::Hello { id, .. }
            | Self::HelloAck { id, .. }
            | Self::Clear { id }
            | Self::SetClip { id, .. }
            | Self::SetDelayed { id, .. }
            | Self::SetShareOption { id, .. }
            | Self::Has { id, .. }
            | Self::GetClip { id }
            | Self::GetChangeCount { id }
            | Self::Subscribe { id }
            | Self::Unsubscribe { id }
            | Self::Update { id, .. }
            | Self::Render { id }
            | Self::Rendered { id, .. }
            | Self::Response { id, .. } => *id,
        }
    }

    /// Bare `ok` response.
    pub fn ok(id: u32) -> Self {
        Self::Response {
            id,
            status: Status::Ok,
            error: None,
            detail: None,
            clip: None,
            has: None,
            change_count: None,
        }
    }

    /// Error response with a machine-readable code.
    pub fn error(id: u32, code: &str, detail: Option<String>) -> Self {
        Self::Response {
            id,
            status: Status::Error,
            error: Some(code.to_string()),
            detail,
            clip: None,
            has: None,
            change_count: None,
        }
    }
}

/// Response status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

/// Current protocol version.
pub const PROTOCOL_VERSION: u32 = 1;

/// Maximum payload size (16 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Minimal envelope for extracting `{type, id}` from unknown messages.
///
/// Used by the broker as a fallback when [`Message`] deserialization
/// fails (e.g., unknown `type` tag), so the error response can still
/// echo the request `id`.
#[derive(Debug, Deserialize)]
pub struct RawEnvelope {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub id: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::{Record, SemanticRecord};

    fn round_trip(msg: &Message) -> Message {
        let encoded = rmp_serde::to_vec_named(msg).unwrap();
        rmp_serde::from_slice(&encoded).unwrap()
    }

    #[test]
    fn hello_without_device_id() {
        #[derive(serde::Serialize)]
        struct LocalHello {
            #[serde(rename = "type")]
            msg_type: &'static str,
            id: u32,
            version: u32,
            app_id: &'static str,
        }
        let encoded = rmp_serde::to_vec_named(&LocalHello {
            msg_type: "hello",
            id: 0,
            version: PROTOCOL_VERSION,
            app_id: "com.example.notes",
        })
        .unwrap();
        let decoded: Message = rmp_serde::from_slice(&encoded).unwrap();
        assert_eq!(
            decoded,
            Message::Hello {
                id: 0,
                version: PROTOCOL_VERSION,
                app_id: "com.example.notes".into(),
                device_id: None,
            }
        );
    }

    #[test]
    fn set_clip_carries_mixed_payloads() {
        let mut clip = Clip::from_text("plain");
        clip.add_kind_record(&SemanticRecord::Html {
            html: "<b>bold</b>".into(),
            plain: Some("bold".into()),
        })
        .unwrap();
        clip.insert_record(
            Record::from_semantic(&SemanticRecord::ApplicationDefined {
                tag: "application/octet-stream".into(),
                data: (0..=255).collect(),
            })
            .unwrap(),
        )
        .unwrap();
        clip.set_share_option(ShareOption::CrossDevice);

        let msg = Message::SetClip { id: 3, clip };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn set_delayed_defaults_properties() {
        #[derive(serde::Serialize)]
        struct Bare {
            #[serde(rename = "type")]
            msg_type: &'static str,
            id: u32,
        }
        let encoded = rmp_serde::to_vec_named(&Bare {
            msg_type: "set_delayed",
            id: 9,
        })
        .unwrap();
        match rmp_serde::from_slice::<Message>(&encoded).unwrap() {
            Message::SetDelayed { id, properties } => {
                assert_eq!(id, 9);
                assert_eq!(properties, Properties::default());
            }
            other => panic!("expected SetDelayed, got {other:?}"),
        }
    }

    #[test]
    fn rendered_with_error() {
        let msg = Message::Rendered {
            id: 1,
            clip: None,
            error: Some("no selection".into()),
        };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn response_with_clip_and_count() {
        let msg = Message::Response {
            id: 4,
            status: Status::Ok,
            error: None,
            detail: None,
            clip: Some(Clip::from_text("x")),
            has: None,
            change_count: Some(12),
        };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn ok_response_omits_optional_fields() {
        let encoded = rmp_serde::to_vec_named(&Message::ok(1)).unwrap();
        let map: std::collections::BTreeMap<String, serde::de::IgnoredAny> =
            rmp_serde::from_slice(&encoded).unwrap();
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "status", "type"]);
    }

    #[test]
    fn error_response_round_trip() {
        let msg = Message::error(7, "capacity_error", Some("full".into()));
        assert_eq!(round_trip(&msg), msg);
        assert_eq!(msg.id(), 7);
    }

    #[test]
    fn unknown_type_falls_back_to_envelope() {
        #[derive(serde::Serialize)]
        struct Future {
            #[serde(rename = "type")]
            msg_type: &'static str,
            id: u32,
            extra: bool,
        }
        let encoded = rmp_serde::to_vec_named(&Future {
            msg_type: "teleport",
            id: 42,
            extra: true,
        })
        .unwrap();
        assert!(rmp_serde::from_slice::<Message>(&encoded).is_err());
        let envelope: RawEnvelope = rmp_serde::from_slice(&encoded).unwrap();
        assert_eq!(envelope.msg_type, "teleport");
        assert_eq!(envelope.id, 42);
    }

    #[test]
    fn status_serialization() {
        let ok = rmp_serde::to_vec_named(&Status::Ok).unwrap();
        let decoded: Status = rmp_serde::from_slice(&ok).unwrap();
        assert_eq!(decoded, Status::Ok);

        let err = rmp_serde::to_vec_named(&Status::Error).unwrap();
        let decoded: Status = rmp_serde::from_slice(&err).unwrap();
        assert_eq!(decoded, Status::Error);
    }
}
