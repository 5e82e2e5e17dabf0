// ── Wire codec ──
//
// Frames are JSON arrays `[type_name, payload]`. Object payloads also
// carry `msg_type`; it is filled in from `type_name` when missing so
// that hand-written fixtures decode too. Two frame types are not
// messages: `id` assigns the client id and `Error` reports a server
// failure.

use serde::de::Error as _;
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::Envelope;
use crate::error::CoreError;

/// An envelope in its `[type, object]` wire form.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame(pub Envelope);

impl Serialize for Frame {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tup = serializer.serialize_tuple(2)?;
        tup.serialize_element(self.0.name())?;
        tup.serialize_element(&self.0)?;
        tup.end()
    }
}

impl<'de> Deserialize<'de> for Frame {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (kind, payload) = <(String, Value)>::deserialize(deserializer)?;
        envelope_from_parts(&kind, payload)
            .map(Frame)
            .map_err(D::Error::custom)
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// The server assigned this connection a client id.
    ClientId(u64),
    /// The server reported a failure.
    Error(String),
    Message(Envelope),
}

/// Decode one text frame.
pub fn decode(text: &str) -> Result<Inbound, CoreError> {
    let (kind, payload): (String, Value) = serde_json::from_str(text)?;
    match kind.as_str() {
        "id" => payload
            .as_u64()
            .map(Inbound::ClientId)
            .ok_or_else(|| CoreError::MalformedFrame {
                message: format!("client id is not a number: {payload}"),
            }),
        "Error" => Ok(Inbound::Error(match payload {
            Value::String(s) => s,
            other => other.to_string(),
        })),
        _ => Ok(Inbound::Message(envelope_from_parts(&kind, payload)?)),
    }
}

/// Encode an envelope as a text frame.
pub fn encode(envelope: &Envelope) -> Result<String, CoreError> {
    Ok(serde_json::to_string(&(envelope.name(), envelope))?)
}

fn envelope_from_parts(kind: &str, payload: Value) -> Result<Envelope, serde_json::Error> {
    let payload = match payload {
        Value::Object(mut obj) => {
            obj.entry("msg_type")
                .or_insert_with(|| Value::String(kind.to_owned()));
            Value::Object(obj)
        }
        // `History` ships its entries as a bare array.
        Value::Array(items) if kind == "History" => serde_json::json!({
            "msg_type": kind,
            "history": items,
        }),
        Value::Null => serde_json::json!({ "msg_type": kind }),
        other => {
            return Err(serde_json::Error::custom(format!(
                "{kind} payload must be an object, got {other}"
            )));
        }
    };
    serde_json::from_value(payload)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::message::{DeviceMove, Message, TimeTravel};
    use pretty_assertions::assert_eq;

    fn moved() -> Envelope {
        Envelope {
            sender: 2,
            message_id: Some(5),
            message: Message::DeviceMove(DeviceMove {
                id: 1,
                x: 150.0,
                y: 120.0,
                previous_x: 100.0,
                previous_y: 100.0,
            }),
        }
    }

    #[test]
    fn client_id_and_error_frames() {
        assert_eq!(decode(r#"["id", 42]"#).unwrap(), Inbound::ClientId(42));
        assert_eq!(
            decode(r#"["Error", "topology locked"]"#).unwrap(),
            Inbound::Error("topology locked".into())
        );
        assert!(matches!(
            decode(r#"["id", "x"]"#),
            Err(CoreError::MalformedFrame { .. })
        ));
    }

    #[test]
    fn frames_round_trip() {
        let text = encode(&moved()).unwrap();
        assert!(text.starts_with(r#"["DeviceMove",{"#));
        assert_eq!(decode(&text).unwrap(), Inbound::Message(moved()));
    }

    #[test]
    fn msg_type_is_inferred_from_frame_type() {
        let text = r#"["DeviceSelected", {"sender": 7, "id": 3}]"#;
        let Inbound::Message(env) = decode(text).unwrap() else {
            panic!("not a message");
        };
        assert_eq!(env.sender, 7);
        assert_eq!(env.name(), "DeviceSelected");
    }

    #[test]
    fn history_payload_may_be_an_array() {
        let entry = serde_json::to_value(Frame(moved())).unwrap();
        let text = serde_json::json!(["History", [entry]]).to_string();
        let Inbound::Message(env) = decode(&text).unwrap() else {
            panic!("not a message");
        };
        let Message::History(h) = env.message else {
            panic!("not history");
        };
        assert_eq!(h.history, vec![Frame(moved())]);
    }

    #[test]
    fn undo_carries_original_as_frame() {
        let undo = Envelope::new(
            2,
            Message::Undo(TimeTravel {
                original_message: Box::new(Frame(moved())),
            }),
        );
        let v = serde_json::to_value(&undo).unwrap();
        assert_eq!(v["original_message"][0], "DeviceMove");
        assert_eq!(decode(&encode(&undo).unwrap()).unwrap(), Inbound::Message(undo));
    }

    #[test]
    fn unknown_types_are_malformed() {
        assert!(decode(r#"["Bogus", {}]"#).is_err());
        assert!(decode("not json").is_err());
        assert!(decode(r#"["DeviceMove", 3]"#).is_err());
    }
}
