use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::document::{ContentPart, ToolRecord};
use crate::errors::FrameError;
use crate::sse::Frame;

/// Typed events carried by the chat stream.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// Incremental answer text.
    Token { text: String },
    /// Transient progress update.
    Status { step: String, detail: Option<String> },
    /// Reasoning trace fragment.
    Thinking { text: String },
    /// Completed tool invocation.
    ToolCall(ToolRecord),
    /// Bulk list of generated files.
    Files(Vec<String>),
    /// Explicitly typed content part.
    Part(ContentPart),
    /// Terminal success.
    Done,
    /// Terminal failure reported by the backend.
    Error { message: String },
}

#[derive(Deserialize)]
struct TextPayload {
    text: String,
}

#[derive(Deserialize)]
struct StatusPayload {
    step: String,
    #[serde(default)]
    detail: Option<String>,
}

#[derive(Deserialize)]
struct FilesPayload {
    files: Vec<String>,
}

#[derive(Deserialize)]
struct AbcPayload {
    abc: String,
}

#[derive(Deserialize)]
struct TabPayload {
    tab: String,
}

#[derive(Deserialize)]
struct FilenamePayload {
    filename: String,
}

#[derive(Deserialize)]
struct ErrorPayload {
    message: String,
}

impl StreamEvent {
    /// Maps a frame onto a typed event.
    ///
    /// Unknown event names yield `Ok(None)`. A known event whose payload lacks
    /// its required fields is an error; callers drop it like malformed JSON.
    pub fn decode(frame: &Frame) -> Result<Option<Self>, FrameError> {
        let name = frame.event.as_str();
        let event = match name {
            "token" => {
                let p: TextPayload = payload(frame)?;
                Self::Token { text: p.text }
            }
            "status" => {
                let p: StatusPayload = payload(frame)?;
                Self::Status {
                    step: p.step,
                    detail: p.detail.filter(|d| !d.is_empty()),
                }
            }
            "thinking" => {
                let p: TextPayload = payload(frame)?;
                Self::Thinking { text: p.text }
            }
            "tool_call" => Self::ToolCall(payload(frame)?),
            "files" => {
                let p: FilesPayload = payload(frame)?;
                Self::Files(p.files)
            }
            "part:abc" => {
                let p: AbcPayload = payload(frame)?;
                Self::Part(ContentPart::notation(p.abc))
            }
            "part:tab" => {
                let p: TabPayload = payload(frame)?;
                Self::Part(ContentPart::tablature(p.tab))
            }
            "part:midi" => {
                let p: FilenamePayload = payload(frame)?;
                Self::Part(ContentPart::media_file(p.filename))
            }
            "part:file" => {
                let p: FilenamePayload = payload(frame)?;
                Self::Part(ContentPart::file(p.filename))
            }
            "done" => Self::Done,
            "error" => {
                let p: ErrorPayload = payload(frame)?;
                Self::Error { message: p.message }
            }
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    /// Terminal events end the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. })
    }

    /// Name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Token { .. } => "token",
            Self::Status { .. } => "status",
            Self::Thinking { .. } => "thinking",
            Self::ToolCall(_) => "tool_call",
            Self::Files(_) => "files",
            Self::Part(_) => "part",
            Self::Done => "done",
            Self::Error { .. } => "error",
        }
    }
}

fn payload<T: DeserializeOwned>(frame: &Frame) -> Result<T, FrameError> {
    T::deserialize(&frame.payload)
        .map_err(|e| FrameError::invalid_payload(frame.event.clone(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(event: &str, payload: serde_json::Value) -> Frame {
        Frame {
            event: event.into(),
            payload,
        }
    }

    fn decode(event: &str, payload: serde_json::Value) -> Option<StreamEvent> {
        StreamEvent::decode(&frame(event, payload)).expect("decode")
    }

    #[test]
    fn decodes_every_known_event() {
        assert_eq!(
            decode("token", json!({"text": "Am"})),
            Some(StreamEvent::Token { text: "Am".into() })
        );
        assert_eq!(
            decode("status", json!({"step": "Searching"})),
            Some(StreamEvent::Status {
                step: "Searching".into(),
                detail: None
            })
        );
        assert_eq!(
            decode("thinking", json!({"text": "hmm"})),
            Some(StreamEvent::Thinking { text: "hmm".into() })
        );
        assert_eq!(
            decode(
                "tool_call",
                json!({"name": "transpose", "arguments": {"to": "D"}, "result": "ok"})
            ),
            Some(StreamEvent::ToolCall(ToolRecord {
                name: "transpose".into(),
                arguments: Some(json!({"to": "D"})),
                result: Some(json!("ok")),
            }))
        );
        assert_eq!(
            decode("files", json!({"files": ["a.mid"]})),
            Some(StreamEvent::Files(vec!["a.mid".into()]))
        );
        assert_eq!(
            decode("part:abc", json!({"abc": "X:1\nK:C"})),
            Some(StreamEvent::Part(ContentPart::notation("X:1\nK:C")))
        );
        assert_eq!(
            decode("part:tab", json!({"tab": "e|-0-|"})),
            Some(StreamEvent::Part(ContentPart::tablature("e|-0-|")))
        );
        assert_eq!(
            decode("part:midi", json!({"filename": "riff.mid"})),
            Some(StreamEvent::Part(ContentPart::media_file("riff.mid")))
        );
        assert_eq!(
            decode("part:file", json!({"filename": "chart.pdf"})),
            Some(StreamEvent::Part(ContentPart::file("chart.pdf")))
        );
        assert_eq!(decode("done", json!({})), Some(StreamEvent::Done));
        assert_eq!(
            decode("error", json!({"message": "boom"})),
            Some(StreamEvent::Error {
                message: "boom".into()
            })
        );
    }

    #[test]
    fn tool_call_accepts_null_arguments_and_result() {
        let event = decode("tool_call", json!({"name": "scale", "arguments": null, "result": null}));
        assert_eq!(
            event,
            Some(StreamEvent::ToolCall(ToolRecord {
                name: "scale".into(),
                arguments: None,
                result: None,
            }))
        );
    }

    #[test]
    fn unknown_event_names_are_ignored() {
        assert_eq!(decode("heartbeat", json!({"x": 1})), None);
        assert_eq!(decode("part:video", json!({"filename": "a.mp4"})), None);
        assert_eq!(decode("", json!({"text": "orphan"})), None);
    }

    #[test]
    fn known_event_with_wrong_shape_is_an_error() {
        let err = StreamEvent::decode(&frame("token", json!({"delta": "x"})));
        assert!(matches!(err, Err(FrameError::InvalidPayload { event, .. }) if event == "token"));
    }

    #[test]
    fn empty_status_detail_is_treated_as_absent() {
        assert_eq!(
            decode("status", json!({"step": "Generating", "detail": ""})),
            Some(StreamEvent::Status {
                step: "Generating".into(),
                detail: None
            })
        );
    }
}
