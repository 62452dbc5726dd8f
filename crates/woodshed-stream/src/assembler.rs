//! Pure document transitions.
//!
//! `apply` is the only place a [`Document`] changes. It owns no state besides
//! the document it is handed, so a scripted sequence of updates fully
//! determines the result.

use tracing::trace;

use crate::document::{ContentPart, Document, Progress, StreamState};
use crate::errors::StreamFailure;
use crate::event::StreamEvent;

/// Input to the assembler.
#[derive(Clone, Debug, PartialEq)]
pub enum Update {
    /// The request was sent; `Idle -> Streaming`.
    Started,
    /// A decoded stream event.
    Event(StreamEvent),
    /// Text released by the token coalescer.
    FlushedText(String),
    /// The caller cancelled the stream.
    Cancelled,
    /// The transport failed to open or broke mid-stream.
    TransportFailed(String),
}

/// Advances `doc` by one update.
///
/// Terminal documents are returned unchanged, as are updates that do not fit
/// the current state (for example events before `Started`).
pub fn apply(mut doc: Document, update: Update) -> Document {
    if doc.state.is_terminal() {
        trace!(document_id = %doc.id, state = ?doc.state, "ignoring update for terminal document");
        return doc;
    }

    match (doc.state, update) {
        (StreamState::Idle, Update::Started) => {
            doc.state = StreamState::Streaming;
        }
        (StreamState::Idle | StreamState::Streaming, Update::TransportFailed(message)) => {
            finish(&mut doc, StreamState::Errored);
            doc.error = Some(StreamFailure::transport(message));
        }
        (StreamState::Streaming, Update::Cancelled) => {
            finish(&mut doc, StreamState::Cancelled);
        }
        (StreamState::Streaming, Update::FlushedText(text)) => {
            if text.is_empty() {
                return doc;
            }
            doc.append_text(&text);
            doc.progress = None;
        }
        (StreamState::Streaming, Update::Event(event)) => apply_event(&mut doc, event),
        (state, update) => {
            trace!(document_id = %doc.id, ?state, ?update, "update does not apply in current state");
            return doc;
        }
    }
    doc.bump();
    doc
}

/// Applies every update in order.
pub fn apply_all(doc: Document, updates: impl IntoIterator<Item = Update>) -> Document {
    updates.into_iter().fold(doc, apply)
}

fn apply_event(doc: &mut Document, event: StreamEvent) {
    match event {
        StreamEvent::Token { text } => {
            doc.append_text(&text);
            doc.progress = None;
        }
        StreamEvent::Status { step, detail } => {
            doc.progress = Some(Progress { step, detail });
        }
        StreamEvent::Thinking { text } => doc.reasoning_trace.push_str(&text),
        StreamEvent::ToolCall(record) => doc.tool_records.push(record),
        StreamEvent::Files(files) => {
            let mut unique: Vec<String> = Vec::with_capacity(files.len());
            for file in files {
                if !unique.contains(&file) {
                    unique.push(file);
                }
            }
            doc.attached_files = unique;
        }
        StreamEvent::Part(ContentPart::Text { text }) => doc.append_text(&text),
        StreamEvent::Part(part) => doc.parts.push(part),
        StreamEvent::Done => finish(doc, StreamState::Completed),
        StreamEvent::Error { message } => {
            finish(doc, StreamState::Errored);
            doc.error = Some(StreamFailure::upstream(message));
        }
    }
}

fn finish(doc: &mut Document, state: StreamState) {
    doc.state = state;
    doc.progress = None;
}
