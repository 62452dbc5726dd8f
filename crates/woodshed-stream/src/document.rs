use crate::errors::StreamFailure;

/// A typed piece of an assistant answer.
///
/// Parts are atomic once appended, except a trailing `Text` part which keeps
/// growing while tokens stream in.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentPart {
    /// Plain markdown text.
    Text { text: String },
    /// Embedded ABC notation source.
    #[serde(rename = "abc")]
    Notation { abc: String },
    /// Guitar or bass tablature.
    #[serde(rename = "tab")]
    Tablature { tab: String },
    /// Generated audio/MIDI file meant for inline playback.
    #[serde(rename = "midi")]
    MediaFileRef { filename: String },
    /// Generic downloadable file.
    #[serde(rename = "file")]
    FileRef { filename: String },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn notation(abc: impl Into<String>) -> Self {
        Self::Notation { abc: abc.into() }
    }

    pub fn tablature(tab: impl Into<String>) -> Self {
        Self::Tablature { tab: tab.into() }
    }

    pub fn media_file(filename: impl Into<String>) -> Self {
        Self::MediaFileRef {
            filename: filename.into(),
        }
    }

    pub fn file(filename: impl Into<String>) -> Self {
        Self::FileRef {
            filename: filename.into(),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text { .. })
    }

    /// Short label matching the wire tag (`text`, `abc`, `tab`, `midi`, `file`).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Notation { .. } => "abc",
            Self::Tablature { .. } => "tab",
            Self::MediaFileRef { .. } => "midi",
            Self::FileRef { .. } => "file",
        }
    }
}

/// One tool invocation reported by the backend pipeline.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolRecord {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<serde_json::Value>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

/// Transient progress indicator shown while the backend works.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Progress {
    pub step: String,
    pub detail: Option<String>,
}

/// Lifecycle of a streamed answer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum StreamState {
    #[default]
    Idle,
    Streaming,
    Completed,
    Cancelled,
    Errored,
}

impl StreamState {
    /// Terminal states accept no further mutation.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Errored)
    }
}

/// The assistant answer being assembled for one turn.
///
/// Documents are advanced by [`crate::assembler::apply`]; every applied
/// mutation bumps `version`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Document {
    pub id: uuid::Uuid,
    pub version: u64,
    pub parts: Vec<ContentPart>,
    pub reasoning_trace: String,
    pub tool_records: Vec<ToolRecord>,
    pub attached_files: Vec<String>,
    pub progress: Option<Progress>,
    pub error: Option<StreamFailure>,
    pub state: StreamState,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates an empty document in the `Idle` state.
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            ..Self::placeholder()
        }
    }

    /// Empty document with the nil id, used as a stand-in while the real one
    /// is moved through `apply`.
    pub(crate) fn placeholder() -> Self {
        Self {
            id: uuid::Uuid::nil(),
            version: 0,
            parts: Vec::new(),
            reasoning_trace: String::new(),
            tool_records: Vec::new(),
            attached_files: Vec::new(),
            progress: None,
            error: None,
            state: StreamState::Idle,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Concatenates all text parts in order and ignores the rest.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            if let ContentPart::Text { text } = part {
                out.push_str(text);
            }
        }
        out
    }

    /// Attached files that can be played inline.
    pub fn media_files(&self) -> impl Iterator<Item = &str> {
        self.attached_files
            .iter()
            .map(String::as_str)
            .filter(|name| is_media_filename(name))
    }

    /// Parts a renderer should draw.
    ///
    /// When the backend tagged any non-text part, the explicit parts are used
    /// as-is. Otherwise the finalized text is scanned for fenced notation and
    /// tablature.
    pub fn render_parts(&self) -> Vec<ContentPart> {
        if self.parts.iter().any(|part| !part.is_text()) {
            return self.parts.clone();
        }
        crate::detect::segment_text(&self.text())
    }

    /// Extends the trailing text part or starts a new one.
    pub(crate) fn append_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.parts.last_mut() {
            Some(ContentPart::Text { text: tail }) => tail.push_str(text),
            _ => self.parts.push(ContentPart::text(text)),
        }
    }

    pub(crate) fn bump(&mut self) {
        self.version = self.version.saturating_add(1);
    }
}

pub(crate) fn is_media_filename(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".mid") || lower.ends_with(".midi")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_uses_nil_id_and_new_does_not() {
        let placeholder = Document::placeholder();
        assert!(placeholder.id.is_nil());
        assert_eq!(placeholder.state, StreamState::Idle);
        assert!(placeholder.parts.is_empty());
        assert!(!Document::new().id.is_nil());
    }

    #[test]
    fn append_text_merges_into_trailing_text_part() {
        let mut doc = Document::new();
        doc.append_text("Play ");
        doc.append_text("this");
        doc.parts.push(ContentPart::notation("X:1\nK:C"));
        doc.append_text("then that");
        assert_eq!(
            doc.parts,
            vec![
                ContentPart::text("Play this"),
                ContentPart::notation("X:1\nK:C"),
                ContentPart::text("then that"),
            ]
        );
    }

    #[test]
    fn append_empty_text_creates_nothing() {
        let mut doc = Document::new();
        doc.append_text("");
        assert!(doc.parts.is_empty());
    }

    #[test]
    fn parts_serialize_with_wire_tags() {
        let value = serde_json::to_value(vec![
            ContentPart::text("hi"),
            ContentPart::notation("X:1"),
            ContentPart::tablature("e|-0-|"),
            ContentPart::media_file("riff.mid"),
            ContentPart::file("chart.pdf"),
        ])
        .expect("serialize");
        assert_eq!(
            value,
            serde_json::json!([
                {"type": "text", "text": "hi"},
                {"type": "abc", "abc": "X:1"},
                {"type": "tab", "tab": "e|-0-|"},
                {"type": "midi", "filename": "riff.mid"},
                {"type": "file", "filename": "chart.pdf"},
            ])
        );
    }

    #[test]
    fn media_files_filters_midi_extensions() {
        let mut doc = Document::new();
        doc.attached_files = vec!["a.mid".into(), "b.pdf".into(), "C.MIDI".into()];
        assert_eq!(doc.media_files().collect::<Vec<_>>(), vec!["a.mid", "C.MIDI"]);
    }

    #[test]
    fn render_parts_prefers_explicit_parts() {
        let mut doc = Document::new();
        doc.append_text("```abc\nX:1\nK:C\nC\n```");
        doc.parts.push(ContentPart::media_file("x.mid"));
        assert_eq!(doc.render_parts(), doc.parts);
    }

    #[test]
    fn render_parts_detects_fenced_notation_in_plain_text() {
        let mut doc = Document::new();
        doc.append_text("Here:\n```\nX:1\nK:G\nGABc\n```\nEnjoy");
        assert_eq!(
            doc.render_parts(),
            vec![
                ContentPart::text("Here:\n"),
                ContentPart::notation("X:1\nK:G\nGABc"),
                ContentPart::text("\nEnjoy"),
            ]
        );
    }

    #[test]
    fn terminal_states() {
        assert!(!StreamState::Idle.is_terminal());
        assert!(!StreamState::Streaming.is_terminal());
        assert!(StreamState::Completed.is_terminal());
        assert!(StreamState::Cancelled.is_terminal());
        assert!(StreamState::Errored.is_terminal());
    }
}
