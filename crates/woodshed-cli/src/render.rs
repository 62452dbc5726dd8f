//! Plain-text rendering of a finished answer for the terminal.

use woodshed_stream::{ClientConfig, ContentPart, Document, StreamState};

/// Lines printed after the streamed text of a turn.
///
/// The answer text itself was already echoed token by token, so only music
/// parts, tool activity, files and the final outcome are listed here.
pub fn summary_lines(doc: &Document, config: &ClientConfig, show_reasoning: bool) -> Vec<String> {
    let mut lines = Vec::new();

    if show_reasoning && !doc.reasoning_trace.is_empty() {
        lines.push("--- reasoning ---".to_string());
        lines.extend(doc.reasoning_trace.lines().map(str::to_string));
    }

    for part in doc.render_parts() {
        match part {
            ContentPart::Text { .. } => {}
            ContentPart::Notation { abc } => {
                lines.push("--- notation (abc) ---".to_string());
                lines.extend(abc.lines().map(str::to_string));
            }
            ContentPart::Tablature { tab } => {
                lines.push("--- tablature ---".to_string());
                lines.extend(tab.lines().map(str::to_string));
            }
            ContentPart::MediaFileRef { filename } => {
                lines.push(format!("midi: {}", link(config.midi_url(&filename), &filename)));
            }
            ContentPart::FileRef { filename } => {
                lines.push(format!("file: {}", link(config.file_url(&filename), &filename)));
            }
        }
    }

    for record in &doc.tool_records {
        let result = record
            .result
            .as_ref()
            .map(compact_json)
            .unwrap_or_else(|| "-".to_string());
        lines.push(format!("tool {} -> {result}", record.name));
    }

    for file in &doc.attached_files {
        lines.push(format!("attached: {}", link(config.file_url(file), file)));
    }

    match doc.state {
        StreamState::Cancelled => lines.push("[cancelled]".to_string()),
        StreamState::Errored => {
            let message = doc
                .error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string());
            lines.push(format!("[error] {message}"));
        }
        _ => {}
    }
    lines
}

fn link<E>(url: Result<impl std::fmt::Display, E>, fallback: &str) -> String {
    url.map(|u| u.to_string()).unwrap_or_else(|_| fallback.to_string())
}

fn compact_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
