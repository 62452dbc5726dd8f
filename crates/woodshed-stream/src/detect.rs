//! Finds notation and tablature inside finalized answer text.
//!
//! The backend does not always tag music explicitly. These pure functions
//! locate fenced code regions and classify them after the fact so a renderer
//! can still draw sheet music or tab inline.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::document::ContentPart;

static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```([^\n`]*)\n(.*?)```").expect("invalid fence regex"));

static HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[A-Z]:\s*.+$").expect("invalid header regex"));

static KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^K:\s*.+$").expect("invalid key regex"));

static TAB_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[eBGDAE]?\|?[-0-9|hp/\\~\s]+\|?$").expect("invalid tab line regex")
});

static TAB_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-0-9]{3,}").expect("invalid tab run regex"));

/// Minimum number of tab-like lines before a block counts as tablature.
const MIN_TAB_LINES: usize = 4;

/// Kind of music found in a fenced block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MusicBlockKind {
    #[serde(rename = "abc")]
    Notation,
    #[serde(rename = "tab")]
    Tablature,
}

/// A classified fenced block.
///
/// `start..end` are byte offsets into the scanned text and cover the whole
/// fence including both markers.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MusicBlock {
    #[serde(rename = "type")]
    pub kind: MusicBlockKind,
    pub content: String,
    pub start: usize,
    pub end: usize,
}

impl MusicBlock {
    fn into_part(self) -> ContentPart {
        match self.kind {
            MusicBlockKind::Notation => ContentPart::notation(self.content),
            MusicBlockKind::Tablature => ContentPart::tablature(self.content),
        }
    }
}

/// True when `text` has at least one header field and a `K:` key header.
pub fn is_notation(text: &str) -> bool {
    let trimmed = text.trim();
    HEADER_RE.is_match(trimmed) && KEY_RE.is_match(trimmed)
}

/// True when at least four lines look like tab staff lines.
pub fn is_tablature(text: &str) -> bool {
    let tab_lines = text
        .trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && TAB_LINE_RE.is_match(line) && TAB_RUN_RE.is_match(line))
        .count();
    tab_lines >= MIN_TAB_LINES
}

/// Returns every fenced block classified as notation or tablature, ordered by
/// `start`. Untagged blocks are classified by content; blocks tagged with any
/// other language are skipped.
pub fn detect_music_blocks(text: &str) -> Vec<MusicBlock> {
    FENCE_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            // The whole opening line belongs to the marker; only its first
            // word is the language tag.
            let tag = caps
                .get(1)
                .and_then(|m| m.as_str().split_whitespace().next())
                .unwrap_or("")
                .to_ascii_lowercase();
            let content = caps.get(2).map_or("", |m| m.as_str()).trim();
            let kind = classify(&tag, content)?;
            Some(MusicBlock {
                kind,
                content: content.to_string(),
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

fn classify(tag: &str, content: &str) -> Option<MusicBlockKind> {
    match tag {
        "abc" => Some(MusicBlockKind::Notation),
        "tab" | "tablature" => Some(MusicBlockKind::Tablature),
        "" if is_notation(content) => Some(MusicBlockKind::Notation),
        "" if is_tablature(content) => Some(MusicBlockKind::Tablature),
        _ => None,
    }
}

/// Splits finalized text into text, notation and tablature parts using the
/// detected block offsets.
pub fn segment_text(text: &str) -> Vec<ContentPart> {
    let mut parts = Vec::new();
    let mut cursor = 0;
    for block in detect_music_blocks(text) {
        if block.start > cursor {
            parts.push(ContentPart::text(&text[cursor..block.start]));
        }
        cursor = block.end;
        parts.push(block.into_part());
    }
    if cursor < text.len() {
        parts.push(ContentPart::text(&text[cursor..]));
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUITAR_TAB: &str = "e|---0---0---0---|\nB|---1---1---1---|\nG|---0---0---0---|\nD|---2---2---2---|\nA|---3---3---3---|\nE|---------------|";

    #[test]
    fn notation_requires_key_header() {
        assert!(is_notation("X:1\nT:Test\nK:C\nCDEF"));
        assert!(is_notation("X:1\nK:Am\nABcd efga"));
        assert!(!is_notation("Hello world"));
        assert!(!is_notation("X:1\nT:Title\nCDEF"));
    }

    #[test]
    fn tablature_needs_four_tab_lines() {
        let six = "e|---0---0---|\n".repeat(6);
        assert!(is_tablature(&six));
        let two = "e|---0---0---|\n".repeat(2);
        assert!(!is_tablature(&two));
        assert!(is_tablature(GUITAR_TAB));
        assert!(!is_tablature("Just some regular text"));
    }

    #[test]
    fn tablature_without_string_names() {
        let tab = "|---0---0---0---|\n|---1---1---1---|\n|---0---0---0---|\n|---2---2---2---|\n|---3---3---3---|\n|---------------|";
        assert!(is_tablature(tab));
    }

    #[test]
    fn tablature_accepts_technique_marks() {
        let tab = "e|--5h7--7p5--|\nB|--5/7--8\\5--|\nG|--4~~--6----|\nD|-----------|";
        assert!(is_tablature(tab));
    }

    #[test]
    fn block_offsets_bound_the_whole_fence() {
        let prefix = "Before: ";
        let text = format!("{prefix}```abc\nX:1\nK:C\nCDEF\n```");
        let blocks = detect_music_blocks(&text);
        assert_eq!(
            blocks,
            vec![MusicBlock {
                kind: MusicBlockKind::Notation,
                content: "X:1\nK:C\nCDEF".into(),
                start: prefix.len(),
                end: text.len(),
            }]
        );
        assert!(text[blocks[0].start..blocks[0].end].starts_with("```abc"));
    }

    #[test]
    fn tagged_tab_block_is_tablature_regardless_of_content() {
        let blocks = detect_music_blocks("```tablature\nanything\n```");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, MusicBlockKind::Tablature);
        assert_eq!(blocks[0].content, "anything");
    }

    #[test]
    fn tags_match_case_insensitively() {
        let blocks = detect_music_blocks("```ABC\nX:1\nK:D\n```");
        assert_eq!(blocks[0].kind, MusicBlockKind::Notation);
    }

    #[test]
    fn untagged_blocks_are_classified_by_content() {
        let text = format!(
            "```\nX:1\nT:Auto\nM:4/4\nK:G\nGABc defg\n```\nand\n```\n{GUITAR_TAB}\n```"
        );
        let kinds: Vec<_> = detect_music_blocks(&text).iter().map(|b| b.kind).collect();
        assert_eq!(kinds, vec![MusicBlockKind::Notation, MusicBlockKind::Tablature]);
    }

    #[test]
    fn other_languages_and_plain_code_are_skipped() {
        assert!(detect_music_blocks("```python\nX:1\nK:C\n```").is_empty());
        assert!(detect_music_blocks("```\nprint('hi')\n```").is_empty());
        assert!(detect_music_blocks("Just some text about music theory.").is_empty());
    }

    #[test]
    fn non_word_tag_still_closes_its_own_fence() {
        let text = "```c++\nint x = 1;\n```\nHere:\n```abc\nX:1\nK:C\nCDEF\n```";
        let blocks = detect_music_blocks(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, MusicBlockKind::Notation);
        assert_eq!(blocks[0].content, "X:1\nK:C\nCDEF");
        assert_eq!(blocks[0].start, text.find("```abc").expect("abc fence"));
        assert_eq!(blocks[0].end, text.len());
    }

    #[test]
    fn tag_line_may_carry_trailing_space_or_attributes() {
        let blocks = detect_music_blocks("```abc \nX:1\nK:C\nCDEF\n```");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, MusicBlockKind::Notation);

        let blocks = detect_music_blocks("```Tab title=\"Intro\"\r\ne|-0-|\r\n```");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, MusicBlockKind::Tablature);
        assert_eq!(blocks[0].content, "e|-0-|");

        assert!(detect_music_blocks("```objective-c\nX:1\nK:C\n```").is_empty());
    }

    #[test]
    fn blocks_are_ordered_and_disjoint() {
        let text = format!(
            "Notation:\n```abc\nX:1\nK:C\nCDEF\n```\nTab:\n```tab\n{GUITAR_TAB}\n```"
        );
        let blocks = detect_music_blocks(&text);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].end <= blocks[1].start);
        assert_eq!(blocks[1].end, text.len());
    }

    #[test]
    fn offsets_are_byte_offsets() {
        let text = "Cl\u{e9}: ```abc\nX:1\nK:C\n```";
        let blocks = detect_music_blocks(text);
        assert_eq!(blocks[0].start, "Cl\u{e9}: ".len());
    }

    #[test]
    fn segment_text_interleaves_text_and_music() {
        let text = "Intro\n```abc\nX:1\nK:C\nC\n```\nOutro";
        assert_eq!(
            segment_text(text),
            vec![
                ContentPart::text("Intro\n"),
                ContentPart::notation("X:1\nK:C\nC"),
                ContentPart::text("\nOutro"),
            ]
        );
        assert_eq!(segment_text("plain"), vec![ContentPart::text("plain")]);
        assert!(segment_text("").is_empty());
    }

    #[test]
    fn music_block_serializes_with_wire_type_labels() {
        let value = serde_json::to_value(&detect_music_blocks("```tab\ne|-0-|\n```")[0]).expect("json");
        assert_eq!(value["type"], "tab");
    }
}
