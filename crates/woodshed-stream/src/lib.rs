//! Streaming chat client that turns an incrementally delivered answer into a
//! renderable document of text, notation, tablature and file references.
//!
//! Bytes from a [`ChatTransport`] are split into frames by [`FrameParser`],
//! decoded into [`StreamEvent`]s and folded into a [`Document`] by the pure
//! [`assembler::apply`] function. Token text is batched by a
//! [`TokenCoalescer`] so a UI repaints at most once per tick.
//!
//! # Streaming a turn
//!
//! ```no_run
//! use woodshed_stream::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ClientError> {
//! let mut conversation = Conversation::http(ClientConfig::from_env()?)?;
//! let callbacks = FnCallbacks::new().on_token(|text| print!("{text}"));
//!
//! let handle = conversation.send("Show me a G major scale in ABC", callbacks)?;
//! let document = handle.finish().await?;
//!
//! for part in document.render_parts() {
//!     println!("{}", part.kind());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Detecting music in finished text
//!
//! ```
//! use woodshed_stream::detect::{MusicBlockKind, detect_music_blocks};
//!
//! let blocks = detect_music_blocks("Try this:\n```abc\nX:1\nK:G\nGABc\n```");
//! assert_eq!(blocks[0].kind, MusicBlockKind::Notation);
//! ```

/// Pure document transitions.
pub mod assembler;
/// Token batching aligned with UI repaints.
pub mod coalescer;
/// Client configuration and backend URL helpers.
pub mod config;
/// Retroactive notation and tablature detection.
pub mod detect;
/// The assembled answer and its content parts.
pub mod document;
/// Public error types.
pub mod errors;
/// Typed stream events decoded from frames.
pub mod event;
/// Process-wide tracing setup.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Session lifecycle, read loop, callbacks and conversations.
pub mod session;
/// Incremental event-stream frame parsing.
pub mod sse;
/// Chat transport contract and the HTTP implementation.
pub mod transport;

pub use assembler::{Update, apply, apply_all};
pub use coalescer::{IntervalScheduler, ManualScheduler, ManualTick, RepaintScheduler, TokenCoalescer};
pub use config::ClientConfig;
pub use detect::{MusicBlock, MusicBlockKind, detect_music_blocks, is_notation, is_tablature, segment_text};
pub use document::{ContentPart, Document, Progress, StreamState, ToolRecord};
pub use errors::{ClientError, FrameError, StreamFailure};
pub use event::StreamEvent;
pub use observability::init_observability;
pub use session::{
    AbortHandle, Conversation, FnCallbacks, NoopCallbacks, StreamCallbacks, StreamHandle,
    StreamSession,
};
pub use sse::{Frame, FrameParser};
pub use transport::{ChatRequest, ChatTransport, ChunkStream, Creativity, HttpTransport};
