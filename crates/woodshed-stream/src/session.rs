use std::sync::Arc;

use futures::StreamExt as _;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::assembler::{Update, apply};
use crate::coalescer::{IntervalScheduler, RepaintScheduler, TokenCoalescer};
use crate::config::ClientConfig;
use crate::document::{ContentPart, Document, StreamState, ToolRecord};
use crate::errors::{ClientError, StreamFailure, stream_failure_from_client_error};
use crate::event::StreamEvent;
use crate::sse::{Frame, FrameParser};
use crate::transport::{ChatRequest, ChatTransport, ChunkStream, Creativity, HttpTransport};

/// Per-event notifications for the UI layer.
///
/// Every method defaults to a no-op. Callbacks run on the session's read loop
/// in frame order, so they should return quickly.
pub trait StreamCallbacks: Send {
    /// Raw token text, before coalescing.
    fn on_token(&mut self, _text: &str) {}

    fn on_status(&mut self, _step: &str, _detail: Option<&str>) {}

    fn on_thinking(&mut self, _text: &str) {}

    fn on_tool_call(&mut self, _record: &ToolRecord) {}

    fn on_files(&mut self, _files: &[String]) {}

    fn on_part(&mut self, _part: &ContentPart) {}

    fn on_done(&mut self) {}

    /// Terminal failure. Never called for cancellation.
    fn on_error(&mut self, _failure: &StreamFailure) {}
}

/// Callbacks that ignore everything.
pub struct NoopCallbacks;

impl StreamCallbacks for NoopCallbacks {}

/// Closure-based callbacks with one optional handler per event kind.
#[derive(Default)]
#[allow(clippy::type_complexity)]
pub struct FnCallbacks {
    token: Option<Box<dyn FnMut(&str) + Send>>,
    status: Option<Box<dyn FnMut(&str, Option<&str>) + Send>>,
    thinking: Option<Box<dyn FnMut(&str) + Send>>,
    tool_call: Option<Box<dyn FnMut(&ToolRecord) + Send>>,
    files: Option<Box<dyn FnMut(&[String]) + Send>>,
    part: Option<Box<dyn FnMut(&ContentPart) + Send>>,
    done: Option<Box<dyn FnMut() + Send>>,
    error: Option<Box<dyn FnMut(&StreamFailure) + Send>>,
}

impl FnCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_token(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.token = Some(Box::new(f));
        self
    }

    pub fn on_status(mut self, f: impl FnMut(&str, Option<&str>) + Send + 'static) -> Self {
        self.status = Some(Box::new(f));
        self
    }

    pub fn on_thinking(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.thinking = Some(Box::new(f));
        self
    }

    pub fn on_tool_call(mut self, f: impl FnMut(&ToolRecord) + Send + 'static) -> Self {
        self.tool_call = Some(Box::new(f));
        self
    }

    pub fn on_files(mut self, f: impl FnMut(&[String]) + Send + 'static) -> Self {
        self.files = Some(Box::new(f));
        self
    }

    pub fn on_part(mut self, f: impl FnMut(&ContentPart) + Send + 'static) -> Self {
        self.part = Some(Box::new(f));
        self
    }

    pub fn on_done(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.done = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnMut(&StreamFailure) + Send + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }
}

impl StreamCallbacks for FnCallbacks {
    fn on_token(&mut self, text: &str) {
        if let Some(f) = self.token.as_mut() {
            f(text);
        }
    }

    fn on_status(&mut self, step: &str, detail: Option<&str>) {
        if let Some(f) = self.status.as_mut() {
            f(step, detail);
        }
    }

    fn on_thinking(&mut self, text: &str) {
        if let Some(f) = self.thinking.as_mut() {
            f(text);
        }
    }

    fn on_tool_call(&mut self, record: &ToolRecord) {
        if let Some(f) = self.tool_call.as_mut() {
            f(record);
        }
    }

    fn on_files(&mut self, files: &[String]) {
        if let Some(f) = self.files.as_mut() {
            f(files);
        }
    }

    fn on_part(&mut self, part: &ContentPart) {
        if let Some(f) = self.part.as_mut() {
            f(part);
        }
    }

    fn on_done(&mut self) {
        if let Some(f) = self.done.as_mut() {
            f();
        }
    }

    fn on_error(&mut self, failure: &StreamFailure) {
        if let Some(f) = self.error.as_mut() {
            f(failure);
        }
    }
}

/// Handle used to request cancellation of a running stream.
#[derive(Clone)]
pub struct AbortHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl AbortHandle {
    /// Requests cancellation.
    ///
    /// Cancellation is cooperative and idempotent. Returns `true` only for the
    /// call that actually raised the request while the read loop was alive.
    pub fn abort(&self) -> bool {
        if self.tx.is_closed() {
            return false;
        }
        self.tx.send_if_modified(|requested| {
            if *requested {
                false
            } else {
                *requested = true;
                true
            }
        })
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

/// One streamed assistant turn.
///
/// A session starts `Idle`, moves to `Streaming` on [`StreamSession::start`]
/// and ends in exactly one terminal state. It cannot be restarted.
pub struct StreamSession {
    id: uuid::Uuid,
    transport: Arc<dyn ChatTransport>,
    config: ClientConfig,
    scheduler: Option<Box<dyn RepaintScheduler>>,
    doc_rx: Option<watch::Receiver<Document>>,
}

impl StreamSession {
    pub fn new(transport: Arc<dyn ChatTransport>, config: ClientConfig) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            transport,
            config,
            scheduler: None,
            doc_rx: None,
        }
    }

    /// Replaces the timer-backed repaint scheduler.
    pub fn with_scheduler(mut self, scheduler: Box<dyn RepaintScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StreamState {
        self.doc_rx
            .as_ref()
            .map_or(StreamState::Idle, |rx| rx.borrow().state)
    }

    /// Sends `request` and starts the read loop on the current Tokio runtime.
    ///
    /// Requires the `Idle` state. Opening the transport happens inside the
    /// read loop, so connection failures arrive through `on_error` and the
    /// document rather than as an `Err` here.
    pub fn start(
        &mut self,
        request: ChatRequest,
        callbacks: impl StreamCallbacks + 'static,
    ) -> Result<StreamHandle, ClientError> {
        let state = self.state();
        if state != StreamState::Idle {
            return Err(ClientError::InvalidState {
                expected: StreamState::Idle,
                actual: state,
            });
        }
        request.validate()?;
        self.config.validate()?;

        let doc = apply(Document::new(), Update::Started);
        let (doc_tx, doc_rx) = watch::channel(doc.clone());
        let (abort_tx, abort_rx) = watch::channel(false);
        let abort_handle = AbortHandle {
            tx: Arc::new(abort_tx),
        };
        let scheduler = self
            .scheduler
            .take()
            .unwrap_or_else(|| Box::new(IntervalScheduler::new(self.config.flush_interval)));

        debug!(
            session_id = %self.id,
            document_id = %doc.id,
            conversation_id = %request.conversation_id,
            "starting stream session"
        );
        let pump = Pump {
            session_id: self.id,
            doc,
            coalescer: TokenCoalescer::new(scheduler),
            callbacks: Box::new(callbacks),
            doc_tx,
        };
        let join = tokio::spawn(read_loop(
            self.transport.clone(),
            request,
            pump,
            abort_rx,
        ));

        self.doc_rx = Some(doc_rx.clone());
        Ok(StreamHandle {
            session_id: self.id,
            abort_handle,
            doc_rx,
            join,
        })
    }
}

/// Live view of a started session.
pub struct StreamHandle {
    session_id: uuid::Uuid,
    abort_handle: AbortHandle,
    doc_rx: watch::Receiver<Document>,
    join: JoinHandle<Document>,
}

impl StreamHandle {
    pub fn session_id(&self) -> uuid::Uuid {
        self.session_id
    }

    /// Returns a cloneable handle that can cancel the stream.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Requests cancellation; see [`AbortHandle::abort`].
    pub fn cancel(&self) -> bool {
        if self.state() != StreamState::Streaming {
            return false;
        }
        self.abort_handle.abort()
    }

    pub fn state(&self) -> StreamState {
        self.doc_rx.borrow().state
    }

    /// Snapshot of the latest published document.
    pub fn document(&self) -> Document {
        self.doc_rx.borrow().clone()
    }

    /// Waits for the next published document.
    ///
    /// Returns `None` once the read loop has finished and nothing newer is
    /// left to observe.
    pub async fn changed(&mut self) -> Option<Document> {
        self.doc_rx.changed().await.ok()?;
        Some(self.doc_rx.borrow_and_update().clone())
    }

    /// Waits for the read loop to finish and returns the final document.
    pub async fn finish(self) -> Result<Document, ClientError> {
        self.join
            .await
            .map_err(|e| ClientError::protocol_msg(format!("stream read loop failed: {e}")))
    }
}

/// Owns the document while the read loop runs and republishes it after
/// every mutation.
struct Pump {
    session_id: uuid::Uuid,
    doc: Document,
    coalescer: TokenCoalescer,
    callbacks: Box<dyn StreamCallbacks>,
    doc_tx: watch::Sender<Document>,
}

impl Pump {
    fn take_doc(&mut self) -> Document {
        std::mem::replace(&mut self.doc, Document::placeholder())
    }

    fn advance(&mut self, update: Update) {
        let doc = self.take_doc();
        self.doc = apply(doc, update);
    }

    fn publish(&self) {
        self.doc_tx.send_replace(self.doc.clone());
    }

    fn flush(&mut self) {
        let doc = self.take_doc();
        let version = doc.version;
        self.doc = self.coalescer.flush_into(doc);
        if self.doc.version != version {
            trace!(session_id = %self.session_id, version = self.doc.version, "flushed coalesced text");
            self.publish();
        }
    }

    fn handle_frame(&mut self, frame: Frame) {
        match StreamEvent::decode(&frame) {
            Ok(Some(event)) => {
                trace!(session_id = %self.session_id, event = event.name(), "dispatching event");
                self.dispatch(event);
            }
            Ok(None) => {
                trace!(session_id = %self.session_id, event = %frame.event, "ignoring unknown event");
            }
            Err(err) => {
                debug!(session_id = %self.session_id, event = %frame.event, error = %err, "dropping frame");
            }
        }
    }

    fn dispatch(&mut self, event: StreamEvent) {
        if let StreamEvent::Token { text } = &event {
            self.callbacks.on_token(text);
            // Progress clears when the coalesced text lands in the document.
            self.coalescer.push(text);
            return;
        }

        self.flush();
        self.advance(Update::Event(event.clone()));
        self.publish();

        match &event {
            StreamEvent::Token { .. } => {}
            StreamEvent::Status { step, detail } => {
                self.callbacks.on_status(step, detail.as_deref());
            }
            StreamEvent::Thinking { text } => self.callbacks.on_thinking(text),
            StreamEvent::ToolCall(record) => self.callbacks.on_tool_call(record),
            StreamEvent::Files(files) => self.callbacks.on_files(files),
            StreamEvent::Part(part) => self.callbacks.on_part(part),
            StreamEvent::Done => {
                debug!(session_id = %self.session_id, parts = self.doc.parts.len(), "stream completed");
                self.callbacks.on_done();
            }
            StreamEvent::Error { message } => {
                warn!(session_id = %self.session_id, error = %message, "backend reported stream error");
                self.callbacks.on_error(&StreamFailure::upstream(message.clone()));
            }
        }
    }

    fn cancel(&mut self) {
        self.flush();
        self.advance(Update::Cancelled);
        debug!(session_id = %self.session_id, state = ?self.doc.state, "stream cancelled");
        self.publish();
    }

    fn fail(&mut self, failure: StreamFailure) {
        self.flush();
        self.advance(Update::TransportFailed(failure.message().to_string()));
        warn!(session_id = %self.session_id, error = %failure, "stream transport failed");
        self.publish();
        self.callbacks.on_error(&failure);
    }

    fn is_terminal(&self) -> bool {
        self.doc.is_terminal()
    }

    fn into_document(self) -> Document {
        self.doc
    }
}

async fn wait_for_abort(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Every handle is gone; nobody can cancel any more.
            std::future::pending::<()>().await;
        }
    }
}

async fn read_loop(
    transport: Arc<dyn ChatTransport>,
    request: ChatRequest,
    mut pump: Pump,
    mut abort_rx: watch::Receiver<bool>,
) -> Document {
    let opened = tokio::select! {
        biased;
        _ = wait_for_abort(&mut abort_rx) => None,
        opened = transport.open(&request) => Some(opened),
    };
    let mut chunks: ChunkStream = match opened {
        None => {
            pump.cancel();
            return pump.into_document();
        }
        Some(Ok(chunks)) => chunks,
        Some(Err(err)) => {
            pump.fail(stream_failure_from_client_error(&err));
            return pump.into_document();
        }
    };

    let mut parser = FrameParser::new();
    loop {
        tokio::select! {
            biased;
            _ = wait_for_abort(&mut abort_rx) => {
                pump.cancel();
                return pump.into_document();
            }
            _ = pump.coalescer.due(), if pump.coalescer.is_scheduled() => {
                pump.flush();
            }
            next = chunks.next() => match next {
                Some(Ok(bytes)) => {
                    trace!(session_id = %pump.session_id, bytes = bytes.len(), "received chunk");
                    for frame in parser.push(&bytes) {
                        if *abort_rx.borrow() {
                            pump.cancel();
                            return pump.into_document();
                        }
                        pump.handle_frame(frame);
                        if pump.is_terminal() {
                            return pump.into_document();
                        }
                    }
                }
                Some(Err(err)) => {
                    pump.fail(stream_failure_from_client_error(&err));
                    return pump.into_document();
                }
                None => {
                    if let Some(frame) = parser.finish() {
                        pump.handle_frame(frame);
                    }
                    if !pump.is_terminal() {
                        pump.fail(StreamFailure::transport("stream ended before completion"));
                    }
                    return pump.into_document();
                }
            }
        }
    }
}

/// A chat conversation: one identity, at most one streaming turn at a time.
pub struct Conversation {
    id: uuid::Uuid,
    transport: Arc<dyn ChatTransport>,
    config: ClientConfig,
    creativity: Creativity,
    active: Option<AbortHandle>,
}

impl Conversation {
    pub fn new(transport: Arc<dyn ChatTransport>, config: ClientConfig) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            transport,
            config,
            creativity: Creativity::default(),
            active: None,
        }
    }

    /// Creates a conversation that talks to the backend over HTTP.
    pub fn http(config: ClientConfig) -> Result<Self, ClientError> {
        let transport = HttpTransport::new(config.clone())?;
        Ok(Self::new(Arc::new(transport), config))
    }

    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    pub fn creativity(&self) -> Creativity {
        self.creativity
    }

    pub fn set_creativity(&mut self, creativity: Creativity) {
        self.creativity = creativity;
    }

    /// Starts a new assistant turn.
    ///
    /// A turn that is still streaming is cancelled first.
    pub fn send(
        &mut self,
        message: impl Into<String>,
        callbacks: impl StreamCallbacks + 'static,
    ) -> Result<StreamHandle, ClientError> {
        let request = ChatRequest::new(message)
            .creativity(self.creativity)
            .conversation_id(self.id);
        request.validate()?;
        if self.cancel() {
            debug!(conversation_id = %self.id, "cancelled previous turn before sending");
        }
        let mut session = StreamSession::new(self.transport.clone(), self.config.clone());
        let handle = session.start(request, callbacks)?;
        self.active = Some(handle.abort_handle());
        Ok(handle)
    }

    /// Cancels the active turn, if any. Returns whether a cancel was issued.
    pub fn cancel(&mut self) -> bool {
        self.active.take().is_some_and(|handle| handle.abort())
    }

    /// Cancels any active turn and switches to a fresh conversation identity.
    pub fn reset(&mut self) {
        self.cancel();
        let previous = std::mem::replace(&mut self.id, uuid::Uuid::new_v4());
        debug!(previous = %previous, conversation_id = %self.id, "conversation reset");
    }
}
