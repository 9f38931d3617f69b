// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan session — the capture/recognize/match/confirm state machine.
//
// Transitions:
//
//   Idle -> Capturing                          start()
//   Capturing -> ExtractingFrame -> Preprocessing -> Recognizing
//             -> Matching -> AwaitingConfirmation   scan_frame()
//   AwaitingConfirmation -> Committed               resolve(Confirm)
//   AwaitingConfirmation -> Retrying -> Capturing   resolve(Reject)
//   any non-terminal -> Cancelled                   stop()
//
// Short text goes straight back to Capturing without reaching Matching.
// Stage errors pass through Failed: transient ones return to Capturing,
// fatal ones continue to Cancelled with the stream and engine released.

use std::sync::Arc;

use labelscan_bridge::{
    CaptureDevice, CaptureStream, ConfirmationPrompt, RecognizerFactory, TextRecognizer,
};
use labelscan_catalog::{Catalog, CatalogMatcher};
use labelscan_core::error::{Result, ScanError};
use labelscan_core::human_errors::humanize_error;
use labelscan_core::{
    BinaryImage, Decision, ErrorClass, PendingConfirmation, SessionConfig, SessionId,
    classify_error,
};
use labelscan_vision::{FrameExtractor, ImagePreprocessor};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::events::{EVENT_CHANNEL_CAPACITY, SessionEvent};
use crate::state::{AttemptOutcome, Resolution, SessionState};

const TEXT_NOT_FOUND: &str = "Text not found. Try again.";
const SCAN_REJECTED: &str = "Scan rejected. Try again.";

/// Result of the pipeline part of an attempt, before the session reacts.
enum Attempt {
    TooShort(String),
    Proposal(PendingConfirmation),
}

/// One scanning session.
///
/// Generic over the camera `D` and the recognition engine factory `F`. The
/// stream and engine are created by [`start`](Self::start), reused for every
/// attempt, and released exactly once.
pub struct ScanSession<D, F>
where
    D: CaptureDevice,
    F: RecognizerFactory,
{
    id: SessionId,
    config: SessionConfig,
    catalog: Arc<Catalog>,
    extractor: FrameExtractor,
    preprocessor: ImagePreprocessor,
    matcher: CatalogMatcher,

    device: D,
    factory: F,
    stream: Option<D::Stream>,
    engine: Option<F::Recognizer>,

    state: SessionState,
    attempts: u32,
    events: broadcast::Sender<SessionEvent>,
}

impl<D, F> ScanSession<D, F>
where
    D: CaptureDevice,
    F: RecognizerFactory,
{
    /// Build a session. The configuration is validated here; an invalid
    /// configuration never produces a session.
    pub fn new(config: SessionConfig, catalog: Arc<Catalog>, device: D, factory: F) -> Result<Self> {
        config.validate()?;
        let extractor = FrameExtractor::new(config.roi)?;
        let preprocessor = ImagePreprocessor::new(config.preprocess.clone())?;
        let matcher = CatalogMatcher::new(config.matcher)?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let id = SessionId::new();
        debug!(session = %id, catalog = catalog.len(), "Scan session created");

        Ok(Self {
            id,
            config,
            catalog,
            extractor,
            preprocessor,
            matcher,
            device,
            factory,
            stream: None,
            engine: None,
            state: SessionState::Idle,
            attempts: 0,
            events,
        })
    }

    // -- Accessors ------------------------------------------------------------

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Number of scan attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The proposal waiting for a decision, if any.
    pub fn pending(&self) -> Option<&PendingConfirmation> {
        match &self.state {
            SessionState::AwaitingConfirmation(pending) => Some(pending),
            _ => None,
        }
    }

    /// The accepted string once the session has committed.
    pub fn accepted(&self) -> Option<&str> {
        match &self.state {
            SessionState::Committed(text) => Some(text),
            _ => None,
        }
    }

    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }

    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    /// Receive state changes and user-facing notices.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    // -- Lifecycle ------------------------------------------------------------

    /// Open the capture stream and, if there is none yet, create the
    /// recognition engine.
    ///
    /// On failure the session stays `Idle` and anything acquired is released
    /// again; nothing is retried automatically.
    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn start(&mut self) -> Result<()> {
        self.expect_state("start", |s| matches!(s, SessionState::Idle))?;

        let stream = match self.device.open().await {
            Ok(stream) => stream,
            Err(err) => {
                warn!(error = %err, "Could not open capture stream");
                self.notify_error(&err);
                return Err(err);
            }
        };
        self.stream = Some(stream);

        if self.engine.is_none() {
            match self.factory.create(&self.config.recognition).await {
                Ok(engine) => self.engine = Some(engine),
                Err(err) => {
                    warn!(error = %err, "Could not create recognition engine");
                    self.release();
                    self.notify_error(&err);
                    return Err(err);
                }
            }
        }

        info!("Scanner started");
        self.transition(SessionState::Capturing);
        Ok(())
    }

    /// Run one attempt on the current frame.
    ///
    /// Transient failures are reported through [`AttemptOutcome::Failed`]
    /// and leave the session capturing. Fatal failures cancel the session
    /// and are returned as errors.
    #[instrument(skip(self), fields(session = %self.id, attempt = self.attempts + 1))]
    pub async fn scan_frame(&mut self) -> Result<AttemptOutcome> {
        self.expect_state("scan_frame", |s| matches!(s, SessionState::Capturing))?;
        self.attempts += 1;

        match self.run_attempt().await {
            Ok(Attempt::TooShort(text)) => {
                debug!(text = %text, "Recognized text too short");
                self.notify(TEXT_NOT_FOUND);
                self.transition(SessionState::Capturing);
                Ok(AttemptOutcome::NoText)
            }
            Ok(Attempt::Proposal(pending)) => {
                let outcome = match &pending.candidate {
                    Some(candidate) => {
                        info!(
                            raw = %pending.raw_text,
                            matched = %candidate.entry.text,
                            score = candidate.score,
                            "Catalog match found"
                        );
                        AttemptOutcome::Candidate(pending.clone())
                    }
                    None => {
                        info!(raw = %pending.raw_text, "No catalog match");
                        self.notify(&format!("No match found for \"{}\".", pending.raw_text));
                        AttemptOutcome::Unmatched(pending.clone())
                    }
                };
                self.transition(SessionState::AwaitingConfirmation(pending));
                Ok(outcome)
            }
            Err(err) => self.fail_attempt(err),
        }
    }

    /// The binary image the recognizer would see for the current frame.
    ///
    /// Runs ROI extraction and preprocessing only, for tuning the stage
    /// parameters against live input. The engine is not called and the
    /// session stays `Capturing`.
    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn preview_frame(&mut self) -> Result<BinaryImage> {
        self.expect_state("preview_frame", |s| matches!(s, SessionState::Capturing))?;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| ScanError::DeviceUnavailable("capture stream is not open".into()))?;
        let frame = stream.current_frame().await?;
        let roi = self.extractor.extract(&frame)?;
        let binary = self.preprocessor.process(&roi)?;
        debug!(
            width = binary.width(),
            height = binary.height(),
            foreground = binary.foreground_count(),
            "Preview ready"
        );
        Ok(binary)
    }

    /// Apply a confirm/reject decision to the pending proposal.
    #[instrument(skip(self), fields(session = %self.id))]
    pub fn resolve(&mut self, decision: Decision) -> Result<Resolution> {
        let pending = match &self.state {
            SessionState::AwaitingConfirmation(pending) => pending.clone(),
            other => {
                return Err(ScanError::InvalidState {
                    operation: "resolve",
                    state: other.to_string(),
                });
            }
        };

        match decision {
            Decision::Confirm => {
                let accepted = pending.proposed().to_string();
                info!(accepted = %accepted, "Scan committed");
                self.release();
                self.transition(SessionState::Committed(accepted.clone()));
                Ok(Resolution::Committed(accepted))
            }
            Decision::Reject => {
                debug!(proposed = %pending.proposed(), "Proposal rejected");
                self.notify(SCAN_REJECTED);
                self.transition(SessionState::Retrying);
                self.transition(SessionState::Capturing);
                Ok(Resolution::Retrying)
            }
        }
    }

    /// Ask `prompt` about the pending proposal and apply its answer.
    pub async fn confirm_with<P: ConfirmationPrompt>(&mut self, prompt: &mut P) -> Result<Resolution> {
        let pending = self.pending().cloned().ok_or_else(|| ScanError::InvalidState {
            operation: "confirm_with",
            state: self.state.to_string(),
        })?;
        let decision = prompt.confirm(&pending).await;
        self.resolve(decision)
    }

    /// Cancel the session and release the stream and engine.
    ///
    /// Idempotent. Has no effect once the session has committed.
    #[instrument(skip(self), fields(session = %self.id))]
    pub fn stop(&mut self) {
        if self.state.is_terminal() {
            debug!(state = %self.state, "Stop ignored");
            return;
        }
        self.release();
        info!("Scanner stopped");
        self.transition(SessionState::Cancelled);
    }

    /// Drive the session until it commits or `cancel` fires.
    ///
    /// Starts the session if it is idle, then alternates scanning frames and
    /// asking `prompt`. Cancellation is observed at every suspension point;
    /// an attempt interrupted there is dropped whole. Returns the accepted
    /// string, or `None` when cancelled.
    pub async fn run<P: ConfirmationPrompt>(
        &mut self,
        prompt: &mut P,
        cancel: CancellationToken,
    ) -> Result<Option<String>> {
        if matches!(self.state, SessionState::Idle) {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.stop();
                    return Ok(None);
                }
                started = self.start() => started?,
            }
        }

        loop {
            match &self.state {
                SessionState::Committed(text) => return Ok(Some(text.clone())),
                SessionState::Cancelled => return Ok(None),
                _ => {}
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.stop();
                    return Ok(None);
                }
                stepped = self.step(prompt) => stepped?,
            }
        }
    }

    async fn step<P: ConfirmationPrompt>(&mut self, prompt: &mut P) -> Result<()> {
        match self.state {
            SessionState::Capturing => self.scan_frame().await.map(|_| ()),
            SessionState::AwaitingConfirmation(_) => self.confirm_with(prompt).await.map(|_| ()),
            _ => Err(ScanError::InvalidState {
                operation: "run",
                state: self.state.to_string(),
            }),
        }
    }

    // -- Internals ------------------------------------------------------------

    /// The pipeline: frame, ROI, binary image, text, catalog match. Frames
    /// and images live only inside this call.
    async fn run_attempt(&mut self) -> Result<Attempt> {
        self.transition(SessionState::ExtractingFrame);
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| ScanError::DeviceUnavailable("capture stream is not open".into()))?;
        let frame = stream.current_frame().await?;
        let roi = self.extractor.extract(&frame)?;
        drop(frame);

        self.transition(SessionState::Preprocessing);
        let binary = self.preprocessor.process(&roi)?;
        drop(roi);

        self.transition(SessionState::Recognizing);
        let engine = self.engine.as_mut().ok_or_else(|| {
            ScanError::RecognitionUnavailable("recognition engine is not running".into())
        })?;
        let result = engine.recognize(&binary, &self.config.recognition).await?;
        drop(binary);

        let text = result.first_line().to_string();
        if text.chars().count() < self.config.min_text_len {
            return Ok(Attempt::TooShort(text));
        }

        self.transition(SessionState::Matching);
        let candidate = self.matcher.best_match(&text, &self.catalog);
        Ok(Attempt::Proposal(PendingConfirmation {
            raw_text: text,
            candidate,
        }))
    }

    fn fail_attempt(&mut self, err: ScanError) -> Result<AttemptOutcome> {
        self.transition(SessionState::Failed);
        let human = humanize_error(&err);
        self.notify(&human.to_string());

        match classify_error(&err) {
            ErrorClass::Transient => {
                warn!(error = %err, "Attempt failed; scanning again");
                self.transition(SessionState::Capturing);
                Ok(AttemptOutcome::Failed(human))
            }
            ErrorClass::Fatal | ErrorClass::Configuration => {
                warn!(error = %err, "Fatal scan error; cancelling session");
                self.release();
                self.transition(SessionState::Cancelled);
                Err(err)
            }
        }
    }

    /// Close the stream and terminate the engine, each at most once.
    fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
            debug!("Capture stream closed");
        }
        if let Some(mut engine) = self.engine.take() {
            engine.terminate();
            debug!("Recognition engine terminated");
        }
    }

    fn expect_state(
        &self,
        operation: &'static str,
        allowed: impl Fn(&SessionState) -> bool,
    ) -> Result<()> {
        if allowed(&self.state) {
            Ok(())
        } else {
            Err(ScanError::InvalidState {
                operation,
                state: self.state.to_string(),
            })
        }
    }

    fn transition(&mut self, to: SessionState) {
        let from = std::mem::replace(&mut self.state, to.clone());
        debug!(from = %from, to = %to, "Session state changed");
        // No subscribers is fine.
        let _ = self.events.send(SessionEvent::StateChanged { from, to });
    }

    fn notify(&self, message: &str) {
        let _ = self.events.send(SessionEvent::Notice(message.to_string()));
    }

    fn notify_error(&self, err: &ScanError) {
        self.notify(&humanize_error(err).to_string());
    }
}

impl<D, F> Drop for ScanSession<D, F>
where
    D: CaptureDevice,
    F: RecognizerFactory,
{
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use image::{Rgba, RgbaImage};
    use labelscan_core::{Frame, RecognitionParams, RecognitionResult};

    use super::*;

    // -- Fakes ------------------------------------------------------------------

    #[derive(Default)]
    struct Counters {
        opens: AtomicUsize,
        closes: AtomicUsize,
        creates: AtomicUsize,
        terminates: AtomicUsize,
        recognitions: AtomicUsize,
    }

    impl Counters {
        fn get(counter: &AtomicUsize) -> usize {
            counter.load(Ordering::SeqCst)
        }
    }

    struct FakeCamera {
        counters: Arc<Counters>,
        deny: bool,
    }

    struct FakeStream {
        counters: Arc<Counters>,
    }

    impl CaptureDevice for FakeCamera {
        type Stream = FakeStream;

        async fn open(&mut self) -> Result<FakeStream> {
            if self.deny {
                return Err(ScanError::DeviceUnavailable(
                    "NotAllowedError: Permission denied".into(),
                ));
            }
            self.counters.opens.fetch_add(1, Ordering::SeqCst);
            Ok(FakeStream {
                counters: Arc::clone(&self.counters),
            })
        }
    }

    impl CaptureStream for FakeStream {
        async fn current_frame(&mut self) -> Result<Frame> {
            Ok(Frame::from_image(RgbaImage::from_pixel(
                200,
                100,
                Rgba([200, 40, 40, 255]),
            )))
        }

        fn close(&mut self) {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Each recognition pops the next scripted result; an empty script reads
    /// nothing.
    type Script = Arc<Mutex<VecDeque<Result<String>>>>;

    struct FakeFactory {
        counters: Arc<Counters>,
        script: Script,
        stall: bool,
    }

    /// With `stall` set, `recognize` never completes.
    struct FakeRecognizer {
        counters: Arc<Counters>,
        script: Script,
        stall: bool,
    }

    impl RecognizerFactory for FakeFactory {
        type Recognizer = FakeRecognizer;

        async fn create(&mut self, _params: &RecognitionParams) -> Result<FakeRecognizer> {
            self.counters.creates.fetch_add(1, Ordering::SeqCst);
            Ok(FakeRecognizer {
                counters: Arc::clone(&self.counters),
                script: Arc::clone(&self.script),
                stall: self.stall,
            })
        }
    }

    impl TextRecognizer for FakeRecognizer {
        async fn recognize(
            &mut self,
            _image: &BinaryImage,
            _params: &RecognitionParams,
        ) -> Result<RecognitionResult> {
            self.counters.recognitions.fetch_add(1, Ordering::SeqCst);
            if self.stall {
                std::future::pending::<()>().await;
            }
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Ok(text)) => Ok(RecognitionResult::from_text(&text, Some(90.0))),
                Some(Err(err)) => Err(err),
                None => Ok(RecognitionResult::from_text("", None)),
            }
        }

        fn terminate(&mut self) {
            self.counters.terminates.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct ScriptedPrompt {
        decisions: VecDeque<Decision>,
        seen: Vec<PendingConfirmation>,
    }

    impl ConfirmationPrompt for ScriptedPrompt {
        async fn confirm(&mut self, pending: &PendingConfirmation) -> Decision {
            self.seen.push(pending.clone());
            self.decisions.pop_front().unwrap_or(Decision::Reject)
        }
    }

    /// A user who never answers.
    struct SilentPrompt;

    impl ConfirmationPrompt for SilentPrompt {
        async fn confirm(&mut self, _pending: &PendingConfirmation) -> Decision {
            std::future::pending().await
        }
    }

    type TestSession = ScanSession<FakeCamera, FakeFactory>;

    fn session_with(
        lines: Vec<Result<String>>,
        deny: bool,
    ) -> (TestSession, Arc<Counters>) {
        build_session(lines, deny, false)
    }

    fn build_session(
        lines: Vec<Result<String>>,
        deny: bool,
        stall: bool,
    ) -> (TestSession, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let catalog = Arc::new(Catalog::new(["Red Brick Tile", "Blue Ceramic Tile"]));
        let camera = FakeCamera {
            counters: Arc::clone(&counters),
            deny,
        };
        let factory = FakeFactory {
            counters: Arc::clone(&counters),
            script: Arc::new(Mutex::new(lines.into())),
            stall,
        };
        let session = ScanSession::new(SessionConfig::default(), catalog, camera, factory).unwrap();
        (session, counters)
    }

    fn script(lines: &[&str]) -> Vec<Result<String>> {
        lines.iter().map(|line| Ok(line.to_string())).collect()
    }

    fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    // -- Start ------------------------------------------------------------------

    #[tokio::test]
    async fn start_acquires_stream_and_engine() {
        let (mut session, counters) = session_with(Vec::new(), false);
        session.start().await.unwrap();

        assert_eq!(session.state(), &SessionState::Capturing);
        assert!(session.has_stream() && session.has_engine());
        assert_eq!(Counters::get(&counters.opens), 1);
        assert_eq!(Counters::get(&counters.creates), 1);
    }

    #[tokio::test]
    async fn denied_camera_leaves_session_idle() {
        let (mut session, counters) = session_with(Vec::new(), true);
        let mut rx = session.subscribe();

        let err = session.start().await.unwrap_err();
        assert!(matches!(err, ScanError::DeviceUnavailable(_)));
        assert_eq!(session.state(), &SessionState::Idle);
        assert_eq!(Counters::get(&counters.creates), 0);

        let notices: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::Notice(msg) => Some(msg),
                _ => None,
            })
            .collect();
        assert!(notices[0].starts_with("Could not start scanner."));
        assert!(notices[0].contains("camera permissions"));
    }

    #[tokio::test]
    async fn invalid_config_never_builds_a_session() {
        let counters = Arc::new(Counters::default());
        let mut config = SessionConfig::default();
        config.matcher.threshold = 2.0;
        let result = ScanSession::new(
            config,
            Arc::new(Catalog::default()),
            FakeCamera {
                counters: Arc::clone(&counters),
                deny: false,
            },
            FakeFactory {
                counters,
                script: Arc::default(),
                stall: false,
            },
        );
        assert!(matches!(result, Err(ScanError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn lowered_text_gate_never_builds_a_session() {
        let counters = Arc::new(Counters::default());
        let config = SessionConfig {
            min_text_len: 1,
            ..Default::default()
        };
        let result = ScanSession::new(
            config,
            Arc::new(Catalog::new(["ab"])),
            FakeCamera {
                counters: Arc::clone(&counters),
                deny: false,
            },
            FakeFactory {
                counters,
                script: Arc::default(),
                stall: false,
            },
        );
        assert!(matches!(result, Err(ScanError::InvalidConfig(_))));
    }

    // -- Attempts ---------------------------------------------------------------

    #[tokio::test]
    async fn short_text_never_reaches_matcher() {
        let (mut session, _) = session_with(script(&["ab"]), false);
        session.start().await.unwrap();
        let mut rx = session.subscribe();

        let outcome = session.scan_frame().await.unwrap();
        assert_eq!(outcome, AttemptOutcome::NoText);
        assert_eq!(session.state(), &SessionState::Capturing);

        let events = drain(&mut rx);
        assert!(!events.iter().any(|e| matches!(
            e,
            SessionEvent::StateChanged {
                to: SessionState::Matching,
                ..
            }
        )));
        assert!(events.contains(&SessionEvent::Notice(TEXT_NOT_FOUND.into())));
    }

    #[tokio::test]
    async fn three_characters_is_still_too_short() {
        let (mut session, _) = session_with(script(&["  abc  \nmore text below"]), false);
        session.start().await.unwrap();
        assert_eq!(session.scan_frame().await.unwrap(), AttemptOutcome::NoText);
    }

    #[tokio::test]
    async fn misread_label_is_proposed_from_catalog() {
        let (mut session, _) = session_with(script(&["Red Brlck Tile"]), false);
        session.start().await.unwrap();

        let outcome = session.scan_frame().await.unwrap();
        let pending = match outcome {
            AttemptOutcome::Candidate(pending) => pending,
            other => panic!("expected a candidate, got {other:?}"),
        };
        assert_eq!(pending.raw_text, "Red Brlck Tile");
        assert_eq!(pending.proposed(), "Red Brick Tile");
        assert!(matches!(session.state(), SessionState::AwaitingConfirmation(_)));
    }

    #[tokio::test]
    async fn unrelated_label_awaits_confirmation_of_raw_text() {
        let (mut session, _) = session_with(script(&["Green Slate Tile"]), false);
        session.start().await.unwrap();

        let outcome = session.scan_frame().await.unwrap();
        let pending = match outcome {
            AttemptOutcome::Unmatched(pending) => pending,
            other => panic!("expected unmatched, got {other:?}"),
        };
        assert_eq!(pending.raw_text, "Green Slate Tile");
        assert!(pending.candidate.is_none());
        assert_eq!(session.pending().map(|p| p.proposed()), Some("Green Slate Tile"));
    }

    #[tokio::test]
    async fn recognition_failure_is_reported_and_retried() {
        let (mut session, counters) = session_with(
            vec![Err(ScanError::RecognitionFailed("model hiccup".into()))],
            false,
        );
        session.start().await.unwrap();
        let mut rx = session.subscribe();

        let outcome = session.scan_frame().await.unwrap();
        let human = match outcome {
            AttemptOutcome::Failed(human) => human,
            other => panic!("expected a transient failure, got {other:?}"),
        };
        assert_eq!(human.message, "Scan failed.");
        assert_eq!(session.state(), &SessionState::Capturing);
        assert_eq!(Counters::get(&counters.terminates), 0);

        let events = drain(&mut rx);
        assert!(events.contains(&SessionEvent::StateChanged {
            from: SessionState::Recognizing,
            to: SessionState::Failed,
        }));
        assert!(events.contains(&SessionEvent::Notice("Scan failed. Please try again.".into())));
    }

    #[tokio::test]
    async fn engine_loss_cancels_and_releases() {
        let (mut session, counters) = session_with(
            vec![Err(ScanError::RecognitionUnavailable("engine crashed".into()))],
            false,
        );
        session.start().await.unwrap();

        let err = session.scan_frame().await.unwrap_err();
        assert!(matches!(err, ScanError::RecognitionUnavailable(_)));
        assert_eq!(session.state(), &SessionState::Cancelled);
        assert_eq!(Counters::get(&counters.closes), 1);
        assert_eq!(Counters::get(&counters.terminates), 1);
    }

    #[tokio::test]
    async fn scanning_before_start_is_rejected() {
        let (mut session, counters) = session_with(Vec::new(), false);
        let err = session.scan_frame().await.unwrap_err();
        assert!(matches!(err, ScanError::InvalidState { operation: "scan_frame", .. }));
        assert_eq!(session.state(), &SessionState::Idle);
        assert_eq!(Counters::get(&counters.recognitions), 0);
    }

    #[tokio::test]
    async fn preview_shows_binary_roi_without_recognizing() {
        let (mut session, counters) = session_with(script(&["Red Brick Tile"]), false);
        session.start().await.unwrap();
        let mut rx = session.subscribe();

        let preview = session.preview_frame().await.unwrap();
        let roi = FrameExtractor::default().roi(200, 100).unwrap();
        assert_eq!(preview.dimensions(), (roi.width, roi.height));
        assert!(preview.as_raw().iter().all(|&v| v == 0 || v == 255));

        assert_eq!(Counters::get(&counters.recognitions), 0);
        assert_eq!(session.state(), &SessionState::Capturing);
        assert_eq!(session.attempts(), 0);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn preview_requires_a_running_session() {
        let (mut session, _) = session_with(Vec::new(), false);
        assert!(matches!(
            session.preview_frame().await,
            Err(ScanError::InvalidState { operation: "preview_frame", .. })
        ));
    }

    // -- Confirmation -------------------------------------------------------------

    #[tokio::test]
    async fn reject_keeps_stream_and_engine() {
        let (mut session, counters) =
            session_with(script(&["Red Brlck Tile", "Red Brick Tile"]), false);
        session.start().await.unwrap();
        session.scan_frame().await.unwrap();

        assert_eq!(session.resolve(Decision::Reject).unwrap(), Resolution::Retrying);
        assert_eq!(session.state(), &SessionState::Capturing);
        assert!(session.has_stream() && session.has_engine());

        // The next attempt reuses the same stream and engine.
        session.scan_frame().await.unwrap();
        assert_eq!(Counters::get(&counters.opens), 1);
        assert_eq!(Counters::get(&counters.creates), 1);
        assert_eq!(Counters::get(&counters.closes), 0);
        assert_eq!(Counters::get(&counters.terminates), 0);
    }

    #[tokio::test]
    async fn confirm_commits_catalog_text_and_releases() {
        let (mut session, counters) = session_with(script(&["Red Brlck Tile"]), false);
        session.start().await.unwrap();
        session.scan_frame().await.unwrap();

        let resolution = session.resolve(Decision::Confirm).unwrap();
        assert_eq!(resolution, Resolution::Committed("Red Brick Tile".into()));
        assert_eq!(session.accepted(), Some("Red Brick Tile"));
        assert!(!session.has_stream() && !session.has_engine());
        assert_eq!(Counters::get(&counters.closes), 1);
        assert_eq!(Counters::get(&counters.terminates), 1);

        // Stopping a committed session changes nothing.
        session.stop();
        assert_eq!(session.accepted(), Some("Red Brick Tile"));
        assert_eq!(Counters::get(&counters.closes), 1);
    }

    #[tokio::test]
    async fn confirm_unmatched_commits_raw_text() {
        let (mut session, _) = session_with(script(&["Green Slate Tile"]), false);
        session.start().await.unwrap();
        session.scan_frame().await.unwrap();

        let mut prompt = ScriptedPrompt {
            decisions: VecDeque::from([Decision::Confirm]),
            seen: Vec::new(),
        };
        let resolution = session.confirm_with(&mut prompt).await.unwrap();
        assert_eq!(resolution, Resolution::Committed("Green Slate Tile".into()));
        assert_eq!(prompt.seen.len(), 1);
    }

    #[tokio::test]
    async fn resolve_without_proposal_is_rejected() {
        let (mut session, _) = session_with(Vec::new(), false);
        session.start().await.unwrap();
        assert!(matches!(
            session.resolve(Decision::Confirm),
            Err(ScanError::InvalidState { .. })
        ));
    }

    // -- Stop ---------------------------------------------------------------------

    #[tokio::test]
    async fn stop_is_idempotent() {
        let (mut session, counters) = session_with(Vec::new(), false);
        session.start().await.unwrap();

        session.stop();
        session.stop();
        assert_eq!(session.state(), &SessionState::Cancelled);
        assert_eq!(Counters::get(&counters.closes), 1);
        assert_eq!(Counters::get(&counters.terminates), 1);

        drop(session);
        assert_eq!(Counters::get(&counters.closes), 1);
    }

    #[tokio::test]
    async fn stop_from_idle_cancels() {
        let (mut session, counters) = session_with(Vec::new(), false);
        session.stop();
        assert_eq!(session.state(), &SessionState::Cancelled);
        assert_eq!(Counters::get(&counters.closes), 0);
        assert!(matches!(
            session.start().await,
            Err(ScanError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn dropping_a_running_session_releases_resources() {
        let (mut session, counters) = session_with(Vec::new(), false);
        session.start().await.unwrap();
        drop(session);
        assert_eq!(Counters::get(&counters.closes), 1);
        assert_eq!(Counters::get(&counters.terminates), 1);
    }

    // -- Run loop -----------------------------------------------------------------

    #[tokio::test]
    async fn run_retries_until_confirmed() {
        let (mut session, counters) =
            session_with(script(&["ab", "Blue Ceramc Tile", "Red Brlck Tile"]), false);
        let mut prompt = ScriptedPrompt {
            decisions: VecDeque::from([Decision::Reject, Decision::Confirm]),
            seen: Vec::new(),
        };

        let accepted = session
            .run(&mut prompt, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(accepted.as_deref(), Some("Red Brick Tile"));
        assert_eq!(session.attempts(), 3);
        assert_eq!(prompt.seen.len(), 2);
        assert_eq!(prompt.seen[0].proposed(), "Blue Ceramic Tile");
        assert_eq!(Counters::get(&counters.opens), 1);
        assert_eq!(Counters::get(&counters.terminates), 1);
    }

    #[tokio::test]
    async fn run_stops_when_cancelled_during_confirmation() {
        let (mut session, counters) = session_with(script(&["Red Brlck Tile"]), false);
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let accepted = session.run(&mut SilentPrompt, token).await.unwrap();
        assert_eq!(accepted, None);
        assert_eq!(session.state(), &SessionState::Cancelled);
        assert_eq!(Counters::get(&counters.closes), 1);
        assert_eq!(Counters::get(&counters.terminates), 1);
    }

    #[tokio::test]
    async fn run_stops_when_cancelled_during_recognition() {
        let (mut session, counters) = build_session(script(&["Red Brick Tile"]), false, true);
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let mut prompt = ScriptedPrompt {
            decisions: VecDeque::from([Decision::Confirm]),
            seen: Vec::new(),
        };
        let accepted = session.run(&mut prompt, token).await.unwrap();

        assert_eq!(accepted, None);
        assert_eq!(session.state(), &SessionState::Cancelled);
        assert_eq!(Counters::get(&counters.recognitions), 1);
        assert!(prompt.seen.is_empty());
        assert_eq!(Counters::get(&counters.closes), 1);
        assert_eq!(Counters::get(&counters.terminates), 1);
    }

    #[tokio::test]
    async fn run_with_cancelled_token_never_starts() {
        let (mut session, counters) = session_with(Vec::new(), false);
        let token = CancellationToken::new();
        token.cancel();

        assert_eq!(session.run(&mut SilentPrompt, token).await.unwrap(), None);
        assert_eq!(Counters::get(&counters.opens), 0);
    }

    #[tokio::test]
    async fn run_surfaces_denied_camera() {
        let (mut session, _) = session_with(Vec::new(), true);
        let result = session.run(&mut SilentPrompt, CancellationToken::new()).await;
        assert!(matches!(result, Err(ScanError::DeviceUnavailable(_))));
        assert_eq!(session.state(), &SessionState::Idle);
    }
}
