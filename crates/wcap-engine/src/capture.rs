//! Screen capture facade.

use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use wcap_capture::{CaptureSession, Frame, VideoStream};
use wcap_portal::{CaptureSource, PortalBus, PortalNegotiator, PortalResult};
use wcap_types::{CaptureConfig, CaptureStats, CaptureType, SessionState};

use crate::error::EngineError;
use crate::metrics::MetricsCollector;
use crate::EngineResult;

type Connect<B> = Box<dyn FnMut() -> PortalResult<B>>;
type MakeStream<S> = Box<dyn FnMut(&CaptureConfig) -> S>;

/// Select a screen or window through the desktop portal and pull frames
/// from it.
///
/// All calls block the calling thread. The portal connection is kept for
/// as long as the source is streaming; the compositor ends the stream when
/// it closes.
pub struct ScreenCapture<B: PortalBus, S: VideoStream> {
    config: CaptureConfig,
    connect: Connect<B>,
    make_stream: MakeStream<S>,
    capture_type: CaptureType,
    negotiator: Option<PortalNegotiator<B>>,
    source: Option<CaptureSource>,
    session: Option<CaptureSession<S>>,
    metrics: MetricsCollector,
}

impl<B: PortalBus, S: VideoStream> ScreenCapture<B, S> {
    /// Create a facade over custom portal and stream backends.
    ///
    /// `connect` runs once per source selection; `make_stream` once per
    /// successful negotiation.
    pub fn with_backends(
        config: CaptureConfig,
        connect: impl FnMut() -> PortalResult<B> + 'static,
        make_stream: impl FnMut(&CaptureConfig) -> S + 'static,
    ) -> Self {
        Self {
            config,
            connect: Box::new(connect),
            make_stream: Box::new(make_stream),
            capture_type: CaptureType::default(),
            negotiator: None,
            source: None,
            session: None,
            metrics: MetricsCollector::new(),
        }
    }

    /// Negotiate a source of `capture_type` and start streaming it.
    ///
    /// Any previous source is stopped first.
    #[instrument(name = "select_source", skip(self), fields(capture_type = capture_type.name()))]
    pub fn try_select_source(&mut self, capture_type: CaptureType) -> EngineResult<CaptureSource> {
        self.stop();
        self.session = None;
        self.source = None;
        self.capture_type = capture_type;

        let bus = (self.connect)()?;
        let mut negotiator = PortalNegotiator::new(bus, &self.config);
        let source = negotiator.negotiate(capture_type)?;

        let mut session = CaptureSession::new((self.make_stream)(&self.config));
        session.open(source.node_id())?;

        info!(%source, "Capture source ready");
        self.negotiator = Some(negotiator);
        self.source = Some(source);
        self.session = Some(session);
        self.metrics.start();
        Ok(source)
    }

    /// Like [`Self::try_select_source`], reporting only success.
    pub fn select_source(&mut self, capture_type: CaptureType) -> bool {
        match self.try_select_source(capture_type) {
            Ok(_) => true,
            Err(e) => {
                warn!("Source selection failed: {}", e);
                false
            }
        }
    }

    /// Block until the next frame is available.
    pub fn next_frame(&mut self) -> EngineResult<Frame> {
        let session = self.session.as_mut().ok_or(EngineError::NoSourceSelected)?;

        let started = Instant::now();
        match session.next_frame(self.capture_type) {
            Ok(frame) => {
                self.metrics.record_frame(frame.decision, started.elapsed());
                Ok(frame)
            }
            Err(e) => {
                self.metrics.record_empty_pull();
                Err(e.into())
            }
        }
    }

    /// Like [`Self::next_frame`], returning an empty frame on any failure.
    pub fn get_frame(&mut self) -> Frame {
        self.next_frame().unwrap_or_else(|e| {
            debug!("No frame: {}", e);
            Frame::empty()
        })
    }

    /// Stop streaming and release the portal session. Safe to call repeatedly.
    #[instrument(name = "capture_stop", skip(self))]
    pub fn stop(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.stop();
        }
        if self.negotiator.take().is_some() {
            debug!("Portal connection released");
            self.metrics.stop();
        }
    }

    /// Kind of source requested by the last selection.
    pub fn capture_type(&self) -> CaptureType {
        self.capture_type
    }

    /// Source resolved by the last successful selection.
    pub fn source(&self) -> Option<CaptureSource> {
        self.source
    }

    /// State of the current capture session.
    pub fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map_or(SessionState::Idle, CaptureSession::state)
    }

    /// Statistics for the current source.
    pub fn stats(&self) -> CaptureStats {
        let (dropped, scratch) = self.session.as_ref().map_or((0, 0), |session| {
            (
                session.stream().dropped_buffers(),
                session.extractor().capacity(),
            )
        });
        self.metrics.snapshot(dropped, scratch)
    }

    /// The portal backend of the active source.
    pub fn portal(&self) -> Option<&B> {
        self.negotiator.as_ref().map(PortalNegotiator::bus)
    }
}

impl<B: PortalBus, S: VideoStream> Drop for ScreenCapture<B, S> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::atomic::Ordering;

    use wcap_capture::mock::{MockBuffer, MockVideoStream};
    use wcap_capture::{CropDecision, CropRect};
    use wcap_portal::mock::MockPortalBus;
    use wcap_portal::{PortalError, PortalStep};

    fn config() -> CaptureConfig {
        CaptureConfig {
            negotiation_timeout_secs: Some(1),
            ..Default::default()
        }
    }

    fn window_buffer() -> MockBuffer {
        MockBuffer::blank(640, 480).fill(CropRect::new(20, 30, 100, 50), [10, 20, 30])
    }

    /// Facade whose stream factory counts how often it is called.
    fn capture(
        bus: impl Fn() -> MockPortalBus + 'static,
        buffers: Vec<MockBuffer>,
    ) -> (ScreenCapture<MockPortalBus, MockVideoStream>, Rc<Cell<usize>>) {
        let streams = Rc::new(Cell::new(0));
        let counter = Rc::clone(&streams);
        let capture = ScreenCapture::with_backends(
            config(),
            move || Ok(bus()),
            move |_| {
                counter.set(counter.get() + 1);
                MockVideoStream::new(buffers.clone())
            },
        );
        (capture, streams)
    }

    #[test]
    fn test_window_capture_yields_content() {
        let (mut capture, _) = capture(|| MockPortalBus::granting(&[57]), vec![window_buffer()]);
        assert!(capture.select_source(CaptureType::Window));
        assert_eq!(capture.state(), SessionState::Streaming);
        assert_eq!(capture.source().map(|s| s.node_id()), Some(57));

        let frame = capture.get_frame();
        assert_eq!((frame.width, frame.height), (100, 50));
        assert_eq!(frame.data.len(), 100 * 50 * 3);
        assert_eq!(frame.decision, CropDecision::Detected);
    }

    #[test]
    fn test_screen_capture_is_full_frame() {
        let (mut capture, _) = capture(|| MockPortalBus::granting(&[57]), vec![window_buffer()]);
        assert!(capture.select_source(CaptureType::Screen));
        let frame = capture.get_frame();
        assert_eq!((frame.width, frame.height), (640, 480));
    }

    #[test]
    fn test_denial_at_any_step_builds_no_stream() {
        for step in [
            PortalStep::CreateSession,
            PortalStep::SelectSources,
            PortalStep::Start,
        ] {
            let (mut capture, streams) = capture(
                move || MockPortalBus::granting(&[57]).denying_at(step, 1),
                vec![window_buffer()],
            );
            assert!(!capture.select_source(CaptureType::Any));
            assert!(capture.get_frame().is_empty());
            assert_eq!(streams.get(), 0);
            assert_eq!(capture.state(), SessionState::Idle);
        }
    }

    #[test]
    fn test_denial_is_reported() {
        let (mut capture, _) = capture(
            || MockPortalBus::granting(&[57]).denying_at(PortalStep::SelectSources, 1),
            vec![],
        );
        let err = capture.try_select_source(CaptureType::Window).unwrap_err();
        assert!(err.is_denied());
    }

    #[test]
    fn test_unreachable_portal() {
        let mut capture = ScreenCapture::<MockPortalBus, MockVideoStream>::with_backends(
            config(),
            || Err(PortalError::Transport("no session bus".to_string())),
            |_| MockVideoStream::default(),
        );
        assert!(!capture.select_source(CaptureType::Screen));
        assert!(matches!(
            capture.next_frame(),
            Err(EngineError::NoSourceSelected)
        ));
    }

    #[test]
    fn test_pipeline_failure_is_reported() {
        let opens = Rc::new(Cell::new(None));
        let seen = Rc::clone(&opens);
        let mut capture = ScreenCapture::with_backends(
            config(),
            || Ok(MockPortalBus::granting(&[57])),
            move |_| {
                let stream = MockVideoStream::default().failing_opens(1);
                seen.set(Some(stream.open_attempts()));
                stream
            },
        );

        let err = capture.try_select_source(CaptureType::Screen).unwrap_err();
        assert!(matches!(err, EngineError::Capture(_)));
        assert!(capture.portal().is_none());
        let attempts = opens.take().unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_frames_before_selection_are_empty() {
        let (mut capture, _) = capture(|| MockPortalBus::granting(&[57]), vec![]);
        assert!(capture.get_frame().is_empty());
        assert_eq!(capture.state(), SessionState::Idle);
    }

    #[test]
    fn test_stream_end_yields_empty_frames() {
        let (mut capture, _) = capture(|| MockPortalBus::granting(&[57]), vec![window_buffer()]);
        assert!(capture.select_source(CaptureType::Window));
        assert!(!capture.get_frame().is_empty());

        assert!(capture.get_frame().is_empty());
        let err = capture.next_frame().unwrap_err();
        assert!(err.is_stream_ended());

        let stats = capture.stats();
        assert_eq!(stats.frames, 1);
        assert_eq!(stats.empty_pulls, 2);
        assert_eq!(stats.scratch_bytes, 100 * 50 * 3);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut capture, _) = capture(
            || MockPortalBus::granting(&[57]),
            vec![window_buffer(), window_buffer()],
        );
        assert!(capture.select_source(CaptureType::Window));
        assert!(capture.portal().is_some());

        capture.stop();
        capture.stop();
        assert_eq!(capture.state(), SessionState::Stopped);
        assert!(capture.portal().is_none());
        assert!(capture.get_frame().is_empty());
    }

    #[test]
    fn test_reselect_after_stop() {
        let (mut capture, streams) = capture(|| MockPortalBus::granting(&[57]), vec![window_buffer()]);
        assert!(capture.select_source(CaptureType::Window));
        capture.stop();

        assert!(capture.select_source(CaptureType::Screen));
        assert_eq!(streams.get(), 2);
        assert_eq!(capture.capture_type(), CaptureType::Screen);
        assert_eq!(capture.state(), SessionState::Streaming);
        assert_eq!(capture.get_frame().width, 640);
    }

    #[test]
    fn test_portal_kept_while_streaming() {
        let (mut capture, _) = capture(|| MockPortalBus::granting(&[57]), vec![]);
        assert!(capture.select_source(CaptureType::Window));
        let calls = capture.portal().map(|bus| bus.calls().len());
        assert_eq!(calls, Some(3));
    }
}
