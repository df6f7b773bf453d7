//! Capture session state machine.

use tracing::{debug, info, instrument, warn};

use wcap_types::{CaptureType, SessionState};

use crate::error::CaptureError;
use crate::extract::FrameExtractor;
use crate::frame::{Frame, RawBuffer};
use crate::stream::VideoStream;
use crate::CaptureResult;

/// Owns one stream and turns its buffers into frames.
///
/// `Idle → Opening → Streaming → Stopped`. A failed open returns to `Idle`
/// and may be retried; `Stopped` is final.
pub struct CaptureSession<S: VideoStream> {
    stream: S,
    state: SessionState,
    ended: bool,
    extractor: FrameExtractor,
    sequence: u64,
}

impl<S: VideoStream> CaptureSession<S> {
    /// Create an idle session around `stream`.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            state: SessionState::Idle,
            ended: false,
            extractor: FrameExtractor::new(),
            sequence: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the upstream source has ended.
    pub fn has_ended(&self) -> bool {
        self.ended
    }

    pub fn extractor(&self) -> &FrameExtractor {
        &self.extractor
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    /// Start streaming from `node_id`.
    #[instrument(skip(self))]
    pub fn open(&mut self, node_id: u32) -> CaptureResult<()> {
        match self.state {
            SessionState::Idle => {}
            SessionState::Opening | SessionState::Streaming => {
                return Err(CaptureError::AlreadyStarted)
            }
            SessionState::Stopped => return Err(CaptureError::Stopped),
        }

        self.state = SessionState::Opening;
        match self.stream.open(node_id) {
            Ok(()) => {
                self.state = SessionState::Streaming;
                info!("Capture stream started");
                Ok(())
            }
            Err(e) => {
                warn!("Failed to open capture stream: {}", e);
                self.stream.close();
                self.state = SessionState::Idle;
                Err(e)
            }
        }
    }

    /// Pull the next buffer and hand it to `f`.
    pub fn pull_with<R>(&mut self, f: impl FnOnce(&RawBuffer<'_>) -> R) -> CaptureResult<R> {
        self.check_pullable()?;
        let result = self.stream.pull_with(f);
        self.note_end(result)
    }

    /// Pull the next buffer and extract it as an owned frame.
    pub fn next_frame(&mut self, capture_type: CaptureType) -> CaptureResult<Frame> {
        self.check_pullable()?;

        let sequence = self.sequence + 1;
        let extractor = &mut self.extractor;
        let result = self
            .stream
            .pull_with(|raw| {
                extractor
                    .extract(raw, capture_type)
                    .map(|view| view.to_frame(sequence))
            })
            .and_then(|frame| frame);

        let frame = self.note_end(result)?;
        self.sequence = sequence;
        Ok(frame)
    }

    /// Stop the stream. Only affects pulls that have not started yet.
    #[instrument(skip(self))]
    pub fn stop(&mut self) {
        if !self.state.can_stop() {
            return;
        }
        self.stream.close();
        self.state = SessionState::Stopped;
        info!(frames = self.sequence, "Capture stream stopped");
    }

    fn check_pullable(&self) -> CaptureResult<()> {
        if !self.state.is_streaming() {
            return Err(CaptureError::NotStarted);
        }
        if self.ended {
            return Err(CaptureError::StreamEnded);
        }
        Ok(())
    }

    fn note_end<R>(&mut self, result: CaptureResult<R>) -> CaptureResult<R> {
        if matches!(result, Err(CaptureError::StreamEnded)) && !self.ended {
            debug!("Upstream source ended");
            self.ended = true;
        }
        result
    }
}

impl<S: VideoStream> Drop for CaptureSession<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::CropRect;
    use crate::mock::{MockBuffer, MockVideoStream};

    fn session(buffers: Vec<MockBuffer>) -> CaptureSession<MockVideoStream> {
        CaptureSession::new(MockVideoStream::new(buffers))
    }

    #[test]
    fn test_pull_before_open_is_not_started() {
        let mut session = session(vec![MockBuffer::blank(4, 4)]);
        let err = session.next_frame(CaptureType::Screen).unwrap_err();
        assert!(matches!(err, CaptureError::NotStarted));
    }

    #[test]
    fn test_open_then_pull() {
        let mut session = session(vec![MockBuffer::blank(8, 6), MockBuffer::blank(8, 6)]);
        session.open(7).unwrap();
        assert_eq!(session.state(), SessionState::Streaming);
        assert_eq!(session.stream().opened_node(), Some(7));

        let first = session.next_frame(CaptureType::Screen).unwrap();
        let second = session.next_frame(CaptureType::Screen).unwrap();
        assert_eq!((first.width, first.height), (8, 6));
        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
    }

    #[test]
    fn test_failed_open_returns_to_idle() {
        let stream = MockVideoStream::new(vec![MockBuffer::blank(4, 4)]).failing_opens(1);
        let mut session = CaptureSession::new(stream);

        let err = session.open(3).unwrap_err();
        assert!(matches!(err, CaptureError::PipelineConstruction(_)));
        assert_eq!(session.state(), SessionState::Idle);

        session.open(3).unwrap();
        assert_eq!(session.state(), SessionState::Streaming);
    }

    #[test]
    fn test_open_twice_is_rejected() {
        let mut session = session(vec![]);
        session.open(1).unwrap();
        assert!(matches!(session.open(1), Err(CaptureError::AlreadyStarted)));
    }

    #[test]
    fn test_stream_end_is_sticky() {
        let mut session = session(vec![MockBuffer::blank(2, 2)]);
        session.open(1).unwrap();
        session.next_frame(CaptureType::Screen).unwrap();

        for _ in 0..3 {
            let err = session.next_frame(CaptureType::Screen).unwrap_err();
            assert!(matches!(err, CaptureError::StreamEnded));
        }
        assert!(session.has_ended());
        assert_eq!(session.stream().pulls(), 2);
    }

    #[test]
    fn test_stop_is_idempotent_and_final() {
        let mut session = session(vec![MockBuffer::blank(2, 2)]);
        session.stop();
        assert_eq!(session.state(), SessionState::Idle);

        session.open(1).unwrap();
        session.stop();
        session.stop();
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.stream().closes(), 1);

        assert!(matches!(
            session.next_frame(CaptureType::Screen),
            Err(CaptureError::NotStarted)
        ));
        assert!(matches!(session.open(1), Err(CaptureError::Stopped)));
    }

    #[test]
    fn test_window_frames_are_cropped() {
        let buffer = MockBuffer::blank(640, 480).fill(CropRect::new(20, 30, 100, 50), [1, 2, 3]);
        let mut session = session(vec![buffer]);
        session.open(1).unwrap();

        let frame = session.next_frame(CaptureType::Window).unwrap();
        assert_eq!((frame.width, frame.height), (100, 50));
        assert_eq!(frame.data.len(), 100 * 50 * 3);
        assert!(frame.data.chunks_exact(3).all(|px| px == [1, 2, 3]));
    }

    #[test]
    fn test_conversion_error_does_not_end_stream() {
        let mut session = session(vec![MockBuffer::malformed(), MockBuffer::blank(2, 2)]);
        session.open(1).unwrap();

        let err = session.next_frame(CaptureType::Screen).unwrap_err();
        assert!(matches!(err, CaptureError::FrameConversion(_)));
        assert!(!session.has_ended());

        let frame = session.next_frame(CaptureType::Screen).unwrap();
        assert_eq!(frame.sequence, 1);
    }

    #[test]
    fn test_pull_with_hands_out_raw_buffer() {
        let mut session = session(vec![MockBuffer::blank(5, 3)]);
        session.open(1).unwrap();
        let geometry = session
            .pull_with(|raw| (raw.width(), raw.height(), raw.stride()))
            .unwrap();
        assert_eq!(geometry, (5, 3, MockBuffer::stride_for(5)));
    }
}
