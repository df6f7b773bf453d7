//! ScreenCast handshake driver.

use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, trace};

use wcap_types::{CaptureConfig, CaptureType, CursorMode};

use crate::error::PortalError;
use crate::request::{PendingRequest, PortalCall, PortalStep, RequestTokens, ResponseResults};
use crate::source::CaptureSource;
use crate::{PortalBus, PortalResult};

/// Drives the `CreateSession` → `SelectSources` → `Start` handshake.
///
/// Steps run strictly in order; each one blocks until the response for its
/// own request path arrives. Any failure ends the negotiation and nothing
/// already completed is retried.
pub struct PortalNegotiator<B> {
    bus: B,
    timeout: Option<Duration>,
    cursor_mode: CursorMode,
}

impl<B: PortalBus> PortalNegotiator<B> {
    /// Create a negotiator over `bus`.
    pub fn new(bus: B, config: &CaptureConfig) -> Self {
        Self {
            bus,
            timeout: config.negotiation_timeout(),
            cursor_mode: config.cursor_mode,
        }
    }

    /// Borrow the underlying bus.
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Run the full handshake and resolve the selected stream.
    #[instrument(name = "portal_negotiate", skip(self), fields(capture_type = capture_type.name()))]
    pub fn negotiate(&mut self, capture_type: CaptureType) -> PortalResult<CaptureSource> {
        let tokens = RequestTokens::next();
        info!("Requesting screen cast session");

        let created = self.round_trip(PortalCall::create_session(&tokens))?;
        let session_handle = created.session_handle.ok_or(PortalError::MissingResult {
            step: PortalStep::CreateSession,
            key: "session_handle",
        })?;
        debug!(%session_handle, "Session created");

        self.round_trip(PortalCall::select_sources(
            &tokens,
            &session_handle,
            capture_type,
            self.cursor_mode,
        ))?;
        debug!("Sources selected");

        let started = self.round_trip(PortalCall::start(&tokens, &session_handle))?;
        let stream = started
            .streams
            .into_iter()
            .next()
            .ok_or(PortalError::NoStreams)?;
        let source = CaptureSource::try_from(stream)?;

        info!(node_id = source.node_id(), "Screen cast source resolved");
        Ok(source)
    }

    /// Issue one call and wait for its correlated response.
    fn round_trip(&mut self, call: PortalCall) -> PortalResult<ResponseResults> {
        let step = call.step();
        let path = self.bus.call(&call)?;
        debug!(%step, %path, "Portal request issued");

        let mut pending = PendingRequest::new(step, path);
        self.await_response(&mut pending)?;
        pending.into_results()
    }

    /// Consume signals until one completes `pending` or the deadline passes.
    fn await_response(&mut self, pending: &mut PendingRequest) -> PortalResult<()> {
        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);

        while !pending.is_complete() {
            let remaining = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(PortalError::Timeout {
                            step: pending.step(),
                        });
                    }
                    Some(deadline - now)
                }
                None => None,
            };

            let Some(signal) = self.bus.next_response(remaining)? else {
                return Err(PortalError::Timeout {
                    step: pending.step(),
                });
            };

            let path = signal.path.clone();
            if !pending.offer(signal) {
                trace!(%path, expected = pending.path(), "Discarding unrelated response");
            }
        }

        Ok(())
    }
}
