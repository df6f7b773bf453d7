//! Scripted portal for exercising the handshake without a desktop session.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::error::PortalError;
use crate::request::{PortalCall, PortalStep, ResponseResults, ResponseSignal, StreamEntry};
use crate::{PortalBus, PortalResult};

const REQUEST_PREFIX: &str = "/org/freedesktop/portal/desktop/request/1_42";

/// A portal bus that answers from a script and records every call.
///
/// By default each call is answered with code 0. Builder methods inject
/// denials, call failures, missing responses and stale signals.
#[derive(Debug)]
pub struct MockPortalBus {
    streams: Vec<u32>,
    session_handle: Option<String>,
    denials: HashMap<PortalStep, u32>,
    failing_call: Option<PortalStep>,
    silent: Option<PortalStep>,
    stale_signals: bool,
    calls: Vec<PortalCall>,
    queue: VecDeque<(ResponseSignal, bool)>,
    last_path: Option<String>,
    stale_delivered: usize,
}

impl MockPortalBus {
    /// Session handle returned by `CreateSession`.
    pub const SESSION_HANDLE: &'static str = "/org/freedesktop/portal/desktop/session/1_42/wcap";

    /// A portal that grants every step and starts the given node ids.
    pub fn granting(streams: &[u32]) -> Self {
        Self {
            streams: streams.to_vec(),
            session_handle: Some(Self::SESSION_HANDLE.to_string()),
            denials: HashMap::new(),
            failing_call: None,
            silent: None,
            stale_signals: false,
            calls: Vec::new(),
            queue: VecDeque::new(),
            last_path: None,
            stale_delivered: 0,
        }
    }

    /// Answer `step` with a non-zero response code.
    pub fn denying_at(mut self, step: PortalStep, code: u32) -> Self {
        self.denials.insert(step, code);
        self
    }

    /// Fail the method call of `step` itself.
    pub fn failing_call_at(mut self, step: PortalStep) -> Self {
        self.failing_call = Some(step);
        self
    }

    /// Never send the response for `step`.
    pub fn silent_at(mut self, step: PortalStep) -> Self {
        self.silent = Some(step);
        self
    }

    /// Omit `session_handle` from the `CreateSession` results.
    pub fn without_session_handle(mut self) -> Self {
        self.session_handle = None;
        self
    }

    /// Precede every response with two signals for other requests.
    pub fn with_stale_signals(mut self) -> Self {
        self.stale_signals = true;
        self
    }

    /// Calls issued so far, in order.
    pub fn calls(&self) -> &[PortalCall] {
        &self.calls
    }

    /// Number of stale signals handed out by `next_response`.
    pub fn stale_delivered(&self) -> usize {
        self.stale_delivered
    }

    fn results_for(&self, step: PortalStep) -> ResponseResults {
        match step {
            PortalStep::CreateSession => ResponseResults {
                session_handle: self.session_handle.clone(),
                streams: Vec::new(),
            },
            PortalStep::SelectSources => ResponseResults::default(),
            PortalStep::Start => ResponseResults {
                session_handle: None,
                streams: self
                    .streams
                    .iter()
                    .map(|&node_id| StreamEntry { node_id })
                    .collect(),
            },
        }
    }

    fn queue_stale(&mut self) {
        let late_path = self
            .last_path
            .clone()
            .unwrap_or_else(|| format!("{REQUEST_PREFIX}/previous"));
        let late = ResponseSignal {
            path: late_path,
            code: 0,
            results: ResponseResults {
                session_handle: Some("/bogus/session".to_string()),
                streams: vec![StreamEntry { node_id: 777 }],
            },
        };
        let unrelated = ResponseSignal {
            path: "/org/freedesktop/portal/desktop/request/1_99/other".to_string(),
            code: 2,
            results: ResponseResults::default(),
        };
        self.queue.push_back((late, true));
        self.queue.push_back((unrelated, true));
    }
}

impl PortalBus for MockPortalBus {
    fn call(&mut self, call: &PortalCall) -> PortalResult<String> {
        let step = call.step();
        self.calls.push(call.clone());

        if self.failing_call == Some(step) {
            return Err(PortalError::Transport(format!("{step} call rejected")));
        }

        let path = format!("{REQUEST_PREFIX}/mock_{}", self.calls.len());
        if self.stale_signals {
            self.queue_stale();
        }
        if self.silent != Some(step) {
            let signal = ResponseSignal {
                path: path.clone(),
                code: self.denials.get(&step).copied().unwrap_or(0),
                results: self.results_for(step),
            };
            self.queue.push_back((signal, false));
        }

        self.last_path = Some(path.clone());
        Ok(path)
    }

    fn next_response(
        &mut self,
        _timeout: Option<Duration>,
    ) -> PortalResult<Option<ResponseSignal>> {
        Ok(self.queue.pop_front().map(|(signal, stale)| {
            if stale {
                self.stale_delivered += 1;
            }
            signal
        }))
    }
}
