//! Portal requests, their options and the responses they resolve to.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use wcap_types::{CaptureType, CursorMode};

use crate::error::PortalError;
use crate::PortalResult;

/// Negotiations started by this process, used to keep tokens unique.
static NEGOTIATION_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// The three ScreenCast handshake steps, in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortalStep {
    CreateSession,
    SelectSources,
    Start,
}

impl PortalStep {
    /// D-Bus method name of this step.
    pub fn method_name(self) -> &'static str {
        match self {
            Self::CreateSession => "CreateSession",
            Self::SelectSources => "SelectSources",
            Self::Start => "Start",
        }
    }

    /// 1-based position of this step in the handshake.
    pub fn index(self) -> u32 {
        match self {
            Self::CreateSession => 1,
            Self::SelectSources => 2,
            Self::Start => 3,
        }
    }
}

impl fmt::Display for PortalStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}

/// A single `a{sv}` option value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Str(String),
    Bool(bool),
    U32(u32),
}

/// Options dictionary passed with a portal call.
pub type PortalOptions = BTreeMap<&'static str, OptionValue>;

/// Tokens naming the request and session objects of one negotiation.
///
/// Built from the process id and a process-wide negotiation counter so two
/// captures in the same process never collide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTokens {
    base: String,
}

impl RequestTokens {
    /// Allocate tokens for a new negotiation.
    pub fn next() -> Self {
        let sequence = NEGOTIATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        Self {
            base: format!("wcap_{}_{}", std::process::id(), sequence),
        }
    }

    /// `handle_token` for the given step.
    pub fn handle_token(&self, step: PortalStep) -> String {
        format!("{}_{}", self.base, step.index())
    }

    /// `session_handle_token` for `CreateSession`.
    pub fn session_handle_token(&self) -> String {
        format!("{}_s", self.base)
    }
}

/// A ScreenCast method call with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortalCall {
    CreateSession {
        options: PortalOptions,
    },
    SelectSources {
        session_handle: String,
        options: PortalOptions,
    },
    Start {
        session_handle: String,
        parent_window: String,
        options: PortalOptions,
    },
}

impl PortalCall {
    /// Build the `CreateSession` call.
    pub fn create_session(tokens: &RequestTokens) -> Self {
        let mut options = PortalOptions::new();
        options.insert(
            "handle_token",
            OptionValue::Str(tokens.handle_token(PortalStep::CreateSession)),
        );
        options.insert(
            "session_handle_token",
            OptionValue::Str(tokens.session_handle_token()),
        );
        Self::CreateSession { options }
    }

    /// Build the `SelectSources` call for a single source of `capture_type`.
    pub fn select_sources(
        tokens: &RequestTokens,
        session_handle: &str,
        capture_type: CaptureType,
        cursor_mode: CursorMode,
    ) -> Self {
        let mut options = PortalOptions::new();
        options.insert(
            "handle_token",
            OptionValue::Str(tokens.handle_token(PortalStep::SelectSources)),
        );
        options.insert("multiple", OptionValue::Bool(false));
        options.insert("types", OptionValue::U32(capture_type.source_mask()));
        options.insert("cursor_mode", OptionValue::U32(cursor_mode.portal_value()));
        Self::SelectSources {
            session_handle: session_handle.to_string(),
            options,
        }
    }

    /// Build the `Start` call with no parent window.
    pub fn start(tokens: &RequestTokens, session_handle: &str) -> Self {
        let mut options = PortalOptions::new();
        options.insert(
            "handle_token",
            OptionValue::Str(tokens.handle_token(PortalStep::Start)),
        );
        Self::Start {
            session_handle: session_handle.to_string(),
            parent_window: String::new(),
            options,
        }
    }

    /// The handshake step this call performs.
    pub fn step(&self) -> PortalStep {
        match self {
            Self::CreateSession { .. } => PortalStep::CreateSession,
            Self::SelectSources { .. } => PortalStep::SelectSources,
            Self::Start { .. } => PortalStep::Start,
        }
    }

    /// The options dictionary of this call.
    pub fn options(&self) -> &PortalOptions {
        match self {
            Self::CreateSession { options }
            | Self::SelectSources { options, .. }
            | Self::Start { options, .. } => options,
        }
    }
}

/// One entry of the `streams` result of `Start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamEntry {
    /// PipeWire node id of the stream.
    pub node_id: u32,
}

/// The parts of a response's results map this crate understands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseResults {
    /// `session_handle` from `CreateSession`.
    pub session_handle: Option<String>,

    /// `streams` from `Start`, in portal order.
    pub streams: Vec<StreamEntry>,
}

/// A `Response` signal observed on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSignal {
    /// Object path of the request the signal belongs to.
    pub path: String,

    /// Response code (0 = success, 1 = cancelled, 2 = other).
    pub code: u32,

    /// Parsed results map.
    pub results: ResponseResults,
}

/// The single in-flight request of a negotiation.
#[derive(Debug)]
pub struct PendingRequest {
    step: PortalStep,
    path: String,
    response: Option<ResponseSignal>,
}

impl PendingRequest {
    /// Track a request that was just issued at `path`.
    pub fn new(step: PortalStep, path: String) -> Self {
        Self {
            step,
            path,
            response: None,
        }
    }

    /// The step this request performs.
    pub fn step(&self) -> PortalStep {
        self.step
    }

    /// Correlation path of the request.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the matching response has been observed.
    pub fn is_complete(&self) -> bool {
        self.response.is_some()
    }

    /// Offer a signal to this request.
    ///
    /// Returns false and leaves the request untouched if the signal belongs
    /// to another path or the request already completed.
    pub fn offer(&mut self, signal: ResponseSignal) -> bool {
        if self.response.is_some() || signal.path != self.path {
            return false;
        }
        self.response = Some(signal);
        true
    }

    /// Resolve into the response results, failing on a non-zero code.
    pub fn into_results(self) -> PortalResult<ResponseResults> {
        match self.response {
            None => Err(PortalError::Timeout { step: self.step }),
            Some(signal) if signal.code != 0 => Err(PortalError::Denied {
                step: self.step,
                code: signal.code,
            }),
            Some(signal) => Ok(signal.results),
        }
    }
}
