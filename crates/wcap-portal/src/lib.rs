//! xdg-desktop-portal ScreenCast negotiation.
//!
//! This crate drives the three-step `CreateSession` / `SelectSources` /
//! `Start` handshake with the desktop portal and resolves the PipeWire
//! node that carries the selected screen or window.

mod dbus;
mod error;
pub mod mock;
mod negotiator;
mod request;
mod source;

use std::time::Duration;

pub use dbus::DbusPortal;
pub use error::PortalError;
pub use negotiator::PortalNegotiator;
pub use request::{
    OptionValue, PendingRequest, PortalCall, PortalOptions, PortalStep, RequestTokens,
    ResponseResults, ResponseSignal, StreamEntry,
};
pub use source::CaptureSource;

/// Well-known bus name of the desktop portal.
pub const PORTAL_BUS_NAME: &str = "org.freedesktop.portal.Desktop";

/// Object path of the desktop portal.
pub const PORTAL_OBJECT_PATH: &str = "/org/freedesktop/portal/desktop";

/// ScreenCast portal interface.
pub const SCREENCAST_INTERFACE: &str = "org.freedesktop.portal.ScreenCast";

/// Interface of the per-request objects.
pub const REQUEST_INTERFACE: &str = "org.freedesktop.portal.Request";

/// Signal emitted on a request object when the request completes.
pub const RESPONSE_SIGNAL: &str = "Response";

/// Result type for portal operations.
pub type PortalResult<T> = Result<T, PortalError>;

/// Transport to the ScreenCast portal.
///
/// Calls return the object path of the request; results arrive later as
/// `Response` signals, which may include signals for unrelated requests.
pub trait PortalBus {
    /// Issue a portal method call and return its request path.
    fn call(&mut self, call: &PortalCall) -> PortalResult<String>;

    /// Wait for the next `Response` signal.
    ///
    /// Returns `Ok(None)` only when `timeout` elapsed without a signal;
    /// with no timeout this blocks until a signal arrives.
    fn next_response(&mut self, timeout: Option<Duration>)
        -> PortalResult<Option<ResponseSignal>>;
}
