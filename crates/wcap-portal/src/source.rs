//! Resolved capture source.

use std::fmt;
use std::num::NonZeroU32;

use crate::error::PortalError;
use crate::request::StreamEntry;
use crate::PortalResult;

/// The PipeWire node selected through the portal.
///
/// Only produced by a completed handshake, so the node id is never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CaptureSource {
    node_id: NonZeroU32,
}

impl CaptureSource {
    /// Wrap a node id, rejecting the zero sentinel.
    pub fn new(node_id: u32) -> PortalResult<Self> {
        NonZeroU32::new(node_id)
            .map(|node_id| Self { node_id })
            .ok_or(PortalError::InvalidNode(node_id))
    }

    /// PipeWire node id of the stream.
    pub fn node_id(&self) -> u32 {
        self.node_id.get()
    }
}

impl TryFrom<StreamEntry> for CaptureSource {
    type Error = PortalError;

    fn try_from(entry: StreamEntry) -> PortalResult<Self> {
        Self::new(entry.node_id)
    }
}

impl fmt::Display for CaptureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pipewire node {}", self.node_id)
    }
}
