//! Capture selection types.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when a name matches no [`CaptureType`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown capture type '{0}', expected screen, window or any")]
pub struct ParseCaptureTypeError(pub String);

/// What kind of source the user may pick in the portal dialog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptureType {
    /// A whole monitor.
    Screen,

    /// A single application window.
    Window,

    /// Either a monitor or a window.
    #[default]
    Any,
}

impl CaptureType {
    /// Every capture type, in portal bitmask order.
    pub const ALL: [CaptureType; 3] = [Self::Screen, Self::Window, Self::Any];

    /// Source-type bitmask sent in the portal's `SelectSources` call.
    pub fn source_mask(self) -> u32 {
        match self {
            Self::Screen => 1,
            Self::Window => 2,
            Self::Any => 1 | 2,
        }
    }

    /// Whether frames of this type may carry padding around the content.
    ///
    /// A monitor surface is fully populated, so only non-screen captures
    /// need content-bounds detection.
    pub fn needs_bounds_detection(self) -> bool {
        !matches!(self, Self::Screen)
    }

    /// Returns the display name for this type.
    pub fn name(self) -> &'static str {
        match self {
            Self::Screen => "screen",
            Self::Window => "window",
            Self::Any => "any",
        }
    }
}

impl FromStr for CaptureType {
    type Err = ParseCaptureTypeError;

    /// Parse a display name as returned by [`CaptureType::name`], ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseCaptureTypeError(s.to_string()))
    }
}

/// How the compositor renders the cursor into the stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CursorMode {
    /// Cursor is not part of the stream.
    Hidden,

    /// Cursor is drawn into the frames.
    #[default]
    Embedded,

    /// Cursor position is sent as stream metadata.
    Metadata,
}

impl CursorMode {
    /// Value of the portal's `cursor_mode` option.
    pub fn portal_value(self) -> u32 {
        match self {
            Self::Hidden => 1,
            Self::Embedded => 2,
            Self::Metadata => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_mask_values() {
        assert_eq!(CaptureType::Screen.source_mask(), 1);
        assert_eq!(CaptureType::Window.source_mask(), 2);
        assert_eq!(CaptureType::Any.source_mask(), 3);
    }

    #[test]
    fn test_bounds_detection_gate() {
        assert!(!CaptureType::Screen.needs_bounds_detection());
        assert!(CaptureType::Window.needs_bounds_detection());
        assert!(CaptureType::Any.needs_bounds_detection());
    }

    #[test]
    fn test_names_parse_back() {
        for kind in CaptureType::ALL {
            assert_eq!(kind.name().parse::<CaptureType>(), Ok(kind));
        }
        assert_eq!("Window".parse::<CaptureType>(), Ok(CaptureType::Window));
    }

    #[test]
    fn test_unknown_name_is_rejected() {
        let err = "monitor".parse::<CaptureType>().unwrap_err();
        assert_eq!(err, ParseCaptureTypeError("monitor".to_string()));
        assert!("".parse::<CaptureType>().is_err());
    }

    #[test]
    fn test_cursor_mode_default_is_embedded() {
        assert_eq!(CursorMode::default(), CursorMode::Embedded);
        assert_eq!(CursorMode::default().portal_value(), 2);
    }
}
