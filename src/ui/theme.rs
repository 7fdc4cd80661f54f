// LogPilot - ui/theme.rs
//
// Colour scheme, severity colour mapping, and layout constants.
// No dependencies on app state or business logic.

use crate::core::severity::Severity;
use egui::Color32;

/// Colour for a severity level. Levels outside the catalog get `None` and
/// render in the default text colour.
pub fn severity_colour(severity: Option<Severity>, dark_mode: bool) -> Option<Color32> {
    let colour = match severity? {
        Severity::Emergency | Severity::Alert => Color32::from_rgb(220, 38, 38), // Red 600
        Severity::Critical => Color32::from_rgb(239, 68, 68),                   // Red 500
        Severity::Error => Color32::from_rgb(248, 113, 113),                    // Red 400
        Severity::Warning => Color32::from_rgb(217, 119, 6),                    // Amber 600
        Severity::Notice => Color32::from_rgb(14, 165, 233),                    // Sky 500
        Severity::Informational => {
            if dark_mode {
                Color32::from_rgb(209, 213, 219) // Gray 300
            } else {
                Color32::from_rgb(55, 65, 81) // Gray 700
            }
        }
        Severity::Debug => Color32::from_rgb(107, 114, 128), // Gray 500
    };
    Some(colour)
}

/// Colour of the per-host connection badge.
pub fn connection_colour(connected: bool, failed: bool) -> Color32 {
    if failed {
        Color32::from_rgb(220, 38, 38)
    } else if connected {
        Color32::from_rgb(34, 197, 94) // Green 500
    } else {
        Color32::from_rgb(107, 114, 128)
    }
}

/// LIVE badge colour.
pub const LIVE_COLOUR: Color32 = Color32::from_rgb(34, 197, 94);

/// Layout constants.
pub const SIDEBAR_WIDTH: f32 = 260.0;
pub const ROW_HEIGHT: f32 = 18.0;
pub const HOST_PANEL_HEIGHT: f32 = 260.0;
