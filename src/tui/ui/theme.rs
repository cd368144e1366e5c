//! Color palettes for the survey screens.
//!
//! The role screen and questions use blue tones, the completion screen green.
//! Semantic colors (success=green, warning=yellow, error=red) are the same in
//! every palette.

use crate::state::Phase;
use ratatui::style::Color;

#[derive(Debug, Clone, Copy)]
pub struct Theme {
    /// Main text color
    pub text: Color,
    /// Descriptions, hints, unselected options
    pub muted: Color,
    /// Highlighted option, progress gauge
    pub accent: Color,
    pub border: Color,
    /// Border of the field receiving input
    pub border_focused: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    /// Header background
    pub header_bg: Color,
}

impl Theme {
    pub fn asking() -> Self {
        Self {
            text: Color::White,
            muted: Color::DarkGray,
            accent: Color::Rgb(100, 180, 255),        // Sky blue
            border: Color::Rgb(60, 100, 160),         // Steel blue
            border_focused: Color::Rgb(130, 200, 255), // Light blue
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            header_bg: Color::Rgb(20, 60, 120), // Deep blue
        }
    }

    pub fn complete() -> Self {
        Self {
            text: Color::White,
            muted: Color::DarkGray,
            accent: Color::Rgb(100, 220, 100),        // Bright green
            border: Color::Rgb(40, 120, 60),          // Forest green
            border_focused: Color::Rgb(150, 255, 150), // Light green
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            header_bg: Color::Rgb(20, 80, 40), // Deep green
        }
    }

    pub fn for_phase(phase: Phase) -> Self {
        match phase {
            Phase::RoleSelection | Phase::Asking => Self::asking(),
            Phase::Complete => Self::complete(),
        }
    }
}
