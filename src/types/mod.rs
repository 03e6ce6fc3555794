//! Core value types shared across the frame tree, validators, and interpreter
//! (spec 3).

use serde::{Deserialize, Serialize};

/// An opaque image payload.
///
/// Image decoding/encoding is out of scope (spec 1) — the core only ever
/// threads this handle through frames and agent calls without inspecting it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Image(pub Vec<u8>);

/// A 2-D point on a frame, produced by `Frame::get_keypoint` and
/// `Frame::show_keypoints` (spec 3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal pixel coordinate.
    pub x: f64,
    /// Vertical pixel coordinate.
    pub y: f64,
}

/// Frame-level interactable tags: the full closed enumeration (spec 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FrameTag {
    /// The whole frame can be clicked.
    Clickable,
    /// The whole frame is a selectable choice.
    Selectable,
    /// The whole frame can be pointed at.
    Pointable,
    /// The whole frame accepts text input.
    Inputtable,
    /// The whole frame is a horizontal slider.
    SlideableX,
    /// The whole frame is a vertical slider.
    SlideableY,
    /// The whole frame can be dragged.
    Draggable,
    /// The whole frame participates in a swap interaction.
    Swappable,
    /// Sentinel: "advance to next screen" (spec 3, exempt from the
    /// single-type invariant, capped at one occurrence).
    Next,
}

/// Element-level interactable tags: the frame-level set minus the two
/// frame-only slider tags (spec 3; resolved Open Question, see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementTag {
    /// The element can be clicked.
    Clickable,
    /// The element is a selectable choice.
    Selectable,
    /// The element can be pointed at.
    Pointable,
    /// The element accepts text input.
    Inputtable,
    /// The element can be dragged.
    Draggable,
    /// The element participates in a swap interaction.
    Swappable,
    /// Sentinel: "advance to next screen".
    Next,
}

impl FrameTag {
    /// Parse a frame-level tag from its `SCREAMING_SNAKE_CASE` name, as used
    /// in Stage-2 JSON payloads.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "CLICKABLE" => Some(Self::Clickable),
            "SELECTABLE" => Some(Self::Selectable),
            "POINTABLE" => Some(Self::Pointable),
            "INPUTTABLE" => Some(Self::Inputtable),
            "SLIDEABLE_X" => Some(Self::SlideableX),
            "SLIDEABLE_Y" => Some(Self::SlideableY),
            "DRAGGABLE" => Some(Self::Draggable),
            "SWAPPABLE" => Some(Self::Swappable),
            "NEXT" => Some(Self::Next),
            _ => None,
        }
    }

    /// Whether this tag is the `NEXT` sentinel, exempt from the Stage-2
    /// single-non-NEXT-type invariant.
    pub fn is_next(self) -> bool {
        matches!(self, Self::Next)
    }

    /// The full set of valid frame-tag names, for error messages and tests.
    pub fn all_names() -> &'static [&'static str] {
        &[
            "CLICKABLE",
            "SELECTABLE",
            "POINTABLE",
            "INPUTTABLE",
            "SLIDEABLE_X",
            "SLIDEABLE_Y",
            "DRAGGABLE",
            "SWAPPABLE",
            "NEXT",
        ]
    }
}

impl ElementTag {
    /// Parse an element-level tag from its `SCREAMING_SNAKE_CASE` name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "CLICKABLE" => Some(Self::Clickable),
            "SELECTABLE" => Some(Self::Selectable),
            "POINTABLE" => Some(Self::Pointable),
            "INPUTTABLE" => Some(Self::Inputtable),
            "DRAGGABLE" => Some(Self::Draggable),
            "SWAPPABLE" => Some(Self::Swappable),
            "NEXT" => Some(Self::Next),
            _ => None,
        }
    }

    /// Whether this tag is the `NEXT` sentinel.
    pub fn is_next(self) -> bool {
        matches!(self, Self::Next)
    }

    /// The full set of valid element-tag names, for error messages and tests.
    pub fn all_names() -> &'static [&'static str] {
        &[
            "CLICKABLE",
            "SELECTABLE",
            "POINTABLE",
            "INPUTTABLE",
            "DRAGGABLE",
            "SWAPPABLE",
            "NEXT",
        ]
    }
}

/// The `position` enum accepted by the Stage-2 `get_element` action (spec 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    /// Search above the frame's current focus.
    Up,
    /// Search below the frame's current focus.
    Down,
    /// Search to the left of the frame's current focus.
    Left,
    /// Search to the right of the frame's current focus.
    Right,
    /// Search the whole frame.
    All,
}

impl Position {
    /// Parse a position from its lowercase name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    /// The full set of valid position names, for error messages.
    pub fn all_names() -> &'static [&'static str] {
        &["up", "down", "left", "right", "all"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_tag_round_trips_all_names() {
        for name in FrameTag::all_names() {
            assert!(FrameTag::from_name(name).is_some(), "{name} should parse");
        }
    }

    #[test]
    fn element_tag_excludes_sliders() {
        assert!(ElementTag::from_name("SLIDEABLE_X").is_none());
        assert!(ElementTag::from_name("SLIDEABLE_Y").is_none());
        assert!(ElementTag::from_name("CLICKABLE").is_some());
    }

    #[test]
    fn next_is_exempt_sentinel() {
        assert!(FrameTag::Next.is_next());
        assert!(!FrameTag::Clickable.is_next());
        assert!(ElementTag::Next.is_next());
    }

    #[test]
    fn position_round_trips_all_names() {
        for name in Position::all_names() {
            assert!(Position::from_name(name).is_some(), "{name} should parse");
        }
        assert!(Position::from_name("sideways").is_none());
    }
}
