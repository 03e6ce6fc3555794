//! The interpreter's runtime value type (spec 4.5, 4.6).
//!
//! Stage-3 expressions and tool results all flow through [`ToolValue`].
//! Frame/element/keypoint results are handles into the [`crate::frame`]
//! arena rather than owned data, so method dispatch can mutate the tree a
//! later step reads.

use crate::frame::{FrameId, Interactable, KeypointRef};
use crate::types::Point;

/// The concrete "class" a [`ChoiceValue`] belongs to, for method-allowlist
/// dispatch (spec 4.6). These model the action-tool results the original
/// system calls back into (`select()`, `refine()`/`release()`, `swap()`,
/// `drop()`) — their bodies are out of scope (spec 1); only their allowed
/// method names are part of this crate's contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChoiceKind {
    /// Result of `select`/`get_all_choices`.
    Select,
    /// Result of `slide_x`/`slide_y`.
    Slide,
    /// Result of `drag`.
    Swap,
    /// Result of `draw`.
    Drag,
    /// An unqualified choice object, exposing only `release`.
    Generic,
}

impl ChoiceKind {
    /// The class name used for method-allowlist lookups (spec 4.6).
    pub fn class_name(self) -> &'static str {
        match self {
            Self::Select => "SelectChoice",
            Self::Slide => "SlideChoice",
            Self::Swap => "SwapChoice",
            Self::Drag => "DragChoice",
            Self::Generic => "Choice",
        }
    }
}

/// An opaque choice object returned by an action tool (spec 4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChoiceValue {
    /// Which method set this choice exposes.
    pub kind: ChoiceKind,
    /// Opaque identifier, stable for the lifetime of one Stage-3 program.
    pub id: u64,
}

/// A runtime value flowing through the Stage-3 interpreter (spec 4.5).
#[derive(Debug, Clone, PartialEq)]
pub enum ToolValue {
    /// JSON `null` / the absence of a value.
    Null,
    /// A boolean.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// A float.
    Float(f64),
    /// A string.
    Str(String),
    /// A homogeneous or heterogeneous list.
    List(Vec<ToolValue>),
    /// A handle to a frame in the tree.
    Frame(FrameId),
    /// A handle to an element (or, transitively, a frame) resolved via
    /// `Frame::get_interactable`.
    Interactable(Interactable),
    /// A handle to a keypoint resolved via `Frame::get_keypoint`.
    Point(KeypointRef),
    /// An opaque choice object returned by an action tool.
    Choice(ChoiceValue),
}

impl ToolValue {
    /// The class name used for method-allowlist lookups (spec 4.6).
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Null => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Frame(_) => "Frame",
            Self::Interactable(_) => "Element",
            Self::Point(_) => "Point",
            Self::Choice(c) => c.kind.class_name(),
        }
    }

    /// Borrow this value as a list, if it is one.
    pub fn as_list(&self) -> Option<&[ToolValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Read this value as an `i64` index (spec 4.5 `{op: "index"}`/`len`
    /// callers), accepting both `Int` and a whole-valued `Float`.
    pub fn as_index(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e18 => {
                #[allow(clippy::cast_possible_truncation)]
                // guarded above: whole-valued and within i64 range
                let truncated = *f as i64;
                Some(truncated)
            }
            _ => None,
        }
    }

    /// Read this value as a string slice, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl From<Point> for ToolValue {
    fn from(point: Point) -> Self {
        Self::List(vec![Self::Float(point.x), Self::Float(point.y)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_name_covers_every_variant() {
        assert_eq!(ToolValue::Null.class_name(), "NoneType");
        assert_eq!(ToolValue::Bool(true).class_name(), "bool");
        assert_eq!(ToolValue::Int(1).class_name(), "int");
        assert_eq!(ToolValue::Float(1.0).class_name(), "float");
        assert_eq!(ToolValue::Str("x".into()).class_name(), "str");
        assert_eq!(ToolValue::List(vec![]).class_name(), "list");
        assert_eq!(ToolValue::Frame(0).class_name(), "Frame");
        assert_eq!(
            ToolValue::Choice(ChoiceValue {
                kind: ChoiceKind::Select,
                id: 0
            })
            .class_name(),
            "SelectChoice"
        );
    }

    #[test]
    fn as_index_accepts_whole_floats_only() {
        assert_eq!(ToolValue::Int(3).as_index(), Some(3));
        assert_eq!(ToolValue::Float(3.0).as_index(), Some(3));
        assert_eq!(ToolValue::Float(3.5).as_index(), None);
        assert_eq!(ToolValue::Str("x".into()).as_index(), None);
    }
}
