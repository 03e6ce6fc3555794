//! Schema validation for the three stage payloads (spec 4.2).
//!
//! Each `validate_stageN` turns an untyped [`Value`] into a typed result or
//! a [`HalliganError::Validation`] carrying a JSONPath-qualified message, so
//! retry feedback can point the model at the exact offending field.

use serde_json::{Map, Value};

use crate::errors::{HalliganError, Result};
use crate::types::{ElementTag, FrameTag, Position};

fn require_dict<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| HalliganError::validation(format!("{path}: expected object")))
}

fn require_list<'a>(value: &'a Value, path: &str) -> Result<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| HalliganError::validation(format!("{path}: expected array")))
}

fn require_str<'a>(obj: &'a Map<String, Value>, key: &str, path: &str) -> Result<&'a str> {
    obj.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| HalliganError::validation(format!("{path}.{key}: expected string")))
}

fn require_int(obj: &Map<String, Value>, key: &str, path: &str) -> Result<i64> {
    obj.get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| HalliganError::validation(format!("{path}.{key}: expected integer")))
}

fn require_optional_int(obj: &Map<String, Value>, key: &str, path: &str) -> Result<Option<i64>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| HalliganError::validation(format!("{path}.{key}: expected integer"))),
    }
}

/// Validate a frame id field is both an integer and within `0..frames`.
fn require_frame_id(obj: &Map<String, Value>, path: &str, frames: usize) -> Result<usize> {
    let raw = require_int(obj, "frame", path)?;
    let id = usize::try_from(raw)
        .map_err(|_| HalliganError::validation(format!("{path}.frame out of range: {raw}")))?;
    if id >= frames {
        return Err(HalliganError::validation(format!(
            "{path}.frame out of range: {raw}"
        )));
    }
    Ok(id)
}

fn require_positive_u32(value: i64, key: &str, path: &str) -> Result<u32> {
    if value <= 0 {
        return Err(HalliganError::validation(format!(
            "{path}.{key} must be positive: {value}"
        )));
    }
    u32::try_from(value).map_err(|_| HalliganError::validation(format!("{path}.{key} out of range: {value}")))
}

fn require_frame_tag(obj: &Map<String, Value>, key: &str, path: &str) -> Result<FrameTag> {
    let name = require_str(obj, key, path)?;
    FrameTag::from_name(name).ok_or_else(|| {
        HalliganError::validation(format!(
            "{path}.{key}: '{name}' is not one of {:?}",
            FrameTag::all_names()
        ))
    })
}

fn require_element_tag(obj: &Map<String, Value>, key: &str, path: &str) -> Result<ElementTag> {
    let name = require_str(obj, key, path)?;
    ElementTag::from_name(name).ok_or_else(|| {
        HalliganError::validation(format!(
            "{path}.{key}: '{name}' is not one of {:?}",
            ElementTag::all_names()
        ))
    })
}

fn require_position(obj: &Map<String, Value>, path: &str) -> Result<Position> {
    let name = require_str(obj, "position", path)?;
    Position::from_name(name).ok_or_else(|| {
        HalliganError::validation(format!(
            "{path}.position: '{name}' is not one of {:?}",
            Position::all_names()
        ))
    })
}

fn require_nonempty_str(obj: &Map<String, Value>, key: &str, path: &str) -> Result<String> {
    let raw = require_str(obj, key, path)?.trim().to_owned();
    if raw.is_empty() {
        return Err(HalliganError::validation(format!(
            "{path}.{key} must be non-empty"
        )));
    }
    Ok(raw)
}

/// A single relation edge produced by Stage 1 (spec 4.2).
#[derive(Debug, Clone, PartialEq)]
pub struct Stage1Relation {
    /// Index of the frame the relation is anchored on.
    pub from: usize,
    /// Index of the related frame, or `None` for an unanchored relation.
    pub to: Option<usize>,
    /// Free-text relationship label.
    pub relationship: String,
}

/// The validated shape of a Stage-1 response (spec 4.2).
#[derive(Debug, Clone, PartialEq)]
pub struct Stage1Result {
    /// Per-frame descriptions, in frame order.
    pub descriptions: Vec<String>,
    /// Relations observed between frames.
    pub relations: Vec<Stage1Relation>,
    /// The inferred CAPTCHA objective.
    pub objective: String,
}

/// Validate a raw Stage-1 response against the current frame count (spec
/// 4.2, 3).
///
/// # Errors
/// Returns [`HalliganError::Validation`] with a JSONPath-qualified message
/// naming the first offending field: a wrong `descriptions` length, an
/// out-of-range relation endpoint, or a missing/empty `objective`.
pub fn validate_stage1(value: &Value, frames: usize) -> Result<Stage1Result> {
    let root = require_dict(value, "$")?;

    let descriptions_raw = require_list(
        root.get("descriptions")
            .ok_or_else(|| HalliganError::validation("$.descriptions: expected array"))?,
        "$.descriptions",
    )?;
    if descriptions_raw.len() != frames {
        return Err(HalliganError::validation(format!(
            "$.descriptions length mismatch: expected {frames}, got {}",
            descriptions_raw.len()
        )));
    }
    let descriptions = descriptions_raw
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_str()
                .map(|s| s.trim().to_owned())
                .ok_or_else(|| HalliganError::validation(format!("$.descriptions[{i}]: expected string")))
        })
        .collect::<Result<Vec<_>>>()?;

    let relations = match root.get("relations") {
        None => Vec::new(),
        Some(value) => require_list(value, "$.relations")?
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let path = format!("$.relations[{i}]");
                let obj = require_dict(item, &path)?;
                let from = require_int(obj, "from", &path)?;
                let to = require_optional_int(obj, "to", &path)?;
                let relationship = require_str(obj, "relationship", &path)?.trim().to_owned();

                let from = usize::try_from(from)
                    .ok()
                    .filter(|&f| f < frames)
                    .ok_or_else(|| HalliganError::validation(format!("{path}.from out of range: {from}")))?;
                let to = match to {
                    None => None,
                    Some(raw) => Some(
                        usize::try_from(raw)
                            .ok()
                            .filter(|&t| t < frames)
                            .ok_or_else(|| HalliganError::validation(format!("{path}.to out of range: {raw}")))?,
                    ),
                };

                Ok(Stage1Relation { from, to, relationship })
            })
            .collect::<Result<Vec<_>>>()?,
    };

    let objective = require_str(root, "objective", "$")?.trim().to_owned();
    if objective.is_empty() {
        return Err(HalliganError::validation("$.objective must be non-empty"));
    }

    Ok(Stage1Result {
        descriptions,
        relations,
        objective,
    })
}

/// The set of action `type` discriminator values a Stage-2 plan may use
/// (spec 3, 4.2).
pub const STAGE2_ACTION_TYPES: &[&str] = &["set_frame", "split_frame", "grid_frame", "get_element"];

/// A single annotation action within a Stage-2 plan (spec 3, 4.2): the four
/// shapes the `type` discriminator distinguishes.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage2Action {
    /// Tag an entire frame with a frame-level interactable.
    SetFrame {
        /// Frame id the action targets.
        frame: usize,
        /// Frame-level tag to apply.
        interactable: FrameTag,
    },
    /// Split a frame into `rows * columns` subframes, each tagged `mark_as`.
    SplitFrame {
        /// Frame id the action targets.
        frame: usize,
        /// Row count; must be positive.
        rows: u32,
        /// Column count; must be positive.
        columns: u32,
        /// Frame-level tag applied to every resulting subframe.
        mark_as: FrameTag,
    },
    /// Lay out `tiles` elements on a frame, each tagged `mark_as`.
    GridFrame {
        /// Frame id the action targets.
        frame: usize,
        /// Tile count; must be positive.
        tiles: u32,
        /// Element-level tag applied to every resulting element.
        mark_as: ElementTag,
    },
    /// Locate a single element on a frame and tag it `mark_as`.
    GetElement {
        /// Frame id the action targets.
        frame: usize,
        /// Search direction.
        position: Position,
        /// Free-text match details; must be non-empty.
        details: String,
        /// Element-level tag applied to the located element.
        mark_as: ElementTag,
    },
}

/// The validated shape of a Stage-2 response (spec 4.2).
#[derive(Debug, Clone, PartialEq)]
pub struct Stage2Plan {
    /// Actions to apply, in order.
    pub actions: Vec<Stage2Action>,
}

/// Validate a raw Stage-2 response against the current frame count (spec
/// 4.2, 3).
///
/// # Errors
/// Returns [`HalliganError::Validation`] with a JSONPath-qualified message
/// naming the first offending field: an unrecognized `type`, an
/// out-of-range `frame`, a non-positive `rows`/`columns`/`tiles`, or an
/// unrecognized tag/position.
pub fn validate_stage2(value: &Value, frames: usize) -> Result<Stage2Plan> {
    let root = require_dict(value, "$")?;
    let actions_raw = require_list(
        root.get("actions")
            .ok_or_else(|| HalliganError::validation("$.actions: expected array"))?,
        "$.actions",
    )?;

    let actions = actions_raw
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let path = format!("$.actions[{i}]");
            let obj = require_dict(item, &path)?;
            let action_type = require_str(obj, "type", &path)?;

            match action_type {
                "set_frame" => Ok(Stage2Action::SetFrame {
                    frame: require_frame_id(obj, &path, frames)?,
                    interactable: require_frame_tag(obj, "interactable", &path)?,
                }),
                "split_frame" => {
                    let frame = require_frame_id(obj, &path, frames)?;
                    let rows = require_positive_u32(require_int(obj, "rows", &path)?, "rows", &path)?;
                    let columns =
                        require_positive_u32(require_int(obj, "columns", &path)?, "columns", &path)?;
                    let mark_as = require_frame_tag(obj, "mark_as", &path)?;
                    Ok(Stage2Action::SplitFrame { frame, rows, columns, mark_as })
                }
                "grid_frame" => {
                    let frame = require_frame_id(obj, &path, frames)?;
                    let tiles = require_positive_u32(require_int(obj, "tiles", &path)?, "tiles", &path)?;
                    let mark_as = require_element_tag(obj, "mark_as", &path)?;
                    Ok(Stage2Action::GridFrame { frame, tiles, mark_as })
                }
                "get_element" => {
                    let frame = require_frame_id(obj, &path, frames)?;
                    let position = require_position(obj, &path)?;
                    let details = require_nonempty_str(obj, "details", &path)?;
                    let mark_as = require_element_tag(obj, "mark_as", &path)?;
                    Ok(Stage2Action::GetElement { frame, position, details, mark_as })
                }
                other => Err(HalliganError::validation(format!(
                    "{path}.type: '{other}' is not one of {STAGE2_ACTION_TYPES:?}"
                ))),
            }
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Stage2Plan { actions })
}

/// The validated shape of a Stage-3 response: a shallow check only — a list
/// of statement objects, each carrying a string `op` (spec 4.2, 4.6). Each
/// statement's remaining shape is checked lazily by the interpreter, mirroring
/// the grounding source's own shallow schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage3Program {
    /// Raw statement objects, validated only down to `{"op": <string>, ...}`.
    pub steps: Vec<Map<String, Value>>,
}

/// Validate a raw Stage-3 response (spec 4.2, 4.6).
///
/// # Errors
/// Returns [`HalliganError::Validation`] if `steps` is missing, not an
/// array, or contains a non-object or an object without a string `op`.
pub fn validate_stage3(value: &Value) -> Result<Stage3Program> {
    let root = require_dict(value, "$")?;
    let steps_raw = require_list(
        root.get("steps")
            .ok_or_else(|| HalliganError::validation("$.steps: expected array"))?,
        "$.steps",
    )?;

    let steps = steps_raw
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let path = format!("$.steps[{i}]");
            let obj = require_dict(item, &path)?.clone();
            require_str(&obj, "op", &path)?;
            Ok(obj)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Stage3Program { steps })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validate_stage1_happy_path() {
        let value = json!({
            "descriptions": ["a door", "a window"],
            "relations": [{"from": 0, "to": 1, "relationship": "left_of"}],
            "objective": "click the door"
        });
        let result = validate_stage1(&value, 2).expect("should validate");
        assert_eq!(result.descriptions.len(), 2);
        assert_eq!(result.relations[0].to, Some(1));
        assert_eq!(result.objective, "click the door");
    }

    #[test]
    fn validate_stage1_allows_missing_relations() {
        let value = json!({"descriptions": [], "objective": "click"});
        let result = validate_stage1(&value, 0).expect("should validate");
        assert!(result.relations.is_empty());
    }

    #[test]
    fn validate_stage1_rejects_description_count_mismatch() {
        let value = json!({"descriptions": ["a door"], "objective": "click"});
        let err = validate_stage1(&value, 2).expect_err("should fail");
        assert!(err.to_string().contains("$.descriptions length mismatch"));
    }

    #[test]
    fn validate_stage1_rejects_out_of_range_relation() {
        let value = json!({
            "descriptions": ["a", "b"],
            "relations": [{"from": 0, "to": 5, "relationship": "near"}],
            "objective": "click"
        });
        let err = validate_stage1(&value, 2).expect_err("should fail");
        assert!(err.to_string().contains("$.relations[0].to"));
    }

    #[test]
    fn validate_stage1_reports_path_on_bad_description() {
        let value = json!({"descriptions": [1], "objective": "x"});
        let err = validate_stage1(&value, 1).expect_err("should fail");
        assert!(err.to_string().contains("$.descriptions[0]"));
    }

    #[test]
    fn validate_stage1_requires_objective() {
        let value = json!({"descriptions": []});
        assert!(validate_stage1(&value, 0).is_err());
    }

    #[test]
    fn validate_stage2_happy_path() {
        let value = json!({
            "actions": [
                {"type": "set_frame", "frame": 0, "interactable": "CLICKABLE"},
                {"type": "split_frame", "frame": 1, "rows": 2, "columns": 2, "mark_as": "CLICKABLE"}
            ]
        });
        let plan = validate_stage2(&value, 2).expect("should validate");
        assert_eq!(plan.actions.len(), 2);
        assert!(matches!(plan.actions[1], Stage2Action::SplitFrame { rows: 2, .. }));
    }

    #[test]
    fn validate_stage2_rejects_unknown_type() {
        let value = json!({"actions": [{"type": "teleport", "frame": 0}]});
        let err = validate_stage2(&value, 1).expect_err("should fail");
        assert!(err.to_string().contains("actions[0].type"));
    }

    #[test]
    fn validate_stage2_rejects_out_of_range_frame() {
        let value = json!({"actions": [{"type": "set_frame", "frame": 5, "interactable": "CLICKABLE"}]});
        let err = validate_stage2(&value, 1).expect_err("should fail");
        assert!(err.to_string().contains("actions[0].frame"));
    }

    #[test]
    fn validate_stage2_rejects_non_positive_rows() {
        let value = json!({
            "actions": [{"type": "split_frame", "frame": 0, "rows": 0, "columns": 2, "mark_as": "CLICKABLE"}]
        });
        let err = validate_stage2(&value, 1).expect_err("should fail");
        assert!(err.to_string().contains("rows"));
    }

    #[test]
    fn validate_stage2_rejects_non_positive_tiles() {
        let value = json!({
            "actions": [{"type": "grid_frame", "frame": 0, "tiles": -1, "mark_as": "CLICKABLE"}]
        });
        let err = validate_stage2(&value, 1).expect_err("should fail");
        assert!(err.to_string().contains("tiles"));
    }

    #[test]
    fn validate_stage2_rejects_unknown_tag() {
        let value = json!({"actions": [{"type": "set_frame", "frame": 0, "interactable": "TELEPORT"}]});
        assert!(validate_stage2(&value, 1).is_err());
    }

    #[test]
    fn validate_stage3_shallow_checks_op_only() {
        let value = json!({
            "steps": [
                {"op": "call", "anything": "goes", "here": 1}
            ]
        });
        let program = validate_stage3(&value).expect("should validate");
        assert_eq!(program.steps.len(), 1);
        assert_eq!(program.steps[0]["op"], "call");
    }

    #[test]
    fn validate_stage3_rejects_missing_op() {
        let value = json!({"steps": [{"not_op": 1}]});
        assert!(validate_stage3(&value).is_err());
    }

    #[test]
    fn validate_stage3_rejects_non_array_steps() {
        let value = json!({"steps": "nope"});
        assert!(validate_stage3(&value).is_err());
    }
}
