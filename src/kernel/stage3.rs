//! The Stage-3 sandboxed interpreter (spec 4.5, 4.6): a restricted
//! expression language plus a small statement runner, built to replace an
//! `eval()`-based execution primitive with two closed allowlists — tool
//! names ([`crate::kernel::registry::ToolRegistry`]) and, for values that
//! carry methods, a fixed class → method-name table.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use serde_json::{Map, Value};

use crate::errors::{HalliganError, Result};
use crate::frame::FrameTree;
use crate::kernel::registry::ToolRegistry;
use crate::kernel::value::ToolValue;

/// The flat, non-lexically-scoped variable environment a Stage-3 program
/// runs against (spec 4.5): no shadowing, a single namespace for the whole
/// program.
pub type Env = HashMap<String, ToolValue>;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Attribute names reserved for internal bookkeeping; `{ref: "attr"}` may
/// never dereference one (spec 9 safety note): a dynamic name starting with
/// `__` would otherwise let a crafted program reach past the object model
/// into implementation internals.
const RESERVED_ATTR_PREFIX: &str = "__";

/// Evaluate a single Stage-3 expression node to a runtime value (spec 4.5).
///
/// Accepts JSON literals (`null`/bool/number/string/array) verbatim, plus
/// the three structured forms: `{"var": name}`, `{"ref": kind, ...}`, and
/// `{"op": kind, ...}`.
///
/// # Errors
/// Returns [`HalliganError::Tool`] for an undefined variable, an unknown
/// `ref`/`op` kind, a malformed operand, or an out-of-range handle.
pub fn eval_expr(expr: &Value, env: &Env, tree: &FrameTree) -> Result<ToolValue> {
    match expr {
        Value::Null => Ok(ToolValue::Null),
        Value::Bool(b) => Ok(ToolValue::Bool(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(ToolValue::Int(i))
            } else {
                n.as_f64().map(ToolValue::Float).ok_or_else(|| {
                    HalliganError::tool(format!("expression: unsupported number {n}"))
                })
            }
        }
        Value::String(s) => Ok(ToolValue::Str(s.clone())),
        Value::Array(items) => items
            .iter()
            .map(|item| eval_expr(item, env, tree))
            .collect::<Result<Vec<_>>>()
            .map(ToolValue::List),
        Value::Object(obj) => eval_structured(obj, env, tree),
    }
}

fn eval_structured(obj: &Map<String, Value>, env: &Env, tree: &FrameTree) -> Result<ToolValue> {
    if let Some(name) = obj.get("var") {
        let name = name
            .as_str()
            .ok_or_else(|| HalliganError::tool("expression: 'var' must be a string"))?;
        return env
            .get(name)
            .cloned()
            .ok_or_else(|| HalliganError::tool(format!("undefined variable: {name}")));
    }

    if let Some(kind) = obj.get("ref") {
        let kind = kind
            .as_str()
            .ok_or_else(|| HalliganError::tool("expression: 'ref' must be a string"))?;
        return eval_ref(kind, obj, env, tree);
    }

    if let Some(kind) = obj.get("op") {
        let kind = kind
            .as_str()
            .ok_or_else(|| HalliganError::tool("expression: 'op' must be a string"))?;
        return eval_op(kind, obj, env, tree);
    }

    Err(HalliganError::tool(
        "expression: object must contain 'var', 'ref', or 'op'",
    ))
}

fn field<'a>(obj: &'a Map<String, Value>, name: &str, ctx: &str) -> Result<&'a Value> {
    obj.get(name)
        .ok_or_else(|| HalliganError::tool(format!("{ctx}: missing '{name}'")))
}

fn eval_index(obj: &Map<String, Value>, name: &str, ctx: &str, env: &Env, tree: &FrameTree) -> Result<usize> {
    let raw = eval_expr(field(obj, name, ctx)?, env, tree)?;
    let i = raw
        .as_index()
        .ok_or_else(|| HalliganError::tool(format!("{ctx}.{name}: expected an integer")))?;
    usize::try_from(i).map_err(|_| HalliganError::tool(format!("{ctx}.{name}: negative index {i}")))
}

fn eval_ref(kind: &str, obj: &Map<String, Value>, env: &Env, tree: &FrameTree) -> Result<ToolValue> {
    match kind {
        "frame" => {
            let id = eval_index(obj, "id", "ref:frame", env, tree)?;
            if tree.get(id).is_none() {
                return Err(HalliganError::tool(format!("invalid frame id: {id}")));
            }
            Ok(ToolValue::Frame(id))
        }
        "interactable" => {
            let frame = eval_index(obj, "frame", "ref:interactable", env, tree)?;
            let id = eval_index(obj, "id", "ref:interactable", env, tree)?;
            tree.get_interactable(frame, id).map(ToolValue::Interactable)
        }
        "keypoint" => {
            let frame = eval_index(obj, "frame", "ref:keypoint", env, tree)?;
            let id = eval_index(obj, "id", "ref:keypoint", env, tree)?;
            tree.get_keypoint(frame, id).map(ToolValue::Point)
        }
        "neighbour" => {
            let point_expr = field(obj, "point", "ref:neighbour")?;
            let point = eval_expr(point_expr, env, tree)?;
            let ToolValue::Point(handle) = point else {
                return Err(HalliganError::tool("ref:neighbour.point: expected a Point"));
            };
            let id = eval_index(obj, "id", "ref:neighbour", env, tree)?;
            tree.get_neighbour(handle, id).map(ToolValue::Point)
        }
        "attr" => {
            let target = eval_expr(field(obj, "obj", "ref:attr")?, env, tree)?;
            let name = field(obj, "name", "ref:attr")?
                .as_str()
                .ok_or_else(|| HalliganError::tool("ref:attr.name: expected a string"))?;
            eval_attr(&target, name, tree)
        }
        "index" => {
            let target = eval_expr(field(obj, "list", "ref:index")?, env, tree)?;
            let index = eval_index(obj, "index", "ref:index", env, tree)?;
            let items = target
                .as_list()
                .ok_or_else(|| HalliganError::tool("ref:index.list: expected a list"))?;
            items
                .get(index)
                .cloned()
                .ok_or_else(|| HalliganError::tool(format!("ref:index: index out of range: {index}")))
        }
        other => Err(HalliganError::tool(format!("unknown ref kind: {other}"))),
    }
}

fn eval_attr(target: &ToolValue, name: &str, tree: &FrameTree) -> Result<ToolValue> {
    if name.starts_with(RESERVED_ATTR_PREFIX) {
        return Err(HalliganError::tool(format!(
            "attribute names starting with '{RESERVED_ATTR_PREFIX}' are reserved"
        )));
    }
    match (target, name) {
        (ToolValue::Frame(id), "description") => {
            let frame = tree
                .get(*id)
                .ok_or_else(|| HalliganError::tool(format!("invalid frame id: {id}")))?;
            Ok(frame
                .description
                .clone()
                .map_or(ToolValue::Null, ToolValue::Str))
        }
        (ToolValue::Frame(id), "interactable") => {
            let frame = tree
                .get(*id)
                .ok_or_else(|| HalliganError::tool(format!("invalid frame id: {id}")))?;
            Ok(frame
                .interactable
                .map_or(ToolValue::Null, |tag| ToolValue::Str(format!("{tag:?}"))))
        }
        (ToolValue::Point(handle), "x" | "y") => {
            let point = tree.point_coordinates(*handle)?;
            Ok(ToolValue::Float(if name == "x" { point.x } else { point.y }))
        }
        (ToolValue::Interactable(handle), "frame") => Ok(ToolValue::Frame(handle.frame)),
        _ => Err(HalliganError::tool(format!(
            "attribute '{name}' is not defined on {}",
            target.class_name()
        ))),
    }
}

fn eval_op(kind: &str, obj: &Map<String, Value>, env: &Env, tree: &FrameTree) -> Result<ToolValue> {
    match kind {
        "map_attr" => {
            let list = eval_expr(field(obj, "list", "op:map_attr")?, env, tree)?;
            let attr = field(obj, "attr", "op:map_attr")?
                .as_str()
                .ok_or_else(|| HalliganError::tool("op:map_attr.attr: expected a string"))?;
            let items = list
                .as_list()
                .ok_or_else(|| HalliganError::tool("op:map_attr.list: expected a list"))?;
            items
                .iter()
                .map(|item| eval_attr(item, attr, tree))
                .collect::<Result<Vec<_>>>()
                .map(ToolValue::List)
        }
        "filter_mask" => {
            let list = eval_expr(field(obj, "items", "op:filter_mask")?, env, tree)?;
            let mask = eval_expr(field(obj, "mask", "op:filter_mask")?, env, tree)?;
            let items = list
                .as_list()
                .ok_or_else(|| HalliganError::tool("op:filter_mask.items: expected a list"))?;
            let flags = mask
                .as_list()
                .ok_or_else(|| HalliganError::tool("op:filter_mask.mask: expected a list"))?;
            if items.len() != flags.len() {
                return Err(HalliganError::tool(
                    "op:filter_mask: 'items' and 'mask' must be the same length",
                ));
            }
            let mut kept = Vec::new();
            for (item, flag) in items.iter().zip(flags.iter()) {
                let keep = matches!(flag, ToolValue::Bool(true));
                if keep {
                    kept.push(item.clone());
                }
            }
            Ok(ToolValue::List(kept))
        }
        "len" => {
            let list = eval_expr(field(obj, "value", "op:len")?, env, tree)?;
            let items = list
                .as_list()
                .ok_or_else(|| HalliganError::tool("op:len.value: expected a list"))?;
            Ok(ToolValue::Int(i64::try_from(items.len()).unwrap_or(i64::MAX)))
        }
        "sum" => {
            let list = eval_expr(field(obj, "value", "op:sum")?, env, tree)?;
            let items = list
                .as_list()
                .ok_or_else(|| HalliganError::tool("op:sum.value: expected a list"))?;
            let mut int_total: i64 = 0;
            let mut float_total = 0.0_f64;
            let mut all_int = true;
            for item in items {
                match item {
                    ToolValue::Int(i) => {
                        int_total = int_total
                            .checked_add(*i)
                            .ok_or_else(|| HalliganError::tool("op:sum: integer overflow"))?;
                    }
                    ToolValue::Float(f) => {
                        all_int = false;
                        #[allow(clippy::arithmetic_side_effects)]
                        // float addition cannot panic, unlike integer overflow
                        {
                            float_total += f;
                        }
                    }
                    other => {
                        return Err(HalliganError::tool(format!(
                            "op:sum: list element is not numeric: {}",
                            other.class_name()
                        )))
                    }
                }
            }
            if all_int {
                Ok(ToolValue::Int(int_total))
            } else {
                #[allow(clippy::cast_precision_loss, clippy::arithmetic_side_effects)]
                // aggregating a mixed int/float list is inherently lossy; float addition cannot panic
                let combined = float_total + int_total as f64;
                Ok(ToolValue::Float(combined))
            }
        }
        other => Err(HalliganError::tool(format!("unknown op kind: {other}"))),
    }
}

/// The fixed class → allowed-method-names table (spec 4.6): the only
/// methods a Stage-3 `call_method` step may invoke, keyed by
/// `ToolValue::class_name`.
fn allowed_methods(class_name: &str) -> Option<&'static [&'static str]> {
    match class_name {
        "Frame" => Some(&["show_keypoints", "get_keypoint", "get_interactable"]),
        "Point" => Some(&["get_neighbour", "show_neighbours"]),
        "SelectChoice" => Some(&["select"]),
        "SlideChoice" => Some(&["refine", "release"]),
        "SwapChoice" => Some(&["swap"]),
        "DragChoice" => Some(&["drop"]),
        "Choice" => Some(&["release"]),
        _ => None,
    }
}

fn ensure_allowed_method(class_name: &str, method: &str) -> Result<()> {
    match allowed_methods(class_name) {
        Some(methods) if methods.contains(&method) => Ok(()),
        _ => Err(HalliganError::tool(format!(
            "method '{method}' is not allowed on {class_name}"
        ))),
    }
}

async fn call_method(
    target: ToolValue,
    method: &str,
    args: &Map<String, Value>,
    env: &Env,
    tree: &mut FrameTree,
) -> Result<ToolValue> {
    let class_name = target.class_name();
    ensure_allowed_method(class_name, method)?;

    match target {
        ToolValue::Frame(id) => match method {
            "show_keypoints" => {
                let ids_value = eval_expr(field(args, "ids", "call_method:show_keypoints")?, env, tree)?;
                let ids = ids_value
                    .as_list()
                    .ok_or_else(|| HalliganError::tool("show_keypoints.ids: expected a list"))?
                    .iter()
                    .map(|v| {
                        v.as_index()
                            .and_then(|i| usize::try_from(i).ok())
                            .ok_or_else(|| HalliganError::tool("show_keypoints.ids: expected integers"))
                    })
                    .collect::<Result<Vec<_>>>()?;
                let points = tree.show_keypoints(id, &ids)?;
                Ok(ToolValue::List(points.into_iter().map(ToolValue::from).collect()))
            }
            "get_keypoint" => {
                let index = eval_index(args, "id", "call_method:get_keypoint", env, tree)?;
                tree.get_keypoint(id, index).map(ToolValue::Point)
            }
            "get_interactable" => {
                let index = eval_index(args, "id", "call_method:get_interactable", env, tree)?;
                tree.get_interactable(id, index).map(ToolValue::Interactable)
            }
            _ => unreachable!("checked by ensure_allowed_method"),
        },
        ToolValue::Point(handle) => match method {
            "get_neighbour" => {
                let index = eval_index(args, "id", "call_method:get_neighbour", env, tree)?;
                tree.get_neighbour(handle, index).map(ToolValue::Point)
            }
            "show_neighbours" => Ok(ToolValue::List(
                tree.show_neighbours(handle)?.into_iter().map(ToolValue::from).collect(),
            )),
            _ => unreachable!("checked by ensure_allowed_method"),
        },
        ToolValue::Choice(_) => Err(HalliganError::tool(format!(
            "method '{method}' on {class_name} has no body in this build"
        ))),
        _ => unreachable!("class_name lookup only succeeds for the variants above"),
    }
}

/// Statement-runner control flow signal (spec 4.5): `break` propagates up
/// to, and is absorbed by, the nearest enclosing `foreach`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepOutcome {
    Continue,
    Break,
}

fn tool_value_to_json(value: &ToolValue) -> Value {
    match value {
        ToolValue::Null => Value::Null,
        ToolValue::Bool(b) => Value::Bool(*b),
        ToolValue::Int(i) => Value::Number((*i).into()),
        ToolValue::Float(f) => serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number),
        ToolValue::Str(s) => Value::String(s.clone()),
        ToolValue::List(items) => Value::Array(items.iter().map(tool_value_to_json).collect()),
        ToolValue::Frame(id) => serde_json::json!({ "frame": id }),
        ToolValue::Interactable(handle) => serde_json::json!({ "frame": handle.frame, "index": handle.index }),
        ToolValue::Point(handle) => serde_json::json!({ "frame": handle.frame, "index": handle.index }),
        ToolValue::Choice(choice) => {
            serde_json::json!({ "class": choice.kind.class_name(), "id": choice.id })
        }
    }
}

fn eval_args(
    args: Option<&Map<String, Value>>,
    env: &Env,
    tree: &FrameTree,
) -> Result<Map<String, Value>> {
    let Some(args) = args else {
        return Ok(Map::new());
    };
    args.iter()
        .map(|(k, v)| eval_expr(v, env, tree).map(|value| (k.clone(), tool_value_to_json(&value))))
        .collect()
}

fn exec_block<'a>(
    steps: &'a [Map<String, Value>],
    env: &'a mut Env,
    tree: &'a mut FrameTree,
    registry: &'a ToolRegistry,
) -> BoxFuture<'a, Result<StepOutcome>> {
    Box::pin(async move {
        for step in steps {
            let op = step
                .get("op")
                .and_then(Value::as_str)
                .ok_or_else(|| HalliganError::tool("step: missing 'op'"))?;

            let outcome = match op {
                "call" => {
                    let name = field(step, "tool", "call")?
                        .as_str()
                        .ok_or_else(|| HalliganError::tool("call.tool: expected a string"))?;
                    let tool = registry
                        .get(name)
                        .ok_or_else(|| HalliganError::tool(format!("unknown tool: {name}")))?;
                    let raw_args = eval_args(step.get("args").and_then(Value::as_object), env, tree)?;
                    let result = tool.call(&raw_args).await?;
                    if let Some(var) = step.get("save_as").and_then(Value::as_str) {
                        if !var.is_empty() {
                            env.insert(var.to_owned(), result);
                        }
                    }
                    StepOutcome::Continue
                }
                "call_method" => {
                    let target_expr = field(step, "target", "call_method")?;
                    let target = eval_expr(target_expr, env, tree)?;
                    let method = field(step, "method", "call_method")?
                        .as_str()
                        .ok_or_else(|| HalliganError::tool("call_method.method: expected a string"))?;
                    let args = step
                        .get("args")
                        .and_then(Value::as_object)
                        .cloned()
                        .unwrap_or_default();
                    let result = call_method(target, method, &args, env, tree).await?;
                    if let Some(var) = step.get("save_as").and_then(Value::as_str) {
                        if !var.is_empty() {
                            env.insert(var.to_owned(), result);
                        }
                    }
                    StepOutcome::Continue
                }
                "assign" => {
                    let var = field(step, "var", "assign")?
                        .as_str()
                        .ok_or_else(|| HalliganError::tool("assign.var: expected a string"))?;
                    let value_expr = field(step, "value", "assign")?;
                    let value = eval_expr(value_expr, env, tree)?;
                    env.insert(var.to_owned(), value);
                    StepOutcome::Continue
                }
                "foreach" => {
                    let list_expr = field(step, "in", "foreach")?;
                    let list = eval_expr(list_expr, env, tree)?;
                    let items = list
                        .as_list()
                        .ok_or_else(|| HalliganError::tool("foreach.in: expected a list"))?
                        .to_vec();
                    let var = field(step, "var", "foreach")?
                        .as_str()
                        .ok_or_else(|| HalliganError::tool("foreach.var: expected a string"))?
                        .to_owned();
                    let body = field(step, "do", "foreach")?
                        .as_array()
                        .ok_or_else(|| HalliganError::tool("foreach.do: expected an array"))?
                        .iter()
                        .map(|item| {
                            item.as_object()
                                .cloned()
                                .ok_or_else(|| HalliganError::tool("foreach.do: expected step objects"))
                        })
                        .collect::<Result<Vec<_>>>()?;

                    let mut broke = false;
                    for item in items {
                        env.insert(var.clone(), item);
                        match exec_block(&body, env, tree, registry).await? {
                            StepOutcome::Break => {
                                broke = true;
                                break;
                            }
                            StepOutcome::Continue => {}
                        }
                    }
                    let _ = broke;
                    StepOutcome::Continue
                }
                "if" => {
                    let cond_expr = field(step, "cond", "if")?;
                    let cond = eval_expr(cond_expr, env, tree)?;
                    let branch_name = if matches!(cond, ToolValue::Bool(true)) {
                        "then"
                    } else {
                        "else"
                    };
                    match step.get(branch_name).and_then(Value::as_array) {
                        Some(branch) => {
                            let branch = branch
                                .iter()
                                .map(|item| {
                                    item.as_object().cloned().ok_or_else(|| {
                                        HalliganError::tool("if: expected step objects")
                                    })
                                })
                                .collect::<Result<Vec<_>>>()?;
                            exec_block(&branch, env, tree, registry).await?
                        }
                        None => StepOutcome::Continue,
                    }
                }
                "break" => StepOutcome::Break,
                other => return Err(HalliganError::tool(format!("unknown step op: {other}"))),
            };

            if outcome == StepOutcome::Break {
                return Ok(StepOutcome::Break);
            }
        }
        Ok(StepOutcome::Continue)
    })
}

/// Run a validated Stage-3 program to completion (spec 4.5).
///
/// A top-level `break` (one not inside any `foreach`) is a tool error: there
/// is no enclosing loop to absorb it.
///
/// # Errors
/// Returns [`HalliganError::Tool`] for any malformed step, unknown tool,
/// disallowed method, or out-of-range handle encountered while running.
pub async fn execute_stage3_program(
    program: &crate::kernel::schemas::Stage3Program,
    env: &mut Env,
    tree: &mut FrameTree,
    registry: &ToolRegistry,
) -> Result<()> {
    match exec_block(&program.steps, env, tree, registry).await? {
        StepOutcome::Continue => Ok(()),
        StepOutcome::Break => Err(HalliganError::tool("break used outside foreach")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::kernel::registry::{Tool, ToolRegistry};
    use crate::kernel::schemas::Stage3Program;
    use crate::types::Image;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        async fn call(&self, args: &Map<String, Value>) -> Result<ToolValue> {
            Ok(ToolValue::Str(args.get("text").and_then(Value::as_str).unwrap_or("").to_owned()))
        }
    }

    fn tree_with_frame() -> FrameTree {
        FrameTree::new(vec![Frame::new(Image::default())])
    }

    fn program(steps: Vec<Value>) -> Stage3Program {
        Stage3Program {
            steps: steps
                .into_iter()
                .map(|v| v.as_object().cloned().expect("step must be object"))
                .collect(),
        }
    }

    #[test]
    fn eval_expr_resolves_variable() {
        let tree = tree_with_frame();
        let mut env = Env::new();
        env.insert("x".to_owned(), ToolValue::Int(42));
        let value = eval_expr(&json!({"var": "x"}), &env, &tree).expect("should resolve");
        assert_eq!(value, ToolValue::Int(42));
    }

    #[test]
    fn eval_expr_undefined_variable_errors() {
        let tree = tree_with_frame();
        let env = Env::new();
        assert!(eval_expr(&json!({"var": "missing"}), &env, &tree).is_err());
    }

    #[test]
    fn eval_ref_frame_resolves_to_handle() {
        let tree = tree_with_frame();
        let env = Env::new();
        let value = eval_expr(&json!({"ref": "frame", "id": 0}), &env, &tree).expect("should resolve");
        assert_eq!(value, ToolValue::Frame(0));
    }

    #[test]
    fn eval_ref_frame_rejects_out_of_range() {
        let tree = tree_with_frame();
        let env = Env::new();
        assert!(eval_expr(&json!({"ref": "frame", "id": 9}), &env, &tree).is_err());
    }

    #[test]
    fn eval_op_len_and_sum() {
        let tree = tree_with_frame();
        let env = Env::new();
        let list = json!([1, 2, 3]);
        let len = eval_expr(&json!({"op": "len", "value": list}), &env, &tree).expect("len");
        assert_eq!(len, ToolValue::Int(3));
        let sum = eval_expr(&json!({"op": "sum", "value": [1, 2, 3]}), &env, &tree).expect("sum");
        assert_eq!(sum, ToolValue::Int(6));
    }

    #[test]
    fn eval_op_filter_mask_keeps_true_positions() {
        let tree = tree_with_frame();
        let env = Env::new();
        let value = eval_expr(
            &json!({"op": "filter_mask", "items": ["a", "b", "c"], "mask": [true, false, true]}),
            &env,
            &tree,
        )
        .expect("filter");
        assert_eq!(
            value,
            ToolValue::List(vec![ToolValue::Str("a".into()), ToolValue::Str("c".into())])
        );
    }

    #[test]
    fn eval_attr_rejects_reserved_prefix() {
        let tree = tree_with_frame();
        let env = Env::new();
        let err = eval_expr(
            &json!({"ref": "attr", "obj": {"ref": "frame", "id": 0}, "name": "__secret"}),
            &env,
            &tree,
        )
        .expect_err("should reject");
        assert!(matches!(err, HalliganError::Tool(_)));
    }

    #[tokio::test]
    async fn execute_program_assigns_and_calls_registered_tool() {
        let mut tree = tree_with_frame();
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let mut env = Env::new();

        let prog = program(vec![
            json!({"op": "assign", "var": "msg", "value": "hello"}),
            json!({"op": "call", "tool": "echo", "args": {"text": {"var": "msg"}}, "save_as": "out"}),
        ]);

        execute_stage3_program(&prog, &mut env, &mut tree, &registry)
            .await
            .expect("should run");
        assert_eq!(env.get("out"), Some(&ToolValue::Str("hello".to_owned())));
    }

    #[tokio::test]
    async fn execute_program_rejects_unknown_tool() {
        let mut tree = tree_with_frame();
        let registry = ToolRegistry::new();
        let mut env = Env::new();
        let prog = program(vec![json!({"op": "call", "tool": "nope", "args": {}})]);
        let err = execute_stage3_program(&prog, &mut env, &mut tree, &registry)
            .await
            .expect_err("should fail");
        assert!(err.to_string().contains("unknown tool"));
    }

    #[tokio::test]
    async fn foreach_break_stops_only_the_enclosing_loop() {
        let mut tree = tree_with_frame();
        let registry = ToolRegistry::new();
        let mut env = Env::new();

        let prog = program(vec![
            json!({
                "op": "foreach",
                "in": [1, 2, 3],
                "var": "item",
                "do": [{"op": "break"}]
            }),
            json!({"op": "assign", "var": "after", "value": "reached"}),
        ]);

        execute_stage3_program(&prog, &mut env, &mut tree, &registry)
            .await
            .expect("should run without propagating break");
        assert_eq!(env.get("after"), Some(&ToolValue::Str("reached".to_owned())));
    }

    #[tokio::test]
    async fn call_method_rejects_disallowed_method() {
        let mut tree = tree_with_frame();
        let registry = ToolRegistry::new();
        let mut env = Env::new();
        let prog = program(vec![json!({
            "op": "call_method",
            "target": {"ref": "frame", "id": 0},
            "method": "delete_everything",
            "args": {}
        })]);
        let err = execute_stage3_program(&prog, &mut env, &mut tree, &registry)
            .await
            .expect_err("should reject");
        assert!(err.to_string().contains("not allowed"));
    }

    #[tokio::test]
    async fn call_method_allows_frame_get_keypoint() {
        let mut tree = tree_with_frame();
        tree.get_mut(0).expect("frame").add_keypoint(crate::types::Point { x: 1.0, y: 2.0 }, vec![]);
        let registry = ToolRegistry::new();
        let mut env = Env::new();
        let prog = program(vec![json!({
            "op": "call_method",
            "target": {"ref": "frame", "id": 0},
            "method": "get_keypoint",
            "args": {"id": 0},
            "save_as": "kp"
        })]);
        execute_stage3_program(&prog, &mut env, &mut tree, &registry)
            .await
            .expect("should run");
        assert!(matches!(env.get("kp"), Some(ToolValue::Point(_))));
    }

    #[tokio::test]
    async fn top_level_break_is_an_error() {
        let mut tree = tree_with_frame();
        let registry = ToolRegistry::new();
        let mut env = Env::new();
        let prog = program(vec![json!({"op": "break"})]);
        let err = execute_stage3_program(&prog, &mut env, &mut tree, &registry)
            .await
            .expect_err("should fail");
        assert!(err.to_string().contains("break used outside foreach"));
    }
}
