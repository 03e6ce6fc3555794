//! Applying a validated Stage-2 plan to the frame tree and checking the
//! post-condition invariant (spec 4.4, I1, I2).

use crate::errors::{HalliganError, Result};
use crate::frame::FrameTree;
use crate::kernel::schemas::Stage2Action;

fn apply_action(tree: &mut FrameTree, action: &Stage2Action) -> Result<()> {
    match action {
        Stage2Action::SetFrame { frame, interactable } => tree.set_frame_as(*frame, *interactable),
        Stage2Action::SplitFrame { frame, rows, columns, mark_as } => {
            let subframes = tree.split(*frame, *rows, *columns)?;
            for sub in subframes {
                tree.set_frame_as(sub, *mark_as)?;
            }
            Ok(())
        }
        Stage2Action::GridFrame { frame, tiles, mark_as } => {
            let grid = tree.grid(*frame, *tiles)?;
            let frame_mut = tree
                .get_mut(*frame)
                .ok_or_else(|| HalliganError::tool(format!("invalid frame id: {frame}")))?;
            for row in grid {
                for element in row {
                    frame_mut.interactables[element].set_element_as(*mark_as);
                }
            }
            Ok(())
        }
        Stage2Action::GetElement { frame, position, details, mark_as } => {
            let index = tree.get_element(*frame, *position, details)?;
            let frame_mut = tree
                .get_mut(*frame)
                .ok_or_else(|| HalliganError::tool(format!("invalid frame id: {frame}")))?;
            frame_mut.interactables[index].set_element_as(*mark_as);
            Ok(())
        }
    }
}

/// Apply every action in `plan` to `tree` in order, then enforce the
/// single-non-NEXT-interactable post-condition (spec 4.4, I1) across
/// `roots`.
///
/// # Errors
/// Returns [`HalliganError::Tool`] if an action targets an invalid id, or
/// [`HalliganError::Validation`] if the post-condition fails after every
/// action has applied.
pub fn apply_stage2_plan(
    tree: &mut FrameTree,
    roots: &[usize],
    plan: &crate::kernel::schemas::Stage2Plan,
) -> Result<()> {
    for action in &plan.actions {
        apply_action(tree, action)?;
    }

    let (types, next_count) = tree.collect_interactable_tags(roots);
    if types.len() != 1 {
        return Err(HalliganError::validation(format!(
            "expected exactly one non-NEXT interactable type after Stage 2, found {}",
            types.len()
        )));
    }
    if next_count > 1 {
        return Err(HalliganError::validation(format!(
            "expected at most one NEXT interactable after Stage 2, found {next_count}"
        )));
    }
    Ok(())
}
