//! The Frame tree: the in-memory structure Stage 2 annotates and Stage 3
//! reads (spec 3).
//!
//! Modelled as an arena (`FrameTree`, a `Vec<Frame>` indexed by [`FrameId`])
//! per the ownership redesign in spec 9: `subframes` are id lists and the
//! `Element` parent back-reference is a `FrameId` rather than a live pointer.
//!
//! `split`/`grid`/`get_element` are CV/layout-backed in the original system;
//! the CV matchers themselves are out of scope (spec 1), so this module
//! implements them as deterministic, non-visual placeholders — sufficient to
//! exercise the Stage-2 applier and its invariants. See DESIGN.md.

use crate::errors::{HalliganError, Result};
use crate::types::{ElementTag, FrameTag, Image, Point, Position};

/// Arena index of a [`Frame`] within a [`FrameTree`].
pub type FrameId = usize;

/// Index of an [`Element`] within its owning frame's `interactables` list.
pub type ElementIndex = usize;

/// Index of a keypoint within a frame's keypoint list.
pub type KeypointIndex = usize;

/// A tagged child region of a [`Frame`] (spec 3).
#[derive(Debug, Clone)]
pub struct Element {
    /// The frame that owns this element.
    pub parent: FrameId,
    /// The element-level interactable tag, if any has been set.
    pub interactable: Option<ElementTag>,
}

impl Element {
    fn new(parent: FrameId) -> Self {
        Self {
            parent,
            interactable: None,
        }
    }

    /// Tag this element with an element-level interactable (spec 3).
    pub fn set_element_as(&mut self, tag: ElementTag) {
        self.interactable = Some(tag);
    }
}

/// A rectangular image region plus metadata (spec 3).
#[derive(Debug, Clone)]
pub struct Frame {
    /// The frame's image payload (opaque — image I/O is out of scope).
    pub image: Image,
    /// A textual description, populated by Stage 1.
    pub description: Option<String>,
    /// Relationship labels keyed by another frame's id, or `None` for an
    /// unanchored relationship (spec 3).
    pub relations: Vec<(Option<FrameId>, String)>,
    /// The frame-level interactable tag, if any has been set.
    pub interactable: Option<FrameTag>,
    /// Elements tagged on this frame, in creation order.
    pub interactables: Vec<Element>,
    /// Child frame ids, in creation order.
    pub subframes: Vec<FrameId>,
    /// Keypoints available for `get_keypoint`/`show_keypoints`.
    pub keypoints: Vec<Point>,
    /// Adjacency list parallel to `keypoints`, for `Point::get_neighbour`/
    /// `Point::show_neighbours`.
    pub keypoint_neighbours: Vec<Vec<KeypointIndex>>,
}

impl Frame {
    /// Construct a new, untagged frame wrapping `image`.
    pub fn new(image: Image) -> Self {
        Self {
            image,
            description: None,
            relations: Vec::new(),
            interactable: None,
            interactables: Vec::new(),
            subframes: Vec::new(),
            keypoints: Vec::new(),
            keypoint_neighbours: Vec::new(),
        }
    }

    /// Append a keypoint with the given neighbour indices (by position
    /// within this frame's keypoint list), returning its index.
    pub fn add_keypoint(&mut self, point: Point, neighbours: Vec<KeypointIndex>) -> KeypointIndex {
        let idx = self.keypoints.len();
        self.keypoints.push(point);
        self.keypoint_neighbours.push(neighbours);
        idx
    }

    /// Tag this frame with a frame-level interactable (spec 3).
    pub fn set_frame_as(&mut self, tag: FrameTag) {
        self.interactable = Some(tag);
    }
}

/// Arena owning the whole frame tree (spec 9 ownership redesign).
#[derive(Debug, Clone, Default)]
pub struct FrameTree {
    frames: Vec<Frame>,
}

impl FrameTree {
    /// Build a tree from a flat list of root frames.
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames }
    }

    /// Number of frames currently in the arena (roots plus every frame
    /// created by `split`).
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the arena holds no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Borrow a frame by id.
    pub fn get(&self, id: FrameId) -> Option<&Frame> {
        self.frames.get(id)
    }

    /// Mutably borrow a frame by id.
    pub fn get_mut(&mut self, id: FrameId) -> Option<&mut Frame> {
        self.frames.get_mut(id)
    }

    /// All root-level frame ids (0..len before any split grows the arena
    /// would also be valid, but callers generally want just the roots).
    pub fn ids(&self) -> impl Iterator<Item = FrameId> {
        0..self.frames.len()
    }

    /// Tag frame `id` with a frame-level interactable (spec 3 `set_frame_as`).
    ///
    /// # Errors
    /// Returns [`HalliganError::Tool`] if `id` is out of range.
    pub fn set_frame_as(&mut self, id: FrameId, tag: FrameTag) -> Result<()> {
        self.get_mut(id)
            .ok_or_else(|| HalliganError::tool(format!("invalid frame id: {id}")))?
            .set_frame_as(tag);
        Ok(())
    }

    /// Split frame `id` into `rows * columns` new subframes, appended to the
    /// arena and linked as children of `id` (spec 3 `split`).
    ///
    /// This is a deterministic placeholder: it creates empty subframes
    /// sharing the parent's image payload rather than performing real
    /// geometric image splitting, since image processing is out of scope
    /// (spec 1). See DESIGN.md.
    ///
    /// # Errors
    /// Returns [`HalliganError::Tool`] if `id` is out of range.
    pub fn split(&mut self, id: FrameId, rows: u32, columns: u32) -> Result<Vec<FrameId>> {
        let image = self
            .get(id)
            .ok_or_else(|| HalliganError::tool(format!("invalid frame id: {id}")))?
            .image
            .clone();

        let tile_count = u64::from(rows).saturating_mul(u64::from(columns));
        let mut new_ids = Vec::with_capacity(usize::try_from(tile_count).unwrap_or(0));
        for _ in 0..tile_count {
            let new_id = self.frames.len();
            self.frames.push(Frame::new(image.clone()));
            new_ids.push(new_id);
        }

        self.get_mut(id)
            .ok_or_else(|| HalliganError::tool(format!("invalid frame id: {id}")))?
            .subframes
            .extend(new_ids.iter().copied());

        Ok(new_ids)
    }

    /// Produce `tiles` evenly-sized elements on frame `id`, laid out as a
    /// single row (spec 3 `grid`).
    ///
    /// Placeholder: does not inspect the image; creates `tiles` untagged
    /// elements. See DESIGN.md.
    ///
    /// # Errors
    /// Returns [`HalliganError::Tool`] if `id` is out of range or `tiles`
    /// is zero.
    pub fn grid(&mut self, id: FrameId, tiles: u32) -> Result<Vec<Vec<ElementIndex>>> {
        if tiles == 0 {
            return Err(HalliganError::tool("grid requires at least one tile"));
        }
        let frame = self
            .get_mut(id)
            .ok_or_else(|| HalliganError::tool(format!("invalid frame id: {id}")))?;

        let mut row = Vec::with_capacity(usize::try_from(tiles).unwrap_or(0));
        for _ in 0..tiles {
            let idx = frame.interactables.len();
            frame.interactables.push(Element::new(id));
            row.push(idx);
        }
        Ok(vec![row])
    }

    /// Locate a single element on frame `id` matching `details`, in the
    /// direction given by `position` (spec 3 `get_element`).
    ///
    /// Placeholder: creates a fresh untagged element each call, since real
    /// detail-matching requires the out-of-scope CV pipeline. See DESIGN.md.
    ///
    /// # Errors
    /// Returns [`HalliganError::Tool`] if `id` is out of range.
    pub fn get_element(
        &mut self,
        id: FrameId,
        _position: Position,
        _details: &str,
    ) -> Result<ElementIndex> {
        let frame = self
            .get_mut(id)
            .ok_or_else(|| HalliganError::tool(format!("invalid frame id: {id}")))?;
        let idx = frame.interactables.len();
        frame.interactables.push(Element::new(id));
        Ok(idx)
    }

    /// Resolve an interactable by index within frame `id`'s tagged `Element`
    /// list (spec 3 `get_interactable`). Whole-frame interactables are
    /// referenced directly via `{ref: "frame", id}` instead, since the
    /// Stage-2 post-condition caps the tree at a single non-NEXT widget.
    ///
    /// # Errors
    /// Returns [`HalliganError::Tool`] if `id` or `index` is out of range.
    pub fn get_interactable(&self, id: FrameId, index: ElementIndex) -> Result<Interactable> {
        let frame = self
            .get(id)
            .ok_or_else(|| HalliganError::tool(format!("invalid frame id: {id}")))?;
        if index >= frame.interactables.len() {
            return Err(HalliganError::tool(format!(
                "invalid interactable id: {index}"
            )));
        }
        Ok(Interactable {
            frame: id,
            index,
        })
    }

    /// Resolve keypoint `index` on frame `id` to a handle (spec 3
    /// `get_keypoint`). Use [`FrameTree::point_coordinates`] to read its
    /// `x`/`y` position.
    ///
    /// # Errors
    /// Returns [`HalliganError::Tool`] if `id` or `index` is out of range.
    pub fn get_keypoint(&self, id: FrameId, index: KeypointIndex) -> Result<KeypointRef> {
        let frame = self
            .get(id)
            .ok_or_else(|| HalliganError::tool(format!("invalid frame id: {id}")))?;
        if index >= frame.keypoints.len() {
            return Err(HalliganError::tool(format!("invalid keypoint id: {index}")));
        }
        Ok(KeypointRef { frame: id, index })
    }

    /// Read the coordinates a keypoint handle refers to.
    ///
    /// # Errors
    /// Returns [`HalliganError::Tool`] if the handle no longer resolves.
    pub fn point_coordinates(&self, handle: KeypointRef) -> Result<Point> {
        self.get(handle.frame)
            .and_then(|frame| frame.keypoints.get(handle.index))
            .copied()
            .ok_or_else(|| HalliganError::tool(format!("invalid keypoint id: {}", handle.index)))
    }

    /// Resolve neighbour `neighbour_id` of keypoint handle `point` (spec 3
    /// `Point::get_neighbour`).
    ///
    /// # Errors
    /// Returns [`HalliganError::Tool`] if `point` or `neighbour_id` is out
    /// of range.
    pub fn get_neighbour(&self, point: KeypointRef, neighbour_id: usize) -> Result<KeypointRef> {
        let frame = self
            .get(point.frame)
            .ok_or_else(|| HalliganError::tool(format!("invalid frame id: {}", point.frame)))?;
        let neighbours = frame.keypoint_neighbours.get(point.index).ok_or_else(|| {
            HalliganError::tool(format!("invalid keypoint id: {}", point.index))
        })?;
        let index = neighbours.get(neighbour_id).copied().ok_or_else(|| {
            HalliganError::tool(format!("invalid neighbour id: {neighbour_id}"))
        })?;
        Ok(KeypointRef {
            frame: point.frame,
            index,
        })
    }

    /// Coordinates of every neighbour of keypoint handle `point` (spec 3
    /// `Point::show_neighbours`).
    ///
    /// # Errors
    /// Returns [`HalliganError::Tool`] if `point` is out of range.
    pub fn show_neighbours(&self, point: KeypointRef) -> Result<Vec<Point>> {
        let frame = self
            .get(point.frame)
            .ok_or_else(|| HalliganError::tool(format!("invalid frame id: {}", point.frame)))?;
        let neighbours = frame.keypoint_neighbours.get(point.index).ok_or_else(|| {
            HalliganError::tool(format!("invalid keypoint id: {}", point.index))
        })?;
        neighbours
            .iter()
            .map(|&idx| {
                frame
                    .keypoints
                    .get(idx)
                    .copied()
                    .ok_or_else(|| HalliganError::tool(format!("invalid keypoint id: {idx}")))
            })
            .collect()
    }

    /// Return the keypoints at `indices` on frame `id` (spec 3
    /// `show_keypoints`); in a full implementation this overlays markers on
    /// the frame's image, which is out of scope here.
    ///
    /// # Errors
    /// Returns [`HalliganError::Tool`] if `id` is out of range or any index
    /// is out of range.
    pub fn show_keypoints(&self, id: FrameId, indices: &[KeypointIndex]) -> Result<Vec<Point>> {
        indices
            .iter()
            .map(|&i| self.get_keypoint(id, i).and_then(|r| self.point_coordinates(r)))
            .collect()
    }

    /// Breadth-first walk of the whole tree (spec 4.4): every frame plus its
    /// interactables, then its subframes. Returns the set of non-`NEXT`
    /// frame/element tags observed and the count of `NEXT` tags (spec I1).
    pub fn collect_interactable_tags(&self, roots: &[FrameId]) -> (std::collections::HashSet<String>, usize) {
        use std::collections::HashSet;
        let mut types: HashSet<String> = HashSet::new();
        let mut next_count = 0usize;
        let mut queue: std::collections::VecDeque<FrameId> = roots.iter().copied().collect();

        while let Some(id) = queue.pop_front() {
            let Some(frame) = self.get(id) else { continue };
            if let Some(tag) = frame.interactable {
                if tag.is_next() {
                    next_count = next_count.saturating_add(1);
                } else {
                    types.insert(format!("{tag:?}"));
                }
            }
            for element in &frame.interactables {
                if let Some(tag) = element.interactable {
                    if tag.is_next() {
                        next_count = next_count.saturating_add(1);
                    } else {
                        types.insert(format!("{tag:?}"));
                    }
                }
            }
            for &sub in &frame.subframes {
                queue.push_back(sub);
            }
        }

        (types, next_count)
    }
}

/// A handle to a resolved interactable (spec 3 `Element | Frame`): an
/// element identified by its owning frame and position within that frame's
/// `interactables` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interactable {
    /// The owning frame.
    pub frame: FrameId,
    /// Position within the owning frame's `interactables` list.
    pub index: ElementIndex,
}

/// A handle to a resolved keypoint (spec 3 `Point`): identified by its
/// owning frame and position within that frame's keypoint list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeypointRef {
    /// The owning frame.
    pub frame: FrameId,
    /// Position within the owning frame's keypoint list.
    pub index: KeypointIndex,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with_one_frame() -> FrameTree {
        FrameTree::new(vec![Frame::new(Image::default())])
    }

    #[test]
    fn split_creates_rows_times_columns_subframes() {
        let mut tree = tree_with_one_frame();
        let ids = tree.split(0, 2, 2).expect("split");
        assert_eq!(ids.len(), 4);
        assert_eq!(tree.get(0).expect("root").subframes, ids);
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn grid_creates_tiles_elements() {
        let mut tree = tree_with_one_frame();
        let grid = tree.grid(0, 3).expect("grid");
        assert_eq!(grid.len(), 1);
        assert_eq!(grid[0].len(), 3);
        assert_eq!(tree.get(0).expect("root").interactables.len(), 3);
    }

    #[test]
    fn grid_rejects_zero_tiles() {
        let mut tree = tree_with_one_frame();
        assert!(tree.grid(0, 0).is_err());
    }

    #[test]
    fn get_interactable_bounds_checks() {
        let mut tree = tree_with_one_frame();
        tree.grid(0, 1).expect("grid");
        assert!(tree.get_interactable(0, 0).is_ok());
        assert!(tree.get_interactable(0, 1).is_err());
        assert!(tree.get_interactable(5, 0).is_err());
    }

    #[test]
    fn collect_interactable_tags_walks_subframes_and_elements() {
        let mut tree = tree_with_one_frame();
        let subs = tree.split(0, 1, 2).expect("split");
        tree.set_frame_as(subs[0], FrameTag::Clickable).expect("tag");
        tree.get_mut(subs[1])
            .expect("frame")
            .set_frame_as(FrameTag::Next);

        let (types, next_count) = tree.collect_interactable_tags(&[0]);
        assert_eq!(types.len(), 1);
        assert_eq!(next_count, 1);
    }

    #[test]
    fn keypoint_neighbours_round_trip() {
        let mut tree = tree_with_one_frame();
        let frame = tree.get_mut(0).expect("root");
        let a = frame.add_keypoint(Point { x: 0.0, y: 0.0 }, vec![]);
        let b = frame.add_keypoint(Point { x: 1.0, y: 1.0 }, vec![a]);
        frame.keypoint_neighbours[a] = vec![b];

        let handle_a = tree.get_keypoint(0, a).expect("keypoint a");
        let handle_b = tree.get_neighbour(handle_a, 0).expect("neighbour");
        assert_eq!(handle_b.index, b);
        assert_eq!(
            tree.point_coordinates(handle_b).expect("coords"),
            Point { x: 1.0, y: 1.0 }
        );
        assert_eq!(tree.show_neighbours(handle_a).expect("show").len(), 1);
    }
}
