use crate::error::HierarchyError;
use crate::keyframe::FrameDomain;
use crate::layer::{LayerId, LayerNode, MatteType};
use kurbo::Rect;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Index of a layer inside its [`CompositionModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {}", self.0)
    }
}

/// Pixel size of the composition after scale-to-fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub width: i32,
    pub height: i32,
}

impl Bounds {
    pub fn to_rect(self) -> Rect {
        Rect::new(0.0, 0.0, self.width as f64, self.height as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFit {
    pub scale: f32,
    pub bounds: Bounds,
}

/// Shrinks `width` x `height` so the longer side, after applying
/// `initial_scale`, is at most `max_pixels`.
pub fn fit_to_pixel_budget(width: i32, height: i32, initial_scale: f32, max_pixels: u32) -> ScaleFit {
    let mut scale = initial_scale;
    let mut scaled_width = (width as f32 * scale) as i32;
    let mut scaled_height = (height as f32 * scale) as i32;

    let longest = scaled_width.max(scaled_height);
    let budget = max_pixels as f32;
    if longest as f32 > budget {
        let factor = budget / longest as f32;
        scaled_width = ((scaled_width as f32 * factor) as i32).min(max_pixels as i32);
        scaled_height = ((scaled_height as f32 * factor) as i32).min(max_pixels as i32);
        scale *= factor;
    }

    ScaleFit {
        scale,
        bounds: Bounds {
            width: scaled_width,
            height: scaled_height,
        },
    }
}

/// A loaded animation: the flattened layer list, its hierarchy, and the
/// timing and size metadata derived from the document.
///
/// Layers are stored in document order and addressed by [`NodeId`]. The
/// model owns every node; parent links are plain indices, so dropping the
/// model drops the whole graph.
#[derive(Debug)]
pub struct CompositionModel {
    nodes: Vec<LayerNode>,
    layer_index: HashMap<LayerId, NodeId>,
    start_frame: i32,
    end_frame: i32,
    frame_rate: i32,
    duration_ms: u64,
    bounds: Option<Bounds>,
    scale: f32,
    has_masks: bool,
    has_mattes: bool,
    progress: f32,
}

impl Default for CompositionModel {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositionModel {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            layer_index: HashMap::new(),
            start_frame: 0,
            end_frame: 0,
            frame_rate: 0,
            duration_ms: 0,
            bounds: None,
            scale: 1.0,
            has_masks: false,
            has_mattes: false,
            progress: 0.0,
        }
    }

    /// Sets the frame range and rate and derives the duration. A zero
    /// frame rate leaves the duration at zero.
    pub fn set_timing(&mut self, start_frame: i32, end_frame: i32, frame_rate: i32) {
        self.start_frame = start_frame;
        self.end_frame = end_frame;
        self.frame_rate = frame_rate;
        self.duration_ms = 0;
        if frame_rate != 0 {
            let frames = (end_frame as f64 - start_frame as f64).max(0.0);
            self.duration_ms = (frames / frame_rate as f64 * 1000.0).max(0.0) as u64;
        }
    }

    pub fn start_frame(&self) -> i32 {
        self.start_frame
    }

    pub fn end_frame(&self) -> i32 {
        self.end_frame
    }

    pub fn frame_rate(&self) -> i32 {
        self.frame_rate
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn frame_domain(&self) -> FrameDomain {
        FrameDomain::new(self.start_frame as f32, self.end_frame as f32)
    }

    pub fn frame_at(&self, progress: f32) -> f32 {
        self.frame_domain().frame_at(progress)
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn set_fit(&mut self, fit: ScaleFit) {
        self.scale = fit.scale;
        self.bounds = Some(fit.bounds);
    }

    pub fn has_masks(&self) -> bool {
        self.has_masks
    }

    pub fn has_mattes(&self) -> bool {
        self.has_mattes
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All layers in document order.
    pub fn layers(&self) -> &[LayerNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&LayerNode> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut LayerNode> {
        self.nodes.get_mut(id.0)
    }

    pub fn node_id(&self, id: LayerId) -> Option<NodeId> {
        self.layer_index.get(&id).copied()
    }

    pub fn layer(&self, id: LayerId) -> Option<&LayerNode> {
        self.node_id(id).and_then(|node| self.node(node))
    }

    pub fn contains_layer(&self, id: LayerId) -> bool {
        self.layer_index.contains_key(&id)
    }

    /// Smallest identifier greater than every identifier in use. Once
    /// `i64::MAX` is taken, the smallest unused non-negative identifier.
    pub fn next_free_id(&self) -> LayerId {
        let Some(max) = self.layer_index.keys().map(|id| id.0).max() else {
            return LayerId(0);
        };
        match max.checked_add(1) {
            Some(next) => LayerId(next),
            // Fewer layers than ids, so the scan always finds a gap.
            None => (0..i64::MAX)
                .map(LayerId)
                .find(|id| !self.contains_layer(*id))
                .unwrap_or(LayerId(i64::MIN)),
        }
    }

    /// Appends a top-level layer and indexes it. The layer is evaluated at
    /// the model's current progress.
    pub fn add_layer(&mut self, mut node: LayerNode) -> Result<NodeId, HierarchyError> {
        if self.layer_index.contains_key(&node.id()) {
            return Err(HierarchyError::DuplicateId(node.id()));
        }

        node.parent = None;
        node.children.clear();
        node.matte_source = None;
        node.set_progress(self.progress, self.frame_at(self.progress));

        self.has_masks |= node.has_masks();
        self.has_mattes |= node.matte_type() != MatteType::None;

        let id = NodeId(self.nodes.len());
        self.layer_index.insert(node.id(), id);
        self.nodes.push(node);
        Ok(id)
    }

    fn check(&self, id: NodeId) -> Result<(), HierarchyError> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(HierarchyError::UnknownNode(id))
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(LayerNode::parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.node(id) {
            Some(node) => node.children(),
            None => &[],
        }
    }

    /// Layers without a parent, in document order.
    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.parent().is_none())
            .map(|(idx, _)| NodeId(idx))
    }

    /// Walks from the parent of `id` up to its root.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            model: self,
            next: self.parent(id),
        }
    }

    /// Makes `child` a child of `parent` and evaluates the child's subtree
    /// at the current progress.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<(), HierarchyError> {
        self.check(parent)?;
        self.check(child)?;
        if parent == child {
            return Err(HierarchyError::SelfReference(child));
        }
        if let Some(existing) = self.nodes[child.0].parent {
            return Err(HierarchyError::AlreadyAttached {
                child,
                parent: existing,
            });
        }
        if self.ancestors(parent).any(|ancestor| ancestor == child) {
            return Err(HierarchyError::Cycle { parent, child });
        }

        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);

        let frame = self.frame_at(self.progress);
        self.walk_from(child, self.progress, frame);
        Ok(())
    }

    /// Removes `child` from `parent`, returning it to the top level.
    pub fn detach(&mut self, parent: NodeId, child: NodeId) -> Result<(), HierarchyError> {
        self.check(parent)?;
        self.check(child)?;
        if self.nodes[child.0].parent != Some(parent) {
            return Err(HierarchyError::NotAChild { parent, child });
        }

        self.nodes[child.0].parent = None;
        self.nodes[parent.0].children.retain(|c| *c != child);
        Ok(())
    }

    /// Pairs `target` with the layer supplying its matte.
    pub fn set_matte_source(&mut self, target: NodeId, source: NodeId) -> Result<(), HierarchyError> {
        self.check(target)?;
        self.check(source)?;
        if target == source {
            return Err(HierarchyError::SelfReference(target));
        }

        let mut cursor = Some(source);
        while let Some(current) = cursor {
            if current == target {
                return Err(HierarchyError::Cycle {
                    parent: source,
                    child: target,
                });
            }
            cursor = self.nodes[current.0].matte_source;
        }

        self.nodes[target.0].matte_source = Some(source);
        self.has_mattes = true;
        Ok(())
    }

    /// Evaluates every layer at `progress`, parents before children, each
    /// layer exactly once. Returns whether any cached value changed.
    pub fn set_progress(&mut self, progress: f32) -> bool {
        let progress = if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 1.0)
        };
        self.progress = progress;
        let frame = self.frame_at(progress);

        let roots: Vec<NodeId> = self.roots().collect();
        let mut changed = false;
        for root in roots {
            changed |= self.walk_from(root, progress, frame);
        }
        changed
    }

    fn walk_from(&mut self, start: NodeId, progress: f32, frame: f32) -> bool {
        let mut changed = false;
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            let node = &mut self.nodes[id.0];
            changed |= node.set_progress(progress, frame);
            // Reverse so children are visited in document order.
            stack.extend(node.children.iter().rev().copied());
        }
        changed
    }
}

pub struct Ancestors<'a> {
    model: &'a CompositionModel,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.model.parent(current);
        Some(current)
    }
}
