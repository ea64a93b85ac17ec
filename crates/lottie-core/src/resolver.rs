use crate::composition::{Bounds, CompositionModel, NodeId};
use crate::layer::{LayerId, LayerNode, MaskMode, MatteType};
use glam::{Affine2, Vec2};
use kurbo::{Affine, BezPath, Point};
use lottie_data::model::BezierPath;

#[derive(Debug, Clone)]
pub struct ResolvedMask {
    pub mode: MaskMode,
    pub inverted: bool,
    /// Mask opacity in 0.0..=1.0.
    pub opacity: f32,
    /// Mask outline in the layer's own coordinate space.
    pub path: BezPath,
}

#[derive(Debug, Clone)]
pub struct ResolvedMatte {
    pub matte_type: MatteType,
    pub source: Box<ResolvedLayer>,
}

/// Everything a renderer needs to draw one layer.
#[derive(Debug, Clone)]
pub struct ResolvedLayer {
    pub id: LayerId,
    pub node: NodeId,
    pub name: Option<String>,
    pub layer_type: u8,
    /// The layer's own transform.
    pub local: Affine2,
    /// Parent chain applied: `parent.transform * local`.
    pub transform: Affine2,
    /// Own opacity times every ancestor's, in 0.0..=1.0.
    pub opacity: f32,
    pub masks: Vec<ResolvedMask>,
    pub matte: Option<ResolvedMatte>,
}

impl ResolvedLayer {
    pub fn alpha(&self) -> u8 {
        (self.opacity * 255.0).round().clamp(0.0, 255.0) as u8
    }

    pub fn affine(&self) -> Affine {
        to_kurbo(self.transform)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedFrame {
    pub progress: f32,
    pub frame: f32,
    pub bounds: Option<Bounds>,
    pub scale: f32,
    pub layers: Vec<ResolvedLayer>,
}

impl ResolvedFrame {
    /// Scale-to-fit transform the renderer applies before any layer.
    pub fn root_transform(&self) -> Affine2 {
        Affine2::from_scale(Vec2::splat(self.scale))
    }

    pub fn layer(&self, id: LayerId) -> Option<&ResolvedLayer> {
        self.layers.iter().find(|layer| layer.id == id)
    }
}

/// Receives resolved layers in document draw order.
pub trait RenderSink {
    fn draw_layer(&mut self, layer: ResolvedLayer);
}

impl RenderSink for Vec<ResolvedLayer> {
    fn draw_layer(&mut self, layer: ResolvedLayer) {
        self.push(layer);
    }
}

impl RenderSink for ResolvedFrame {
    fn draw_layer(&mut self, layer: ResolvedLayer) {
        self.layers.push(layer);
    }
}

/// Turns the cached animation values of a [`CompositionModel`] into world
/// transforms and effective opacities.
///
/// The resolver only reads caches; drive the model with
/// [`CompositionModel::set_progress`] first.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformResolver;

impl TransformResolver {
    /// `T(position) * R(rotation) * S(scale) * T(-anchor)`. Identity
    /// components are skipped.
    pub fn local_transform(node: &LayerNode) -> Affine2 {
        let mut transform = Affine2::IDENTITY;

        if let Some(position) = node.position().and_then(|p| p.value()) {
            if *position != Vec2::ZERO {
                transform = transform * Affine2::from_translation(*position);
            }
        }
        if let Some(rotation) = node.rotation().and_then(|r| r.value()) {
            if *rotation != 0.0 {
                transform = transform * Affine2::from_angle(rotation.to_radians());
            }
        }
        if let Some(scale) = node.scale().and_then(|s| s.value()) {
            if !scale.is_identity() {
                transform = transform * Affine2::from_scale(scale.as_vec2());
            }
        }
        if let Some(anchor) = node.anchor_point().and_then(|a| a.value()) {
            if *anchor != Vec2::ZERO {
                transform = transform * Affine2::from_translation(-*anchor);
            }
        }

        transform
    }

    pub fn resolve(&self, model: &CompositionModel) -> ResolvedFrame {
        let mut frame = ResolvedFrame {
            progress: model.progress(),
            frame: model.frame_at(model.progress()),
            bounds: model.bounds(),
            scale: model.scale(),
            layers: Vec::with_capacity(model.len()),
        };
        self.resolve_into(model, &mut frame);
        frame
    }

    /// Emits every drawable layer to `sink` in document order. Hidden
    /// layers, layers outside their in/out range and matte sources are not
    /// emitted; matte sources travel with their target instead.
    pub fn resolve_into(&self, model: &CompositionModel, sink: &mut impl RenderSink) {
        let world = world_states(model);

        for (idx, node) in model.layers().iter().enumerate() {
            if node.is_hidden() || node.is_matte_source() || !node.is_active_at(node.frame()) {
                continue;
            }
            let id = NodeId(idx);
            let mut layer = build_layer(id, node, world[idx]);

            if let Some(source_id) = node.matte_source() {
                if let Some(source) = model.node(source_id) {
                    layer.matte = Some(ResolvedMatte {
                        matte_type: node.matte_type(),
                        source: Box::new(build_layer(source_id, source, world[source_id.0])),
                    });
                }
            }

            sink.draw_layer(layer);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct WorldState {
    local: Affine2,
    transform: Affine2,
    opacity: f32,
}

impl Default for WorldState {
    fn default() -> Self {
        Self {
            local: Affine2::IDENTITY,
            transform: Affine2::IDENTITY,
            opacity: 1.0,
        }
    }
}

fn world_states(model: &CompositionModel) -> Vec<WorldState> {
    let mut states = vec![WorldState::default(); model.len()];
    let mut stack: Vec<(NodeId, Affine2, f32)> = model
        .roots()
        .map(|root| (root, Affine2::IDENTITY, 1.0))
        .collect();

    while let Some((id, parent_transform, parent_opacity)) = stack.pop() {
        let Some(node) = model.node(id) else {
            continue;
        };
        let local = TransformResolver::local_transform(node);
        let state = WorldState {
            local,
            transform: parent_transform * local,
            opacity: parent_opacity * node.opacity_fraction(),
        };
        states[id.0] = state;
        for child in node.children() {
            stack.push((*child, state.transform, state.opacity));
        }
    }
    states
}

fn build_layer(id: NodeId, node: &LayerNode, state: WorldState) -> ResolvedLayer {
    let masks = node
        .masks()
        .iter()
        .filter_map(|mask| {
            mask.path.value().map(|path| ResolvedMask {
                mode: mask.mode,
                inverted: mask.inverted,
                opacity: mask.opacity_fraction(),
                path: bezier_to_path(path),
            })
        })
        .collect();

    ResolvedLayer {
        id: node.id(),
        node: id,
        name: node.name().map(str::to_owned),
        layer_type: node.layer_type(),
        local: state.local,
        transform: state.transform,
        opacity: state.opacity,
        masks,
        matte: None,
    }
}

pub fn to_kurbo(transform: Affine2) -> Affine {
    let m = transform.matrix2;
    let t = transform.translation;
    Affine::new([
        m.x_axis.x as f64,
        m.x_axis.y as f64,
        m.y_axis.x as f64,
        m.y_axis.y as f64,
        t.x as f64,
        t.y as f64,
    ])
}

/// Converts vertex/tangent path data into a cubic Bezier path. Tangents are
/// relative to their vertex.
pub fn bezier_to_path(data: &BezierPath) -> BezPath {
    let mut path = BezPath::new();
    let count = data.v.len();
    if count == 0 {
        return path;
    }

    let point = |p: [f32; 2]| Point::new(p[0] as f64, p[1] as f64);
    let tangent = |list: &[[f32; 2]], idx: usize| list.get(idx).copied().unwrap_or([0.0, 0.0]);

    path.move_to(point(data.v[0]));
    let segments = if data.c { count } else { count - 1 };
    for i in 0..segments {
        let next = (i + 1) % count;
        let from = data.v[i];
        let to = data.v[next];
        let out = tangent(&data.o, i);
        let inc = tangent(&data.i, next);
        path.curve_to(
            point([from[0] + out[0], from[1] + out[1]]),
            point([to[0] + inc[0], to[1] + inc[1]]),
            point(to),
        );
    }
    if data.c {
        path.close_path();
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::PropertyAnimation;
    use crate::keyframe::{FrameDomain, KeyframeCurve, ScaleXY};
    use kurbo::PathEl;

    fn constant<T>(value: T) -> PropertyAnimation<T>
    where
        T: crate::keyframe::Interpolatable + PartialEq + Send + 'static,
    {
        PropertyAnimation::new(KeyframeCurve::constant(value), FrameDomain::new(0.0, 10.0))
    }

    fn approx(a: Vec2, b: Vec2) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn test_order_is_translate_rotate_scale_unanchor() {
        let mut node = LayerNode::new(LayerId(1));
        node.set_position(constant(Vec2::new(100.0, 50.0)));
        node.set_rotation(constant(90.0f32));
        node.set_scale(constant(ScaleXY::new(2.0, 1.0)));
        node.set_anchor_point(constant(Vec2::new(10.0, 0.0)));

        let m = TransformResolver::local_transform(&node);
        // (10,0) is the anchor: it lands on the position.
        assert!(approx(m.transform_point2(Vec2::new(10.0, 0.0)), Vec2::new(100.0, 50.0)));
        // One unit right of the anchor is scaled by 2 then rotated onto +y.
        assert!(approx(m.transform_point2(Vec2::new(11.0, 0.0)), Vec2::new(100.0, 52.0)));
    }

    #[test]
    fn test_identity_parts_are_skipped() {
        let mut node = LayerNode::new(LayerId(1));
        node.set_position(constant(Vec2::ZERO));
        node.set_rotation(constant(0.0f32));
        node.set_scale(constant(ScaleXY::IDENTITY));
        node.set_anchor_point(constant(Vec2::ZERO));
        assert_eq!(TransformResolver::local_transform(&node), Affine2::IDENTITY);
    }

    #[test]
    fn test_parent_opacity_multiplies() {
        let mut model = CompositionModel::new();
        model.set_timing(0, 10, 10);
        let mut parent = LayerNode::new(LayerId(1));
        parent.set_opacity(constant(128u8));
        parent.set_position(constant(Vec2::new(5.0, 5.0)));
        let mut child = LayerNode::new(LayerId(2));
        child.set_opacity(constant(255u8));
        let parent = model.add_layer(parent).unwrap();
        let child = model.add_layer(child).unwrap();
        model.attach(parent, child).unwrap();

        let frame = TransformResolver.resolve(&model);
        let resolved = frame.layer(LayerId(2)).unwrap();
        assert!((resolved.opacity - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(resolved.alpha(), 128);
        assert!(approx(resolved.transform.transform_point2(Vec2::ZERO), Vec2::new(5.0, 5.0)));
        assert_eq!(resolved.local, Affine2::IDENTITY);
        assert_eq!(resolved.affine(), Affine::translate((5.0, 5.0)));
    }

    #[test]
    fn test_hidden_and_matte_sources_are_not_emitted() {
        let mut model = CompositionModel::new();
        model.set_timing(0, 10, 10);
        let mut matte = LayerNode::new(LayerId(1));
        matte.set_is_matte_source(true);
        let mut target = LayerNode::new(LayerId(2));
        target.set_matte_type(MatteType::Invert);
        let mut hidden = LayerNode::new(LayerId(3));
        hidden.set_hidden(true);
        let mut late = LayerNode::new(LayerId(4));
        late.set_in_out(Some(5.0), None);

        let matte = model.add_layer(matte).unwrap();
        let target = model.add_layer(target).unwrap();
        model.add_layer(hidden).unwrap();
        model.add_layer(late).unwrap();
        model.set_matte_source(target, matte).unwrap();
        model.set_progress(0.0);

        let mut sink = Vec::new();
        TransformResolver.resolve_into(&model, &mut sink);
        assert_eq!(sink.len(), 1);
        let matte = sink[0].matte.as_ref().unwrap();
        assert_eq!(matte.matte_type, MatteType::Invert);
        assert_eq!(matte.source.id, LayerId(1));

        assert!(model.set_progress(0.5));
        let frame = TransformResolver.resolve(&model);
        assert!(frame.layer(LayerId(4)).is_some());
    }

    #[test]
    fn test_open_and_closed_paths() {
        let data = BezierPath {
            c: true,
            v: vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0]],
            i: vec![[0.0, 0.0]; 3],
            o: vec![[1.0, 0.0], [0.0, 0.0], [0.0, 0.0]],
        };
        let closed = bezier_to_path(&data);
        let els = closed.elements();
        assert_eq!(els.len(), 5);
        assert!(matches!(els[0], PathEl::MoveTo(p) if p == Point::new(0.0, 0.0)));
        assert!(matches!(els[1], PathEl::CurveTo(c1, _, end) if c1 == Point::new(1.0, 0.0) && end == Point::new(10.0, 0.0)));
        assert!(matches!(els[4], PathEl::ClosePath));

        let open = bezier_to_path(&BezierPath { c: false, ..data });
        assert_eq!(open.elements().len(), 3);
        assert!(bezier_to_path(&BezierPath::default()).elements().is_empty());
    }

    #[test]
    fn test_root_transform_scales() {
        let frame = ResolvedFrame {
            scale: 0.5,
            ..Default::default()
        };
        assert!(approx(frame.root_transform().transform_point2(Vec2::new(4.0, 2.0)), Vec2::new(2.0, 1.0)));
    }
}
