use crate::animation::PropertyAnimation;
use crate::composition::{CompositionModel, NodeId};
use crate::error::{CurveError, LayerParseError};
use crate::keyframe::{ControlPoint, Interpolatable, KeyframeCurve, ScaleXY, SplitCurve};
use glam::Vec2;
use lottie_data::model::{self as data, BezierPath};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Mutex, OnceLock};

/// Identifier of a layer, unique within one composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub i64);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a layer's alpha is derived from its paired matte layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatteType {
    #[default]
    None,
    Add,
    Invert,
}

impl MatteType {
    pub fn from_code(code: Option<u8>) -> Self {
        match code {
            None | Some(0) => MatteType::None,
            Some(1) => MatteType::Add,
            Some(2) => MatteType::Invert,
            Some(other) => {
                log_unsupported_matte_once(other);
                MatteType::None
            }
        }
    }
}

fn log_unsupported_matte_once(code: u8) {
    static UNSUPPORTED_MATTES: OnceLock<Mutex<HashSet<u8>>> = OnceLock::new();
    let store = UNSUPPORTED_MATTES.get_or_init(|| Mutex::new(HashSet::new()));
    if let Ok(mut seen) = store.lock() {
        if seen.insert(code) {
            tracing::warn!(code, "unsupported matte mode, layer is drawn without a matte");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskMode {
    None,
    Add,
    Subtract,
    Intersect,
    Lighten,
    Darken,
    Difference,
}

impl MaskMode {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "n" => Some(MaskMode::None),
            "a" => Some(MaskMode::Add),
            "s" => Some(MaskMode::Subtract),
            "i" => Some(MaskMode::Intersect),
            "l" => Some(MaskMode::Lighten),
            "d" => Some(MaskMode::Darken),
            "f" => Some(MaskMode::Difference),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Mask {
    pub mode: MaskMode,
    pub inverted: bool,
    pub name: Option<String>,
    pub path: PropertyAnimation<BezierPath>,
    pub opacity: Option<PropertyAnimation<u8>>,
}

impl Mask {
    pub fn new(mode: MaskMode, path: PropertyAnimation<BezierPath>) -> Self {
        Self {
            mode,
            inverted: false,
            name: None,
            path,
            opacity: None,
        }
    }

    /// Mask opacity as a fraction, 1.0 when the mask has none.
    pub fn opacity_fraction(&self) -> f32 {
        self.opacity
            .as_ref()
            .and_then(PropertyAnimation::value)
            .map_or(1.0, |alpha| *alpha as f32 / 255.0)
    }

    fn set_progress(&mut self, progress: f32) -> bool {
        let mut changed = self.path.set_progress(progress);
        if let Some(opacity) = &mut self.opacity {
            changed |= opacity.set_progress(progress);
        }
        changed
    }
}

/// One node of the scene graph.
///
/// Nodes live in a [`CompositionModel`]; `parent` and `children` are indices
/// into it, never owning references. Hierarchy edits go through
/// [`CompositionModel::attach`] and [`CompositionModel::detach`].
#[derive(Debug)]
pub struct LayerNode {
    id: LayerId,
    name: Option<String>,
    layer_type: u8,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    source_index: Option<i64>,
    parent_ref: Option<i64>,
    position: Option<PropertyAnimation<Vec2>>,
    anchor_point: Option<PropertyAnimation<Vec2>>,
    rotation: Option<PropertyAnimation<f32>>,
    scale: Option<PropertyAnimation<ScaleXY>>,
    opacity: Option<PropertyAnimation<u8>>,
    masks: Vec<Mask>,
    matte_type: MatteType,
    pub(crate) matte_source: Option<NodeId>,
    is_matte_source: bool,
    hidden: bool,
    in_frame: Option<f32>,
    out_frame: Option<f32>,
    progress: f32,
    frame: f32,
}

impl LayerNode {
    pub fn new(id: LayerId) -> Self {
        Self {
            id,
            name: None,
            layer_type: 0,
            parent: None,
            children: Vec::new(),
            source_index: None,
            parent_ref: None,
            position: None,
            anchor_point: None,
            rotation: None,
            scale: None,
            opacity: None,
            masks: Vec::new(),
            matte_type: MatteType::None,
            matte_source: None,
            is_matte_source: false,
            hidden: false,
            in_frame: None,
            out_frame: None,
            progress: 0.0,
            frame: 0.0,
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: LayerId) {
        self.id = id;
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn layer_type(&self) -> u8 {
        self.layer_type
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// `ind` as written in the document, before any id reassignment.
    pub fn source_index(&self) -> Option<i64> {
        self.source_index
    }

    /// `parent` as written in the document; resolved by the loader.
    pub fn parent_ref(&self) -> Option<i64> {
        self.parent_ref
    }

    pub fn position(&self) -> Option<&PropertyAnimation<Vec2>> {
        self.position.as_ref()
    }

    pub fn position_mut(&mut self) -> Option<&mut PropertyAnimation<Vec2>> {
        self.position.as_mut()
    }

    pub fn anchor_point(&self) -> Option<&PropertyAnimation<Vec2>> {
        self.anchor_point.as_ref()
    }

    pub fn rotation(&self) -> Option<&PropertyAnimation<f32>> {
        self.rotation.as_ref()
    }

    pub fn scale(&self) -> Option<&PropertyAnimation<ScaleXY>> {
        self.scale.as_ref()
    }

    pub fn opacity(&self) -> Option<&PropertyAnimation<u8>> {
        self.opacity.as_ref()
    }

    pub fn set_position(&mut self, mut anim: PropertyAnimation<Vec2>) {
        anim.set_progress(self.progress);
        self.position = Some(anim);
    }

    pub fn set_anchor_point(&mut self, mut anim: PropertyAnimation<Vec2>) {
        anim.set_progress(self.progress);
        self.anchor_point = Some(anim);
    }

    pub fn set_rotation(&mut self, mut anim: PropertyAnimation<f32>) {
        anim.set_progress(self.progress);
        self.rotation = Some(anim);
    }

    pub fn set_scale(&mut self, mut anim: PropertyAnimation<ScaleXY>) {
        anim.set_progress(self.progress);
        self.scale = Some(anim);
    }

    pub fn set_opacity(&mut self, mut anim: PropertyAnimation<u8>) {
        anim.set_progress(self.progress);
        self.opacity = Some(anim);
    }

    pub fn masks(&self) -> &[Mask] {
        &self.masks
    }

    pub fn add_mask(&mut self, mut mask: Mask) {
        mask.set_progress(self.progress);
        self.masks.push(mask);
    }

    pub fn matte_type(&self) -> MatteType {
        self.matte_type
    }

    pub fn set_matte_type(&mut self, matte_type: MatteType) {
        self.matte_type = matte_type;
    }

    /// The layer whose alpha drives this layer's matte.
    pub fn matte_source(&self) -> Option<NodeId> {
        self.matte_source
    }

    pub fn is_matte_source(&self) -> bool {
        self.is_matte_source
    }

    pub fn set_is_matte_source(&mut self, value: bool) {
        self.is_matte_source = value;
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub fn set_in_out(&mut self, in_frame: Option<f32>, out_frame: Option<f32>) {
        self.in_frame = in_frame;
        self.out_frame = out_frame;
    }

    /// Whether the layer is within its in/out range. Missing bounds are open.
    pub fn is_active_at(&self, frame: f32) -> bool {
        self.in_frame.map_or(true, |start| frame >= start)
            && self.out_frame.map_or(true, |end| frame < end)
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn frame(&self) -> f32 {
        self.frame
    }

    /// Opacity as a fraction, 1.0 when the layer has no opacity animation.
    pub fn opacity_fraction(&self) -> f32 {
        self.opacity
            .as_ref()
            .and_then(PropertyAnimation::value)
            .map_or(1.0, |alpha| *alpha as f32 / 255.0)
    }

    /// Re-evaluates every owned animation. Children are advanced by the
    /// owning composition. Returns whether anything observable changed,
    /// including the layer entering or leaving its in/out range.
    pub(crate) fn set_progress(&mut self, progress: f32, frame: f32) -> bool {
        let was_active = self.is_active_at(self.frame);
        self.progress = progress;
        self.frame = frame;

        let mut changed = was_active != self.is_active_at(frame);
        if let Some(anim) = &mut self.position {
            changed |= anim.set_progress(progress);
        }
        if let Some(anim) = &mut self.anchor_point {
            changed |= anim.set_progress(progress);
        }
        if let Some(anim) = &mut self.rotation {
            changed |= anim.set_progress(progress);
        }
        if let Some(anim) = &mut self.scale {
            changed |= anim.set_progress(progress);
        }
        if let Some(anim) = &mut self.opacity {
            changed |= anim.set_progress(progress);
        }
        for mask in &mut self.masks {
            changed |= mask.set_progress(progress);
        }
        changed
    }

    pub fn has_masks(&self) -> bool {
        !self.masks.is_empty()
    }
}

/// Turns one layer document into a [`LayerNode`].
pub trait LayerParser: Send + Sync {
    /// `composition` is the model being loaded; its timing is already known.
    fn parse(
        &self,
        document: &serde_json::Value,
        composition: &CompositionModel,
    ) -> Result<LayerNode, LayerParseError>;
}

/// Parses Lottie layer objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct LottieLayerParser;

impl LayerParser for LottieLayerParser {
    fn parse(
        &self,
        document: &serde_json::Value,
        composition: &CompositionModel,
    ) -> Result<LayerNode, LayerParseError> {
        let layer = data::Layer::deserialize(document)?;
        let domain = composition.frame_domain();

        let mut node = LayerNode::new(LayerId(layer.ind.unwrap_or(0)));
        node.layer_type = layer.ty;
        node.name = layer.nm.clone();
        node.source_index = layer.ind;
        node.parent_ref = layer.parent;
        node.hidden = layer.is_hidden();
        node.is_matte_source = layer.is_matte_source();
        node.matte_type = MatteType::from_code(layer.tt);
        node.set_in_out(layer.ip, layer.op);

        let ks = &layer.ks;
        if let Some(curve) = curve_from(&ks.a, "anchor", |v| Vec2::new(v.0[0], v.0[1]))? {
            node.set_anchor_point(PropertyAnimation::new(curve, domain));
        }
        match &ks.p {
            data::PositionProperty::Unified(p) => {
                if let Some(curve) = curve_from(p, "position", |v| Vec2::new(v.0[0], v.0[1]))? {
                    node.set_position(PropertyAnimation::new(curve, domain));
                }
            }
            data::PositionProperty::Split { x, y, .. } => {
                let x = curve_from(x, "position.x", |v| *v)?;
                let y = curve_from(y, "position.y", |v| *v)?;
                if x.is_some() || y.is_some() {
                    let split = SplitCurve {
                        x: x.unwrap_or_else(|| KeyframeCurve::constant(0.0)),
                        y: y.unwrap_or_else(|| KeyframeCurve::constant(0.0)),
                    };
                    node.set_position(PropertyAnimation::new(split, domain));
                }
            }
        }
        if let Some(curve) = curve_from(&ks.s, "scale", |v| {
            ScaleXY::new(v.0[0] / 100.0, v.0[1] / 100.0)
        })? {
            node.set_scale(PropertyAnimation::new(curve, domain));
        }
        if let Some(curve) = curve_from(&ks.rz, "rotation", |v| *v)? {
            node.set_rotation(PropertyAnimation::new(curve, domain));
        }
        if let Some(curve) = curve_from(&ks.o, "opacity", |v| percent_to_alpha(*v))? {
            node.set_opacity(PropertyAnimation::new(curve, domain));
        }

        for props in layer.masks_properties.iter().flatten() {
            let Some(mode) = props.mode.as_deref().and_then(MaskMode::from_code) else {
                tracing::debug!(mode = ?props.mode, layer = %node.id, "skipping mask with unknown mode");
                continue;
            };
            let Some(curve) = curve_from(&props.pt, "mask", BezierPath::clone)? else {
                tracing::debug!(layer = %node.id, "skipping mask without a path");
                continue;
            };
            let opacity = curve_from(&props.o, "mask.opacity", |v| percent_to_alpha(*v))?
                .map(|curve| PropertyAnimation::new(curve, domain));
            node.add_mask(Mask {
                inverted: props.inv,
                name: props.nm.clone(),
                opacity,
                ..Mask::new(mode, PropertyAnimation::new(curve, domain))
            });
        }

        Ok(node)
    }
}

/// Lottie opacity is a percentage; the core works on 0..=255.
pub fn percent_to_alpha(percent: f32) -> u8 {
    (percent / 100.0 * 255.0).round().clamp(0.0, 255.0) as u8
}

fn curve_from<T, U>(
    prop: &data::Property<T>,
    property: &'static str,
    convert: impl Fn(&T) -> U,
) -> Result<Option<KeyframeCurve<U>>, LayerParseError>
where
    U: Interpolatable,
{
    let wrap = |source| LayerParseError::Curve { property, source };
    match &prop.k {
        data::Value::Default => Ok(None),
        data::Value::Static(v) => Ok(Some(KeyframeCurve::constant(convert(v)))),
        data::Value::Animated(keyframes) => {
            let mut points: Vec<ControlPoint<U>> = Vec::with_capacity(keyframes.len());
            let mut pending_ease_in = None;
            let mut previous_end: Option<U> = None;

            for kf in keyframes {
                // Legacy documents omit `s` on the final keyframe and carry
                // the value as the previous keyframe's `e`.
                let value = match (&kf.s, previous_end.take()) {
                    (Some(s), _) => convert(s),
                    (None, Some(end)) => end,
                    (None, None) => return Err(wrap(CurveError::MissingValue { frame: kf.t })),
                };

                let mut point = ControlPoint::new(kf.t, value);
                point.ease_in = pending_ease_in.take();
                point.ease_out = kf.o.as_ref().and_then(data::BezierTangent::handle).map(Vec2::from);
                point.hold = kf.is_hold();
                pending_ease_in = kf.i.as_ref().and_then(data::BezierTangent::handle).map(Vec2::from);
                previous_end = kf.e.as_ref().map(&convert);
                points.push(point);
            }

            KeyframeCurve::new(points).map(Some).map_err(wrap)
        }
    }
}
