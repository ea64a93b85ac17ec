//! Keyframe evaluation, layer hierarchy and transform resolution for Lottie
//! compositions.
//!
//! A [`CompositionLoader`] turns a parsed document into a
//! [`CompositionModel`]. [`CompositionModel::set_progress`] evaluates every
//! animated property for a point in time, and [`TransformResolver`] turns the
//! cached values into per-layer world transforms and opacities for a
//! renderer. [`LottiePlayer`] wraps the three for simple playback.

pub mod animation;
pub mod composition;
pub mod error;
pub mod keyframe;
pub mod layer;
pub mod loader;
pub mod player;
pub mod resolver;

pub use animation::{ObserverId, PropertyAnimation};
pub use composition::{fit_to_pixel_budget, Bounds, CompositionModel, NodeId, ScaleFit};
pub use error::{CurveError, HierarchyError, LayerParseError, LoadError};
pub use keyframe::{
    solve_cubic_bezier, ControlPoint, Curve, FrameDomain, Interpolatable, KeyframeCurve, ScaleXY,
    SplitCurve,
};
pub use layer::{LayerId, LayerNode, LayerParser, LottieLayerParser, Mask, MaskMode, MatteType};
pub use loader::{CompositionLoader, FlattenPrecomps, LoaderConfig, PrecompStrategy};
pub use player::LottiePlayer;
pub use resolver::{
    bezier_to_path, RenderSink, ResolvedFrame, ResolvedLayer, ResolvedMask, ResolvedMatte,
    TransformResolver,
};
