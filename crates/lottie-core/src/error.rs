use crate::composition::NodeId;
use crate::layer::LayerId;
use lottie_data::FieldError;
use thiserror::Error;

/// A keyframe curve that cannot be evaluated.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CurveError {
    #[error("keyframe curve has no control points")]
    Empty,
    #[error("keyframe {index} at frame {frame} precedes the previous keyframe at frame {previous}")]
    Unsorted {
        index: usize,
        frame: f32,
        previous: f32,
    },
    #[error("keyframe at frame {frame} has no value")]
    MissingValue { frame: f32 },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum HierarchyError {
    #[error("node {0} does not belong to this composition")]
    UnknownNode(NodeId),
    #[error("node {0} cannot reference itself")]
    SelfReference(NodeId),
    #[error("node {child} is already attached to {parent}")]
    AlreadyAttached { child: NodeId, parent: NodeId },
    #[error("attaching {child} under {parent} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },
    #[error("node {child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },
    #[error("layer id {0} is already in use")]
    DuplicateId(LayerId),
}

#[derive(Debug, Error)]
pub enum LayerParseError {
    #[error("malformed layer: {0}")]
    Schema(#[from] serde_json::Error),
    #[error("invalid `{property}` animation: {source}")]
    Curve {
        property: &'static str,
        #[source]
        source: CurveError,
    },
}

/// Fatal composition load failures. Recoverable problems (bounds, timing,
/// assets) are absorbed by the loader and never reported here.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unable to read composition: {0}")]
    Io(#[from] std::io::Error),
    #[error("unable to parse composition JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("composition document is not a JSON object")]
    NotAnObject,
    #[error("unable to find layers: {0}")]
    Layers(#[source] FieldError),
    #[error("unable to load layer {index}: {source}")]
    Layer {
        index: usize,
        #[source]
        source: LayerParseError,
    },
    #[error("unable to open resource `{name}`: {source}")]
    Resource {
        name: String,
        #[source]
        source: std::io::Error,
    },
}
