//! Builds a [`CompositionModel`] from a parsed document.
//!
//! Only the `layers` array is mandatory. Timing, size and assets are read
//! field by field; a missing or malformed optional field is logged and the
//! derived value keeps its default.

use crate::composition::{fit_to_pixel_budget, CompositionModel, NodeId};
use crate::error::{LayerParseError, LoadError};
use crate::layer::{LayerId, LayerNode, LayerParser, LottieLayerParser, MatteType};
use lottie_data::{Document, FieldError};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Upper bound for the longer side of the scaled composition.
    pub max_pixels: u32,
    pub initial_scale: f32,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_pixels: 1000,
            initial_scale: 1.0,
        }
    }
}

/// Decides which asset layer lists end up in the composition.
pub trait PrecompStrategy: Send + Sync {
    fn layer_blocks<'a>(&self, assets: &'a [Value]) -> Vec<&'a [Value]>;
}

/// Appends every asset's `layers` to the top-level layer list. Precomp
/// timing, looping and nesting are not modelled.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlattenPrecomps;

impl PrecompStrategy for FlattenPrecomps {
    fn layer_blocks<'a>(&self, assets: &'a [Value]) -> Vec<&'a [Value]> {
        let mut blocks = Vec::new();
        for (index, asset) in assets.iter().enumerate() {
            let Some(doc) = Document::new(asset) else {
                tracing::warn!(index, "ignoring asset that is not an object");
                continue;
            };
            match doc.get_array("layers") {
                Ok(layers) => blocks.push(layers),
                // Image and audio assets carry no layers.
                Err(err) if err.is_missing() => {}
                Err(err) => tracing::warn!(index, %err, "ignoring asset layers"),
            }
        }
        blocks
    }
}

#[derive(Clone)]
pub struct CompositionLoader {
    config: LoaderConfig,
    parser: Arc<dyn LayerParser>,
    precomps: Arc<dyn PrecompStrategy>,
}

impl fmt::Debug for CompositionLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositionLoader")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for CompositionLoader {
    fn default() -> Self {
        Self::new(LoaderConfig::default())
    }
}

impl CompositionLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            parser: Arc::new(LottieLayerParser),
            precomps: Arc::new(FlattenPrecomps),
        }
    }

    pub fn with_layer_parser(mut self, parser: impl LayerParser + 'static) -> Self {
        self.parser = Arc::new(parser);
        self
    }

    pub fn with_precomp_strategy(mut self, strategy: impl PrecompStrategy + 'static) -> Self {
        self.precomps = Arc::new(strategy);
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn load_from_reader<R: Read>(&self, reader: R) -> Result<CompositionModel, LoadError> {
        let document: Value = serde_json::from_reader(reader)?;
        self.load(&document)
    }

    pub fn load_from_slice(&self, bytes: &[u8]) -> Result<CompositionModel, LoadError> {
        let document: Value = serde_json::from_slice(bytes)?;
        self.load(&document)
    }

    pub fn load_from_path(&self, path: impl AsRef<Path>) -> Result<CompositionModel, LoadError> {
        let file = File::open(path.as_ref())?;
        self.load_from_reader(BufReader::new(file))
    }

    pub fn load(&self, document: &Value) -> Result<CompositionModel, LoadError> {
        let doc = Document::new(document).ok_or(LoadError::NotAnObject)?;
        let mut model = CompositionModel::new();

        let start = optional_i32(&doc, "ip");
        let end = optional_i32(&doc, "op");
        let rate = optional_i32(&doc, "fr");
        model.set_timing(start, end, rate);

        match (doc.get_i32("w"), doc.get_i32("h")) {
            (Ok(width), Ok(height)) => {
                let fit = fit_to_pixel_budget(
                    width,
                    height,
                    self.config.initial_scale,
                    self.config.max_pixels,
                );
                tracing::debug!(width, height, scale = fit.scale, "derived composition bounds");
                model.set_fit(fit);
            }
            (w, h) => {
                for err in [w.err(), h.err()].into_iter().flatten() {
                    if !err.is_missing() {
                        tracing::warn!(%err, "composition size unreadable, bounds left unset");
                    }
                }
            }
        }

        let layers = doc.get_array("layers").map_err(LoadError::Layers)?;
        self.load_block(&mut model, layers)
            .map_err(|(index, source)| LoadError::Layer { index, source })?;

        let blocks = match doc.get_array("assets") {
            Ok(assets) => self.precomps.layer_blocks(assets),
            Err(err) => {
                if !err.is_missing() {
                    tracing::warn!(%err, "assets unreadable, continuing without precomp layers");
                }
                Vec::new()
            }
        };
        for (block, layers) in blocks.into_iter().enumerate() {
            if let Err((index, err)) = self.load_block(&mut model, layers) {
                tracing::warn!(block, index, %err, "skipping asset with an unreadable layer");
            }
        }

        model.set_progress(0.0);
        tracing::debug!(
            layers = model.len(),
            duration_ms = model.duration_ms(),
            masks = model.has_masks(),
            mattes = model.has_mattes(),
            "composition loaded"
        );
        Ok(model)
    }

    /// Parses one layer list and adds it to `model`. Parent and matte
    /// references are resolved within the list. Nothing is added unless
    /// every layer parses.
    fn load_block(
        &self,
        model: &mut CompositionModel,
        layers: &[Value],
    ) -> Result<(), (usize, LayerParseError)> {
        let snapshot: &CompositionModel = model;
        let nodes = layers
            .iter()
            .enumerate()
            .map(|(index, layer)| self.parser.parse(layer, snapshot).map_err(|err| (index, err)))
            .collect::<Result<Vec<LayerNode>, _>>()?;

        let mut by_source: HashMap<i64, NodeId> = HashMap::new();
        let mut added: Vec<(NodeId, Option<i64>)> = Vec::with_capacity(nodes.len());
        let mut previous: Option<NodeId> = None;

        for mut node in nodes {
            let source = node.source_index();
            let id = match source {
                Some(ind) if !model.contains_layer(LayerId(ind)) => LayerId(ind),
                _ => {
                    let fresh = model.next_free_id();
                    tracing::debug!(source = ?source, %fresh, "assigning fresh layer id");
                    fresh
                }
            };
            node.set_id(id);
            let parent_ref = node.parent_ref();
            let matte_type = node.matte_type();

            let node_id = match model.add_layer(node) {
                Ok(node_id) => node_id,
                Err(err) => {
                    tracing::warn!(%err, "dropping layer");
                    continue;
                }
            };
            if let Some(ind) = source {
                by_source.entry(ind).or_insert(node_id);
            }

            if matte_type != MatteType::None {
                match previous {
                    Some(matte) => {
                        if let Err(err) = model.set_matte_source(node_id, matte) {
                            tracing::warn!(%err, "ignoring matte pairing");
                        }
                    }
                    None => tracing::warn!(layer = %id, "matte target has no preceding layer"),
                }
            }

            previous = Some(node_id);
            added.push((node_id, parent_ref));
        }

        for (child, parent_ref) in added {
            let Some(parent_ind) = parent_ref else {
                continue;
            };
            match by_source.get(&parent_ind) {
                Some(&parent) => {
                    if let Err(err) = model.attach(parent, child) {
                        tracing::warn!(%err, "ignoring parent reference");
                    }
                }
                None => tracing::warn!(%child, parent = parent_ind, "parent layer not found"),
            }
        }

        Ok(())
    }
}

fn optional_i32(doc: &Document<'_>, field: &str) -> i32 {
    doc.get_i32(field).unwrap_or_else(|err: FieldError| {
        if err.is_missing() {
            tracing::debug!(field, "timing field absent, using 0");
        } else {
            tracing::warn!(%err, "timing field unreadable, using 0");
        }
        0
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn load(doc: Value) -> CompositionModel {
        CompositionLoader::default().load(&doc).unwrap()
    }

    #[test]
    fn test_timing_fields_are_independent() {
        let model = load(json!({ "ip": "abc", "op": 60.9, "fr": 30, "layers": [] }));
        assert_eq!(model.start_frame(), 0);
        assert_eq!(model.end_frame(), 60);
        assert_eq!(model.frame_rate(), 30);
        assert_eq!(model.duration_ms(), 2000);
    }

    #[test]
    fn test_missing_size_leaves_bounds_unset() {
        let model = load(json!({ "w": 500, "layers": [] }));
        assert_eq!(model.bounds(), None);
        assert_eq!(model.scale(), 1.0);
    }

    #[test]
    fn test_configured_budget() {
        let loader = CompositionLoader::new(LoaderConfig {
            max_pixels: 200,
            initial_scale: 1.0,
        });
        let model = loader.load(&json!({ "w": 400, "h": 100, "layers": [] })).unwrap();
        assert_eq!(model.scale(), 0.5);
        assert_eq!(model.bounds().map(|b| (b.width, b.height)), Some((200, 50)));
    }

    #[test]
    fn test_duplicate_and_missing_ids_get_fresh_ids() {
        let model = load(json!({
            "layers": [ { "ind": 4 }, { "ind": 4 }, {} ]
        }));
        let ids: Vec<_> = model.layers().iter().map(LayerNode::id).collect();
        assert_eq!(ids, vec![LayerId(4), LayerId(5), LayerId(6)]);
    }

    #[test]
    fn test_fresh_id_when_max_id_is_taken() {
        let model = load(json!({
            "layers": [ { "ind": i64::MAX }, { "nm": "second" } ]
        }));
        let ids: Vec<_> = model.layers().iter().map(LayerNode::id).collect();
        assert_eq!(ids, vec![LayerId(i64::MAX), LayerId(0)]);
        assert_eq!(model.layer(LayerId(0)).and_then(LayerNode::name), Some("second"));
    }

    #[test]
    fn test_parents_resolve_within_their_block() {
        let model = load(json!({
            "layers": [ { "ind": 1 }, { "ind": 2, "parent": 1 } ],
            "assets": [ { "id": "comp_0", "layers": [ { "ind": 1 }, { "ind": 2, "parent": 1 } ] } ]
        }));

        assert_eq!(model.len(), 4);
        assert_eq!(model.parent(NodeId(1)), Some(NodeId(0)));
        assert_eq!(model.parent(NodeId(3)), Some(NodeId(2)));
        assert_eq!(model.node(NodeId(2)).map(LayerNode::id), Some(LayerId(3)));
    }

    #[test]
    fn test_cyclic_and_unknown_parents_are_ignored() {
        let model = load(json!({
            "layers": [ { "ind": 1, "parent": 2 }, { "ind": 2, "parent": 1 }, { "ind": 3, "parent": 99 } ]
        }));
        assert_eq!(model.parent(NodeId(0)), Some(NodeId(1)));
        assert_eq!(model.parent(NodeId(1)), None);
        assert_eq!(model.parent(NodeId(2)), None);
    }

    #[test]
    fn test_matte_pairs_with_preceding_layer() {
        let model = load(json!({
            "layers": [ { "ind": 1, "td": 1 }, { "ind": 2, "tt": 1 } ]
        }));
        assert!(model.has_mattes());
        let target = model.node(NodeId(1)).unwrap();
        assert_eq!(target.matte_type(), MatteType::Add);
        assert_eq!(target.matte_source(), Some(NodeId(0)));
        assert!(model.node(NodeId(0)).unwrap().is_matte_source());
    }

    #[test]
    fn test_asset_with_bad_layer_is_skipped_whole() {
        let model = load(json!({
            "layers": [ { "ind": 1 } ],
            "assets": [
                { "id": "bad", "layers": [ { "ind": 10 }, { "ind": 11, "ks": { "o": { "a": 1, "k": [ { "t": 0 } ] } } } ] },
                { "id": "image", "p": "img.png" },
                { "id": "good", "layers": [ { "ind": 20 } ] }
            ]
        }));
        assert_eq!(model.len(), 2);
        assert!(model.layer(LayerId(10)).is_none());
        assert!(model.layer(LayerId(20)).is_some());
    }

    #[test]
    fn test_bad_top_level_layer_is_fatal() {
        let err = CompositionLoader::default()
            .load(&json!({ "layers": [ {}, { "ind": "x" } ] }))
            .unwrap_err();
        assert!(matches!(err, LoadError::Layer { index: 1, .. }));
    }

    #[test]
    fn test_custom_parser_and_precomp_strategy() {
        struct Named;

        impl LayerParser for Named {
            fn parse(
                &self,
                document: &Value,
                composition: &CompositionModel,
            ) -> Result<LayerNode, LayerParseError> {
                let mut node = LottieLayerParser.parse(document, composition)?;
                node.set_name(format!("layer {}", node.source_index().unwrap_or(-1)));
                Ok(node)
            }
        }

        struct TopLevelOnly;

        impl PrecompStrategy for TopLevelOnly {
            fn layer_blocks<'a>(&self, _assets: &'a [Value]) -> Vec<&'a [Value]> {
                Vec::new()
            }
        }

        let model = CompositionLoader::default()
            .with_layer_parser(Named)
            .with_precomp_strategy(TopLevelOnly)
            .load(&json!({
                "layers": [ { "ind": 3 } ],
                "assets": [ { "id": "comp_0", "layers": [ { "ind": 4 } ] } ]
            }))
            .unwrap();
        assert_eq!(model.len(), 1);
        assert_eq!(model.layer(LayerId(3)).and_then(LayerNode::name), Some("layer 3"));
    }

    #[test]
    fn test_config_from_json() {
        let config: LoaderConfig = serde_json::from_value(json!({ "max_pixels": 2048 })).unwrap();
        assert_eq!(config.max_pixels, 2048);
        assert_eq!(config.initial_scale, 1.0);
    }
}
