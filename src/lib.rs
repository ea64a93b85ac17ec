//! Loading entry points for Lottie compositions.
//!
//! Synchronous loaders return a [`CompositionModel`] directly. The `*_async`
//! variants parse on a worker thread and report to a
//! [`CompositionListener`]; the returned [`LoadHandle`] cancels delivery.
//!
//! ```no_run
//! use lottie_player::{load_document_async, CompositionModel};
//! use serde_json::json;
//!
//! let handle = load_document_async(json!({ "fr": 30, "op": 60, "layers": [] }), |model: CompositionModel| {
//!     println!("loaded {} layers", model.len());
//! });
//! handle.wait();
//! ```

pub mod resource;
pub mod task;

pub use lottie_core::{
    CompositionLoader, CompositionModel, LoadError, LoaderConfig, LottiePlayer, ResolvedFrame,
    TransformResolver,
};
pub use resource::{FileResourceLoader, ResourceLoader};
pub use task::{CancellationToken, CompositionListener, LoadHandle};

use serde_json::Value;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

/// Starts background loads with a shared loader configuration and resource
/// lookup.
#[derive(Clone)]
pub struct BackgroundLoader {
    loader: CompositionLoader,
    resources: Arc<dyn ResourceLoader>,
}

impl std::fmt::Debug for BackgroundLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundLoader")
            .field("loader", &self.loader)
            .finish_non_exhaustive()
    }
}

impl BackgroundLoader {
    pub fn new(loader: CompositionLoader, resources: impl ResourceLoader + 'static) -> Self {
        Self {
            loader,
            resources: Arc::new(resources),
        }
    }

    pub fn loader(&self) -> &CompositionLoader {
        &self.loader
    }

    /// Opens `name` through the resource loader on the worker thread. An
    /// unreadable resource is reported through
    /// [`CompositionListener::on_failed`].
    pub fn load_resource(
        &self,
        name: impl Into<String>,
        listener: impl CompositionListener,
    ) -> LoadHandle {
        let name = name.into();
        let resources = Arc::clone(&self.resources);
        task::spawn_load(
            self.loader.clone(),
            move |loader| {
                let reader = resources
                    .open(&name)
                    .map_err(|source| LoadError::Resource { name, source })?;
                loader.load_from_reader(reader)
            },
            Box::new(listener),
        )
    }

    pub fn load_reader<R>(&self, reader: R, listener: impl CompositionListener) -> LoadHandle
    where
        R: Read + Send + 'static,
    {
        task::spawn_load(
            self.loader.clone(),
            move |loader| loader.load_from_reader(reader),
            Box::new(listener),
        )
    }

    pub fn load_document(&self, document: Value, listener: impl CompositionListener) -> LoadHandle {
        task::spawn_load(
            self.loader.clone(),
            move |loader| loader.load(&document),
            Box::new(listener),
        )
    }
}

pub fn load_from_reader<R: Read>(reader: R) -> Result<CompositionModel, LoadError> {
    CompositionLoader::default().load_from_reader(reader)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<CompositionModel, LoadError> {
    CompositionLoader::default().load_from_path(path)
}

pub fn load_from_document(document: &Value) -> Result<CompositionModel, LoadError> {
    CompositionLoader::default().load(document)
}

/// Loads `name` from `resources` in the background.
pub fn load_resource_async(
    resources: impl ResourceLoader + 'static,
    name: impl Into<String>,
    listener: impl CompositionListener,
) -> LoadHandle {
    BackgroundLoader::new(CompositionLoader::default(), resources).load_resource(name, listener)
}

pub fn load_reader_async<R>(reader: R, listener: impl CompositionListener) -> LoadHandle
where
    R: Read + Send + 'static,
{
    task::spawn_load(
        CompositionLoader::default(),
        move |loader| loader.load_from_reader(reader),
        Box::new(listener),
    )
}

pub fn load_document_async(document: Value, listener: impl CompositionListener) -> LoadHandle {
    task::spawn_load(
        CompositionLoader::default(),
        move |loader| loader.load(&document),
        Box::new(listener),
    )
}
