use crate::composition::CompositionModel;
use crate::resolver::{ResolvedFrame, TransformResolver};

/// Drives a composition's progress and hands out resolved frames.
///
/// The last resolved frame is reused until a progress update actually
/// changes a property value or a layer's visibility. A reused frame still
/// reports the current progress and frame number.
#[derive(Debug, Default)]
pub struct LottiePlayer {
    model: Option<CompositionModel>,
    resolver: TransformResolver,
    progress: f32,
    cached: Option<ResolvedFrame>,
}

impl LottiePlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, mut model: CompositionModel) {
        model.set_progress(0.0);
        self.progress = 0.0;
        self.cached = None;
        self.model = Some(model);
    }

    pub fn unload(&mut self) -> Option<CompositionModel> {
        self.cached = None;
        self.model.take()
    }

    pub fn model(&self) -> Option<&CompositionModel> {
        self.model.as_ref()
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn set_progress(&mut self, progress: f32) {
        let Some(model) = &mut self.model else {
            return;
        };
        if model.set_progress(progress) {
            self.cached = None;
        } else if let Some(frame) = &mut self.cached {
            frame.progress = model.progress();
            frame.frame = model.frame_at(frame.progress);
        }
        self.progress = model.progress();
    }

    /// Moves playback forward by `dt` seconds, wrapping at the end.
    pub fn advance(&mut self, dt: f32) {
        let Some(model) = &self.model else {
            return;
        };
        let duration = model.duration().as_secs_f32();
        if duration <= 0.0 || !dt.is_finite() {
            return;
        }

        let progress = (self.progress + dt / duration).rem_euclid(1.0);
        self.set_progress(progress);
    }

    pub fn frame(&mut self) -> Option<&ResolvedFrame> {
        let model = self.model.as_ref()?;
        if self.cached.is_none() {
            tracing::trace!(progress = self.progress, "resolving frame");
            self.cached = Some(self.resolver.resolve(model));
        }
        self.cached.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::CompositionLoader;
    use serde_json::json;

    fn player() -> LottiePlayer {
        let model = CompositionLoader::default()
            .load(&json!({
                "ip": 0, "op": 20, "fr": 10, "w": 100, "h": 100,
                "layers": [
                    { "ind": 1, "ks": { "p": { "a": 1, "k": [
                        { "t": 0, "s": [0, 0] }, { "t": 20, "s": [100, 0] }
                    ] } } },
                    { "ind": 2, "ip": 10, "op": 20 }
                ]
            }))
            .unwrap();
        let mut player = LottiePlayer::new();
        player.load(model);
        player
    }

    #[test]
    fn test_advance_wraps() {
        let mut player = player();
        player.advance(1.0);
        assert!((player.progress() - 0.5).abs() < 1e-6);
        player.advance(1.5);
        assert!((player.progress() - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_frame_is_cached_until_values_change() {
        let mut player = player();
        let first = player.frame().map(|f| f.layers.len());
        assert_eq!(first, Some(1));

        player.set_progress(0.0);
        assert!(player.cached.is_some());

        player.set_progress(0.5);
        assert!(player.cached.is_none());
        let frame = player.frame().unwrap();
        assert_eq!(frame.layers.len(), 2);
        assert_eq!(frame.layers[0].transform.translation.x, 50.0);
    }

    #[test]
    fn test_static_frame_reports_current_progress() {
        let model = CompositionLoader::default()
            .load(&json!({
                "ip": 0, "op": 20, "fr": 10,
                "layers": [ { "ind": 1, "ks": { "p": { "k": [5, 5] } } } ]
            }))
            .unwrap();
        let mut player = LottiePlayer::new();
        player.load(model);
        assert_eq!(player.frame().map(|f| f.progress), Some(0.0));

        player.set_progress(0.5);
        assert!(player.cached.is_some());
        let frame = player.frame().unwrap();
        assert_eq!(frame.progress, 0.5);
        assert_eq!(frame.frame, 10.0);
        assert_eq!(frame.layers[0].transform.translation.x, 5.0);

        player.advance(0.5);
        let frame = player.frame().unwrap();
        assert!((frame.progress - 0.75).abs() < 1e-6);
        assert!((frame.frame - 15.0).abs() < 1e-4);
    }

    #[test]
    fn test_empty_player() {
        let mut empty = LottiePlayer::new();
        empty.advance(0.5);
        assert!(empty.frame().is_none());

        let mut loaded = player();
        assert!(loaded.frame().is_some());
        let model = loaded.unload();
        assert_eq!(model.map(|m| m.len()), Some(2));
        assert!(loaded.frame().is_none());
    }
}
