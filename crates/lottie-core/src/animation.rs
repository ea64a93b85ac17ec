use crate::keyframe::{Curve, FrameDomain};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Observer<T> = Box<dyn FnMut(&T) + Send>;

/// An animated property: a curve plus the value it last produced.
///
/// Observers registered with [`add_observer`](Self::add_observer) run only
/// when [`set_progress`](Self::set_progress) yields a value different from
/// the cached one, so repeated progress updates with no visible effect
/// trigger nothing downstream.
pub struct PropertyAnimation<T> {
    curve: Box<dyn Curve<T>>,
    domain: FrameDomain,
    last_progress: Option<f32>,
    last_value: Option<T>,
    observers: Vec<(ObserverId, Observer<T>)>,
    next_observer: u64,
}

impl<T: Clone + PartialEq> PropertyAnimation<T> {
    pub fn new(curve: impl Curve<T> + 'static, domain: FrameDomain) -> Self {
        Self {
            curve: Box::new(curve),
            domain,
            last_progress: None,
            last_value: None,
            observers: Vec::new(),
            next_observer: 0,
        }
    }

    pub fn domain(&self) -> FrameDomain {
        self.domain
    }

    /// Evaluates the curve without touching the cache.
    pub fn evaluate(&self, progress: f32) -> T {
        self.curve.value_at(self.domain.frame_at(progress))
    }

    /// Updates the cached value for `progress`. Returns `true` when the
    /// value changed, in which case every observer has been notified once.
    pub fn set_progress(&mut self, progress: f32) -> bool {
        if self.last_progress == Some(progress) && self.last_value.is_some() {
            return false;
        }

        let value = self.evaluate(progress);
        self.last_progress = Some(progress);
        if self.last_value.as_ref() == Some(&value) {
            return false;
        }

        for (_, observer) in &mut self.observers {
            observer(&value);
        }
        self.last_value = Some(value);
        true
    }

    /// Most recently evaluated value; `None` until the first
    /// [`set_progress`](Self::set_progress).
    pub fn value(&self) -> Option<&T> {
        self.last_value.as_ref()
    }

    pub fn progress(&self) -> Option<f32> {
        self.last_progress
    }

    pub fn add_observer(&mut self, observer: impl FnMut(&T) + Send + 'static) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl<T: fmt::Debug> fmt::Debug for PropertyAnimation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyAnimation")
            .field("domain", &self.domain)
            .field("last_progress", &self.last_progress)
            .field("last_value", &self.last_value)
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyframe::{ControlPoint, KeyframeCurve};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn ramp() -> PropertyAnimation<f32> {
        let curve = KeyframeCurve::new(vec![
            ControlPoint::new(0.0, 0.0f32),
            ControlPoint::new(10.0, 100.0),
        ])
        .unwrap();
        PropertyAnimation::new(curve, FrameDomain::new(0.0, 10.0))
    }

    #[test]
    fn test_cache_tracks_last_evaluation() {
        let mut anim = ramp();
        assert_eq!(anim.value(), None);

        anim.set_progress(0.25);
        assert_eq!(anim.value(), Some(&25.0));
        assert_eq!(anim.progress(), Some(0.25));
        assert_eq!(anim.evaluate(0.25), 25.0);
    }

    #[test]
    fn test_repeated_progress_notifies_once() {
        let mut anim = ramp();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        anim.add_observer(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(anim.set_progress(0.5));
        assert!(!anim.set_progress(0.5));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unchanged_value_does_not_notify() {
        // Both progress values clamp to the final keyframe.
        let curve = KeyframeCurve::new(vec![
            ControlPoint::new(0.0, 1.0f32),
            ControlPoint::new(5.0, 2.0),
        ])
        .unwrap();
        let mut anim = PropertyAnimation::new(curve, FrameDomain::new(0.0, 10.0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        anim.add_observer(move |v: &f32| sink.lock().unwrap().push(*v));

        assert!(anim.set_progress(0.6));
        assert!(!anim.set_progress(0.9));
        assert_eq!(anim.progress(), Some(0.9));
        assert_eq!(*seen.lock().unwrap(), vec![2.0]);
    }

    #[test]
    fn test_removed_observer_is_silent() {
        let mut anim = ramp();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let id = anim.add_observer(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(anim.remove_observer(id));
        assert!(!anim.remove_observer(id));
        anim.set_progress(0.1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(anim.observer_count(), 0);
    }
}
