use crate::error::CurveError;
use glam::Vec2;
use lottie_data::model::BezierPath;

pub trait Interpolatable: Sized + Clone {
    fn lerp(&self, other: &Self, t: f32) -> Self;
}

impl Interpolatable for f32 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Interpolatable for Vec2 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Vec2::lerp(*self, *other, t)
    }
}

// Opacity on the 0..=255 scale.
impl Interpolatable for u8 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        let a = *self as f32;
        let b = *other as f32;
        (a + (b - a) * t).round().clamp(0.0, 255.0) as u8
    }
}

impl Interpolatable for BezierPath {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        if t <= 0.0 {
            return self.clone();
        }
        if t >= 1.0 {
            return other.clone();
        }

        // Vertex counts rarely differ; interpolate over the shared prefix.
        let count = self.v.len().min(other.v.len());
        if count == 0 {
            return self.clone();
        }

        let mix = |a: [f32; 2], b: [f32; 2]| [a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t];
        let tangent = |list: &[[f32; 2]], idx: usize| list.get(idx).copied().unwrap_or([0.0, 0.0]);

        let mut path = BezierPath {
            c: self.c,
            v: Vec::with_capacity(count),
            i: Vec::with_capacity(count),
            o: Vec::with_capacity(count),
        };
        for idx in 0..count {
            path.v.push(mix(self.v[idx], other.v[idx]));
            path.i.push(mix(tangent(&self.i, idx), tangent(&other.i, idx)));
            path.o.push(mix(tangent(&self.o, idx), tangent(&other.o, idx)));
        }
        path
    }
}

/// Non-uniform scale factor, 1.0 meaning unscaled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleXY {
    pub x: f32,
    pub y: f32,
}

impl ScaleXY {
    pub const IDENTITY: ScaleXY = ScaleXY { x: 1.0, y: 1.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_identity(&self) -> bool {
        self.x == 1.0 && self.y == 1.0
    }

    pub fn as_vec2(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

impl Default for ScaleXY {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Interpolatable for ScaleXY {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        ScaleXY {
            x: Interpolatable::lerp(&self.x, &other.x, t),
            y: Interpolatable::lerp(&self.y, &other.y, t),
        }
    }
}

/// Solves the cubic Bezier easing curve through (0,0), `p1`, `p2`, (1,1)
/// for the parameter whose x equals `x`, and returns the matching y.
pub fn solve_cubic_bezier(p1: Vec2, p2: Vec2, x: f32) -> f32 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    let bezier_x = |t: f32| {
        let one_minus_t = 1.0 - t;
        3.0 * one_minus_t * one_minus_t * t * p1.x + 3.0 * one_minus_t * t * t * p2.x + t * t * t
    };

    // Newton-Raphson
    let mut t = x;
    let mut converged = false;
    for _ in 0..8 {
        let err = bezier_x(t) - x;
        if err.abs() < 1e-5 {
            converged = true;
            break;
        }

        let one_minus_t = 1.0 - t;
        let dx_dt = 3.0 * one_minus_t * one_minus_t * p1.x
            + 6.0 * one_minus_t * t * (p2.x - p1.x)
            + 3.0 * t * t * (1.0 - p2.x);

        if dx_dt.abs() < 1e-6 {
            break;
        }
        t -= err / dx_dt;
        if !(0.0..=1.0).contains(&t) {
            break;
        }
    }

    // Flat or steep handles defeat Newton; x(t) is monotonic for handles
    // inside the unit square, so bisection always lands.
    if !converged || !(0.0..=1.0).contains(&t) {
        let (mut lo, mut hi) = (0.0f32, 1.0f32);
        t = x;
        for _ in 0..32 {
            let est = bezier_x(t);
            if (est - x).abs() < 1e-6 {
                break;
            }
            if est < x {
                lo = t;
            } else {
                hi = t;
            }
            t = (lo + hi) * 0.5;
        }
    }

    let one_minus_t = 1.0 - t;
    3.0 * one_minus_t * one_minus_t * t * p1.y + 3.0 * one_minus_t * t * t * p2.y + t * t * t
}

/// Maps normalized progress onto a composition's frame range.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameDomain {
    pub start: f32,
    pub end: f32,
}

impl FrameDomain {
    pub fn new(start: f32, end: f32) -> Self {
        Self { start, end }
    }

    pub fn frame_at(&self, progress: f32) -> f32 {
        let p = if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 1.0)
        };
        self.start + (self.end - self.start) * p
    }
}

/// One keyframe of a [`KeyframeCurve`].
///
/// `ease_out` is the first easing handle of the segment leaving this point,
/// `ease_in` the second handle of the segment arriving at it. A segment with
/// neither handle interpolates linearly.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlPoint<T> {
    pub frame: f32,
    pub value: T,
    pub ease_in: Option<Vec2>,
    pub ease_out: Option<Vec2>,
    pub hold: bool,
}

impl<T> ControlPoint<T> {
    pub fn new(frame: f32, value: T) -> Self {
        Self {
            frame,
            value,
            ease_in: None,
            ease_out: None,
            hold: false,
        }
    }

    pub fn with_ease_in(mut self, handle: Vec2) -> Self {
        self.ease_in = Some(handle);
        self
    }

    pub fn with_ease_out(mut self, handle: Vec2) -> Self {
        self.ease_out = Some(handle);
        self
    }

    pub fn with_hold(mut self) -> Self {
        self.hold = true;
        self
    }
}

/// Anything that yields a property value for a frame.
pub trait Curve<T>: Send {
    fn value_at(&self, frame: f32) -> T;
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyframeCurve<T> {
    points: Vec<ControlPoint<T>>,
}

impl<T: Interpolatable> KeyframeCurve<T> {
    pub fn new(points: Vec<ControlPoint<T>>) -> Result<Self, CurveError> {
        if points.is_empty() {
            return Err(CurveError::Empty);
        }
        for (index, pair) in points.windows(2).enumerate() {
            if pair[1].frame < pair[0].frame || pair[1].frame.is_nan() {
                return Err(CurveError::Unsorted {
                    index: index + 1,
                    frame: pair[1].frame,
                    previous: pair[0].frame,
                });
            }
        }
        Ok(Self { points })
    }

    pub fn constant(value: T) -> Self {
        Self {
            points: vec![ControlPoint::new(0.0, value)],
        }
    }

    pub fn points(&self) -> &[ControlPoint<T>] {
        &self.points
    }

    pub fn value_at(&self, frame: f32) -> T {
        // Index of the first point strictly after `frame`, so frame ties
        // resolve to the later point in document order.
        let idx = self.points.partition_point(|p| p.frame <= frame);

        if idx == 0 {
            return self.points[0].value.clone();
        }
        let len = self.points.len();
        if idx >= len {
            return self.points[len - 1].value.clone();
        }

        let start = &self.points[idx - 1];
        let end = &self.points[idx];

        if start.hold {
            return start.value.clone();
        }

        let span = end.frame - start.frame;
        if span <= 0.0 {
            return start.value.clone();
        }

        let t = (frame - start.frame) / span;
        let eased = match (start.ease_out, end.ease_in) {
            (None, None) => t,
            (out, inc) => solve_cubic_bezier(
                out.unwrap_or(Vec2::ZERO),
                inc.unwrap_or(Vec2::ONE),
                t,
            ),
        };

        start.value.lerp(&end.value, eased)
    }
}

impl<T: Interpolatable + Send> Curve<T> for KeyframeCurve<T> {
    fn value_at(&self, frame: f32) -> T {
        KeyframeCurve::value_at(self, frame)
    }
}

/// Position authored as independent x and y curves.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitCurve {
    pub x: KeyframeCurve<f32>,
    pub y: KeyframeCurve<f32>,
}

impl Curve<Vec2> for SplitCurve {
    fn value_at(&self, frame: f32) -> Vec2 {
        Vec2::new(self.x.value_at(frame), self.y.value_at(frame))
    }
}
