//! Centripetal Catmull-Rom curve sampling
//!
//! [`CurveSampler`] interpolates an ordered list of control points with
//! continuous tangents. The curve passes through every control point; the
//! open ends are extended by reflecting the second point about the first (and
//! the second-to-last about the last).

use glam::Vec3;

use crate::error::CurveError;

/// Chord subdivisions used for the arc-length table
const LENGTH_DIVISIONS: usize = 200;

/// Knot spacings shorter than this are treated as zero
const KNOT_EPSILON: f32 = 1e-4;

/// Smooth interpolating curve through three or more control points
#[derive(Clone, Debug)]
pub struct CurveSampler {
    points: Vec<Vec3>,
    /// Cumulative chord length at `i / LENGTH_DIVISIONS`
    lengths: Vec<f32>,
}

/// Cubic coefficients of one curve span in its local parameter `w ∈ [0, 1]`
struct Span {
    c0: Vec3,
    c1: Vec3,
    c2: Vec3,
    c3: Vec3,
}

impl Span {
    fn point(&self, w: f32) -> Vec3 {
        self.c0 + w * (self.c1 + w * (self.c2 + w * self.c3))
    }

    fn derivative(&self, w: f32) -> Vec3 {
        self.c1 + w * (2.0 * self.c2 + 3.0 * w * self.c3)
    }
}

impl CurveSampler {
    /// Build a curve through `points`
    ///
    /// # Errors
    /// Returns [`CurveError::TooFewPoints`] when fewer than 3 points are given.
    pub fn new(points: &[Vec3]) -> Result<Self, CurveError> {
        if points.len() < 3 {
            return Err(CurveError::TooFewPoints(points.len()));
        }

        let mut curve = Self {
            points: points.to_vec(),
            lengths: Vec::new(),
        };
        curve.lengths = curve.chord_lengths();
        Ok(curve)
    }

    /// Control points this curve interpolates
    pub fn control_points(&self) -> &[Vec3] {
        &self.points
    }

    /// Point at parameter `t` (clamped to `[0, 1]`)
    pub fn point_at(&self, t: f32) -> Vec3 {
        let (span, w) = self.span_at(t);
        span.point(w)
    }

    /// Unit tangent at parameter `t` (clamped to `[0, 1]`)
    ///
    /// Returns `None` when the curve is degenerate at `t` (coincident control
    /// points), so callers can reuse a previous orientation.
    pub fn tangent_at(&self, t: f32) -> Option<Vec3> {
        let (span, w) = self.span_at(t);
        span.derivative(w).try_normalize()
    }

    /// Lazy sequence of `divisions + 1` evenly parameter-spaced points
    ///
    /// The iterator is `Clone`, so the sequence can be restarted.
    pub fn points(&self, divisions: usize) -> impl Iterator<Item = Vec3> + Clone + '_ {
        let divisions = divisions.max(1);
        (0..=divisions).map(move |i| self.point_at(i as f32 / divisions as f32))
    }

    /// Eager version of [`CurveSampler::points`]
    pub fn sample_points(&self, divisions: usize) -> Vec<Vec3> {
        self.points(divisions).collect()
    }

    /// Approximate arc length of the whole curve
    pub fn length(&self) -> f32 {
        self.lengths.last().copied().unwrap_or(0.0)
    }

    /// Approximate arc length from the start to parameter `t`
    pub fn length_at(&self, t: f32) -> f32 {
        let scaled = t.clamp(0.0, 1.0) * LENGTH_DIVISIONS as f32;
        let i = (scaled.floor() as usize).min(LENGTH_DIVISIONS - 1);
        let frac = scaled - i as f32;
        self.lengths[i] + (self.lengths[i + 1] - self.lengths[i]) * frac
    }

    fn chord_lengths(&self) -> Vec<f32> {
        let mut lengths = Vec::with_capacity(LENGTH_DIVISIONS + 1);
        let mut total = 0.0;
        let mut prev = self.point_at(0.0);
        lengths.push(0.0);
        for p in self.points(LENGTH_DIVISIONS).skip(1) {
            total += prev.distance(p);
            lengths.push(total);
            prev = p;
        }
        lengths
    }

    /// Locate the span containing `t` and the local parameter within it
    fn span_at(&self, t: f32) -> (Span, f32) {
        let n = self.points.len();
        let p = (n - 1) as f32 * t.clamp(0.0, 1.0);
        let mut index = p.floor() as usize;
        let mut weight = p - index as f32;

        if index >= n - 1 {
            index = n - 2;
            weight = 1.0;
        }

        let pts = &self.points;
        let p1 = pts[index];
        let p2 = pts[index + 1];
        let p0 = if index > 0 {
            pts[index - 1]
        } else {
            2.0 * pts[0] - pts[1]
        };
        let p3 = if index + 2 < n {
            pts[index + 2]
        } else {
            2.0 * pts[n - 1] - pts[n - 2]
        };

        (centripetal_span(p0, p1, p2, p3), weight)
    }
}

/// Non-uniform Catmull-Rom span between `p1` and `p2` with centripetal knots
fn centripetal_span(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3) -> Span {
    let mut dt0 = p0.distance_squared(p1).powf(0.25);
    let mut dt1 = p1.distance_squared(p2).powf(0.25);
    let mut dt2 = p2.distance_squared(p3).powf(0.25);

    if dt1 < KNOT_EPSILON {
        dt1 = 1.0;
    }
    if dt0 < KNOT_EPSILON {
        dt0 = dt1;
    }
    if dt2 < KNOT_EPSILON {
        dt2 = dt1;
    }

    // Tangents at p1 and p2, rescaled to the [0, 1] span parameter
    let t1 = ((p1 - p0) / dt0 - (p2 - p0) / (dt0 + dt1) + (p2 - p1) / dt1) * dt1;
    let t2 = ((p2 - p1) / dt1 - (p3 - p1) / (dt1 + dt2) + (p3 - p2) / dt2) * dt1;

    Span {
        c0: p1,
        c1: t1,
        c2: -3.0 * p1 + 3.0 * p2 - 2.0 * t1 - t2,
        c3: 2.0 * p1 - 2.0 * p2 + t1 + t2,
    }
}
