//! Two-chamber domain geometry and the ray/boundary intersection solver.
//!
//! The domain consists of two open discs of radius `r` whose centers sit on the
//! x-axis symmetric about the origin, joined by a horizontal strip (the bridge)
//! of length `bridge_length` and height `bridge_height`. All solver functions
//! are pure: they take a position and a heading angle and read the immutable
//! [`Domain`].
//!
//! Rays are parametrised as `p + t * max_path * (cos a, sin a)` with `t` in
//! `[0, 1]`, so `max_path` bounds the search for the next boundary.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use crate::core::config::{DistanceMeasure, GateShape, SimConfig};

/// Tolerance on the ray parameter, used to guarantee forward progress.
pub const EPS: f64 = 1e-14;

/// Relative margin used when projecting a stray point back into a chamber.
const CLAMP_MARGIN: f64 = 1e-9;

/// One of the two chambers, and the gate on that side of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Both sides, in processing order.
    pub const ALL: [Side; 2] = [Side::Left, Side::Right];

    /// Array index for per-side storage.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }

    /// Sign of the x-coordinate on this side.
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Side::Left => -1.0,
            Side::Right => 1.0,
        }
    }

    #[inline]
    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    /// Side of a strictly non-zero x-coordinate; `None` on the midline or NaN.
    #[inline]
    pub fn of_x(x: f64) -> Option<Side> {
        if x < 0.0 {
            Some(Side::Left)
        } else if x > 0.0 {
            Some(Side::Right)
        } else {
            None
        }
    }
}

/// A wall impact: travel distance and the inward normal angle at the impact point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Impact {
    pub distance: f64,
    pub normal: f64,
}

/// Outcome of [`Domain::next_event`]: where the straight flight ends and the
/// heading after the event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NextEvent {
    pub distance: f64,
    pub position: [f64; 2],
    pub direction: f64,
    pub kind: EventKind,
}

/// Boundary responsible for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Top or bottom wall of the bridge (reflects).
    Bridge,
    /// Chamber wall (reflects).
    Circle(Side),
    /// Gate boundary crossing (passes through).
    Gate,
    /// Midline crossing inside the bridge (passes through).
    Middle,
}

/// Immutable derived geometry of the two chambers and the channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    pub circle_radius: f64,
    /// Gap between the two circles after bridge coupling.
    pub circle_distance: f64,
    pub bridge_height: f64,
    /// Strip length, extended so that the strip ends meet the circles.
    pub bridge_length: f64,
    pub left_center_x: f64,
    pub right_center_x: f64,
    /// Upper bound on the length of a single straight flight.
    pub max_path: f64,
    pub gate_shape: GateShape,
}

impl Domain {
    /// Derive the geometry from a configuration.
    ///
    /// The bridge is a priori not connected to the circles; it is lengthened
    /// (or the circles are moved, when the distance is the channel length) so
    /// the strip corners lie exactly on the circles. Infeasible geometries
    /// (`bridge_height / 2 >= circle_radius`) produce NaN lengths and are
    /// rejected by `Simulation::start`.
    pub fn new(config: &SimConfig) -> Self {
        let r = config.circle_radius;
        let h = config.bridge_height;
        let discrepancy = 2.0 * (r * r - h * h / 4.0).sqrt() - 2.0 * r;
        let (bridge_length, circle_distance) = match config.gate_shape {
            GateShape::Flat {
                distance: DistanceMeasure::ChannelLength,
            } => (config.circle_distance, config.circle_distance + discrepancy),
            _ => (config.circle_distance - discrepancy, config.circle_distance),
        };
        let center = circle_distance / 2.0 + r;
        Self {
            circle_radius: r,
            circle_distance,
            bridge_height: h,
            bridge_length,
            left_center_x: -center,
            right_center_x: center,
            max_path: circle_distance + h + 4.0 * r,
            gate_shape: config.gate_shape,
        }
    }

    #[inline]
    pub fn center_x(&self, side: Side) -> f64 {
        match side {
            Side::Left => self.left_center_x,
            Side::Right => self.right_center_x,
        }
    }

    /// Whether the placement region exists at all.
    pub fn is_feasible(&self) -> bool {
        self.bridge_height / 2.0 < self.circle_radius && self.bridge_length.is_finite()
    }

    // ============ Region membership ============

    /// Strict interior of the chamber circle on `side`.
    #[inline]
    pub fn is_in_circle(&self, x: f64, y: f64, side: Side) -> bool {
        let dx = x - self.center_x(side);
        dx * dx + y * y < self.circle_radius * self.circle_radius
    }

    /// Closed bridge rectangle. Not exclusive with the circles.
    #[inline]
    pub fn is_in_bridge(&self, x: f64, y: f64) -> bool {
        x.abs() <= self.bridge_length / 2.0 && y.abs() <= self.bridge_height / 2.0
    }

    pub fn is_in_domain(&self, x: f64, y: f64) -> bool {
        if self.is_in_bridge(x, y) {
            return true;
        }
        if x < 0.0 {
            self.is_in_circle(x, y, Side::Left)
        } else {
            self.is_in_circle(x, y, Side::Right)
        }
    }

    /// Gate region on `side`. The midline belongs to both gates.
    pub fn is_in_gate(&self, x: f64, y: f64, side: Side) -> bool {
        if side.sign() * x < 0.0 {
            return false;
        }
        match self.gate_shape {
            GateShape::Flat { .. } => x.abs() <= self.bridge_length / 2.0,
            GateShape::Curved => !self.is_in_circle(x, y, side),
        }
    }

    // ============ Time-to-impact solvers ============

    /// First hit of the top or bottom bridge wall.
    ///
    /// Segment/segment intersection of the ray with both horizontal walls. The
    /// bottom wall has inward normal `+pi/2`, the top wall `-pi/2`.
    pub fn time_to_hit_bridge(&self, position: [f64; 2], direction: f64) -> Option<Impact> {
        let [px, py] = position;
        let half_len = self.bridge_length / 2.0;
        let half_h = self.bridge_height / 2.0;
        let rx = self.max_path * direction.cos();
        let ry = self.max_path * direction.sin();
        let (sx, sy) = (self.bridge_length, 0.0);
        let denom = rx * sy - ry * sx;
        if denom == 0.0 {
            return None;
        }

        let mut min_t = 1.0;
        let mut normal = None;
        for (wall_y, wall_normal) in [(-half_h, FRAC_PI_2), (half_h, -FRAC_PI_2)] {
            let qx = -half_len - px;
            let qy = wall_y - py;
            let u = (qx * ry - qy * rx) / denom;
            let t = (qx * sy - qy * sx) / denom;
            if EPS < t && t < min_t && (0.0..=1.0).contains(&u) {
                min_t = t - EPS;
                normal = Some(wall_normal);
            }
        }
        normal.map(|normal| Impact {
            distance: min_t * self.max_path,
            normal,
        })
    }

    /// Parametric roots of the ray against the circle on `side`, normalised by
    /// the radius. `None` when the ray misses the circle.
    fn circle_roots(&self, position: [f64; 2], direction: f64, side: Side) -> Option<(f64, f64)> {
        let r = self.circle_radius;
        let px = (position[0] - self.center_x(side)) / r;
        let py = position[1] / r;
        let ax = self.max_path * direction.cos() / r;
        let ay = self.max_path * direction.sin() / r;
        let a = ax * ax + ay * ay;
        let b = 2.0 * (px * ax + py * ay);
        let c = px * px + py * py - 1.0;
        let disc = b * b - 4.0 * a * c;
        if disc < 0.0 || a == 0.0 {
            return None;
        }
        let sqrt_disc = disc.sqrt();
        Some(((-b - sqrt_disc) / (2.0 * a), (-b + sqrt_disc) / (2.0 * a)))
    }

    #[inline]
    fn point_at(&self, position: [f64; 2], direction: f64, t: f64) -> [f64; 2] {
        [
            position[0] + t * self.max_path * direction.cos(),
            position[1] + t * self.max_path * direction.sin(),
        ]
    }

    /// First hit of the chamber wall on `side`.
    ///
    /// Roots whose impact point lies inside the bridge strip are skipped: that
    /// part of the circle is open to the channel. The normal points from the
    /// impact point to the chamber center.
    pub fn time_to_hit_circle(&self, position: [f64; 2], direction: f64, side: Side) -> Option<Impact> {
        let (t1, t2) = self.circle_roots(position, direction, side)?;
        let cx = self.center_x(side);
        let mut min_t = 1.0;
        let mut normal = None;
        for t in [t1, t2] {
            if EPS < t && t < min_t {
                let [ix, iy] = self.point_at(position, direction, t);
                if !self.is_in_bridge(ix, iy) {
                    normal = Some((0.0 - iy).atan2(cx - ix));
                    min_t = t - EPS;
                }
            }
        }
        normal.map(|normal| Impact {
            distance: min_t * self.max_path,
            normal,
        })
    }

    /// Distance to the next gate boundary crossing, if any within `max_path`.
    ///
    /// Flat gates are bounded by the vertical lines `x = +-bridge_length / 2`;
    /// curved gates by the parts of the circles that lie inside the strip.
    pub fn time_to_hit_gate(&self, position: [f64; 2], direction: f64) -> Option<f64> {
        match self.gate_shape {
            GateShape::Flat { .. } => {
                let cos = direction.cos();
                let half_len = self.bridge_length / 2.0;
                [-half_len, half_len]
                    .into_iter()
                    .map(|line| (line - position[0]) / cos)
                    .filter(|&d| d > 0.0 && d < self.max_path)
                    .min_by(f64::total_cmp)
            }
            GateShape::Curved => {
                let mut min_t = 1.0;
                for side in Side::ALL {
                    let Some((t1, t2)) = self.circle_roots(position, direction, side) else {
                        continue;
                    };
                    for t in [t1, t2] {
                        if EPS < t && t < min_t {
                            let [ix, iy] = self.point_at(position, direction, t);
                            if self.is_in_bridge(ix, iy) {
                                min_t = t;
                            }
                        }
                    }
                }
                (min_t < 1.0).then_some(min_t * self.max_path)
            }
        }
    }

    /// Distance to the midline segment `x = 0, |y| <= bridge_height / 2`.
    pub fn time_to_hit_middle(&self, position: [f64; 2], direction: f64) -> Option<f64> {
        let [px, py] = position;
        let h = self.bridge_height;
        let rx = self.max_path * direction.cos();
        let ry = self.max_path * direction.sin();
        let denom = rx * h;
        if denom == 0.0 {
            return None;
        }
        let qx = 0.0 - px;
        let qy = -h / 2.0 - py;
        let u = (qx * ry - qy * rx) / denom;
        let t = qx * h / denom;
        if EPS < t && t < 1.0 && (0.0..=1.0).contains(&u) {
            Some((t + EPS) * self.max_path)
        } else {
            None
        }
    }

    /// Select the earliest boundary event along the ray.
    ///
    /// Walls reflect the heading; gate and midline crossings keep it and are
    /// pushed `EPS` past the line so the particle is strictly on the far side.
    /// `None` means no boundary was found within `max_path`.
    pub fn next_event(&self, position: [f64; 2], direction: f64) -> Option<NextEvent> {
        let mut best: Option<(f64, f64, EventKind)> = None;
        let mut consider = |distance: f64, heading: f64, kind: EventKind| {
            let limit = best.map_or(self.max_path, |(d, _, _)| d);
            if distance < limit {
                best = Some((distance, heading, kind));
            }
        };

        if let Some(hit) = self.time_to_hit_bridge(position, direction) {
            consider(hit.distance, reflect(direction, hit.normal), EventKind::Bridge);
        }
        for side in Side::ALL {
            if let Some(hit) = self.time_to_hit_circle(position, direction, side) {
                consider(
                    hit.distance,
                    reflect(direction, hit.normal),
                    EventKind::Circle(side),
                );
            }
        }
        if let Some(d) = self.time_to_hit_gate(position, direction) {
            consider(d + EPS, direction, EventKind::Gate);
        }
        if let Some(d) = self.time_to_hit_middle(position, direction) {
            consider(d + EPS, direction, EventKind::Middle);
        }

        best.map(|(distance, heading, kind)| NextEvent {
            distance,
            position: [
                position[0] + distance * direction.cos(),
                position[1] + distance * direction.sin(),
            ],
            direction: heading,
            kind,
        })
    }

    /// Return a point inside the domain close to `(x, y)`.
    ///
    /// Points already inside are returned unchanged. Points within the strip's
    /// x-range are pulled vertically into the strip; anything else is projected
    /// radially to just inside the chamber on its side (`fallback` on the
    /// midline or for non-finite input).
    pub fn clamp_into(&self, x: f64, y: f64, fallback: Side) -> [f64; 2] {
        if !x.is_finite() || !y.is_finite() {
            return [self.center_x(fallback), 0.0];
        }
        if self.is_in_domain(x, y) {
            return [x, y];
        }
        let half_h = self.bridge_height / 2.0;
        if x.abs() <= self.bridge_length / 2.0 {
            return [x, y.clamp(-half_h, half_h)];
        }
        let side = Side::of_x(x).unwrap_or(fallback);
        let cx = self.center_x(side);
        let (dx, dy) = (x - cx, y);
        let dist = dx.hypot(dy);
        if dist == 0.0 {
            return [cx, 0.0];
        }
        let scale = self.circle_radius * (1.0 - CLAMP_MARGIN) / dist;
        [cx + dx * scale, dy * scale]
    }
}

/// Specular reflection of a heading off a wall with inward normal angle
/// `normal`. The result lies in `[0, 2*pi)`.
#[inline]
pub fn reflect(angle_in: f64, normal: f64) -> f64 {
    (2.0 * normal - angle_in + PI).rem_euclid(TAU)
}

/// Map an angle into `[0, 2*pi)`.
#[inline]
pub fn normalize_angle(angle: f64) -> f64 {
    angle.rem_euclid(TAU)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const TOL: f64 = 1e-9;

    fn domain(gate_shape: GateShape) -> Domain {
        Domain::new(&SimConfig {
            circle_radius: 1.0,
            circle_distance: 0.5,
            bridge_height: 0.1,
            gate_shape,
            ..SimConfig::default()
        })
    }

    fn curved() -> Domain {
        domain(GateShape::Curved)
    }

    fn flat() -> Domain {
        domain(GateShape::Flat {
            distance: DistanceMeasure::ChamberGap,
        })
    }

    /// Difference of two angles modulo 2*pi, mapped into `[0, pi]`.
    fn angle_diff(a: f64, b: f64) -> f64 {
        let d = (a - b).rem_euclid(TAU);
        d.min(TAU - d)
    }

    #[test]
    fn membership_tests() {
        let d = curved();
        assert!(!d.is_in_circle(0.0, 0.0, Side::Left));
        assert!(!d.is_in_circle(0.0, 0.0, Side::Right));
        assert!(d.is_in_bridge(0.0, 0.0));
        assert!(d.is_in_gate(0.0, 0.0, Side::Left));
        assert!(d.is_in_gate(0.0, 0.0, Side::Right));
        assert!(d.is_in_domain(0.0, 0.0));

        assert!(!d.is_in_bridge(-2.0, 0.3));
        assert!(d.is_in_circle(-2.0, 0.3, Side::Left));
        assert!(!d.is_in_circle(-2.0, 0.3, Side::Right));
        assert!(d.is_in_domain(-2.0, 0.3));
        assert!(!d.is_in_gate(-2.0, 0.3, Side::Left));
        assert!(!d.is_in_gate(-2.0, 0.3, Side::Right));

        // The far edge of the right circle is not strictly inside.
        assert!(!d.is_in_circle(2.25, 0.0, Side::Right));
        assert!(!d.is_in_domain(2.25, 0.06));

        // Above the strip on the midline: outside the domain, inside both gates.
        assert!(!d.is_in_domain(0.0, 0.06));
        assert!(d.is_in_gate(0.0, 0.06, Side::Left));
        assert!(d.is_in_gate(0.0, 0.06, Side::Right));
    }

    #[test]
    fn flat_gate_is_bounded_by_channel_ends() {
        let d = flat();
        let half = d.bridge_length / 2.0;
        assert!(d.is_in_gate(-half + 1e-6, 0.0, Side::Left));
        assert!(!d.is_in_gate(-half - 1e-6, 0.0, Side::Left));
        assert!(!d.is_in_gate(-half + 1e-6, 0.0, Side::Right));
        assert!(d.is_in_gate(0.0, 0.01, Side::Left) && d.is_in_gate(0.0, 0.01, Side::Right));
    }

    #[test]
    fn bridge_coupling_connects_strip_to_circles() {
        let d = curved();
        assert!(d.bridge_length > d.circle_distance);
        let (x, y) = (d.bridge_length / 2.0 - 0.001, d.bridge_height / 2.0 - 0.001);
        assert!(d.is_in_domain(x, y));
        assert!(!d.is_in_circle(x, y, Side::Right));
        // The strip corner lies on the circle.
        let dx = d.bridge_length / 2.0 - d.right_center_x;
        let dy = d.bridge_height / 2.0;
        assert_abs_diff_eq!(dx.hypot(dy), d.circle_radius, epsilon = 1e-12);
        assert_abs_diff_eq!(d.max_path, 4.6, epsilon = 1e-12);
    }

    #[test]
    fn channel_length_moves_the_circles() {
        let d = domain(GateShape::Flat {
            distance: DistanceMeasure::ChannelLength,
        });
        assert_abs_diff_eq!(d.bridge_length, 0.5, epsilon = 1e-12);
        assert!(d.circle_distance < 0.5);
        let dx = d.bridge_length / 2.0 - d.right_center_x;
        assert_abs_diff_eq!(dx.hypot(0.05), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn bridge_hits() {
        let d = curved();
        let h = d.bridge_height;

        let hit = d.time_to_hit_bridge([0.0, 0.0], FRAC_PI_2).expect("top wall");
        assert_abs_diff_eq!(hit.distance, h / 2.0, epsilon = TOL);
        assert_abs_diff_eq!(hit.normal, -FRAC_PI_2, epsilon = TOL);

        let hit = d.time_to_hit_bridge([0.0, 0.0], PI / 4.0).expect("top wall");
        assert_abs_diff_eq!(hit.distance, h / 2.0 * 2f64.sqrt(), epsilon = TOL);

        let hit = d.time_to_hit_bridge([0.0, -0.1], 3.0 * PI / 4.0).expect("bottom wall");
        assert_abs_diff_eq!(hit.distance, h / 2.0 * 2f64.sqrt(), epsilon = TOL);
        assert_abs_diff_eq!(hit.normal, FRAC_PI_2, epsilon = TOL);

        // Leaving from the top wall goes to the bottom wall.
        let hit = d
            .time_to_hit_bridge([d.bridge_length / 3.0, h / 2.0], -FRAC_PI_2)
            .expect("bottom wall");
        assert_abs_diff_eq!(hit.distance, h, epsilon = TOL);
        assert_abs_diff_eq!(hit.normal, FRAC_PI_2, epsilon = TOL);
    }

    #[test]
    fn bridge_misses() {
        let d = curved();
        assert!(d.time_to_hit_bridge([d.left_center_x, 0.0], -FRAC_PI_2).is_none());
        assert!(d.time_to_hit_bridge([d.right_center_x, 0.0], -3.0 * PI / 4.0).is_none());
        // Parallel rays never intersect, even along the wall itself.
        let above = [-d.bridge_length / 2.0 - 0.1, d.bridge_height / 2.0 + 0.1];
        assert!(d.time_to_hit_bridge(above, 0.0).is_none());
        assert!(d.time_to_hit_bridge([-d.bridge_length, d.bridge_height / 2.0], 0.0).is_none());
    }

    #[test]
    fn circle_hits_from_center() {
        let d = curved();
        let center = [d.left_center_x, 0.0];
        let hit = d.time_to_hit_circle(center, -FRAC_PI_2, Side::Left).expect("wall");
        assert_abs_diff_eq!(hit.distance, 1.0, epsilon = TOL);
        assert_abs_diff_eq!(hit.normal, FRAC_PI_2, epsilon = TOL);

        let hit = d.time_to_hit_circle(center, PI / 4.0, Side::Left).expect("wall");
        assert_abs_diff_eq!(hit.distance, 1.0, epsilon = TOL);
        assert_abs_diff_eq!(hit.normal, -3.0 * PI / 4.0, epsilon = TOL);

        let hit = d.time_to_hit_circle(center, -PI, Side::Left).expect("wall");
        assert_abs_diff_eq!(hit.distance, 1.0, epsilon = TOL);
        assert!(angle_diff(hit.normal, 0.0) < TOL);

        let hit = d
            .time_to_hit_circle([d.right_center_x, 0.0], -FRAC_PI_2, Side::Right)
            .expect("wall");
        assert_abs_diff_eq!(hit.distance, 1.0, epsilon = TOL);
        assert_abs_diff_eq!(hit.normal, FRAC_PI_2, epsilon = TOL);
    }

    #[test]
    fn circle_hits_along_inscribed_triangle() {
        let d = curved();
        let x = 3f64.sqrt() / 2.0;
        let start = [d.left_center_x - x, -0.5];
        let hit = d.time_to_hit_circle(start, PI / 3.0, Side::Left).expect("top vertex");
        assert_abs_diff_eq!(hit.distance, 2.0 * x, epsilon = TOL);
        assert_abs_diff_eq!(hit.normal, -FRAC_PI_2, epsilon = TOL);

        let hit = d.time_to_hit_circle(start, 0.0, Side::Left).expect("right vertex");
        assert_abs_diff_eq!(hit.distance, 2.0 * x, epsilon = TOL);
        assert_abs_diff_eq!(hit.normal, 5.0 * PI / 6.0, epsilon = TOL);
    }

    #[test]
    fn circle_openings_inside_bridge_are_skipped() {
        let d = curved();
        let center = [d.left_center_x, 0.0];
        let hit = d.time_to_hit_circle(center, 0.0, Side::Right).expect("far wall");
        assert_abs_diff_eq!(hit.distance, 3.5, epsilon = TOL);
        assert_abs_diff_eq!(hit.normal, PI, epsilon = TOL);
        assert!(d.time_to_hit_circle(center, 0.0, Side::Left).is_none());
    }

    #[test]
    fn curved_gate_crossings() {
        let d = curved();
        let t = d
            .time_to_hit_gate([d.left_center_x, 0.0], 0.0)
            .expect("neck entry");
        assert_abs_diff_eq!(t, 1.0, epsilon = TOL);
        let t = d.time_to_hit_gate([0.0, 0.0], PI).expect("left opening");
        assert_abs_diff_eq!(t, 0.25, epsilon = TOL);
        assert!(d.time_to_hit_gate([d.left_center_x, 0.0], FRAC_PI_2).is_none());
    }

    #[test]
    fn flat_gate_crossings() {
        let d = flat();
        let t = d
            .time_to_hit_gate([d.left_center_x, 0.0], 0.0)
            .expect("gate line");
        assert_abs_diff_eq!(t, 1.25 - d.bridge_length / 2.0, epsilon = TOL);
        let t = d.time_to_hit_gate([0.0, 0.0], 0.0).expect("right line");
        assert_abs_diff_eq!(t, d.bridge_length / 2.0, epsilon = TOL);
    }

    #[test]
    fn middle_crossing() {
        let d = curved();
        let t = d.time_to_hit_middle([-0.5, 0.0], 0.0).expect("midline");
        assert_abs_diff_eq!(t, 0.5, epsilon = TOL);
        assert!(d.time_to_hit_middle([-0.5, 0.0], PI).is_none());
        assert!(d.time_to_hit_middle([-0.5, 0.3], 0.0).is_none());
    }

    #[test]
    fn reflection_law() {
        assert!(angle_diff(reflect(PI / 6.0, PI), 5.0 * PI / 6.0) < TOL);
        assert!(angle_diff(reflect(FRAC_PI_2, -FRAC_PI_2), -FRAC_PI_2) < TOL);
        assert!(angle_diff(reflect(0.0, 5.0 * PI / 4.0), 3.0 * FRAC_PI_2) < TOL);
        assert!(angle_diff(reflect(0.0, FRAC_PI_2), 0.0) < TOL);
        let r = reflect(1.0, 0.3);
        assert!((0.0..TAU).contains(&r));
    }

    #[test]
    fn double_reflection_off_perpendicular_walls_reverses_heading() {
        for &(angle, normal) in &[(0.3, 0.0), (2.0, 1.1), (-1.0, 4.0)] {
            let twice = reflect(reflect(angle, normal), normal + FRAC_PI_2);
            assert!(angle_diff(twice, angle + PI) < TOL);
        }
    }

    #[test]
    fn next_event_from_center_reflects_off_chamber() {
        let d = flat();
        let ev = d
            .next_event([d.left_center_x, 0.0], -FRAC_PI_2)
            .expect("chamber wall");
        assert_eq!(ev.kind, EventKind::Circle(Side::Left));
        assert_abs_diff_eq!(ev.distance, 1.0, epsilon = TOL);
        assert_abs_diff_eq!(ev.direction, FRAC_PI_2, epsilon = TOL);
        assert!(d.is_in_domain(ev.position[0], ev.position[1]));
    }

    #[test]
    fn next_event_passes_through_gate_and_midline() {
        let d = curved();
        let ev = d.next_event([d.left_center_x, 0.0], 0.0).expect("gate");
        assert_eq!(ev.kind, EventKind::Gate);
        assert_eq!(ev.direction, 0.0);
        assert!(ev.position[0] > -0.25);
        let ev = d.next_event(ev.position, ev.direction).expect("midline");
        assert_eq!(ev.kind, EventKind::Middle);
        assert!(ev.position[0] > 0.0);
    }

    #[test]
    fn clamp_into_returns_domain_points() {
        let d = flat();
        assert_eq!(d.clamp_into(-1.25, 0.0, Side::Left), [-1.25, 0.0]);
        let [x, y] = d.clamp_into(0.1, 0.2, Side::Right);
        assert!(d.is_in_domain(x, y));
        assert_abs_diff_eq!(x, 0.1);
        let [x, y] = d.clamp_into(-2.5, 0.0, Side::Right);
        assert!(d.is_in_domain(x, y) && x < 0.0);
        let [x, y] = d.clamp_into(f64::NAN, 0.0, Side::Right);
        assert_eq!([x, y], [d.right_center_x, 0.0]);
    }

    #[test]
    fn side_helpers() {
        assert_eq!(Side::of_x(-0.1), Some(Side::Left));
        assert_eq!(Side::of_x(0.1), Some(Side::Right));
        assert_eq!(Side::of_x(0.0), None);
        assert_eq!(Side::Left.opposite(), Side::Right);
        assert_eq!(Side::Right.index(), 1);
    }
}
