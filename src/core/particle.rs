use crate::core::geometry::Side;
use crate::error::{Error, Result};

/// A point particle in straight-line flight between boundary events.
///
/// Particles are addressed by their index in the simulation's particle vector,
/// which is stable for the lifetime of a run.
///
/// Fields:
/// - `position`, `direction`: state committed at the last event (`impact_time`)
/// - `next_*`: predicted state at the next event
/// - `in_gate`: admission flag per gate side, indexed by [`Side::index`]
/// - `side`: chamber the particle is counted in
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// Position (x, y) at `impact_time`.
    pub position: [f64; 2],
    /// Heading in radians.
    pub direction: f64,
    /// Time of the last event.
    pub impact_time: f64,
    /// Predicted position at the next event.
    pub next_position: [f64; 2],
    /// Heading after the next event.
    pub next_direction: f64,
    /// Time of the next event.
    pub next_impact_time: f64,
    /// Admitted to the left/right gate.
    pub in_gate: [bool; 2],
    /// Chamber bookkeeping for the occupancy counter.
    pub side: Side,
}

impl Particle {
    /// Create a particle at rest in time (no event predicted yet).
    ///
    /// Errors:
    /// - `Error::InvalidParam` if the position or direction is NaN/inf.
    pub fn new(position: [f64; 2], direction: f64, side: Side) -> Result<Self> {
        if !position.iter().all(|x| x.is_finite()) {
            return Err(Error::InvalidParam("position must be finite".into()));
        }
        if !direction.is_finite() {
            return Err(Error::InvalidParam("direction must be finite".into()));
        }
        Ok(Self {
            position,
            direction,
            impact_time: 0.0,
            next_position: position,
            next_direction: direction,
            next_impact_time: 0.0,
            in_gate: [false; 2],
            side,
        })
    }

    /// Whether the heading points toward the midline (`x * cos(direction) <= 0`).
    #[inline]
    pub fn is_heading_inward(&self) -> bool {
        self.position[0] * self.direction.cos() <= 0.0
    }

    #[inline]
    pub fn is_in_gate(&self, side: Side) -> bool {
        self.in_gate[side.index()]
    }

    #[inline]
    pub fn set_in_gate(&mut self, side: Side, inside: bool) {
        self.in_gate[side.index()] = inside;
    }

    /// Linear interpolation of the position between the last and the next event.
    pub fn position_at(&self, time: f64) -> [f64; 2] {
        let span = self.next_impact_time - self.impact_time;
        if span == 0.0 {
            return self.position;
        }
        let frac = (time - self.impact_time) / span;
        [
            self.position[0] + (self.next_position[0] - self.position[0]) * frac,
            self.position[1] + (self.next_position[1] - self.position[1]) * frac,
        ]
    }

    /// Make the predicted event the current state.
    #[inline]
    pub fn commit(&mut self) {
        self.position = self.next_position;
        self.direction = self.next_direction;
        self.impact_time = self.next_impact_time;
    }
}
