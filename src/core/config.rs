//! Construction parameters for a [`Simulation`](crate::core::Simulation).

use serde::{Deserialize, Serialize};

use crate::core::geometry::Side;
use crate::error::{Error, Result};

/// How the configured `circle_distance` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMeasure {
    /// Gap between the two chamber circles along the x-axis.
    ChamberGap,
    /// Length of the straight channel; the chambers are moved so the channel
    /// ends meet the circles.
    ChannelLength,
}

/// Shape of the admission zone on each side of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GateShape {
    /// The half of the straight channel on that side.
    Flat { distance: DistanceMeasure },
    /// The neck between the midline and the chamber circle on that side.
    Curved,
}

impl GateShape {
    /// Build a shape from the two boolean switches used by flag-style front ends.
    ///
    /// Errors: `Error::Config` for a curved gate with the channel-length
    /// correction, which has no geometric meaning.
    pub fn from_flags(flat: bool, distance_as_channel_length: bool) -> Result<Self> {
        match (flat, distance_as_channel_length) {
            (true, false) => Ok(GateShape::Flat {
                distance: DistanceMeasure::ChamberGap,
            }),
            (true, true) => Ok(GateShape::Flat {
                distance: DistanceMeasure::ChannelLength,
            }),
            (false, false) => Ok(GateShape::Curved),
            (false, true) => Err(Error::Config(
                "the channel-length correction requires a flat gate".into(),
            )),
        }
    }
}

/// Channels joining the two chambers.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelLayout {
    /// One gated channel on the x-axis.
    #[default]
    Single,
    /// The gated channel plus a back channel with its own length and width.
    /// Accepted by the configuration but refused by `Simulation::start`.
    WithBackChannel { length: f64, width: f64 },
}

impl ChannelLayout {
    /// Layout from the positional back-channel arguments of batch front ends;
    /// a non-positive width means there is no back channel.
    pub fn from_back_channel(length: f64, width: f64) -> Self {
        if width > 0.0 {
            ChannelLayout::WithBackChannel { length, width }
        } else {
            ChannelLayout::Single
        }
    }

    /// Number of channels between the chambers.
    pub fn channels(&self) -> usize {
        match self {
            ChannelLayout::Single => 1,
            ChannelLayout::WithBackChannel { .. } => 2,
        }
    }
}

/// Heading given to particles refused by (or evicted from) a full gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetractionPolicy {
    /// Reverse the heading if it points toward the channel, otherwise keep it.
    Reverse,
    /// Uniformly random heading in the outward half-plane of the gate's side.
    Random,
}

/// Simulation parameters. All lengths are dimensionless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Number of particles (fixed for the lifetime of the simulation).
    pub num_particles: usize,
    /// Radius of both chambers.
    pub circle_radius: f64,
    /// Chamber gap or channel length, see [`DistanceMeasure`].
    pub circle_distance: f64,
    /// Full width of the channel; its half-height is `bridge_height / 2`.
    pub bridge_height: f64,
    /// Maximum simultaneous occupants of the left gate (0 closes it).
    pub left_capacity: usize,
    /// Maximum simultaneous occupants of the right gate (0 closes it).
    pub right_capacity: usize,
    pub retraction: RetractionPolicy,
    pub gate_shape: GateShape,
    pub channels: ChannelLayout,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            num_particles: 100,
            circle_radius: 1.0,
            circle_distance: 0.5,
            bridge_height: 0.1,
            left_capacity: 1,
            right_capacity: 1,
            retraction: RetractionPolicy::Reverse,
            gate_shape: GateShape::Flat {
                distance: DistanceMeasure::ChamberGap,
            },
            channels: ChannelLayout::Single,
        }
    }
}

impl SimConfig {
    /// Parse a configuration from JSON; missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| Error::Config(format!("malformed configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check parameter sanity.
    ///
    /// Geometric feasibility (`bridge_height / 2 < circle_radius`) is checked
    /// by `Simulation::start`, which is where placement would become impossible.
    pub fn validate(&self) -> Result<()> {
        if self.num_particles == 0 {
            return Err(Error::Config("num_particles must be > 0".into()));
        }
        if !self.circle_radius.is_finite() || self.circle_radius <= 0.0 {
            return Err(Error::Config(format!(
                "circle_radius must be finite and > 0, got {}",
                self.circle_radius
            )));
        }
        if !self.circle_distance.is_finite() || self.circle_distance < 0.0 {
            return Err(Error::Config(format!(
                "circle_distance must be finite and >= 0, got {}",
                self.circle_distance
            )));
        }
        if !self.bridge_height.is_finite() || self.bridge_height <= 0.0 {
            return Err(Error::Config(format!(
                "bridge_height must be finite and > 0, got {}",
                self.bridge_height
            )));
        }
        if let ChannelLayout::WithBackChannel { length, width } = self.channels {
            if !length.is_finite() || length < 0.0 || !width.is_finite() || width <= 0.0 {
                return Err(Error::Config(format!(
                    "back channel needs finite length >= 0 and width > 0, got {length} x {width}"
                )));
            }
        }
        Ok(())
    }

    /// Capacity of the gate on `side`.
    pub fn capacity(&self, side: Side) -> usize {
        match side {
            Side::Left => self.left_capacity,
            Side::Right => self.right_capacity,
        }
    }
}
