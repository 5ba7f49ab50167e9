//! Simulation engine: geometry, particle state, scheduling and the gate
//! state machine.

pub mod config;
pub mod gate;
pub mod geometry;
pub mod particle;
pub mod rng;
pub mod scheduler;
pub mod sim;

pub use config::{ChannelLayout, DistanceMeasure, GateShape, RetractionPolicy, SimConfig};
pub use gate::{Admission, Gate};
pub use geometry::{Domain, EventKind, NextEvent, Side};
pub use particle::Particle;
pub use rng::SimRng;
pub use scheduler::Scheduler;
pub use sim::{Measurement, Simulation};
