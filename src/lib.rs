//! Event-driven simulation of point particles in two circular chambers joined
//! by a channel with capacity-limited gates.
//!
//! The engine lives in [`core`]; [`observer`] and [`io`] carry measurements
//! and diagnostic dumps out of a running [`core::Simulation`]. Building with
//! the `python` feature adds the `GateSim` extension class.

pub mod core;
pub mod error;
pub mod io;
pub mod logging;
pub mod observer;

#[cfg(feature = "python")]
mod python;

pub use crate::core::{Measurement, SimConfig, Simulation};
pub use crate::error::{Error, Result};
pub use crate::observer::Observer;
