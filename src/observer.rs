//! Hooks through which a running [`Simulation`] reports to the outside world.
//!
//! The engine itself never touches the file system; dump writers and
//! recorders in [`crate::io`] implement [`Observer`] instead.

use crate::core::{Measurement, Simulation};
use crate::error::Result;

/// Receiver of snapshot ticks and per-event measurements.
///
/// Both methods default to doing nothing, so an observer only overrides what
/// it needs. An error aborts the current `update` call and is returned from it.
pub trait Observer {
    /// Called for each sampling tick `time` that falls before the next event.
    /// Positions at the tick are available through [`Simulation::position_at`].
    fn on_snapshot(&mut self, _time: f64, _sim: &Simulation) -> Result<()> {
        Ok(())
    }

    /// Called once per processed event, after all state has been updated.
    fn on_event(&mut self, _measurement: &Measurement) -> Result<()> {
        Ok(())
    }
}

impl Observer for () {}

impl<O: Observer + ?Sized> Observer for &mut O {
    fn on_snapshot(&mut self, time: f64, sim: &Simulation) -> Result<()> {
        (**self).on_snapshot(time, sim)
    }

    fn on_event(&mut self, measurement: &Measurement) -> Result<()> {
        (**self).on_event(measurement)
    }
}

impl<A: Observer, B: Observer> Observer for (A, B) {
    fn on_snapshot(&mut self, time: f64, sim: &Simulation) -> Result<()> {
        self.0.on_snapshot(time, sim)?;
        self.1.on_snapshot(time, sim)
    }

    fn on_event(&mut self, measurement: &Measurement) -> Result<()> {
        self.0.on_event(measurement)?;
        self.1.on_event(measurement)
    }
}

impl<O: Observer> Observer for Option<O> {
    fn on_snapshot(&mut self, time: f64, sim: &Simulation) -> Result<()> {
        match self {
            Some(inner) => inner.on_snapshot(time, sim),
            None => Ok(()),
        }
    }

    fn on_event(&mut self, measurement: &Measurement) -> Result<()> {
        match self {
            Some(inner) => inner.on_event(measurement),
            None => Ok(()),
        }
    }
}
