use numpy::ndarray::Array2;
use numpy::{IntoPyArray, PyArray1, PyArray2};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::core::{ChannelLayout, GateShape, RetractionPolicy, Side, SimConfig, Simulation};

fn py_err<E: ToString>(e: E) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn parse_side(side: &str) -> PyResult<Side> {
    match side {
        "left" => Ok(Side::Left),
        "right" => Ok(Side::Right),
        other => Err(py_err(format!(
            "side must be 'left' or 'right', got {other:?}"
        ))),
    }
}

/// GateSim Python-facing wrapper around the Rust Simulation core.
///
/// API:
/// - __new__(num_particles, circle_radius=1.0, circle_distance=0.5, bridge_height=0.1,
///   left_capacity=1, right_capacity=1, flat_gate=True,
///   distance_as_channel_length=False, random_retraction=False,
///   second_length=0.0, second_width=0.0, seed=None)
/// - start(left_fraction), step(), run_events(n), advance_to(time)
/// - get_positions() -> np.ndarray, shape (N, 2)
/// - get_directions() -> np.ndarray, shape (N,)
#[pyclass]
pub struct GateSim {
    sim: Simulation,
}

#[pymethods]
impl GateSim {
    /// Build a two-chamber simulation. Call `start` before stepping.
    ///
    /// A positive `second_width` requests a back channel; `start` then raises
    /// ValueError since only the single gated channel is simulated.
    ///
    /// Errors: raises ValueError on invalid parameters, including a curved
    /// gate combined with the channel-length correction.
    #[new]
    #[pyo3(signature = (
        num_particles,
        circle_radius=1.0,
        circle_distance=0.5,
        bridge_height=0.1,
        left_capacity=1,
        right_capacity=1,
        flat_gate=true,
        distance_as_channel_length=false,
        random_retraction=false,
        second_length=0.0,
        second_width=0.0,
        seed=None
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        num_particles: usize,
        circle_radius: f64,
        circle_distance: f64,
        bridge_height: f64,
        left_capacity: usize,
        right_capacity: usize,
        flat_gate: bool,
        distance_as_channel_length: bool,
        random_retraction: bool,
        second_length: f64,
        second_width: f64,
        seed: Option<u64>,
    ) -> PyResult<Self> {
        let gate_shape =
            GateShape::from_flags(flat_gate, distance_as_channel_length).map_err(py_err)?;
        let retraction = if random_retraction {
            RetractionPolicy::Random
        } else {
            RetractionPolicy::Reverse
        };
        let config = SimConfig {
            num_particles,
            circle_radius,
            circle_distance,
            bridge_height,
            left_capacity,
            right_capacity,
            retraction,
            gate_shape,
            channels: ChannelLayout::from_back_channel(second_length, second_width),
        };
        let sim = Simulation::new(config, seed).map_err(py_err)?;
        Ok(Self { sim })
    }

    /// Place the particles, `left_fraction` of them in the left chamber.
    fn start(&mut self, left_fraction: f64) -> PyResult<()> {
        self.sim.start(left_fraction).map_err(py_err)
    }

    /// Process one event; returns (time, in_left).
    fn step(&mut self) -> PyResult<(f64, usize)> {
        let m = self.sim.step().map_err(py_err)?;
        Ok((m.time, m.in_left))
    }

    /// Process `n` events (releases the GIL during computation).
    fn run_events(&mut self, py: Python<'_>, n: u64) -> PyResult<()> {
        py.detach(|| self.sim.run_events(n)).map_err(py_err)
    }

    /// Process every event up to the given absolute time (releases the GIL).
    fn advance_to(&mut self, py: Python<'_>, target_time: f64) -> PyResult<()> {
        py.detach(|| self.sim.advance_to(target_time))
            .map_err(py_err)
    }

    /// Move one particle to (x, y) with the given heading at the current time.
    fn set_particle(&mut self, index: usize, x: f64, y: f64, direction: f64) -> PyResult<()> {
        self.sim
            .set_particle(index, [x, y], direction)
            .map_err(py_err)
    }

    #[getter]
    fn time(&self) -> f64 {
        self.sim.time()
    }

    #[getter]
    fn in_left(&self) -> usize {
        self.sim.in_left()
    }

    #[getter]
    fn in_right(&self) -> usize {
        self.sim.in_right()
    }

    #[getter]
    fn events(&self) -> u64 {
        self.sim.events()
    }

    #[getter]
    fn explosions(&self) -> u64 {
        self.sim.explosions()
    }

    #[getter]
    fn degeneracy_resets(&self) -> u64 {
        self.sim.degeneracy_resets()
    }

    #[getter]
    fn seed(&self) -> u64 {
        self.sim.seed()
    }

    /// Midline crossings away from `side` ("left" or "right").
    fn crossings(&self, side: &str) -> PyResult<u64> {
        Ok(self.sim.crossings(parse_side(side)?))
    }

    fn mass_spread(&self) -> f64 {
        self.sim.mass_spread()
    }

    /// Handles of the particles admitted to the gate on `side`.
    fn gate_occupants(&self, side: &str) -> PyResult<Vec<usize>> {
        Ok(self.sim.gate(parse_side(side)?).occupants().to_vec())
    }

    /// Return committed positions as a NumPy array of shape (N, 2), dtype=float64.
    fn get_positions<'py>(&self, py: Python<'py>) -> PyResult<Py<PyArray2<f64>>> {
        let n = self.sim.num_particles();
        let mut arr = Array2::<f64>::zeros((n, 2));
        for (i, p) in self.sim.particles().iter().enumerate() {
            arr[[i, 0]] = p.position[0];
            arr[[i, 1]] = p.position[1];
        }
        let pyarr = arr.into_pyarray(py);
        Ok(pyarr.to_owned().into())
    }

    /// Return headings in radians as a NumPy array of shape (N,).
    fn get_directions<'py>(&self, py: Python<'py>) -> PyResult<Py<PyArray1<f64>>> {
        let pyarr = self.sim.directions().into_pyarray(py);
        Ok(pyarr.to_owned().into())
    }
}

/// The gatesim Python module entry point.
#[pymodule]
fn gatesim(_py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<GateSim>()?;
    Ok(())
}
