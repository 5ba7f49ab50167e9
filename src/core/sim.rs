use log::{debug, trace, warn};
use std::f64::consts::{FRAC_PI_2, PI};

use crate::core::config::{RetractionPolicy, SimConfig};
use crate::core::gate::{Admission, Gate};
use crate::core::geometry::{normalize_angle, Domain, Side};
use crate::core::particle::Particle;
use crate::core::rng::SimRng;
use crate::core::scheduler::Scheduler;
use crate::error::{Error, Result};
use crate::observer::Observer;

/// Small numeric tolerance for time comparisons.
const EPS_TIME: f64 = 1e-12;

/// Re-samplings attempted before a particle without a reachable boundary is parked.
const MAX_DEGENERACY_RESETS: usize = 64;

/// Random retraction draws for a refused particle whose landing point leaves the domain.
const MAX_RETRACTIONS: usize = 16;

/// Rejection-sampling budget for placing one particle in a chamber.
const MAX_PLACEMENT_ATTEMPTS: usize = 1_000_000;

/// Occupancy snapshot produced after every event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub time: f64,
    /// Events processed since `start`.
    pub events: u64,
    pub in_left: usize,
    pub in_right: usize,
}

impl Measurement {
    /// Polarisation `|2 * in_left - n| / n`, in `[0, 1]`.
    pub fn mass_spread(&self) -> f64 {
        let n = self.in_left + self.in_right;
        if n == 0 {
            return 0.0;
        }
        (2.0 * self.in_left as f64 - n as f64).abs() / n as f64
    }
}

/// Two circular chambers joined by a channel with a capacity-limited gate on
/// each side.
///
/// Point particles fly at unit speed and reflect specularly off the walls.
/// The engine is event driven: each particle carries its next boundary event
/// and a scheduler keyed on the event time picks the particle to advance.
///
/// A particle heading toward the midline that enters a gate region is admitted
/// while the gate has room. An arrival at a full gate "explodes" it: the
/// arrival and every resident retract, and the gate is emptied.
#[derive(Debug)]
pub struct Simulation {
    config: SimConfig,
    domain: Domain,
    rng: SimRng,
    particles: Vec<Particle>,
    scheduler: Scheduler,
    gates: [Gate; 2],
    time: f64,
    next_sample_time: f64,
    in_left: usize,
    /// Midline crossings indexed by the side left behind.
    crossings: [u64; 2],
    events: u64,
    degeneracy_resets: u64,
    explosions: u64,
    anomalies: u64,
    clamps: u64,
}

impl Simulation {
    /// Create a simulation for `config`, deriving the coupled geometry once.
    ///
    /// No particle exists until [`Simulation::start`] is called.
    ///
    /// Errors:
    /// - `Error::Config` if a parameter fails [`SimConfig::validate`].
    pub fn new(config: SimConfig, seed: Option<u64>) -> Result<Self> {
        config.validate()?;
        let domain = Domain::new(&config);
        let gates = Side::ALL.map(|side| Gate::new(config.capacity(side)));
        let n = config.num_particles;
        Ok(Self {
            domain,
            rng: SimRng::new(seed),
            particles: Vec::with_capacity(n),
            scheduler: Scheduler::with_capacity(n),
            gates,
            time: 0.0,
            next_sample_time: 0.0,
            in_left: 0,
            crossings: [0; 2],
            events: 0,
            degeneracy_resets: 0,
            explosions: 0,
            anomalies: 0,
            clamps: 0,
            config,
        })
    }

    /// Place all particles and build the event schedule.
    ///
    /// `floor(initial_left_fraction * n)` particles go to the left chamber, the
    /// rest to the right, each uniformly inside its chamber (outside the gate
    /// and the channel) with a uniform heading. Calling it again restarts the
    /// run from time zero.
    ///
    /// Errors:
    /// - `Error::Config` if the channel is too wide for the chambers or the
    ///   fraction is outside `[0, 1]`.
    pub fn start(&mut self, initial_left_fraction: f64) -> Result<()> {
        if !self.domain.is_feasible() {
            return Err(Error::Config(format!(
                "bridge height {} too large for circle radius {}; no placement possible",
                self.config.bridge_height, self.config.circle_radius
            )));
        }
        if !(0.0..=1.0).contains(&initial_left_fraction) {
            return Err(Error::Config(format!(
                "initial left fraction must be in [0, 1], got {initial_left_fraction}"
            )));
        }
        if self.config.channels.channels() > 1 {
            return Err(Error::Config(format!(
                "{} channels requested; only the single gated channel is modelled",
                self.config.channels.channels()
            )));
        }

        let n = self.config.num_particles;
        let num_left = (initial_left_fraction * n as f64).floor() as usize;
        self.time = 0.0;
        self.next_sample_time = 0.0;
        self.in_left = num_left;
        self.crossings = [0; 2];
        self.events = 0;
        self.degeneracy_resets = 0;
        self.explosions = 0;
        self.anomalies = 0;
        self.clamps = 0;
        self.gates = Side::ALL.map(|side| Gate::new(self.config.capacity(side)));

        self.particles.clear();
        for i in 0..n {
            let side = if i < num_left { Side::Left } else { Side::Right };
            let position = self.sample_in_chamber(side);
            let direction = self.rng.angle();
            self.particles.push(Particle::new(position, direction, side)?);
        }
        for i in 0..n {
            self.compute_next_impact(i);
        }
        let times: Vec<f64> = self.particles.iter().map(|p| p.next_impact_time).collect();
        self.scheduler.rebuild(&times)?;

        debug!(
            "started {} particles ({} left), seed {}, bridge length {:.6}",
            n,
            num_left,
            self.rng.seed(),
            self.domain.bridge_length
        );
        Ok(())
    }

    // ============ Accessors ============

    /// Time of the last processed event.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn num_particles(&self) -> usize {
        self.particles.len()
    }

    /// Particles counted in the left chamber.
    pub fn in_left(&self) -> usize {
        self.in_left
    }

    pub fn in_right(&self) -> usize {
        self.particles.len() - self.in_left
    }

    /// Midline crossings away from `side` since `start`.
    pub fn crossings(&self, side: Side) -> u64 {
        self.crossings[side.index()]
    }

    /// Events processed since `start`.
    pub fn events(&self) -> u64 {
        self.events
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn gate(&self, side: Side) -> &Gate {
        &self.gates[side.index()]
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Particles re-sampled because no boundary was found ahead of them.
    pub fn degeneracy_resets(&self) -> u64 {
        self.degeneracy_resets
    }

    pub fn explosions(&self) -> u64 {
        self.explosions
    }

    /// Evicted residents whose interpolated position had left the domain.
    pub fn anomalies(&self) -> u64 {
        self.anomalies
    }

    /// Landing points pulled back into the domain before commit.
    pub fn clamps(&self) -> u64 {
        self.clamps
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.rng.seed()
    }

    /// Random alphanumeric token drawn from this simulation's stream.
    pub fn token(&mut self, len: usize) -> String {
        self.rng.token(len)
    }

    pub fn measurement(&self) -> Measurement {
        Measurement {
            time: self.time,
            events: self.events,
            in_left: self.in_left,
            in_right: self.in_right(),
        }
    }

    pub fn mass_spread(&self) -> f64 {
        self.measurement().mass_spread()
    }

    /// Position of `particle` at `time`, interpolated along its current flight.
    ///
    /// Errors: `Error::InvalidParam` for an unknown handle.
    pub fn position_at(&self, particle: usize, time: f64) -> Result<[f64; 2]> {
        self.particles
            .get(particle)
            .map(|p| p.position_at(time))
            .ok_or_else(|| Error::InvalidParam(format!("no particle with handle {particle}")))
    }

    pub fn directions(&self) -> Vec<f64> {
        self.particles.iter().map(|p| p.direction).collect()
    }

    // ============ Driving ============

    /// Process exactly one event.
    ///
    /// With `sampling_interval > 0`, every sampling tick between the current
    /// time and the next event is reported through [`Observer::on_snapshot`]
    /// before the event is applied. The resulting measurement is passed to
    /// [`Observer::on_event`] and returned.
    ///
    /// Errors: `Error::Config` before `start`; observer errors are propagated.
    pub fn update<O: Observer + ?Sized>(
        &mut self,
        sampling_interval: f64,
        observer: &mut O,
    ) -> Result<Measurement> {
        let (p, next_time) = self
            .scheduler
            .peek_min()
            .ok_or_else(|| Error::Config("simulation has not been started".into()))?;

        if sampling_interval > 0.0 {
            if self.next_sample_time < self.time {
                self.next_sample_time = (self.time / sampling_interval).ceil() * sampling_interval;
            }
            while self.next_sample_time < next_time {
                observer.on_snapshot(self.next_sample_time, self)?;
                self.next_sample_time += sampling_interval;
            }
        }

        // Safety clamp of the landing point.
        let particle = &mut self.particles[p];
        let [nx, ny] = particle.next_position;
        if !self.domain.is_in_domain(nx, ny) {
            let fallback = Side::of_x(nx).unwrap_or(particle.side);
            particle.next_position = self.domain.clamp_into(nx, ny, fallback);
            self.clamps += 1;
            warn!(
                "particle {p} about to leave the domain at ({nx:.6}, {ny:.6}), clamped to ({:.6}, {:.6})",
                particle.next_position[0], particle.next_position[1]
            );
        }

        let landing_x = self.particles[p].next_position[0];
        self.settle_side(p, landing_x, true);
        self.particles[p].commit();
        self.time = next_time;
        self.events += 1;

        let mut retracted = false;
        for side in Side::ALL {
            retracted |= self.gate_transition(p, side)?;
        }
        // A refused particle already has its retraction flight.
        if !retracted {
            self.compute_next_impact(p);
        }
        match self.scheduler.peek_min() {
            Some((head, _)) if head == p => {
                self.scheduler.pop_min();
            }
            _ => {
                self.scheduler.remove(p);
            }
        }
        self.scheduler.insert(p, self.particles[p].next_impact_time)?;

        let measurement = self.measurement();
        observer.on_event(&measurement)?;
        Ok(measurement)
    }

    /// Process one event without sampling or observers.
    pub fn step(&mut self) -> Result<Measurement> {
        self.update(0.0, &mut ())
    }

    /// Process `n` events.
    pub fn run_events(&mut self, n: u64) -> Result<()> {
        for _ in 0..n {
            self.step()?;
        }
        Ok(())
    }

    /// Process every event scheduled at or before `target_time`.
    ///
    /// [`Simulation::time`] afterwards is the time of the last processed event,
    /// not `target_time`; use [`Simulation::position_at`] to read positions at
    /// the target.
    pub fn advance_to(&mut self, target_time: f64) -> Result<()> {
        if !target_time.is_finite() {
            return Err(Error::InvalidParam("target_time must be finite".into()));
        }
        if target_time < self.time - EPS_TIME {
            return Err(Error::InvalidParam(
                "target_time cannot be earlier than current time".into(),
            ));
        }
        while let Some((_, next)) = self.scheduler.peek_min() {
            if next > target_time {
                break;
            }
            self.step()?;
        }
        Ok(())
    }

    /// Place `particle` at `position` with `direction` at the current time.
    ///
    /// The particle leaves any gate it occupied, its chamber bookkeeping
    /// follows the new position and its next event is rescheduled.
    ///
    /// Errors:
    /// - `Error::InvalidParam` for an unknown handle, non-finite values, or a
    ///   position outside the domain.
    pub fn set_particle(&mut self, particle: usize, position: [f64; 2], direction: f64) -> Result<()> {
        if particle >= self.particles.len() {
            return Err(Error::InvalidParam(format!(
                "no particle with handle {particle} ({} particles)",
                self.particles.len()
            )));
        }
        if !position.iter().all(|v| v.is_finite()) || !direction.is_finite() {
            return Err(Error::InvalidParam(
                "position and direction must be finite".into(),
            ));
        }
        if !self.domain.is_in_domain(position[0], position[1]) {
            return Err(Error::InvalidParam(format!(
                "position ({}, {}) is outside the domain",
                position[0], position[1]
            )));
        }

        for side in Side::ALL {
            self.leave_gate(particle, side);
        }
        self.settle_side(particle, position[0], false);
        let p = &mut self.particles[particle];
        p.position = position;
        p.direction = direction;
        p.impact_time = self.time;
        self.compute_next_impact(particle);
        self.scheduler
            .reschedule(particle, self.particles[particle].next_impact_time)
    }

    // ============ Internal helpers ============

    /// Predict the next boundary event of particle `i` from its committed state.
    ///
    /// A particle with no boundary ahead is re-sampled on its side; after too
    /// many attempts it is parked in place for one `max_path`.
    fn compute_next_impact(&mut self, i: usize) {
        for _ in 0..MAX_DEGENERACY_RESETS {
            let p = &self.particles[i];
            if let Some(event) = self.domain.next_event(p.position, p.direction) {
                let p = &mut self.particles[i];
                p.next_position = event.position;
                p.next_direction = event.direction;
                p.next_impact_time = p.impact_time + event.distance;
                return;
            }
            self.degeneracy_resets += 1;
            warn!(
                "no boundary ahead of particle {i} at ({:.6}, {:.6}) heading {:.6}; re-sampled",
                p.position[0], p.position[1], p.direction
            );
            self.reset_particle(i);
        }

        warn!("particle {i} parked after {MAX_DEGENERACY_RESETS} re-samplings");
        let max_path = self.domain.max_path;
        let p = &mut self.particles[i];
        p.next_position = p.position;
        p.next_direction = p.direction;
        p.next_impact_time = p.impact_time + max_path;
    }

    /// Re-sample particle `i` uniformly in the chamber it is counted in.
    fn reset_particle(&mut self, i: usize) {
        for side in Side::ALL {
            self.leave_gate(i, side);
        }
        let side = self.particles[i].side;
        let position = self.sample_in_chamber(side);
        let direction = self.rng.angle();
        let p = &mut self.particles[i];
        p.position = position;
        p.direction = direction;
        p.impact_time = self.time;
    }

    /// Rejection sampling inside the circle on `side`, away from the gate and
    /// the channel. Falls back to the chamber center if the budget runs out.
    fn sample_in_chamber(&mut self, side: Side) -> [f64; 2] {
        let box_x = self.domain.circle_distance / 2.0 + 2.0 * self.domain.circle_radius;
        let box_y = self.domain.circle_radius;
        for _ in 0..MAX_PLACEMENT_ATTEMPTS {
            let x = (self.rng.uniform() - 0.5) * 2.0 * box_x;
            let y = (self.rng.uniform() - 0.5) * 2.0 * box_y;
            if self.domain.is_in_circle(x, y, side)
                && !self.domain.is_in_gate(x, y, side)
                && !self.domain.is_in_bridge(x, y)
            {
                return [x, y];
            }
        }
        warn!("placement budget exhausted on {side:?} side, using the chamber center");
        [self.domain.center_x(side), 0.0]
    }

    /// Move particle `i`'s chamber bookkeeping to the side of `x`.
    ///
    /// A point exactly on the midline keeps the previous side.
    fn settle_side(&mut self, i: usize, x: f64, count_crossing: bool) {
        let Some(new_side) = Side::of_x(x) else {
            return;
        };
        let old_side = self.particles[i].side;
        if new_side == old_side {
            return;
        }
        self.particles[i].side = new_side;
        match new_side {
            Side::Left => self.in_left += 1,
            Side::Right => self.in_left -= 1,
        }
        if count_crossing {
            self.crossings[old_side.index()] += 1;
        }
    }

    fn leave_gate(&mut self, i: usize, side: Side) {
        if self.particles[i].is_in_gate(side) {
            self.particles[i].set_in_gate(side, false);
            self.gates[side.index()].depart(i);
        }
    }

    /// Admission or departure of particle `i` at the gate on `side`.
    ///
    /// Returns `true` if the particle was refused and its next impact already
    /// recomputed for the retraction.
    fn gate_transition(&mut self, i: usize, side: Side) -> Result<bool> {
        let p = &self.particles[i];
        let [x, y] = p.position;
        if self.domain.is_in_gate(x, y, side) && p.is_heading_inward() {
            if !p.is_in_gate(side) {
                match self.gates[side.index()].admit(i) {
                    Admission::Admitted => {
                        trace!("particle {i} admitted to {side:?} gate at t={}", self.time);
                        self.particles[i].set_in_gate(side, true);
                    }
                    Admission::Refused => {
                        self.explode_gate(i, side)?;
                        return Ok(true);
                    }
                }
            }
        } else {
            self.leave_gate(i, side);
        }
        Ok(false)
    }

    /// Refuse particle `i` at the full gate on `side` and evict every resident.
    fn explode_gate(&mut self, i: usize, side: Side) -> Result<()> {
        self.explosions += 1;
        debug!(
            "{side:?} gate exploded at t={:.6} on arrival of particle {i}, evicting {}",
            self.time,
            self.gates[side.index()].len()
        );

        let attempts = match self.config.retraction {
            RetractionPolicy::Reverse => 1,
            RetractionPolicy::Random => MAX_RETRACTIONS,
        };
        for _ in 0..attempts {
            let direction = self.retraction_angle(i, side);
            self.particles[i].direction = direction;
            self.compute_next_impact(i);
            let [nx, ny] = self.particles[i].next_position;
            if self.domain.is_in_domain(nx, ny) {
                break;
            }
        }

        let residents = self.gates[side.index()].evict_all();
        for resident in residents {
            self.particles[resident].set_in_gate(side, false);
            let [x, y] = self.particles[resident].position_at(self.time);
            let position = if self.domain.is_in_domain(x, y) {
                [x, y]
            } else {
                self.anomalies += 1;
                let clamped = self
                    .domain
                    .clamp_into(x, y, self.particles[resident].side);
                warn!(
                    "evicted particle {resident} found outside the domain at ({x:.6}, {y:.6}), clamped"
                );
                clamped
            };
            self.settle_side(resident, position[0], true);
            let p = &mut self.particles[resident];
            p.position = position;
            p.impact_time = self.time;
            let direction = self.retraction_angle(resident, side);
            self.particles[resident].direction = direction;
            self.compute_next_impact(resident);
            self.scheduler
                .reschedule(resident, self.particles[resident].next_impact_time)?;
        }
        Ok(())
    }

    /// Heading given to particle `i` when it retracts from the gate on `side`.
    fn retraction_angle(&mut self, i: usize, side: Side) -> f64 {
        let p = &self.particles[i];
        match self.config.retraction {
            RetractionPolicy::Reverse => {
                let x = if p.position[0] != 0.0 {
                    p.position[0]
                } else {
                    side.sign()
                };
                if x * p.direction.cos() < 0.0 {
                    normalize_angle(p.direction + PI)
                } else {
                    p.direction
                }
            }
            RetractionPolicy::Random => {
                let lower = match side {
                    Side::Right => -FRAC_PI_2,
                    Side::Left => FRAC_PI_2,
                };
                normalize_angle(lower + self.rng.uniform() * PI)
            }
        }
    }
}
