use gatesim::core::{
    ChannelLayout, DistanceMeasure, GateShape, RetractionPolicy, Side, SimConfig, Simulation,
};
use gatesim::error::Result;
use rstest::rstest;

fn config(num_particles: usize, capacity: usize, gate_shape: GateShape, retraction: RetractionPolicy) -> SimConfig {
    SimConfig {
        num_particles,
        circle_radius: 1.0,
        circle_distance: 0.5,
        bridge_height: 0.1,
        left_capacity: capacity,
        right_capacity: capacity,
        retraction,
        gate_shape,
        channels: ChannelLayout::Single,
    }
}

fn check_invariants(sim: &Simulation) {
    let d = sim.domain();
    let mut left = 0;
    for (i, p) in sim.particles().iter().enumerate() {
        assert!(
            d.is_in_domain(p.position[0], p.position[1]),
            "particle {i} outside domain at {:?}",
            p.position
        );
        assert!(p.next_impact_time >= p.impact_time);
        assert_eq!(sim.scheduler().time_of(i), Some(p.next_impact_time));
        if p.side == Side::Left {
            left += 1;
        }
        for side in Side::ALL {
            assert_eq!(p.is_in_gate(side), sim.gate(side).contains(i));
        }
    }
    assert_eq!(sim.in_left(), left);
    assert_eq!(sim.in_left() + sim.in_right(), sim.num_particles());

    let (_, head) = sim.scheduler().peek_min().expect("scheduled");
    let min = sim
        .particles()
        .iter()
        .map(|p| p.next_impact_time)
        .fold(f64::INFINITY, f64::min);
    assert_eq!(head, min);
}

/// Every gate shape and retraction policy keeps the bookkeeping consistent.
#[rstest]
#[case::flat_gap(GateShape::Flat { distance: DistanceMeasure::ChamberGap }, RetractionPolicy::Reverse, 1)]
#[case::flat_length(GateShape::Flat { distance: DistanceMeasure::ChannelLength }, RetractionPolicy::Reverse, 2)]
#[case::curved(GateShape::Curved, RetractionPolicy::Reverse, 1)]
#[case::curved_random(GateShape::Curved, RetractionPolicy::Random, 3)]
#[case::flat_random(GateShape::Flat { distance: DistanceMeasure::ChamberGap }, RetractionPolicy::Random, 1)]
#[case::closed(GateShape::Curved, RetractionPolicy::Reverse, 0)]
fn bookkeeping_holds_after_every_event(
    #[case] gate_shape: GateShape,
    #[case] retraction: RetractionPolicy,
    #[case] capacity: usize,
) -> Result<()> {
    let mut sim = Simulation::new(config(60, capacity, gate_shape, retraction), Some(2024))?;
    sim.start(0.75)?;
    check_invariants(&sim);
    let mut last = sim.time();
    for _ in 0..3000 {
        let m = sim.step()?;
        assert!(m.time >= last);
        last = m.time;
        for side in Side::ALL {
            assert!(sim.gate(side).len() <= capacity);
        }
        check_invariants(&sim);
    }
    assert_eq!(sim.events(), 3000);
    if capacity == 0 {
        assert_eq!(sim.crossings(Side::Left) + sim.crossings(Side::Right), 0);
        assert_eq!(sim.in_left(), 45);
    }
    Ok(())
}

#[test]
fn equal_seeds_replay_identically() -> Result<()> {
    let cfg = config(40, 1, GateShape::Curved, RetractionPolicy::Random);
    let mut a = Simulation::new(cfg.clone(), Some(99))?;
    let mut b = Simulation::new(cfg, Some(99))?;
    a.start(0.5)?;
    b.start(0.5)?;
    for _ in 0..2000 {
        assert_eq!(a.step()?, b.step()?);
    }
    assert_eq!(a.particles(), b.particles());
    assert_eq!(a.explosions(), b.explosions());
    Ok(())
}

#[test]
fn restart_resets_counters() -> Result<()> {
    let mut sim = Simulation::new(config(30, 1, GateShape::Curved, RetractionPolicy::Reverse), Some(4))?;
    sim.start(1.0)?;
    sim.run_events(500)?;
    assert!(sim.events() == 500);
    sim.start(0.0)?;
    assert_eq!(sim.events(), 0);
    assert_eq!(sim.time(), 0.0);
    assert_eq!(sim.in_left(), 0);
    assert_eq!(sim.explosions(), 0);
    assert!(sim.gate(Side::Left).is_empty() && sim.gate(Side::Right).is_empty());
    check_invariants(&sim);
    Ok(())
}

#[test]
fn json_config_drives_a_run() -> Result<()> {
    let cfg = SimConfig::from_json(
        r#"{ "num_particles": 20, "gate_shape": { "kind": "curved" }, "right_capacity": 2 }"#,
    )?;
    let mut sim = Simulation::new(cfg, Some(8))?;
    sim.start(0.5)?;
    sim.advance_to(10.0)?;
    assert!(sim.time() <= 10.0);
    check_invariants(&sim);
    Ok(())
}
