use controller::{BehaviorState, Iso, PlayerConfiguration, SolverStats};
use sim::{Script, SimConfig, SimError, Simulation};

const FRAMES: u64 = 150;

fn run(config: &SimConfig, frames: u64) -> Simulation {
    let mut sim = Simulation::from_config(config).unwrap();
    let mut script = Script::new(config.script.clone());
    for frame in 0..frames {
        script.apply_due(&mut sim, frame).unwrap();
        sim.step(config.frame_time);
    }
    sim
}

fn config_with_workers(workers: usize) -> SimConfig {
    SimConfig {
        workers,
        ..SimConfig::default()
    }
}

#[test]
fn worker_count_does_not_change_results() {
    let single = run(&config_with_workers(1), FRAMES);
    let pooled = run(&config_with_workers(4), FRAMES);

    let a: Vec<_> = single.characters().collect();
    let b: Vec<_> = pooled.characters().collect();
    assert_eq!(a.len(), b.len());
    for ((_, name_a, ca), (_, name_b, cb)) in a.iter().zip(&b) {
        assert_eq!(name_a, name_b);
        assert_eq!(ca.pose(), cb.pose(), "{name_a} diverged");
        assert_eq!(ca.velocity(), cb.velocity(), "{name_a} diverged");
        assert_eq!(ca.state(), cb.state());
    }
}

#[test]
fn scripted_scene_moves_the_runner() {
    let config = config_with_workers(2);
    let sim = run(&config, FRAMES);

    let runner = sim.find("runner").unwrap();
    let c = sim.controller(runner).unwrap();
    assert!(matches!(c.state(), BehaviorState::Walking(_)));
    assert!(c.pose().translation.z < -5.0);
    // Stopped by the wall whose face is at z = -12.
    assert!(c.pose().translation.z - c.config().outer_radius > -12.0 - 1.0e-3);
}

#[test]
fn every_frame_stays_within_the_sweep_bound() {
    let config = config_with_workers(2);
    let mut sim = Simulation::from_config(&config).unwrap();
    let mut script = Script::new(config.script.clone());
    for frame in 0..FRAMES {
        script.apply_due(&mut sim, frame).unwrap();
        let report = sim.step(config.frame_time);
        assert_eq!(report.frame, frame + 1);
        assert_eq!(report.characters, 3);
        assert_eq!(report.dropped_writebacks, 0);
        assert!(report.max_solver_sweeps <= SolverStats::MAX_SWEEPS);
        assert!(report.sub_steps <= 3 * 8);
    }
}

#[test]
fn despawned_characters_leave_the_world() {
    let mut sim = Simulation::from_config(&config_with_workers(1)).unwrap();
    let id = sim.find("jumper").unwrap();
    let body = sim.controller(id).unwrap().body();

    sim.despawn_character(id).unwrap();
    assert_eq!(sim.len(), 2);
    assert!(sim.find("jumper").is_none());
    assert!(sim.world().bodies.get(body).is_none());
    assert!(matches!(
        sim.despawn_character(id),
        Err(SimError::UnknownCharacter(_))
    ));

    let report = sim.step(1.0 / 60.0);
    assert_eq!(report.characters, 2);
    assert_eq!(report.dropped_writebacks, 0);
}

#[test]
fn spawn_rejects_duplicates_and_bad_configs() {
    let mut sim = Simulation::from_config(&config_with_workers(1)).unwrap();

    let duplicate = sim.spawn_character("runner", PlayerConfiguration::default(), Iso::identity());
    assert!(matches!(duplicate, Err(SimError::DuplicateCharacter(_))));

    let bad = PlayerConfiguration {
        inner_radius: 1.0,
        ..PlayerConfiguration::default()
    };
    let result = sim.spawn_character("wide", bad, Iso::identity());
    assert!(matches!(result, Err(SimError::Player { .. })));
    assert_eq!(sim.len(), 3);

    let id = sim
        .spawn_character("late", PlayerConfiguration::default(), Iso::translation(0.0, 0.0, 5.0))
        .unwrap();
    assert_eq!(sim.len(), 4);
    assert!(sim.controller(id).is_some());
}

#[test]
fn script_naming_an_unknown_character_fails() {
    let config = SimConfig::from_toml_str(
        r#"
        [[script]]
        frame = 0
        character = "ghost"
        event = { kind = "press", action = "jump" }
        "#,
    )
    .unwrap();
    let mut sim = Simulation::from_config(&config).unwrap();
    let mut script = Script::new(config.script.clone());

    let result = script.apply_due(&mut sim, 0);
    assert!(matches!(result, Err(SimError::UnknownCharacter(name)) if name == "ghost"));
}

#[test]
fn script_despawn_event_removes_the_character() {
    let config = SimConfig::from_toml_str(
        r#"
        [[script]]
        frame = 2
        character = "rider"
        event = { kind = "despawn" }
        "#,
    )
    .unwrap();
    let mut sim = Simulation::from_config(&config).unwrap();
    let mut script = Script::new(config.script.clone());

    assert_eq!(script.apply_due(&mut sim, 1).unwrap(), 0);
    assert_eq!(script.apply_due(&mut sim, 2).unwrap(), 1);
    assert!(script.is_finished());
    assert!(sim.find("rider").is_none());
}
