use std::path::PathBuf;
use std::process::ExitCode;

use sim::{Script, SimConfig, SimError, Simulation};

fn run(config_path: Option<PathBuf>) -> Result<(), SimError> {
    let config = SimConfig::load(config_path.as_deref())?;
    log::info!(
        "running {} frames at {:.4}s with {} characters",
        config.frames,
        config.frame_time,
        config.characters.len()
    );

    let mut sim = Simulation::from_config(&config)?;
    let mut script = Script::new(config.script.clone());

    for frame in 0..config.frames {
        script.apply_due(&mut sim, frame)?;
        let report = sim.step(config.frame_time);

        if report.frame % 60 == 0 {
            log::info!(
                "frame {}: {} characters, {} sub-steps, max {} solver sweeps",
                report.frame,
                report.characters,
                report.sub_steps,
                report.max_solver_sweeps
            );
            for (id, name, controller) in sim.characters() {
                let t = controller.pose().translation;
                log::info!(
                    "  {name} {id}: {} at ({:.2}, {:.2}, {:.2}), {} contacts",
                    controller.state().name(),
                    t.x,
                    t.y,
                    t.z,
                    controller.last_contacts().len()
                );
            }
        }
    }

    log::info!("finished after {} frames", sim.frame());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    match run(config_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
