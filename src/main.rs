use env_logger::Env;
use log::{error, info};
use std::process::ExitCode;
use timetable_solver::sample::sample_problem;
use timetable_solver::{Engine, EngineConfig, compare_strategies};

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> timetable_solver::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading configuration from {}", path);
            EngineConfig::load(path)?
        }
        None => EngineConfig::default(),
    };

    let engine = Engine::new(config)?;
    let problem = sample_problem("demo");
    let comparison = compare_strategies(&engine, &problem)?;

    println!("{}", serde_json::to_string_pretty(&comparison)?);
    Ok(())
}
