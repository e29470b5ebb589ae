use tracing_subscriber::{EnvFilter, fmt};

use tournament_registrar::shell::config::RegistrarConfig;
use tournament_registrar::shell::simulation;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = RegistrarConfig::from_env()?;
    tracing::info!(
        backend = ?config.backend,
        capacity = config.simulation_capacity,
        players = config.simulation_players,
        max_attempts = config.retry.max_attempts,
        "starting registration contention run"
    );

    let report = simulation::run(&config).await?;
    tracing::info!(
        admitted = report.outcomes.admitted,
        full = report.outcomes.full,
        version = report.tournament.version,
        registrations = report.registrations,
        "contention run finished"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
