use actix_web::{App, HttpServer, web};
use dotenvy::dotenv;
use log::{error, info};
use std::io;

use consensus_game::api::{self, AppState};
use consensus_game::sim::{SimConfig, Simulation, SimulationReport};

#[actix_web::main]
async fn main() -> io::Result<()> {
    let _ = dotenv();
    env_logger::init();

    let config = SimConfig::from_env().map_err(|e| {
        error!("invalid configuration: {e}");
        io::Error::new(io::ErrorKind::InvalidInput, e)
    })?;
    let mut sim = Simulation::new(&config).map_err(|e| {
        error!("cannot build simulation: {e}");
        io::Error::new(io::ErrorKind::InvalidInput, e)
    })?;

    info!(
        "running {} ticks over {} nodes ({:?})",
        config.ticks,
        config.nodes.len(),
        config.nodes
    );
    sim.run(config.ticks);
    let report = sim.report();
    print_summary(&report);

    if !config.serve {
        let json = serde_json::to_string_pretty(&report).map_err(io::Error::other)?;
        println!("{json}");
        return Ok(());
    }

    let (host, port) = (config.host.clone(), config.port);
    println!("⛓️ Serving simulation {} at http://{host}:{port}/api/v1", report.run_id);

    let state = web::Data::new(AppState::new(sim));

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::init_routes)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}

fn print_summary(report: &SimulationReport) {
    println!(
        "run {} | ticks={} mined={} main_chain={} agreement={:.2} stale_rate={:.2}",
        report.run_id,
        report.ticks,
        report.total_mined,
        report.main_chain_length,
        report.agreement,
        report.stale_rate
    );
    for node in &report.nodes {
        println!(
            "  {:<8} {:<12} height={:<5} mined={:<5} relayed={:<5} tips={} {}",
            node.node_id,
            node.policy.as_str(),
            node.height,
            node.mined,
            node.relayed,
            node.tips,
            node.halted.as_deref().unwrap_or("")
        );
    }
}
