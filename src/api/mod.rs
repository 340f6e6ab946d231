mod chain;
mod health;
pub mod models;
mod stats;

use actix_web::web::{self, ServiceConfig};

pub use models::AppState;

pub fn init_routes(cfg: &mut ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(health::health_check)
            .service(stats::get_report)
            .service(stats::run_ticks)
            .service(chain::get_node_chain)
            .service(chain::get_node_logs),
    );
}
