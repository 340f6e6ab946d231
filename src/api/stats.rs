use actix_web::{HttpResponse, Responder, get, post, web};
use log::info;

use super::models::{AppState, MAX_TICKS_PER_REQUEST, RunRequest};

/// Current simulation report.
#[get("/report/")]
pub async fn get_report(state: web::Data<AppState>) -> impl Responder {
    let sim = state.simulation.lock().expect("mutex poisoned");
    HttpResponse::Ok().json(sim.report())
}

/// Advance the simulation by `ticks` and return the new report.
#[post("/run/")]
pub async fn run_ticks(state: web::Data<AppState>, body: web::Json<RunRequest>) -> impl Responder {
    if body.ticks == 0 || body.ticks > MAX_TICKS_PER_REQUEST {
        return HttpResponse::BadRequest()
            .body(format!("ticks must be in 1..={MAX_TICKS_PER_REQUEST}"));
    }

    let mut sim = state.simulation.lock().expect("mutex poisoned");
    let from = sim.tick();
    sim.run(body.ticks);
    info!("RUN - advanced ticks {} -> {}", from, sim.tick());
    HttpResponse::Ok().json(sim.report())
}
