use actix_web::{HttpResponse, Responder, get, web};

use super::models::{AppState, ChainResponse, LogsResponse};

/// Main chain of one node, genesis first.
#[get("/nodes/{node_id}/chain/")]
pub async fn get_node_chain(
    state: web::Data<AppState>,
    path: web::Path<(String,)>,
) -> impl Responder {
    let node_id = path.into_inner().0;
    let sim = state.simulation.lock().expect("mutex poisoned");

    let Some(chain) = sim.node(&node_id).and_then(|n| n.chain()) else {
        return HttpResponse::NotFound().body(format!("no chain for node {node_id}"));
    };
    HttpResponse::Ok().json(ChainResponse {
        node_id: &node_id,
        height: chain.height(),
        has_fork: chain.has_fork(),
        tips: chain
            .get_all_tips()
            .into_iter()
            .map(|b| b.hash.as_str())
            .collect(),
        chain: chain.get_main_chain(),
    })
}

/// Journal entries recorded by one node's policy.
#[get("/nodes/{node_id}/logs/")]
pub async fn get_node_logs(
    state: web::Data<AppState>,
    path: web::Path<(String,)>,
) -> impl Responder {
    let node_id = path.into_inner().0;
    let sim = state.simulation.lock().expect("mutex poisoned");

    let Some(node) = sim.node(&node_id) else {
        return HttpResponse::NotFound().body(format!("unknown node {node_id}"));
    };
    let journal = node.policy().context().journal();
    HttpResponse::Ok().json(LogsResponse {
        node_id: &node_id,
        dropped: journal.dropped(),
        entries: journal.entries(),
    })
}
