use actix_web::{HttpResponse, Responder, post, web};
use log::{debug, info, warn};

use super::models::AppState;
use crate::blockchain::{Block, lock_chain};
use crate::consensus::ValidationResponse;

/// Peer validation endpoint: checks a candidate mined elsewhere against our
/// own tip. Read-only: the candidate is never appended here.
#[post("/validate")]
pub async fn validate_block(state: web::Data<AppState>, body: web::Bytes) -> impl Responder {
    let candidate: Block = match serde_json::from_slice(&body) {
        Ok(block) => block,
        Err(e) => {
            warn!("VALIDATE - undecodable candidate: {e}");
            return HttpResponse::BadRequest().json(ValidationResponse::invalid());
        }
    };

    let valid = {
        let bc = lock_chain(&state.blockchain);
        bc.is_valid(&candidate, bc.tip())
    };

    if valid {
        info!(
            "VALIDATE - block #{} hash={} is valid",
            candidate.index, candidate.hash
        );
        HttpResponse::Ok().json(ValidationResponse::valid())
    } else {
        debug!(
            "VALIDATE - block #{} hash={} is invalid",
            candidate.index, candidate.hash
        );
        HttpResponse::Ok().json(ValidationResponse::invalid())
    }
}
