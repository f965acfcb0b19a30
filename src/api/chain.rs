use actix_web::{HttpResponse, Responder, get, web};

use super::models::{AppState, ChainResponse};
use crate::blockchain::lock_chain;

/// Get the full blockchain, with a re-validation of every link.
#[get("/chain")]
pub async fn get_chain(state: web::Data<AppState>) -> impl Responder {
    let bc = lock_chain(&state.blockchain);
    let resp = ChainResponse {
        length: bc.len(),
        difficulty: bc.difficulty(),
        valid: bc.is_valid_chain(),
        chain: bc.blocks(),
    };
    HttpResponse::Ok().json(resp)
}

#[cfg(test)]
mod tests {
    use actix_web::{App, test, web};

    use crate::api::{AppState, init_routes};

    #[actix_web::test]
    async fn lists_genesis_on_a_fresh_node() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::default()))
                .configure(init_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/chain").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["length"], 1);
        assert_eq!(body["valid"], true);
        assert_eq!(body["chain"][0]["previousHash"], "0");
    }
}
