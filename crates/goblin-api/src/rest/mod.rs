pub mod allocate;
pub mod register;

use axum::routing::post;
use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/allocate/{subdomain}", post(allocate::allocate))
        .route("/register/{subdomain}", post(register::register))
}
