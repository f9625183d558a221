use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use goblin_core::FallbackSpec;
use serde::Deserialize;
use tracing::info;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterParams {
    address: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    Path(subdomain): Path<String>,
    Query(params): Query<RegisterParams>,
) -> Response {
    let address = match params.address {
        Some(address) if !address.is_empty() => address,
        _ => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "missing required query parameter: address".to_string(),
            )
                .into_response();
        }
    };

    state
        .manager
        .register_fallback(&subdomain, FallbackSpec::Resolve(address.clone()))
        .await;
    info!(%subdomain, %address, "fallback registered");

    StatusCode::ACCEPTED.into_response()
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::sync::Arc;

    use axum::extract::{Path, Query, State};
    use goblin_core::{LeaseManager, NoProxySupervisor};
    use tokio_util::sync::CancellationToken;

    use super::*;

    fn state() -> AppState {
        AppState {
            manager: LeaseManager::new(
                vec![Ipv4Addr::new(10, 0, 0, 1)],
                Arc::new(NoProxySupervisor),
                CancellationToken::new(),
            ),
            shutdown: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn registers_address_and_returns_202() {
        let state = state();
        let response = register(
            State(state.clone()),
            Path("docs".to_string()),
            Query(RegisterParams {
                address: Some("203.0.113.5".to_string()),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let resolved = state.manager.resolve("docs").await.unwrap();
        assert_eq!(resolved, Ipv4Addr::new(203, 0, 113, 5));
    }

    #[tokio::test]
    async fn missing_address_returns_500() {
        let response = register(
            State(state()),
            Path("docs".to_string()),
            Query(RegisterParams { address: None }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
