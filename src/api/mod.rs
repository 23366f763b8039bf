// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::rejection::JsonRejection,
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    error::ApiError,
    lending::{Contribution, LendingPool, PaymentStatus, PoolTerms, PortfolioEntry, UserProfile},
    models::{
        ChainBalance, ConversionRateRequest, LendingPoolsResponse, PoolDetail, PoolDetailRequest,
        PoolDetailResponse, PortfolioResponse, PricedToken, ProfileResponse, TokenBalanceRequest,
        TokenBalanceResponse, UsdcBalanceRequest, UsdcBalanceResponse, UserRequest, WalletAddress,
    },
    state::AppState,
    upstream::{Chain, ConversionRate, TokenBalance},
};

pub mod balance;
pub mod health;
pub mod pools;
pub mod portfolio;
pub mod rates;

/// Unwrap a JSON body, turning any rejection into a 400.
pub(crate) fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(body)| body).map_err(ApiError::from)
}

/// A present, non-blank string field.
pub(crate) fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("{field} is required")))
}

pub fn router(state: AppState) -> Router {
    let functions = Router::new()
        .route("/get-lending-pools", post(pools::get_lending_pools))
        .route(
            "/get-lending-pool-detail",
            post(pools::get_lending_pool_detail),
        )
        .route("/get-portfolio", post(portfolio::get_portfolio))
        .route("/get-profile", post(portfolio::get_profile))
        .route("/get-token-balance", post(balance::get_token_balance))
        .route("/get-usdc-balance", post(balance::get_usdc_balance))
        .route("/get-conversion-rate", post(rates::get_conversion_rate))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .nest("/functions/v1", functions)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        pools::get_lending_pools,
        pools::get_lending_pool_detail,
        portfolio::get_portfolio,
        portfolio::get_profile,
        balance::get_token_balance,
        balance::get_usdc_balance,
        rates::get_conversion_rate,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            LendingPool,
            PoolTerms,
            Contribution,
            PaymentStatus,
            PortfolioEntry,
            UserProfile,
            WalletAddress,
            LendingPoolsResponse,
            PoolDetailRequest,
            PoolDetail,
            PoolDetailResponse,
            UserRequest,
            PortfolioResponse,
            ProfileResponse,
            Chain,
            TokenBalance,
            PricedToken,
            TokenBalanceRequest,
            TokenBalanceResponse,
            UsdcBalanceRequest,
            ChainBalance,
            UsdcBalanceResponse,
            ConversionRateRequest,
            ConversionRate,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Pools", description = "Lending pools"),
        (name = "Portfolio", description = "User portfolio and profile"),
        (name = "Balances", description = "On-chain token balances"),
        (name = "Rates", description = "Currency conversion"),
        (name = "Health", description = "Liveness and readiness")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{LendingDatabase, SeedData};
    use crate::upstream::{ChainDataClient, RateClient};
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    // Nothing listens on the discard port, so upstream calls fail fast
    const DEAD_UPSTREAM: &str = "http://127.0.0.1:9";

    fn test_state() -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = LendingDatabase::open(&dir.path().join("lending.redb")).unwrap();

        let closing = Utc::now() - Duration::days(60);
        let pool = LendingPool {
            id: "pool-1".to_string(),
            name: "Harvest".to_string(),
            description: None,
            currency: "USDC".to_string(),
            target_amount: dec!(1000),
            monthly_interest: dec!(2),
            min_lend_period_days: 30,
            closing_date: closing,
            status: "active".to_string(),
            created_at: closing - Duration::days(30),
        };
        let contribution = |id: &str, amount| Contribution {
            id: id.to_string(),
            pool_id: "pool-1".to_string(),
            user_id: "user-1".to_string(),
            amount,
            payment_status: PaymentStatus::Confirmed,
            expected_claim_date: None,
            created_at: closing,
        };
        db.seed(&SeedData {
            pools: vec![pool],
            contributions: vec![contribution("c1", dec!(600)), contribution("c2", dec!(700))],
            profiles: vec![UserProfile {
                id: "user-1".to_string(),
                wallet_address: None,
                display_name: Some("Ada".to_string()),
                email: None,
                created_at: closing,
            }],
        })
        .unwrap();

        let state = AppState::new(
            db,
            ChainDataClient::new(DEAD_UPSTREAM, None).unwrap(),
            RateClient::new(DEAD_UPSTREAM).unwrap(),
        );
        (state, dir)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn decimal(value: &Value) -> rust_decimal::Decimal {
        value.as_str().unwrap().parse().unwrap()
    }

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let (state, _dir) = test_state();
        let app = router(state);
        // Ensure the router can be converted into a service without panicking.
        let _ = app.into_make_service();
    }

    #[tokio::test]
    async fn lists_pools() {
        let (state, _dir) = test_state();
        let (status, body) = call(
            router(state),
            post_json("/functions/v1/get-lending-pools", "{}"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pools"][0]["id"], "pool-1");
    }

    #[tokio::test]
    async fn pool_detail_sums_contributions_and_clamps_progress() {
        let (state, _dir) = test_state();
        let (status, body) = call(
            router(state),
            post_json(
                "/functions/v1/get-lending-pool-detail",
                r#"{"id":"pool-1"}"#,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pool"]["id"], "pool-1");
        assert_eq!(decimal(&body["pool"]["total_lent"]), dec!(1300));
        assert_eq!(decimal(&body["pool"]["funding_progress"]), dec!(100));
        assert_eq!(body["pool"]["contribution_count"], 2);
    }

    #[tokio::test]
    async fn unknown_pool_is_404() {
        let (state, _dir) = test_state();
        let (status, body) = call(
            router(state),
            post_json("/functions/v1/get-lending-pool-detail", r#"{"id":"nope"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "Pool not found" }));
    }

    #[tokio::test]
    async fn missing_field_is_400() {
        let (state, _dir) = test_state();
        let (status, body) = call(
            router(state),
            post_json("/functions/v1/get-portfolio", "{}"),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "userId is required" }));
    }

    #[tokio::test]
    async fn malformed_json_is_400() {
        let (state, _dir) = test_state();
        let (status, body) = call(
            router(state),
            post_json("/functions/v1/get-profile", "{not json"),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn portfolio_carries_derived_fields() {
        let (state, _dir) = test_state();
        let (status, body) = call(
            router(state),
            post_json("/functions/v1/get-portfolio", r#"{"userId":"user-1"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let entries = body["portfolio"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        for entry in entries {
            // Closed 60 days ago with a 30-day minimum
            assert_eq!(entry["is_eligible"], true);
            assert_eq!(entry["pool"]["pool_id"], "pool-1");
            assert!(entry["eligible_date"].is_string());
        }
        let c1 = entries.iter().find(|e| e["id"] == "c1").unwrap();
        // Two months at 2% since closing
        assert_eq!(decimal(&c1["claimable_amount"]), dec!(624));
    }

    #[tokio::test]
    async fn profile_lookup() {
        let (state, _dir) = test_state();
        let app = router(state);

        let (status, body) = call(
            app.clone(),
            post_json("/functions/v1/get-profile", r#"{"userId":"user-1"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["profile"]["display_name"], "Ada");

        let (status, _) = call(
            app,
            post_json("/functions/v1/get-profile", r#"{"userId":"ghost"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn conversion_rate_falls_back_when_upstream_is_down() {
        let (state, _dir) = test_state();
        let (status, body) = call(
            router(state),
            post_json(
                "/functions/v1/get-conversion-rate",
                r#"{"fromCurrency":"EUR","toCurrency":"USD","amount":"10"}"#,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "fallback");
        assert_eq!(body["fromCurrency"], "EUR");
        assert_eq!(decimal(&body["rate"]), dec!(1.08));
        assert_eq!(decimal(&body["convertedAmount"]), dec!(10.8));
    }

    #[tokio::test]
    async fn oversized_conversion_amount_is_400() {
        let (state, _dir) = test_state();
        let (status, body) = call(
            router(state),
            post_json(
                "/functions/v1/get-conversion-rate",
                r#"{"fromCurrency":"BTC","toCurrency":"USD","amount":"79228162514264337593543950335"}"#,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Amount out of range"));
    }

    #[tokio::test]
    async fn invalid_wallet_address_is_400() {
        let (state, _dir) = test_state();
        let (status, _) = call(
            router(state),
            post_json(
                "/functions/v1/get-token-balance",
                r#"{"walletAddress":"0x123","chain":"base"}"#,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn usdc_balance_fails_when_every_chain_fails() {
        let (state, _dir) = test_state();
        let (status, body) = call(
            router(state),
            post_json(
                "/functions/v1/get-usdc-balance",
                r#"{"walletAddress":"0x742d35Cc6634C0532925a3b844Bc9e7595f4aB12"}"#,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Chain data unavailable" }));
    }

    #[tokio::test]
    async fn preflight_gets_cors_headers() {
        let (state, _dir) = test_state();
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/functions/v1/get-portfolio")
            .header(header::ORIGIN, "https://app.example.com")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .unwrap();

        let response = router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let (state, _dir) = test_state();
        let request = Request::builder()
            .uri("/health/live")
            .body(Body::empty())
            .unwrap();
        let response = router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }
}
