// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::time::Duration;

use axum::{
    body::Body,
    http::{HeaderName, Request, StatusCode},
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{auth_gateway, AuthGateway},
    models::{HealthResponse, SaveUrlRequest, SaveUrlResponse},
    state::AppState,
};

pub mod health;
pub mod redirect;
pub mod urls;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the service router.
///
/// Every route, docs included, runs behind the authorization gateway; only
/// `DELETE /url/{alias}` enforces its decision. `request_timeout` bounds the
/// whole request, SSO lookups included.
pub fn router(state: AppState, gateway: AuthGateway, request_timeout: Duration) -> Router {
    let x_request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .route("/health/live", get(health::liveness))
        .route("/url", post(urls::save_url))
        .route("/url/{alias}", delete(urls::delete_url))
        .route("/{alias}", get(redirect::redirect))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        // Layers run bottom-up: request id, trace, timeout, gateway.
        .layer(from_fn_with_state(gateway, auth_gateway))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                let request_id = req
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("n/a");
                tracing::info_span!(
                    "http_request",
                    method = %req.method(),
                    uri = %req.uri().path(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        urls::save_url,
        urls::delete_url,
        redirect::redirect,
        health::liveness
    ),
    components(schemas(SaveUrlRequest, SaveUrlResponse, HealthResponse)),
    modifiers(&BearerAuth),
    tags(
        (name = "Links", description = "Short link management"),
        (name = "Health", description = "Liveness probe")
    )
)]
struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::error::DENIAL_MESSAGE;
    use crate::auth::{token::sign_test_token, Principal, PrincipalLookup, TokenCodec};
    use crate::sso::fake::{FakeAuthority, FakeConnector};
    use crate::sso::{RetryPolicy, SsoClient, SsoSettings};
    use crate::storage::Storage;
    use axum::body::to_bytes;
    use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, LOCATION};
    use serde_json::{json, Value};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        storage: Arc<Storage>,
        authority: Arc<FakeAuthority>,
        user_key: String,
        _dir: TempDir,
    }

    async fn app(retry: RetryPolicy) -> TestApp {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(&dir.path().join("storage.redb")).unwrap());
        let authority = Arc::new(FakeAuthority::default());

        let sso = SsoClient::bootstrap(
            SsoSettings {
                app_name: "url-shortener".to_string(),
                retry: retry.with_backoff(Duration::from_millis(1), 2.0, Duration::from_millis(5)),
                admin_level_threshold: 1,
            },
            &FakeConnector::new(authority.clone()),
            &*storage,
        )
        .await
        .unwrap();

        let user_key = sso.user_key().to_string();
        let gateway = AuthGateway::new(
            TokenCodec::new(&user_key),
            Arc::new(sso),
            PrincipalLookup::Id,
        );
        let router = router(
            AppState::new(storage.clone()),
            gateway,
            Duration::from_secs(5),
        );

        TestApp {
            router,
            storage,
            authority,
            user_key,
            _dir: dir,
        }
    }

    fn bearer(app: &TestApp, uid: i64) -> String {
        let token = sign_test_token(
            &json!({
                "uid": uid,
                "email": format!("{uid}@x.com"),
                "exp": chrono::Utc::now().timestamp() + 3600,
                "level": 0
            }),
            &app.user_key,
        );
        format!("Bearer {token}")
    }

    fn delete_request(alias: &str, authorization: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("DELETE")
            .uri(format!("/url/{alias}"));
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn save_request(body: Value, authorization: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/url")
            .header(CONTENT_TYPE, "application/json");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn admin_can_delete() {
        let app = app(RetryPolicy::default()).await;
        app.authority.set_level(Principal::Id(7), 2);
        app.storage.save_url("https://google.com", "doomed").unwrap();

        let response = app
            .router
            .clone()
            .oneshot(delete_request("doomed", Some(&bearer(&app, 7))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(app.storage.get_url("doomed").is_err());
    }

    #[tokio::test]
    async fn non_admin_gets_generic_denial() {
        let app = app(RetryPolicy::default()).await;
        app.authority.set_level(Principal::Id(8), 1);
        app.storage.save_url("https://google.com", "kept").unwrap();

        let response = app
            .router
            .clone()
            .oneshot(delete_request("kept", Some(&bearer(&app, 8))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await, json!({"error": DENIAL_MESSAGE}));
        assert!(app.storage.get_url("kept").is_ok());
    }

    #[tokio::test]
    async fn forged_token_is_denied_without_asking_sso() {
        let app = app(RetryPolicy::default()).await;
        app.authority.set_level(Principal::Id(7), 9);
        let forged = sign_test_token(
            &json!({"uid": 7, "email": "7@x.com", "exp": chrono::Utc::now().timestamp() + 60, "level": 9}),
            "not-the-user-key",
        );

        let response = app
            .router
            .clone()
            .oneshot(delete_request("any", Some(&format!("Bearer {forged}"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(app.authority.admin_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn sso_timeout_denies_delete_but_save_still_works() {
        let app = app(RetryPolicy::new(2, Duration::from_millis(20))).await;
        app.authority.set_level(Principal::Id(7), 9);
        app.authority.delay_admin(Duration::from_millis(200));
        app.storage.save_url("https://google.com", "kept").unwrap();

        let response = app
            .router
            .clone()
            .oneshot(delete_request("kept", Some(&bearer(&app, 7))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await, json!({"error": DENIAL_MESSAGE}));
        assert!(app.storage.get_url("kept").is_ok());
        assert_eq!(app.authority.admin_calls.load(Ordering::SeqCst), 2);

        let response = app
            .router
            .clone()
            .oneshot(save_request(
                json!({"url": "https://example.com", "alias": "fresh"}),
                Some(&bearer(&app, 7)),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            json_body(response).await,
            json!({"alias": "fresh", "url": "https://example.com"})
        );
    }

    #[tokio::test]
    async fn anonymous_requests_work_on_open_routes() {
        let app = app(RetryPolicy::default()).await;

        let response = app
            .router
            .clone()
            .oneshot(save_request(json!({"url": "https://example.com"}), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        let alias = json_body(response).await["alias"]
            .as_str()
            .unwrap()
            .to_string();
        assert_eq!(alias.len(), 6);

        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/{alias}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[LOCATION], "https://example.com");

        let response = app
            .router
            .clone()
            .oneshot(delete_request(&alias, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(app.authority.admin_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_alias_is_not_found() {
        let app = app(RetryPolicy::default()).await;

        let response = app
            .router
            .clone()
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await, json!({"error": "url not found"}));
    }

    #[tokio::test]
    async fn health_and_docs_are_served() {
        let app = app(RetryPolicy::default()).await;

        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/health/live")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"status": "ok"}));

        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api-doc/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let doc = json_body(response).await;
        assert!(doc["paths"]["/url/{alias}"]["delete"].is_object());
        assert!(doc["components"]["securitySchemes"]["bearerAuth"].is_object());
    }
}
