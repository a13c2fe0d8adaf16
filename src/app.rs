use std::net::SocketAddr;
use axum::{Router, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use crate::state::AppState;
use crate::{auth, events};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(events::router())
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, ?latency, "response");
                        } else {
                            tracing::info!(%status, ?latency, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{
        jwt::JwtKeys,
        repo_types::{NewUser, Role},
    };
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(app: &Router, req: Request<Body>) -> Response {
        app.clone().oneshot(req).await.expect("router is infallible")
    }

    async fn body_json(res: Response) -> Value {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_req(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        req.body(Body::from(body.to_string())).unwrap()
    }

    fn bare_req(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        req.body(Body::empty()).unwrap()
    }

    async fn register(app: &Router, body: Value) -> Response {
        send(app, json_req("POST", "/register", None, body)).await
    }

    async fn login(app: &Router, email: &str, password: &str) -> Response {
        let form = format!("username={email}&password={password}").replace('@', "%40");
        let req = Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form))
            .unwrap();
        send(app, req).await
    }

    async fn token_for(app: &Router, name: &str, email: &str, role: &str) -> String {
        let res = register(
            app,
            json!({ "name": name, "email": email, "password": "pw", "role": role }),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let res = login(app, email, "pw").await;
        assert_eq!(res.status(), StatusCode::OK);
        body_json(res).await["access_token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    fn sample_event() -> Value {
        json!({
            "title": "Rust Meetup",
            "description": "Talks and pizza",
            "date": "2025-09-12",
            "time": "18:30",
            "image_url": "https://img.example/meetup.png"
        })
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = build_app(AppState::fake());
        let res = send(&app, bare_req("GET", "/health", None)).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn register_login_and_read_current_user() {
        let app = build_app(AppState::fake());

        let res = register(&app, json!({ "name": "A", "email": "a@x.com", "password": "pw" })).await;
        assert_eq!(res.status(), StatusCode::OK);
        let created = body_json(res).await;
        assert_eq!(created["email"], "a@x.com");
        assert_eq!(created["role"], "normal");
        assert!(created.get("hashed_password").is_none());

        let res = login(&app, "a@x.com", "pw").await;
        assert_eq!(res.status(), StatusCode::OK);
        let tok = body_json(res).await;
        assert_eq!(tok["token_type"], "bearer");
        let token = tok["access_token"].as_str().unwrap();

        let res = send(&app, bare_req("GET", "/users/me", Some(token))).await;
        assert_eq!(res.status(), StatusCode::OK);
        let me = body_json(res).await;
        assert_eq!(me["email"], "a@x.com");
        assert_eq!(me["role"], "normal");
        assert_eq!(me["id"], created["id"]);
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let state = AppState::fake();
        let app = build_app(state.clone());
        let body = json!({ "name": "A", "email": "a@x.com", "password": "pw" });

        assert_eq!(register(&app, body.clone()).await.status(), StatusCode::OK);
        let res = register(&app, body).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(res).await["detail"], "Email already registered");

        assert!(state.users.find_user_by_id(1).await.unwrap().is_some());
        assert!(state.users.find_user_by_id(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bad_credentials_are_unauthorized() {
        let app = build_app(AppState::fake());
        register(&app, json!({ "name": "A", "email": "a@x.com", "password": "pw" })).await;

        let res = login(&app, "a@x.com", "nope").await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(res).await["detail"], "Incorrect email or password");

        let res = login(&app, "ghost@x.com", "pw").await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn current_user_requires_valid_token() {
        let state = AppState::fake();
        let app = build_app(state.clone());

        let res = send(&app, bare_req("GET", "/users/me", None)).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(res.headers()[header::WWW_AUTHENTICATE], "Bearer");

        let res = send(&app, bare_req("GET", "/users/me", Some("garbage"))).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        // well-signed token whose subject does not exist
        let orphan = state.keys.issue(404).unwrap();
        let res = send(&app, bare_req("GET", "/users/me", Some(&orphan))).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(res).await["detail"], "User not found");

        // token from a server with a different secret
        let foreign = JwtKeys::new(&crate::config::JwtConfig {
            secret: "someone-else".into(),
            algorithm: jsonwebtoken::Algorithm::HS256,
            ttl_minutes: 30,
        });
        let user = state
            .users
            .insert_user(NewUser {
                name: "B".into(),
                email: "b@x.com".into(),
                hashed_password: "x".into(),
                role: Role::Admin,
            })
            .await
            .unwrap();
        let forged = foreign.issue(user.id).unwrap();
        let res = send(&app, bare_req("GET", "/users/me", Some(&forged))).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn create_event_is_admin_gated() {
        let app = build_app(AppState::fake());

        let res = send(&app, json_req("POST", "/events", None, sample_event())).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let normal = token_for(&app, "N", "n@x.com", "normal").await;
        let res = send(&app, json_req("POST", "/events", Some(&normal), sample_event())).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let admin = token_for(&app, "Ad", "admin@x.com", "admin").await;
        let res = send(&app, json_req("POST", "/events", Some(&admin), sample_event())).await;
        assert_eq!(res.status(), StatusCode::OK);
        let created = body_json(res).await;
        assert_eq!(created["time"], "18:30:00");

        let res = send(&app, bare_req("GET", "/events", None)).await;
        assert_eq!(res.status(), StatusCode::OK);
        let list = body_json(res).await;
        let list = list.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["id"], created["id"]);
        assert_eq!(list[0]["title"], "Rust Meetup");
    }

    #[tokio::test]
    async fn events_can_be_read_searched_updated_and_deleted() {
        let app = build_app(AppState::fake());
        let admin = token_for(&app, "Ad", "admin@x.com", "admin").await;

        let res = send(&app, json_req("POST", "/events", Some(&admin), sample_event())).await;
        let id = body_json(res).await["id"].as_i64().unwrap();
        send(
            &app,
            json_req(
                "POST",
                "/events",
                Some(&admin),
                json!({
                    "title": "Book club",
                    "description": "Reading RUST for Rustaceans",
                    "date": "2025-08-01",
                    "time": "10:00:00"
                }),
            ),
        )
        .await;

        let res = send(&app, bare_req("GET", &format!("/events/{id}"), None)).await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = send(&app, bare_req("GET", "/events?search=rust", None)).await;
        let found = body_json(res).await;
        let titles: Vec<&str> = found
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, ["Book club", "Rust Meetup"]);

        let res = send(&app, bare_req("GET", "/events?search=pizza", None)).await;
        assert_eq!(body_json(res).await.as_array().unwrap().len(), 1);

        let res = send(
            &app,
            json_req(
                "PATCH",
                &format!("/events/{id}"),
                Some(&admin),
                json!({ "title": "Rust Meetup #2", "image_url": null }),
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let updated = body_json(res).await;
        assert_eq!(updated["title"], "Rust Meetup #2");
        assert_eq!(updated["description"], "Talks and pizza");
        assert!(updated["image_url"].is_null());

        let res = send(&app, bare_req("DELETE", &format!("/events/{id}"), Some(&admin))).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);

        let res = send(&app, bare_req("GET", &format!("/events/{id}"), None)).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(res).await["detail"], "Event not found");

        let res = send(&app, bare_req("DELETE", &format!("/events/{id}"), Some(&admin))).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_and_delete_require_admin() {
        let app = build_app(AppState::fake());
        let admin = token_for(&app, "Ad", "admin@x.com", "admin").await;
        let normal = token_for(&app, "N", "n@x.com", "normal").await;
        let res = send(&app, json_req("POST", "/events", Some(&admin), sample_event())).await;
        let id = body_json(res).await["id"].as_i64().unwrap();

        let res = send(
            &app,
            json_req("PATCH", &format!("/events/{id}"), Some(&normal), json!({ "title": "x" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let res = send(&app, bare_req("DELETE", &format!("/events/{id}"), None)).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = send(&app, bare_req("DELETE", &format!("/events/{id}"), Some(&normal))).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let res = send(&app, bare_req("GET", &format!("/events/{id}"), None)).await;
        assert_eq!(body_json(res).await["title"], "Rust Meetup");
    }

    async fn assert_bad_request(res: Response) {
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "application/json");
        let body = body_json(res).await;
        assert!(body["detail"].is_string(), "no detail in {body}");
    }

    #[tokio::test]
    async fn malformed_requests_get_json_400() {
        let app = build_app(AppState::fake());
        let admin = token_for(&app, "Ad", "admin@x.com", "admin").await;

        let res = register(
            &app,
            json!({ "name": "R", "email": "r@x.com", "password": "pw", "role": "root" }),
        )
        .await;
        assert_bad_request(res).await;

        let mut event = sample_event();
        event["time"] = json!("25:00");
        let res = send(&app, json_req("POST", "/events", Some(&admin), event)).await;
        assert_bad_request(res).await;

        let res = send(&app, bare_req("GET", "/events/abc", None)).await;
        assert_bad_request(res).await;

        let res = send(
            &app,
            json_req("PATCH", "/events/abc", Some(&admin), json!({ "title": "x" })),
        )
        .await;
        assert_bad_request(res).await;

        let req = Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("username=admin%40x.com"))
            .unwrap();
        assert_bad_request(send(&app, req).await).await;
    }

    #[tokio::test]
    async fn registration_store_failure_is_500() {
        let state = AppState {
            users: std::sync::Arc::new(crate::auth::services::tests::InsertFails),
            ..AppState::fake()
        };
        let app = build_app(state);
        let res = register(
            &app,
            json!({ "name": "A", "email": "a@x.com", "password": "pw" }),
        )
        .await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let detail = body_json(res).await["detail"].as_str().unwrap().to_string();
        assert!(detail.starts_with("Registration failed"));
        assert!(!detail.contains("pool timed out"));
    }
}
