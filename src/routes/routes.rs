//! Defines routes for authentication, boards and attachments.
//!
//! ## Structure
//! - **Public endpoints**
//!   - `GET    /healthz`, `GET /readyz`: liveness / readiness
//!   - `POST   /auth/signup`: register
//!   - `POST   /auth/signin`: obtain `{ accessToken }`
//!
//! - **Bearer-authenticated endpoints**
//!   - `GET    /boards`: caller's boards
//!   - `POST   /boards`: create (multipart, optional `file`)
//!   - `GET    /boards/{id}`: one board
//!   - `PATCH  /boards/{id}`: update content (multipart, optional `file`)
//!   - `DELETE /boards/{id}`: delete
//!   - `PATCH  /boards/{id}/status`: set PUBLIC / PRIVATE
//!   - `GET    /boards/files/{board_id}`: download attachment

use crate::{
    handlers::{
        auth_handlers::{signin, signup},
        board_handlers::{
            create_board, delete_board, download_file, get_board, list_boards, update_board,
            update_board_status,
        },
        health_handlers::{healthz, readyz},
    },
    middleware::auth::require_auth,
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Room for the multipart framing and text fields around the file part.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the full application router with its shared state applied.
///
/// The auth middleware is a `route_layer`, so unknown paths still 404
/// instead of 401.
pub fn routes(state: AppState) -> Router {
    let body_limit = state
        .attachments
        .max_upload_bytes()
        .saturating_add(FORM_OVERHEAD_BYTES);

    let auth = Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/signin", post(signin));

    let boards = Router::new()
        .route("/boards", get(list_boards).post(create_board))
        .route(
            "/boards/{id}",
            get(get_board).patch(update_board).delete(delete_board),
        )
        .route("/boards/{id}/status", patch(update_board_status))
        .route("/boards/files/{board_id}", get(download_file))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(DefaultBodyLimit::max(body_limit));

    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .merge(auth)
        .merge(boards)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{TestContext, multipart_body};
    use axum::{
        body::{Body, Bytes},
        http::{HeaderMap, Request, StatusCode, header},
    };
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    struct Reply {
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    }

    impl Reply {
        fn json(&self) -> Value {
            serde_json::from_slice(&self.body).expect("json body")
        }
    }

    async fn send(ctx: &TestContext, req: Request<Body>) -> Reply {
        let response = routes(ctx.state.clone()).oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        Reply {
            status,
            headers,
            body,
        }
    }

    fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn bare_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn form_request(
        method: &str,
        uri: &str,
        token: &str,
        fields: &[(&str, &str)],
        file: Option<(&str, &[u8])>,
    ) -> Request<Body> {
        let (content_type, body) = multipart_body(fields, file);
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap()
    }

    async fn sign_up_and_in(ctx: &TestContext, username: &str, password: &str) -> String {
        let creds = json!({ "username": username, "password": password });
        let reply = send(ctx, json_request("POST", "/auth/signup", None, creds.clone())).await;
        assert_eq!(reply.status, StatusCode::CREATED);

        let reply = send(ctx, json_request("POST", "/auth/signin", None, creds)).await;
        assert_eq!(reply.status, StatusCode::OK);
        reply.json()["accessToken"]
            .as_str()
            .expect("accessToken")
            .to_string()
    }

    async fn create(ctx: &TestContext, token: &str, title: &str, file: Option<(&str, &[u8])>) -> i64 {
        let reply = send(
            ctx,
            form_request("POST", "/boards", token, &[("title", title), ("description", "D")], file),
        )
        .await;
        assert_eq!(reply.status, StatusCode::CREATED);
        reply.json()["id"].as_i64().expect("board id")
    }

    #[tokio::test]
    async fn health_endpoints_report_ok() {
        let ctx = TestContext::new().await;
        assert_eq!(send(&ctx, bare_request("GET", "/healthz", None)).await.status, StatusCode::OK);

        let ready = send(&ctx, bare_request("GET", "/readyz", None)).await;
        assert_eq!(ready.status, StatusCode::OK);
        assert_eq!(ready.json()["checks"]["sqlite"]["ok"], true);
        assert_eq!(ready.json()["checks"]["disk"]["ok"], true);
        assert!(ctx.stored_files().is_empty());
    }

    #[tokio::test]
    async fn signup_conflict_and_signin_failures() {
        let ctx = TestContext::new().await;
        sign_up_and_in(&ctx, "alice", "pass1234").await;

        let again = json!({ "username": "alice", "password": "whatever1" });
        let reply = send(&ctx, json_request("POST", "/auth/signup", None, again)).await;
        assert_eq!(reply.status, StatusCode::CONFLICT);

        let wrong = json!({ "username": "alice", "password": "nope1234" });
        let unknown = json!({ "username": "mallory", "password": "pass1234" });
        let wrong = send(&ctx, json_request("POST", "/auth/signin", None, wrong)).await;
        let unknown = send(&ctx, json_request("POST", "/auth/signin", None, unknown)).await;
        assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
        assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong.body, unknown.body);
    }

    #[tokio::test]
    async fn malformed_credentials_are_bad_requests() {
        let ctx = TestContext::new().await;
        let short = json!({ "username": "al", "password": "pass1234" });
        let missing = json!({ "username": "alice" });
        assert_eq!(
            send(&ctx, json_request("POST", "/auth/signup", None, short)).await.status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            send(&ctx, json_request("POST", "/auth/signup", None, missing)).await.status,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn board_routes_require_a_valid_token() {
        let ctx = TestContext::new().await;
        sign_up_and_in(&ctx, "alice", "pass1234").await;

        let missing = send(&ctx, bare_request("GET", "/boards", None)).await;
        let garbage = send(&ctx, bare_request("GET", "/boards", Some("garbage"))).await;
        let ghost_token = ctx.state.tokens.issue("ghost").unwrap();
        let ghost = send(&ctx, bare_request("GET", "/boards", Some(&ghost_token))).await;

        for reply in [&missing, &garbage, &ghost] {
            assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
            assert_eq!(reply.json()["status"], 401);
        }

        let expired = crate::services::token_service::TokenService::new("test-secret", -300)
            .issue("alice")
            .unwrap();
        let reply = send(&ctx, bare_request("GET", "/boards", Some(&expired))).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn create_without_file_then_fetch() {
        let ctx = TestContext::new().await;
        let token = sign_up_and_in(&ctx, "alice", "pass1234").await;

        let id = create(&ctx, &token, "T", None).await;
        let reply = send(&ctx, bare_request("GET", &format!("/boards/{}", id), Some(&token))).await;
        assert_eq!(reply.status, StatusCode::OK);

        let board = reply.json();
        assert_eq!(board["status"], "PUBLIC");
        assert_eq!(board["title"], "T");
        assert_eq!(board["description"], "D");
        assert_eq!(board["user"]["username"], "alice");
        assert!(board.get("fileName").is_none());
        assert!(ctx.stored_files().is_empty());
    }

    #[tokio::test]
    async fn attachment_downloads_under_original_name() {
        let ctx = TestContext::new().await;
        let token = sign_up_and_in(&ctx, "alice", "pass1234").await;

        let id = create(&ctx, &token, "T", Some(("notes.txt", b"0123456789"))).await;
        let stored = ctx.stored_files();
        assert_eq!(stored.len(), 1);
        assert_ne!(stored[0], "notes.txt");

        let board = send(&ctx, bare_request("GET", &format!("/boards/{}", id), Some(&token))).await;
        assert_eq!(board.json()["fileName"], "notes.txt");
        assert_eq!(board.json()["fileSize"], 10);
        assert!(!String::from_utf8_lossy(&board.body).contains(&stored[0]));

        let reply = send(&ctx, bare_request("GET", &format!("/boards/files/{}", id), Some(&token))).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body.as_ref(), b"0123456789");
        assert_eq!(reply.headers[header::CONTENT_LENGTH], "10");
        assert_eq!(reply.headers[header::CONTENT_TYPE], "application/octet-stream");
        let disposition = reply.headers[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.contains("notes.txt"));
        assert!(!disposition.contains(&stored[0]));
    }

    #[tokio::test]
    async fn download_without_attachment_is_not_found() {
        let ctx = TestContext::new().await;
        let token = sign_up_and_in(&ctx, "alice", "pass1234").await;
        let id = create(&ctx, &token, "T", None).await;

        let reply = send(&ctx, bare_request("GET", &format!("/boards/files/{}", id), Some(&token))).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
        let missing = send(&ctx, bare_request("GET", "/boards/files/999", Some(&token))).await;
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn other_user_cannot_delete() {
        let ctx = TestContext::new().await;
        let alice = sign_up_and_in(&ctx, "alice", "pass1234").await;
        let bob = sign_up_and_in(&ctx, "bob", "pass5678").await;
        let id = create(&ctx, &alice, "T", Some(("a.txt", b"abc"))).await;

        let denied = send(&ctx, bare_request("DELETE", &format!("/boards/{}", id), Some(&bob))).await;
        let absent = send(&ctx, bare_request("DELETE", "/boards/999", Some(&bob))).await;
        assert_eq!(denied.status, StatusCode::NOT_FOUND);
        assert_eq!(absent.status, StatusCode::NOT_FOUND);

        let still_there = send(&ctx, bare_request("GET", &format!("/boards/{}", id), Some(&alice))).await;
        assert_eq!(still_there.status, StatusCode::OK);
        assert_eq!(ctx.stored_files().len(), 1);
    }

    #[tokio::test]
    async fn owner_delete_removes_board_and_file() {
        let ctx = TestContext::new().await;
        let token = sign_up_and_in(&ctx, "alice", "pass1234").await;
        let id = create(&ctx, &token, "T", Some(("a.txt", b"abc"))).await;

        let reply = send(&ctx, bare_request("DELETE", &format!("/boards/{}", id), Some(&token))).await;
        assert_eq!(reply.status, StatusCode::NO_CONTENT);
        let gone = send(&ctx, bare_request("GET", &format!("/boards/{}", id), Some(&token))).await;
        assert_eq!(gone.status, StatusCode::NOT_FOUND);
        assert!(ctx.stored_files().is_empty());
    }

    #[tokio::test]
    async fn list_returns_only_own_boards_in_order() {
        let ctx = TestContext::new().await;
        let alice = sign_up_and_in(&ctx, "alice", "pass1234").await;
        let bob = sign_up_and_in(&ctx, "bob", "pass5678").await;

        let first = create(&ctx, &alice, "first", None).await;
        create(&ctx, &bob, "bobs", None).await;
        let second = create(&ctx, &alice, "second", None).await;

        let reply = send(&ctx, bare_request("GET", "/boards", Some(&alice))).await;
        let ids: Vec<i64> = reply
            .json()
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[tokio::test]
    async fn status_updates_validate_and_respect_ownership() {
        let ctx = TestContext::new().await;
        let alice = sign_up_and_in(&ctx, "alice", "pass1234").await;
        let bob = sign_up_and_in(&ctx, "bob", "pass5678").await;
        let id = create(&ctx, &alice, "T", None).await;
        let uri = format!("/boards/{}/status", id);

        let ok = send(&ctx, json_request("PATCH", &uri, Some(&alice), json!({ "status": "private" }))).await;
        assert_eq!(ok.status, StatusCode::OK);
        assert_eq!(ok.json()["status"], "PRIVATE");

        let bad = send(&ctx, json_request("PATCH", &uri, Some(&alice), json!({ "status": "ARCHIVED" }))).await;
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);

        let foreign = send(&ctx, json_request("PATCH", &uri, Some(&bob), json!({ "status": "PUBLIC" }))).await;
        assert_eq!(foreign.status, StatusCode::NOT_FOUND);

        let board = send(&ctx, bare_request("GET", &format!("/boards/{}", id), Some(&alice))).await;
        assert_eq!(board.json()["status"], "PRIVATE");
    }

    #[tokio::test]
    async fn update_replaces_file_and_content() {
        let ctx = TestContext::new().await;
        let token = sign_up_and_in(&ctx, "alice", "pass1234").await;
        let id = create(&ctx, &token, "T", Some(("old.txt", b"old"))).await;
        let old_stored = ctx.stored_files();

        let reply = send(
            &ctx,
            form_request(
                "PATCH",
                &format!("/boards/{}", id),
                &token,
                &[("title", "T2"), ("description", "D2")],
                Some(("new.txt", b"newer")),
            ),
        )
        .await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.json()["title"], "T2");
        assert_eq!(reply.json()["fileName"], "new.txt");
        assert_eq!(reply.json()["status"], "PUBLIC");

        let now_stored = ctx.stored_files();
        assert_eq!(now_stored.len(), 1);
        assert_ne!(now_stored, old_stored);

        let download = send(&ctx, bare_request("GET", &format!("/boards/files/{}", id), Some(&token))).await;
        assert_eq!(download.body.as_ref(), b"newer");
    }

    #[tokio::test]
    async fn update_by_other_user_discards_their_upload() {
        let ctx = TestContext::new().await;
        let alice = sign_up_and_in(&ctx, "alice", "pass1234").await;
        let bob = sign_up_and_in(&ctx, "bob", "pass5678").await;
        let id = create(&ctx, &alice, "T", Some(("a.txt", b"abc"))).await;
        let before = ctx.stored_files();

        let reply = send(
            &ctx,
            form_request(
                "PATCH",
                &format!("/boards/{}", id),
                &bob,
                &[("title", "X"), ("description", "Y")],
                Some(("evil.txt", b"evil")),
            ),
        )
        .await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
        assert_eq!(ctx.stored_files(), before);
    }

    #[tokio::test]
    async fn blank_title_is_rejected_without_leaving_files() {
        let ctx = TestContext::new().await;
        let token = sign_up_and_in(&ctx, "alice", "pass1234").await;

        let reply = send(
            &ctx,
            form_request(
                "POST",
                "/boards",
                &token,
                &[("title", "   "), ("description", "D")],
                Some(("a.txt", b"abc")),
            ),
        )
        .await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert!(ctx.stored_files().is_empty());

        let listed = send(&ctx, bare_request("GET", "/boards", Some(&token))).await;
        assert_eq!(listed.json(), json!([]));
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let ctx = TestContext::with_upload_limit(8).await;
        let token = sign_up_and_in(&ctx, "alice", "pass1234").await;

        let reply = send(
            &ctx,
            form_request(
                "POST",
                "/boards",
                &token,
                &[("title", "T"), ("description", "D")],
                Some(("big.bin", b"0123456789abcdef")),
            ),
        )
        .await;
        assert_eq!(reply.status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(ctx.stored_files().is_empty());
    }

    #[tokio::test]
    async fn extractor_rejections_use_the_json_error_body() {
        let ctx = TestContext::with_upload_limit(8).await;
        let token = sign_up_and_in(&ctx, "alice", "pass1234").await;

        let bad_id = send(&ctx, bare_request("GET", "/boards/abc", Some(&token))).await;
        assert_eq!(bad_id.status, StatusCode::BAD_REQUEST);
        assert_eq!(bad_id.json()["status"], 400);
        assert!(bad_id.json()["error"].is_string());

        let bad_download = send(&ctx, bare_request("GET", "/boards/files/abc", Some(&token))).await;
        assert_eq!(bad_download.status, StatusCode::BAD_REQUEST);
        assert_eq!(bad_download.json()["status"], 400);

        let not_a_form = send(
            &ctx,
            json_request("POST", "/boards", Some(&token), json!({ "title": "T" })),
        )
        .await;
        assert_eq!(not_a_form.status, StatusCode::BAD_REQUEST);
        assert_eq!(not_a_form.json()["status"], 400);

        let huge = json!({ "status": "P".repeat(70 * 1024) });
        let too_large = send(
            &ctx,
            json_request("PATCH", "/boards/1/status", Some(&token), huge),
        )
        .await;
        assert_eq!(too_large.status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(too_large.json()["status"], 413);
        assert!(ctx.stored_files().is_empty());
    }
}
