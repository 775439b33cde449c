pub mod auth;
pub mod error;
pub mod faq;
pub mod middleware;
pub mod stats;
pub mod tickets;
pub mod users;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, patch, post},
};

use crate::auth::AppState;
use crate::middleware::require_auth;

/// Every route requires a bearer token minted by the chat-bot front end.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/users/observe", post(users::observe))
        .route("/tickets", get(tickets::list_tickets).post(tickets::submit_ticket))
        .route("/tickets/mine", get(tickets::my_tickets))
        .route("/tickets/search", get(tickets::search_tickets))
        .route("/tickets/by-channel/{channel_id}", get(tickets::get_ticket_by_channel))
        .route("/tickets/{ticket_id}", get(tickets::get_ticket))
        .route("/tickets/{ticket_id}/status", patch(tickets::set_status))
        .route("/tickets/{ticket_id}/details", patch(tickets::attach_details))
        .route(
            "/tickets/{ticket_id}/answers",
            get(tickets::list_answers).post(tickets::post_answer),
        )
        .route("/faq", get(faq::list_faq).post(faq::add_faq))
        .route("/faq/search", get(faq::search_faq))
        .route("/faq/suggest", post(faq::suggest))
        .route(
            "/faq/{id}",
            get(faq::get_faq).patch(faq::update_faq).delete(faq::delete_faq),
        )
        .route("/stats/summary", get(stats::summary))
        .route("/stats/me", get(stats::my_stats))
        .route("/stats/users/{user_id}", get(stats::user_stats))
        .route("/stats/overview", get(stats::overview))
        .route("/stats/dashboard", get(stats::dashboard))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use inventon_core::AuthorizationGate;
    use inventon_db::SqliteStore;
    use inventon_types::api::Claims;

    use super::*;
    use crate::auth::{AppStateInner, create_token};

    const SECRET: &str = "test-signing-key";
    const ADMIN_ROLE: i64 = 900;

    fn app() -> Router {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let state = AppStateInner::new(store, AuthorizationGate::new(Some(ADMIN_ROLE)), SECRET.into());
        router(state)
    }

    fn token(user_id: i64, roles: Vec<i64>) -> String {
        let claims = Claims {
            sub: user_id,
            username: format!("user{}", user_id),
            display_name: None,
            roles,
            administrator: false,
            owner: false,
            exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
        };
        create_token(SECRET, &claims).unwrap()
    }

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn question(channel_id: i64) -> Value {
        json!({
            "channel_id": channel_id,
            "environment": "Linux",
            "language": "Python",
            "error_text": "TypeError",
            "purpose": "parse file",
        })
    }

    #[tokio::test]
    async fn missing_or_bad_token_is_unauthorized() {
        let app = app();
        let (status, _) = call(&app, "GET", "/tickets/mine", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = call(&app, "GET", "/tickets/mine", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn ticket_lifecycle_over_http() {
        let app = app();
        let user = token(1, vec![]);
        let admin = token(2, vec![ADMIN_ROLE]);

        let (status, ticket) = call(&app, "POST", "/tickets", Some(&user), Some(question(10))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(ticket["status"], "open");
        assert_eq!(ticket["title"], "[Python] parse file");
        let id = ticket["id"].as_i64().unwrap();

        let (status, _) = call(&app, "POST", "/tickets", Some(&user), Some(question(10))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let answer_uri = format!("/tickets/{}/answers", id);
        let solution = json!({ "text": "cast it", "is_solution": true });
        let (status, _) =
            call(&app, "POST", &answer_uri, Some(&user), Some(solution.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, posted) = call(&app, "POST", &answer_uri, Some(&admin), Some(solution)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(posted["ticket"]["status"], "solved");
        assert!(posted["response_time"]["minutes"].as_i64().unwrap() >= 0);

        let (status, answers) = call(&app, "GET", &answer_uri, Some(&user), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(answers.as_array().unwrap().len(), 1);

        let status_uri = format!("/tickets/{}/status", id);
        let (status, _) = call(
            &app,
            "PATCH",
            &status_uri,
            Some(&admin),
            Some(json!({ "status": "resolved" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&app, "GET", "/tickets/999", Some(&admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let stranger = token(3, vec![]);
        let (status, _) = call(&app, "GET", &format!("/tickets/{}", id), Some(&stranger), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn faq_and_stats_endpoints() {
        let app = app();
        let user = token(1, vec![]);
        let admin = token(2, vec![ADMIN_ROLE]);

        let entry = json!({ "question": "How to install pip?", "answer": "get-pip.py", "keywords": "pip, install" });
        let (status, _) = call(&app, "POST", "/faq", Some(&user), Some(entry.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, created) = call(&app, "POST", "/faq", Some(&admin), Some(entry)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["keywords"], json!(["pip", "install"]));

        let (status, hits) = call(&app, "GET", "/faq/search?q=PIP", Some(&user), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(hits.as_array().unwrap().len(), 1);

        let (_, suggested) = call(
            &app,
            "POST",
            "/faq/suggest",
            Some(&user),
            Some(json!({ "message": "pip install fails, help?" })),
        )
        .await;
        assert_eq!(suggested["suggestions"].as_array().unwrap().len(), 1);

        let (status, _) = call(&app, "GET", "/stats/dashboard", Some(&user), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, dashboard) = call(&app, "GET", "/stats/dashboard", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(dashboard["today"]["faq_searches"], 1);

        let (status, summary) =
            call(&app, "GET", "/stats/summary?period=month", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["solve_rate"], 0.0);
        let (status, _) =
            call(&app, "GET", "/stats/summary?period=decade", Some(&admin), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
