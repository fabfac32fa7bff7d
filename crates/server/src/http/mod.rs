use axum::{Router, middleware::from_fn_with_state, routing::get};
use deployment::Deployment;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{DeploymentImpl, middleware, routes};

pub fn router(deployment: DeploymentImpl) -> Router {
    let protected_routes = Router::new()
        .merge(routes::auth::me_router())
        .merge(routes::projects::router(&deployment))
        .merge(routes::tickets::router(&deployment))
        .merge(routes::comments::router(&deployment))
        .layer(from_fn_with_state(
            deployment.clone(),
            middleware::auth::require_auth,
        ));

    let api_routes = Router::new()
        .merge(routes::auth::router())
        .merge(protected_routes);

    let uploads_dir = deployment.attachment().uploads_dir().to_path_buf();

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api_routes)
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(deployment)
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode, header},
    };
    use deployment::Deployment;
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::{DeploymentImpl, test_support::TestEnvGuard};

    async fn setup_app() -> (tempfile::TempDir, TestEnvGuard, Router) {
        let (temp_dir, temp_root) = ::test_support::fresh_temp_root("bugtrack-test-");
        let db_path = temp_root.join("db.sqlite");
        let db_url = format!("sqlite://{}?mode=rwc", db_path.to_string_lossy());
        let env_guard = TestEnvGuard::new(&temp_root, db_url);

        let deployment = DeploymentImpl::new().await.unwrap();
        let app = super::router(deployment);

        (temp_dir, env_guard, app)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(value) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&value).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// Register a user and return (user_id, token).
    async fn register(app: &Router, name: &str, email: &str) -> (Uuid, String) {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "name": name, "email": email, "password": "hunter22" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "register failed: {body}");

        let user_id = body
            .pointer("/data/user/id")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .expect("user id in register response");
        let token = body
            .pointer("/data/token")
            .and_then(|v| v.as_str())
            .expect("token in register response")
            .to_string();
        (user_id, token)
    }

    async fn create_project(app: &Router, token: &str, title: &str) -> Uuid {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/projects",
            Some(token),
            Some(json!({ "title": title, "description": "A test project" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "create project failed: {body}");
        body.pointer("/data/id")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .expect("project id")
    }

    async fn create_ticket(app: &Router, token: &str, project_id: Uuid, title: &str) -> Uuid {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/tickets",
            Some(token),
            Some(json!({
                "project_id": project_id,
                "title": title,
                "description": "Something broke",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "create ticket failed: {body}");
        body.pointer("/data/id")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .expect("ticket id")
    }

    #[tokio::test]
    async fn health_is_public_and_api_requires_auth() {
        let (_temp, _env, app) = setup_app().await;

        let (status, _) = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, Method::GET, "/api/projects", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.get("success").and_then(|v| v.as_bool()), Some(false));

        let (status, _) = send(
            &app,
            Method::GET,
            "/api/projects",
            Some("not-a-real-token"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_login_me_flow() {
        let (_temp, _env, app) = setup_app().await;

        let (user_id, token) = register(&app, "Xenia", "x@example.com").await;

        let (status, body) = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body.pointer("/data/id").and_then(|v| v.as_str()),
            Some(user_id.to_string().as_str())
        );

        // Duplicate registration conflicts.
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "name": "Other", "email": "x@example.com", "password": "hunter22" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        // Wrong password is rejected.
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "x@example.com", "password": "wrong-password" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "x@example.com", "password": "hunter22" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.pointer("/data/token").and_then(|v| v.as_str()).is_some());
    }

    /// Scenario A: membership drives assignment validity.
    #[tokio::test]
    async fn assignment_requires_membership_at_assignment_time() {
        let (_temp, _env, app) = setup_app().await;

        let (x_id, x_token) = register(&app, "X", "x@example.com").await;
        let (y_id, y_token) = register(&app, "Y", "y@example.com").await;
        let (z_id, _z_token) = register(&app, "Z", "z@example.com").await;

        let project_id = create_project(&app, &x_token, "P1").await;

        // X becomes admin with member set {X}.
        let (status, body) = send(
            &app,
            Method::GET,
            &format!("/api/projects/{project_id}"),
            Some(&x_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body.pointer("/data/admin_id").and_then(|v| v.as_str()),
            Some(x_id.to_string().as_str())
        );
        assert_eq!(body.pointer("/data/members").unwrap().as_array().unwrap().len(), 1);

        // X adds Y by email.
        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/api/projects/{project_id}/members"),
            Some(&x_token),
            Some(json!({ "email": "y@example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.pointer("/data/members").unwrap().as_array().unwrap().len(), 2);

        // Y creates T1 with no assignee.
        let ticket_id = create_ticket(&app, &y_token, project_id, "T1").await;

        // X assigns T1 to Y: Y is a member, so this succeeds.
        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/api/tickets/{ticket_id}"),
            Some(&x_token),
            Some(json!({ "assigned_to_id": y_id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body.pointer("/data/assigned_to_id").and_then(|v| v.as_str()),
            Some(y_id.to_string().as_str())
        );

        // X assigns T1 to Z (not a member): validation error, not 403.
        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/api/tickets/{ticket_id}"),
            Some(&x_token),
            Some(json!({ "assigned_to_id": z_id })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body.get("message").and_then(|v| v.as_str()),
            Some("Assigned user must be a team member of the project")
        );
    }

    /// Scenario B: non-members cannot see a project until added.
    #[tokio::test]
    async fn membership_gates_project_visibility() {
        let (_temp, _env, app) = setup_app().await;

        let (_x_id, x_token) = register(&app, "X", "x@example.com").await;
        let (_y_id, y_token) = register(&app, "Y", "y@example.com").await;

        let project_id = create_project(&app, &x_token, "P1").await;

        let (status, body) = send(
            &app,
            Method::GET,
            &format!("/api/projects/{project_id}"),
            Some(&y_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        // Never the entity body.
        assert!(body.get("data").map(|v| v.is_null()).unwrap_or(true));

        let (status, _) = send(
            &app,
            Method::GET,
            &format!("/api/tickets/project/{project_id}"),
            Some(&y_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // Project listing simply omits it.
        let (status, body) = send(&app, Method::GET, "/api/projects", Some(&y_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.pointer("/data").unwrap().as_array().unwrap().len(), 0);

        send(
            &app,
            Method::POST,
            &format!("/api/projects/{project_id}/members"),
            Some(&x_token),
            Some(json!({ "email": "y@example.com" })),
        )
        .await;

        let (status, _) = send(
            &app,
            Method::GET,
            &format!("/api/projects/{project_id}"),
            Some(&y_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            &app,
            Method::GET,
            &format!("/api/tickets/project/{project_id}"),
            Some(&y_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    /// Scenario C: comments are author-owned, even against the admin.
    #[tokio::test]
    async fn comment_mutation_is_author_only() {
        let (_temp, _env, app) = setup_app().await;

        let (_x_id, x_token) = register(&app, "X", "x@example.com").await;
        let (_y_id, y_token) = register(&app, "Y", "y@example.com").await;

        let project_id = create_project(&app, &x_token, "P1").await;
        send(
            &app,
            Method::POST,
            &format!("/api/projects/{project_id}/members"),
            Some(&x_token),
            Some(json!({ "email": "y@example.com" })),
        )
        .await;

        let ticket_id = create_ticket(&app, &y_token, project_id, "T1").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/comments",
            Some(&y_token),
            Some(json!({ "ticket_id": ticket_id, "text": "looks good" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let comment_id = body
            .pointer("/data/id")
            .and_then(|v| v.as_str())
            .unwrap()
            .to_string();

        // X is project admin but not the author.
        let (status, _) = send(
            &app,
            Method::PUT,
            &format!("/api/comments/{comment_id}"),
            Some(&x_token),
            Some(json!({ "text": "edited by admin" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/api/comments/{comment_id}"),
            Some(&y_token),
            Some(json!({ "text": "revised" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body.pointer("/data/text").and_then(|v| v.as_str()),
            Some("revised")
        );

        let (status, _) = send(
            &app,
            Method::DELETE,
            &format!("/api/comments/{comment_id}"),
            Some(&x_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    /// Scenario D: the admin can never be removed from the team.
    #[tokio::test]
    async fn admin_self_removal_is_rejected_unconditionally() {
        let (_temp, _env, app) = setup_app().await;

        let (x_id, x_token) = register(&app, "X", "x@example.com").await;
        let (y_id, y_token) = register(&app, "Y", "y@example.com").await;

        let project_id = create_project(&app, &x_token, "P1").await;
        send(
            &app,
            Method::POST,
            &format!("/api/projects/{project_id}/members"),
            Some(&x_token),
            Some(json!({ "email": "y@example.com" })),
        )
        .await;

        // Admin removing itself.
        let (status, body) = send(
            &app,
            Method::DELETE,
            &format!("/api/projects/{project_id}/members/{x_id}"),
            Some(&x_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(
            body.get("message").and_then(|v| v.as_str()),
            Some("Cannot remove project admin from team")
        );

        // A member targeting the admin fares no better.
        let (status, _) = send(
            &app,
            Method::DELETE,
            &format!("/api/projects/{project_id}/members/{x_id}"),
            Some(&y_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // Removing an ordinary member works, and the admin survives.
        let (status, body) = send(
            &app,
            Method::DELETE,
            &format!("/api/projects/{project_id}/members/{y_id}"),
            Some(&x_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let members = body.pointer("/data/members").unwrap().as_array().unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(
            members[0].get("id").and_then(|v| v.as_str()),
            Some(x_id.to_string().as_str())
        );
    }

    #[tokio::test]
    async fn ticket_delete_requires_creator_or_admin() {
        let (_temp, _env, app) = setup_app().await;

        let (_x_id, x_token) = register(&app, "X", "x@example.com").await;
        let (_y_id, y_token) = register(&app, "Y", "y@example.com").await;
        let (_w_id, w_token) = register(&app, "W", "w@example.com").await;

        let project_id = create_project(&app, &x_token, "P1").await;
        for email in ["y@example.com", "w@example.com"] {
            send(
                &app,
                Method::POST,
                &format!("/api/projects/{project_id}/members"),
                Some(&x_token),
                Some(json!({ "email": email })),
            )
            .await;
        }

        // W is a member but neither creator nor admin.
        let ticket_id = create_ticket(&app, &y_token, project_id, "T1").await;
        let (status, _) = send(
            &app,
            Method::DELETE,
            &format!("/api/tickets/{ticket_id}"),
            Some(&w_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // The creator can delete.
        let (status, _) = send(
            &app,
            Method::DELETE,
            &format!("/api/tickets/{ticket_id}"),
            Some(&y_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // The project admin can delete someone else's ticket.
        let ticket_id = create_ticket(&app, &y_token, project_id, "T2").await;
        let (status, _) = send(
            &app,
            Method::DELETE,
            &format!("/api/tickets/{ticket_id}"),
            Some(&x_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_entities_yield_not_found_not_forbidden() {
        let (_temp, _env, app) = setup_app().await;

        let (_x_id, x_token) = register(&app, "X", "x@example.com").await;
        let ghost = Uuid::new_v4();

        let (status, _) = send(
            &app,
            Method::GET,
            &format!("/api/projects/{ghost}"),
            Some(&x_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app,
            Method::GET,
            &format!("/api/tickets/{ghost}"),
            Some(&x_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app,
            Method::GET,
            &format!("/api/comments/ticket/{ghost}"),
            Some(&x_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn project_update_and_delete_are_admin_only() {
        let (_temp, _env, app) = setup_app().await;

        let (_x_id, x_token) = register(&app, "X", "x@example.com").await;
        let (_y_id, y_token) = register(&app, "Y", "y@example.com").await;

        let project_id = create_project(&app, &x_token, "P1").await;
        send(
            &app,
            Method::POST,
            &format!("/api/projects/{project_id}/members"),
            Some(&x_token),
            Some(json!({ "email": "y@example.com" })),
        )
        .await;

        let (status, _) = send(
            &app,
            Method::PUT,
            &format!("/api/projects/{project_id}"),
            Some(&y_token),
            Some(json!({ "title": "Hijacked" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &app,
            Method::DELETE,
            &format!("/api/projects/{project_id}"),
            Some(&y_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/api/projects/{project_id}"),
            Some(&x_token),
            Some(json!({ "title": "Renamed", "status": "completed" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body.pointer("/data/title").and_then(|v| v.as_str()),
            Some("Renamed")
        );
        assert_eq!(
            body.pointer("/data/status").and_then(|v| v.as_str()),
            Some("completed")
        );

        let (status, _) = send(
            &app,
            Method::DELETE,
            &format!("/api/projects/{project_id}"),
            Some(&x_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // Deleted projects become unreachable.
        let (status, _) = send(
            &app,
            Method::GET,
            &format!("/api/projects/{project_id}"),
            Some(&x_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
