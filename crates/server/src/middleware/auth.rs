use axum::{
    Json,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use db::models::user::User;
use deployment::Deployment;
use utils::response::ApiResponse;

use crate::DeploymentImpl;

fn parse_authorization_bearer(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    let (prefix, rest) = trimmed.split_once(' ')?;
    if !prefix.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

fn unauthorized_response(message: &str) -> Response {
    let response = ApiResponse::<()>::error(message);
    (StatusCode::UNAUTHORIZED, Json(response)).into_response()
}

/// Authenticate the request and thread the caller into it as an
/// `Extension<User>`. There is no shared session state; every request
/// carries its own identity.
pub async fn require_auth(
    State(deployment): State<DeploymentImpl>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_authorization_bearer);

    let Some(token) = token else {
        return unauthorized_response("Not authorized, no token");
    };

    let claims = match deployment.auth().verify_token(token) {
        Ok(claims) => claims,
        Err(err) => {
            tracing::warn!(
                path = %req.uri().path(),
                method = %req.method(),
                error = %err,
                "Rejected bearer token"
            );
            return unauthorized_response("Not authorized, token failed");
        }
    };

    let user = match User::find_by_id(&deployment.db().pool, claims.sub).await {
        Ok(Some(user)) => user,
        Ok(None) => return unauthorized_response("User not found"),
        Err(err) => {
            tracing::error!(error = %err, "Failed to load authenticated user");
            let response = ApiResponse::<()>::error("Internal server error");
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response();
        }
    };

    req.extensions_mut().insert(user);
    next.run(req).await
}
