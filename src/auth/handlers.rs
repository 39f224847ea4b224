use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::dto::{PublicUser, SignUpRequest},
    error::{AuthError, ValidationErrors},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/auth/signup", post(signup))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PublicUser>), AuthError> {
    let Json(payload) = payload.map_err(|rejection| {
        warn!(status = %rejection.status(), "undecodable signup body");
        AuthError::Validation(ValidationErrors::single("body", rejection_message(&rejection)))
    })?;

    let user = state.registration.signup(payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Fixed text per rejection kind. serde's own message quotes the offending
/// value, which may be the password.
fn rejection_message(rejection: &JsonRejection) -> &'static str {
    match rejection {
        JsonRejection::JsonSyntaxError(_) => "invalid JSON",
        JsonRejection::JsonDataError(_) => "wrong field type",
        JsonRejection::MissingJsonContentType(_) => "expected application/json",
        _ => "unreadable request body",
    }
}
