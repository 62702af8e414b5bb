use crate::AppState;
use crate::api::error::AppError;
use crate::services::ingest::IngestError;
use crate::utils::auth::get_bearer_token;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

/// Authenticated caller, inserted into request extensions
#[derive(Debug, Clone, Copy)]
pub struct AuthSubject {
    pub user_id: Uuid,
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = get_bearer_token(req.headers())
        .map(str::to_string)
        .ok_or_else(|| IngestError::Unauthenticated("Couldn't find JWT".to_string()))?;

    let user_id = state.identity.authenticate(&token)?;

    req.extensions_mut().insert(AuthSubject { user_id });
    Ok(next.run(req).await)
}
