use axum::extract::{Query, State};
use axum::Json;

use crate::access::AccessScope;
use crate::auth::extractor::AuthUser;
use crate::error::AppError;
use crate::state::SharedState;

use super::vehicles::ListParams;

pub async fn scope(
    auth: AuthUser,
    State(state): State<SharedState>,
    Query(params): Query<ListParams>,
) -> Result<Json<AccessScope>, AppError> {
    Ok(Json(auth.scope(&state, params.include_mirrored)))
}
