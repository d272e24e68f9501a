use axum::extract::{Extension, State};

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::Json;
use crate::middleware::AccountContext;
use crate::models::Notification;

/// GET /notifications: the caller's lifecycle notifications, newest first.
pub async fn my_notifications(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccountContext>,
) -> Result<Json<Vec<Notification>>> {
    let conn = state.db.get()?;
    let notifications = queries::list_notifications_for_account(&conn, &ctx.account.id)?;
    Ok(Json(notifications))
}
