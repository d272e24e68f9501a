use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::db::{AppState, queries};
use crate::error::AppError;
use crate::models::Account;
use crate::util::{extract_bearer_token, hash_token, token_matches};

/// The authenticated caller, attached to the request by [`account_auth`].
#[derive(Clone)]
pub struct AccountContext {
    pub account: Account,
}

impl AccountContext {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.account.role.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Only admins can perform this action".into(),
            ))
        }
    }
}

pub async fn account_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(request.headers()).ok_or(AppError::Unauthorized)?;

    let conn = state.db.get()?;
    let account = queries::get_account_by_token_hash(&conn, &hash_token(token))?
        .filter(|a| token_matches(token, &a.api_token_hash))
        .ok_or(AppError::Unauthorized)?;

    request.extensions_mut().insert(AccountContext { account });

    Ok(next.run(request).await)
}
