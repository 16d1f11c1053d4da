use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The identity forwarded by the surrounding application's auth layer.
///
/// Token verification terminates upstream; requests reach this API with
/// the caller already identified by the numeric `x-user-id` header. A
/// missing or non-numeric header is rejected with 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: i64,
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<i64>().ok())
            .ok_or(ApiError::Unauthorized)?;
        Ok(CurrentUser { user_id })
    }
}
