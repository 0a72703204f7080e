//! Caller identity. Authentication happens in front of this service; the
//! identity provider forwards the authenticated user as trusted headers.

use actix_web::{dev::Payload, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};

use crate::error::ApiError;
use crate::models::Recipe;

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_ROLE_HEADER: &str = "X-User-Role";
pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i32,
    pub is_admin: bool,
}

impl Identity {
    pub fn from_request_headers(req: &HttpRequest) -> Result<Self, ApiError> {
        let user_id = req
            .headers()
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<i32>().ok())
            .ok_or(ApiError::Unauthorized)?;
        let is_admin = req
            .headers()
            .get(USER_ROLE_HEADER)
            .and_then(|value| value.to_str().ok())
            .map_or(false, |role| role.eq_ignore_ascii_case(ADMIN_ROLE));
        Ok(Self { user_id, is_admin })
    }

    /// Only the author or an administrator may change a recipe.
    pub fn can_edit(&self, recipe: &Recipe) -> bool {
        self.is_admin || recipe.author_id == self.user_id
    }
}

impl FromRequest for Identity {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Identity::from_request_headers(req))
    }
}
