//! Favorites, shopping cart and subscriptions are all the same thing: a set
//! of targets keyed by user. Joining twice and leaving a set one is not in
//! are both refused.

use crate::error::ApiError;
use crate::models::Membership;
use crate::store::{Store, StoreError};

pub fn join(
    store: &dyn Store,
    kind: Membership,
    user_id: i32,
    target_id: i32,
) -> Result<(), ApiError> {
    if kind == Membership::Subscription && user_id == target_id {
        return Err(ApiError::Validation(
            "You cannot subscribe to yourself.".to_string(),
        ));
    }
    store
        .add_membership(kind, user_id, target_id)
        .map_err(|err| match err {
            StoreError::Duplicate => ApiError::Validation(kind.duplicate_message().to_string()),
            other => other.into(),
        })
}

pub fn leave(
    store: &dyn Store,
    kind: Membership,
    user_id: i32,
    target_id: i32,
) -> Result<(), ApiError> {
    store
        .remove_membership(kind, user_id, target_id)
        .map_err(|err| match err {
            StoreError::NotFound => ApiError::NotFound(kind.missing_message().to_string()),
            other => other.into(),
        })
}

/// Membership test for the optional caller of a read endpoint. Anonymous
/// callers belong to no set.
pub fn contains(
    store: &dyn Store,
    kind: Membership,
    viewer: Option<i32>,
    target_id: i32,
) -> Result<bool, StoreError> {
    match viewer {
        Some(user_id) => store.has_membership(kind, user_id, target_id),
        None => Ok(false),
    }
}
