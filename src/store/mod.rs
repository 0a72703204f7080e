//! Storage access. Handlers only ever talk to a [`Store`]; the MySQL
//! implementation backs the server and the in-memory one backs the tests.

mod memory;
mod mysql;

pub use memory::MemoryStore;
pub use mysql::{CircuitBreakerType, DbPool, MysqlStore};

use diesel::r2d2::PoolError;
use diesel::result::DatabaseErrorKind;
use thiserror::Error;

use crate::models::{Ingredient, IngredientLine, Membership, Recipe, RecipeFilter, Tag, User};
use crate::recipes::RecipeDraft;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("record already exists")]
    Duplicate,
    #[error("database is not responding")]
    Unavailable,
    #[error("connection pool error: {0}")]
    Pool(#[from] PoolError),
    #[error("database error: {0}")]
    Database(diesel::result::Error),
}

impl From<diesel::result::Error> for StoreError {
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::Error;

        match err {
            Error::NotFound => StoreError::NotFound,
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => StoreError::Duplicate,
            //a dangling reference means the referenced row is gone
            Error::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                StoreError::NotFound
            }
            other => StoreError::Database(other),
        }
    }
}

impl StoreError {
    /// Whether the error says something about the health of the database
    /// rather than about the data that was asked for.
    pub fn is_outage(&self) -> bool {
        matches!(self, StoreError::Pool(_) | StoreError::Database(_))
    }
}

pub trait Store: Send + Sync {
    fn tags(&self) -> StoreResult<Vec<Tag>>;
    fn tag(&self, id: i32) -> StoreResult<Tag>;

    /// Catalog ordered by name, optionally restricted to a case-insensitive
    /// name prefix.
    fn ingredients(&self, name_prefix: Option<&str>) -> StoreResult<Vec<Ingredient>>;
    fn ingredient(&self, id: i32) -> StoreResult<Ingredient>;
    /// Get-or-create on the (name, unit) pair. Returns true when a row was added.
    fn seed_ingredient(&self, name: &str, measurement_unit: &str) -> StoreResult<bool>;

    fn user(&self, id: i32) -> StoreResult<User>;

    /// Newest first. Returns the total number of matches with the page.
    fn recipes(
        &self,
        filter: &RecipeFilter,
        offset: i64,
        limit: i64,
    ) -> StoreResult<(i64, Vec<Recipe>)>;
    fn recipe(&self, id: i32) -> StoreResult<Recipe>;
    fn recipe_tags(&self, recipe_id: i32) -> StoreResult<Vec<Tag>>;
    fn recipe_ingredients(&self, recipe_id: i32) -> StoreResult<Vec<IngredientLine>>;
    fn create_recipe(&self, author_id: i32, draft: &RecipeDraft) -> StoreResult<i32>;
    /// Replaces the scalar fields, the tag set and the ingredient set at once.
    fn update_recipe(&self, id: i32, draft: &RecipeDraft) -> StoreResult<()>;
    fn delete_recipe(&self, id: i32) -> StoreResult<()>;

    fn add_membership(&self, kind: Membership, user_id: i32, target_id: i32) -> StoreResult<()>;
    fn remove_membership(&self, kind: Membership, user_id: i32, target_id: i32)
        -> StoreResult<()>;
    fn has_membership(&self, kind: Membership, user_id: i32, target_id: i32)
        -> StoreResult<bool>;

    /// Authors the user follows, in subscription order.
    fn subscriptions(&self, user_id: i32, offset: i64, limit: i64)
        -> StoreResult<(i64, Vec<User>)>;
    fn author_recipes(&self, author_id: i32, limit: Option<i64>) -> StoreResult<Vec<Recipe>>;
    fn author_recipe_count(&self, author_id: i32) -> StoreResult<i64>;

    /// Every ingredient row of every recipe in the user's purchase set,
    /// in purchase order and then in recipe row order.
    fn shopping_cart(&self, user_id: i32) -> StoreResult<Vec<IngredientLine>>;
}
