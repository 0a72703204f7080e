use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, PoolError};
use failsafe::backoff::EqualJittered;
use failsafe::failure_policy::{ConsecutiveFailures, OrElse, SuccessRateOverTimeWindow};
use failsafe::{CircuitBreaker, Config, StateMachine};

use super::{Store, StoreError, StoreResult};
use crate::models::{Ingredient, IngredientLine, Membership, Recipe, RecipeFilter, Tag, User};
use crate::query;
use crate::recipes::RecipeDraft;

pub type DbPool = r2d2::Pool<ConnectionManager<MysqlConnection>>;

pub type CircuitBreakerType = StateMachine<
    OrElse<SuccessRateOverTimeWindow<EqualJittered>, ConsecutiveFailures<EqualJittered>>,
    (),
>;

/// [`Store`] over a pooled MySQL connection. Every call goes through a
/// circuit breaker so a dead database is rejected fast instead of piling
/// up blocked workers.
pub struct MysqlStore {
    pool: DbPool,
    circuit_breaker: CircuitBreakerType,
}

impl MysqlStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            circuit_breaker: Config::new().build(),
        }
    }

    pub fn connect(database_url: &str, max_size: u32) -> Result<Self, PoolError> {
        let manager = ConnectionManager::<MysqlConnection>::new(database_url);
        let pool = r2d2::Pool::builder().max_size(max_size).build(manager)?;
        Ok(Self::new(pool))
    }

    fn run<T, E, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&MysqlConnection) -> Result<T, E>,
        StoreError: From<E>,
    {
        //not found and duplicates are answers, only outages trip the breaker
        let outcome = self.circuit_breaker.call_with(
            |err: &StoreError| err.is_outage(),
            || -> StoreResult<T> {
                let conn = self.pool.get()?;
                Ok(f(&conn)?)
            },
        );
        match outcome {
            Ok(val) => Ok(val),
            Err(failsafe::Error::Inner(err)) => {
                if err.is_outage() {
                    log::error!("database call failed: {}", err);
                }
                Err(err)
            }
            Err(failsafe::Error::Rejected) => {
                log::warn!("database circuit is open, rejecting call");
                Err(StoreError::Unavailable)
            }
        }
    }
}

impl Store for MysqlStore {
    fn tags(&self) -> StoreResult<Vec<Tag>> {
        self.run(query::find_all_tags)
    }

    fn tag(&self, id: i32) -> StoreResult<Tag> {
        self.run(|conn| query::find_tag(id, conn))
    }

    fn ingredients(&self, name_prefix: Option<&str>) -> StoreResult<Vec<Ingredient>> {
        self.run(|conn| query::find_ingredients(name_prefix, conn))
    }

    fn ingredient(&self, id: i32) -> StoreResult<Ingredient> {
        self.run(|conn| query::find_ingredient(id, conn))
    }

    fn seed_ingredient(&self, name: &str, measurement_unit: &str) -> StoreResult<bool> {
        self.run(|conn| query::get_or_create_ingredient(name, measurement_unit, conn))
    }

    fn user(&self, id: i32) -> StoreResult<User> {
        self.run(|conn| query::find_user(id, conn))
    }

    fn recipes(
        &self,
        filter: &RecipeFilter,
        offset: i64,
        limit: i64,
    ) -> StoreResult<(i64, Vec<Recipe>)> {
        self.run(|conn| query::find_recipes(filter, offset, limit, conn))
    }

    fn recipe(&self, id: i32) -> StoreResult<Recipe> {
        self.run(|conn| query::find_recipe(id, conn))
    }

    fn recipe_tags(&self, recipe_id: i32) -> StoreResult<Vec<Tag>> {
        self.run(|conn| query::find_recipe_tags(recipe_id, conn))
    }

    fn recipe_ingredients(&self, recipe_id: i32) -> StoreResult<Vec<IngredientLine>> {
        self.run(|conn| query::find_recipe_ingredients(recipe_id, conn))
    }

    fn create_recipe(&self, author_id: i32, draft: &RecipeDraft) -> StoreResult<i32> {
        self.run(|conn| query::insert_recipe(author_id, draft, conn))
    }

    fn update_recipe(&self, id: i32, draft: &RecipeDraft) -> StoreResult<()> {
        self.run(|conn| query::update_recipe(id, draft, conn))
    }

    fn delete_recipe(&self, id: i32) -> StoreResult<()> {
        self.run(|conn| query::delete_recipe(id, conn))
    }

    fn add_membership(&self, kind: Membership, user_id: i32, target_id: i32) -> StoreResult<()> {
        self.run(|conn| query::insert_membership(kind, user_id, target_id, conn))
    }

    fn remove_membership(
        &self,
        kind: Membership,
        user_id: i32,
        target_id: i32,
    ) -> StoreResult<()> {
        self.run(|conn| query::delete_membership(kind, user_id, target_id, conn))
    }

    fn has_membership(
        &self,
        kind: Membership,
        user_id: i32,
        target_id: i32,
    ) -> StoreResult<bool> {
        self.run(|conn| query::membership_exists(kind, user_id, target_id, conn))
    }

    fn subscriptions(
        &self,
        user_id: i32,
        offset: i64,
        limit: i64,
    ) -> StoreResult<(i64, Vec<User>)> {
        self.run(|conn| query::find_subscriptions(user_id, offset, limit, conn))
    }

    fn author_recipes(&self, author_id: i32, limit: Option<i64>) -> StoreResult<Vec<Recipe>> {
        self.run(|conn| query::find_author_recipes(author_id, limit, conn))
    }

    fn author_recipe_count(&self, author_id: i32) -> StoreResult<i64> {
        self.run(|conn| query::count_author_recipes(author_id, conn))
    }

    fn shopping_cart(&self, user_id: i32) -> StoreResult<Vec<IngredientLine>> {
        self.run(|conn| query::find_shopping_cart(user_id, conn))
    }
}
