//! JSON shapes returned by the API, assembled from store rows.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::membership;
use crate::models::{IngredientLine, Membership, Recipe, Tag, User};
use crate::store::{Store, StoreResult};

pub const MAX_PAGE_SIZE: i64 = 100;
pub const SUBSCRIPTIONS_PAGE_SIZE: i64 = 10;

/// Default page size of the recipe list.
#[derive(Debug, Clone, Copy)]
pub struct Paging {
    pub page_size: i64,
}

impl Default for Paging {
    fn default() -> Self {
        Self { page_size: 6 }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<i64>,
    pub previous: Option<i64>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(count: i64, page: i64, limit: i64, results: Vec<T>) -> Self {
        Self {
            count,
            next: match page.checked_mul(limit) {
                Some(seen) if seen < count => Some(page + 1),
                _ => None,
            },
            previous: if page > 1 { Some(page - 1) } else { None },
            results,
        }
    }
}

/// Turns 1-based `page` and `limit` query values into (page, limit, offset).
/// `None` when the offset does not fit in an `i64`.
pub fn page_window(
    page: Option<i64>,
    limit: Option<i64>,
    default_limit: i64,
) -> Option<(i64, i64, i64)> {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE);
    let offset = (page - 1).checked_mul(limit)?;
    Some((page, limit, offset))
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorView {
    pub email: String,
    pub id: i32,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeView {
    pub id: i32,
    pub tags: Vec<Tag>,
    pub author: AuthorView,
    pub ingredients: Vec<IngredientLine>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub pub_date: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShortRecipe {
    pub id: i32,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl From<Recipe> for ShortRecipe {
    fn from(recipe: Recipe) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name,
            image: recipe.image,
            cooking_time: recipe.cooking_time,
        }
    }
}

/// An author as listed on the subscriptions page.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorCard {
    #[serde(flatten)]
    pub author: AuthorView,
    pub recipes: Vec<ShortRecipe>,
    pub recipes_count: i64,
}

pub fn author_view(store: &dyn Store, viewer: Option<i32>, user: User) -> StoreResult<AuthorView> {
    let is_subscribed = membership::contains(store, Membership::Subscription, viewer, user.id)?;
    Ok(AuthorView {
        email: user.email,
        id: user.id,
        username: user.username,
        first_name: user.first_name,
        last_name: user.last_name,
        is_subscribed,
    })
}

pub fn recipe_view(
    store: &dyn Store,
    viewer: Option<i32>,
    recipe: Recipe,
) -> StoreResult<RecipeView> {
    let author = author_view(store, viewer, store.user(recipe.author_id)?)?;
    Ok(RecipeView {
        id: recipe.id,
        tags: store.recipe_tags(recipe.id)?,
        author,
        ingredients: store.recipe_ingredients(recipe.id)?,
        is_favorited: membership::contains(store, Membership::Favorite, viewer, recipe.id)?,
        is_in_shopping_cart: membership::contains(store, Membership::Purchase, viewer, recipe.id)?,
        name: recipe.name,
        image: recipe.image,
        text: recipe.text,
        cooking_time: recipe.cooking_time,
        pub_date: recipe.pub_date,
    })
}

pub fn author_card(
    store: &dyn Store,
    viewer: Option<i32>,
    user: User,
    recipes_limit: Option<i64>,
) -> StoreResult<AuthorCard> {
    let recipes = store
        .author_recipes(user.id, recipes_limit.map(|limit| limit.max(0)))?
        .into_iter()
        .map(ShortRecipe::from)
        .collect();
    let recipes_count = store.author_recipe_count(user.id)?;
    Ok(AuthorCard {
        author: author_view(store, viewer, user)?,
        recipes,
        recipes_count,
    })
}
