use actix_web::http::header;
use actix_web::{delete, get, patch, post, put, route, web, Error, HttpResponse};
use serde::Deserialize;

use crate::auth::Identity;
use crate::cache::CatalogCache;
use crate::error::ApiError;
use crate::membership;
use crate::models::{Ingredient, Membership, Recipe, RecipeFilter};
use crate::recipes::{RecipeDraft, RecipePatch};
use crate::shopping;
use crate::store::Store;
use crate::views::{self, Page, Paging, ShortRecipe, SUBSCRIPTIONS_PAGE_SIZE};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _| {
        ApiError::Validation(err.to_string()).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _| {
        ApiError::Validation(err.to_string()).into()
    }))
    .service(list_tags)
    .service(get_tag)
    .service(list_ingredients)
    .service(get_ingredient)
    // before the {id} routes so the literal segment wins
    .service(download_shopping_cart)
    .service(list_recipes)
    .service(create_recipe)
    .service(get_recipe)
    .service(replace_recipe)
    .service(patch_recipe)
    .service(delete_recipe)
    .service(add_favorite)
    .service(remove_favorite)
    .service(add_to_shopping_cart)
    .service(remove_from_shopping_cart)
    .service(list_subscriptions)
    .service(subscribe)
    .service(unsubscribe);
}

#[get("/api/tags/")]
async fn list_tags(store: web::Data<dyn Store>) -> Result<HttpResponse, Error> {
    let tags = web::block(move || store.tags())
        .await?
        .map_err(ApiError::from)?;
    Ok(HttpResponse::Ok().json(tags))
}

#[get("/api/tags/{tag_id}/")]
async fn get_tag(
    tag_id: web::Path<i32>,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, Error> {
    let tag = web::block(move || store.tag(tag_id.into_inner()))
        .await?
        .map_err(ApiError::from)?;
    Ok(HttpResponse::Ok().json(tag))
}

#[derive(Deserialize)]
struct IngredientQuery {
    name: Option<String>,
}

#[get("/api/ingredients/")]
async fn list_ingredients(
    query: web::Query<IngredientQuery>,
    store: web::Data<dyn Store>,
    cache: web::Data<CatalogCache>,
) -> Result<HttpResponse, Error> {
    let prefix = query
        .into_inner()
        .name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());
    let ingredients = web::block(move || -> Result<Vec<Ingredient>, ApiError> {
        if let Some(prefix) = prefix {
            return Ok(store.ingredients(Some(&prefix))?);
        }
        if let Some(cached) = cache.load() {
            return Ok(cached);
        }
        let catalog = store.ingredients(None)?;
        cache.store(&catalog);
        Ok(catalog)
    })
    .await??;
    Ok(HttpResponse::Ok().json(ingredients))
}

#[get("/api/ingredients/{ingredient_id}/")]
async fn get_ingredient(
    ingredient_id: web::Path<i32>,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, Error> {
    let ingredient = web::block(move || store.ingredient(ingredient_id.into_inner()))
        .await?
        .map_err(ApiError::from)?;
    Ok(HttpResponse::Ok().json(ingredient))
}

fn page_window(
    page: Option<i64>,
    limit: Option<i64>,
    default_limit: i64,
) -> Result<(i64, i64, i64), ApiError> {
    views::page_window(page, limit, default_limit)
        .ok_or_else(|| ApiError::Validation("Page number is out of range.".to_string()))
}

/// `?tags=` may repeat, so the recipe list query is read as raw pairs.
fn recipe_list_params(
    pairs: &[(String, String)],
    viewer: Option<i32>,
) -> Result<(RecipeFilter, Option<i64>, Option<i64>), ApiError> {
    fn number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ApiError> {
        value
            .trim()
            .parse()
            .map_err(|_| ApiError::Validation(format!("{} must be a number.", key)))
    }
    fn flag(value: &str) -> bool {
        matches!(value.trim(), "1" | "true" | "True")
    }

    let mut filter = RecipeFilter::default();
    let (mut page, mut limit) = (None, None);
    for (key, value) in pairs {
        match key.as_str() {
            "tags" => filter.tags.push(value.clone()),
            "author" => filter.author = Some(number(key, value)?),
            "page" => page = Some(number(key, value)?),
            "limit" => limit = Some(number(key, value)?),
            //only meaningful for a known caller
            "is_favorited" if flag(value) => filter.favorited_by = viewer,
            "is_in_shopping_cart" if flag(value) => filter.in_cart_of = viewer,
            _ => {}
        }
    }
    Ok((filter, page, limit))
}

#[get("/api/recipes/")]
async fn list_recipes(
    query: web::Query<Vec<(String, String)>>,
    identity: Option<Identity>,
    paging: web::Data<Paging>,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, Error> {
    let viewer = identity.map(|identity| identity.user_id);
    let (filter, page, limit) = recipe_list_params(&query, viewer)?;
    let (page, limit, offset) = page_window(page, limit, paging.page_size)?;

    let page = web::block(move || -> Result<Page<views::RecipeView>, ApiError> {
        let (count, recipes) = store.recipes(&filter, offset, limit)?;
        let results = recipes
            .into_iter()
            .map(|recipe| views::recipe_view(store.get_ref(), viewer, recipe))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(count, page, limit, results))
    })
    .await??;
    Ok(HttpResponse::Ok().json(page))
}

#[post("/api/recipes/")]
async fn create_recipe(
    identity: Identity,
    draft: web::Json<RecipeDraft>,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, Error> {
    let draft = draft.into_inner();
    draft.validate(true).map_err(ApiError::from)?;

    let recipe = web::block(move || -> Result<views::RecipeView, ApiError> {
        draft.check_references(store.get_ref())?;
        let recipe_id = store.create_recipe(identity.user_id, &draft)?;
        log::info!("user {} created recipe {}", identity.user_id, recipe_id);
        let recipe = store.recipe(recipe_id)?;
        Ok(views::recipe_view(store.get_ref(), Some(identity.user_id), recipe)?)
    })
    .await??;
    Ok(HttpResponse::Created().json(recipe))
}

#[get("/api/recipes/{recipe_id}/")]
async fn get_recipe(
    recipe_id: web::Path<i32>,
    identity: Option<Identity>,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, Error> {
    let viewer = identity.map(|identity| identity.user_id);
    let recipe = web::block(move || -> Result<views::RecipeView, ApiError> {
        let recipe = store.recipe(recipe_id.into_inner())?;
        Ok(views::recipe_view(store.get_ref(), viewer, recipe)?)
    })
    .await??;
    Ok(HttpResponse::Ok().json(recipe))
}

/// Shared by PUT and PATCH. `into_draft` turns the request body into a full
/// draft once the caller is known to be allowed to edit the recipe.
async fn save_recipe<F>(
    recipe_id: i32,
    identity: Identity,
    store: web::Data<dyn Store>,
    into_draft: F,
) -> Result<HttpResponse, Error>
where
    F: FnOnce(&dyn Store, &Recipe) -> Result<RecipeDraft, ApiError> + Send + 'static,
{
    let recipe = web::block(move || -> Result<views::RecipeView, ApiError> {
        let existing = store.recipe(recipe_id)?;
        if !identity.can_edit(&existing) {
            return Err(ApiError::Forbidden);
        }
        let draft = into_draft(store.get_ref(), &existing)?;
        //every check runs before the ingredient rows are replaced
        draft.validate(false)?;
        draft.check_references(store.get_ref())?;
        store.update_recipe(recipe_id, &draft)?;
        log::info!("user {} updated recipe {}", identity.user_id, recipe_id);
        let recipe = store.recipe(recipe_id)?;
        Ok(views::recipe_view(store.get_ref(), Some(identity.user_id), recipe)?)
    })
    .await??;
    Ok(HttpResponse::Ok().json(recipe))
}

#[put("/api/recipes/{recipe_id}/")]
async fn replace_recipe(
    recipe_id: web::Path<i32>,
    identity: Identity,
    draft: web::Json<RecipeDraft>,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, Error> {
    let draft = draft.into_inner();
    save_recipe(recipe_id.into_inner(), identity, store, move |_, _| Ok(draft)).await
}

#[patch("/api/recipes/{recipe_id}/")]
async fn patch_recipe(
    recipe_id: web::Path<i32>,
    identity: Identity,
    patch: web::Json<RecipePatch>,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, Error> {
    let patch = patch.into_inner();
    save_recipe(recipe_id.into_inner(), identity, store, move |store, existing| {
        Ok(patch.fill_from(store, existing)?)
    })
    .await
}

#[delete("/api/recipes/{recipe_id}/")]
async fn delete_recipe(
    recipe_id: web::Path<i32>,
    identity: Identity,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, Error> {
    let recipe_id = recipe_id.into_inner();
    web::block(move || -> Result<(), ApiError> {
        let existing = store.recipe(recipe_id)?;
        if !identity.can_edit(&existing) {
            return Err(ApiError::Forbidden);
        }
        store.delete_recipe(recipe_id)?;
        log::info!("user {} deleted recipe {}", identity.user_id, recipe_id);
        Ok(())
    })
    .await??;
    Ok(HttpResponse::NoContent().finish())
}

async fn add_recipe_membership(
    kind: Membership,
    recipe_id: i32,
    identity: Identity,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, Error> {
    let recipe = web::block(move || -> Result<ShortRecipe, ApiError> {
        let recipe = store.recipe(recipe_id)?;
        membership::join(store.get_ref(), kind, identity.user_id, recipe_id)?;
        Ok(ShortRecipe::from(recipe))
    })
    .await??;
    Ok(HttpResponse::Created().json(recipe))
}

async fn remove_membership(
    kind: Membership,
    target_id: i32,
    identity: Identity,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, Error> {
    web::block(move || membership::leave(store.get_ref(), kind, identity.user_id, target_id))
        .await??;
    Ok(HttpResponse::NoContent().finish())
}

#[route("/api/recipes/{recipe_id}/favorite/", method = "GET", method = "POST")]
async fn add_favorite(
    recipe_id: web::Path<i32>,
    identity: Identity,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, Error> {
    add_recipe_membership(Membership::Favorite, recipe_id.into_inner(), identity, store).await
}

#[delete("/api/recipes/{recipe_id}/favorite/")]
async fn remove_favorite(
    recipe_id: web::Path<i32>,
    identity: Identity,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, Error> {
    remove_membership(Membership::Favorite, recipe_id.into_inner(), identity, store).await
}

#[route("/api/recipes/{recipe_id}/shopping_cart/", method = "GET", method = "POST")]
async fn add_to_shopping_cart(
    recipe_id: web::Path<i32>,
    identity: Identity,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, Error> {
    add_recipe_membership(Membership::Purchase, recipe_id.into_inner(), identity, store).await
}

#[delete("/api/recipes/{recipe_id}/shopping_cart/")]
async fn remove_from_shopping_cart(
    recipe_id: web::Path<i32>,
    identity: Identity,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, Error> {
    remove_membership(Membership::Purchase, recipe_id.into_inner(), identity, store).await
}

#[get("/api/recipes/download_shopping_cart/")]
async fn download_shopping_cart(
    identity: Identity,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, Error> {
    let lines = web::block(move || store.shopping_cart(identity.user_id))
        .await?
        .map_err(ApiError::from)?;
    let list = shopping::aggregate(&lines);
    log::debug!(
        "user {} downloaded a shopping list of {} items",
        identity.user_id,
        list.items.len()
    );

    Ok(HttpResponse::Ok()
        .content_type(shopping::CONTENT_TYPE)
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", shopping::FILE_NAME),
        ))
        .body(shopping::render_text(&list)))
}

#[derive(Deserialize)]
struct AuthorQuery {
    page: Option<i64>,
    limit: Option<i64>,
    recipes_limit: Option<i64>,
}

#[get("/api/users/subscriptions/")]
async fn list_subscriptions(
    query: web::Query<AuthorQuery>,
    identity: Identity,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, Error> {
    let query = query.into_inner();
    let (page, limit, offset) = page_window(query.page, query.limit, SUBSCRIPTIONS_PAGE_SIZE)?;
    let recipes_limit = query.recipes_limit;

    let page = web::block(move || -> Result<Page<views::AuthorCard>, ApiError> {
        let (count, authors) = store.subscriptions(identity.user_id, offset, limit)?;
        let results = authors
            .into_iter()
            .map(|author| {
                views::author_card(store.get_ref(), Some(identity.user_id), author, recipes_limit)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(count, page, limit, results))
    })
    .await??;
    Ok(HttpResponse::Ok().json(page))
}

#[route("/api/users/{author_id}/subscribe/", method = "GET", method = "POST")]
async fn subscribe(
    author_id: web::Path<i32>,
    query: web::Query<AuthorQuery>,
    identity: Identity,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, Error> {
    let author_id = author_id.into_inner();
    let recipes_limit = query.into_inner().recipes_limit;

    let card = web::block(move || -> Result<views::AuthorCard, ApiError> {
        let author = store.user(author_id)?;
        membership::join(store.get_ref(), Membership::Subscription, identity.user_id, author_id)?;
        Ok(views::author_card(store.get_ref(), Some(identity.user_id), author, recipes_limit)?)
    })
    .await??;
    Ok(HttpResponse::Created().json(card))
}

#[delete("/api/users/{author_id}/subscribe/")]
async fn unsubscribe(
    author_id: web::Path<i32>,
    identity: Identity,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, Error> {
    remove_membership(Membership::Subscription, author_id.into_inner(), identity, store).await
}
