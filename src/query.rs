use chrono::Utc;
use diesel::dsl::exists;
use diesel::mysql::Mysql;
use diesel::prelude::*;
use diesel::{delete, insert_into, select, update};

use crate::models::{
    Ingredient, IngredientLine, Membership, NewIngredient, NewRecipe, NewRecipeIngredient,
    NewRecipeTag, Recipe, RecipeChanges, RecipeFilter, Tag, User,
};
use crate::recipes::RecipeDraft;
use crate::schema::{
    favorites, ingredients, purchases, recipe_ingredients, recipe_tags, recipes, subscriptions,
    tags, users,
};
use crate::store::{StoreError, StoreResult};

no_arg_sql_function!(
    last_insert_id,
    diesel::sql_types::Unsigned<diesel::sql_types::BigInt>
);

//runs $body with the association table of $kind bound to $table, $user and $target
macro_rules! on_membership_table {
    ($kind:expr, $table:ident, $user:ident, $target:ident => $body:block) => {
        match $kind {
            Membership::Favorite => {
                use crate::schema::favorites::{
                    recipe_id as $target, table as $table, user_id as $user,
                };
                $body
            }
            Membership::Purchase => {
                use crate::schema::purchases::{
                    recipe_id as $target, table as $table, user_id as $user,
                };
                $body
            }
            Membership::Subscription => {
                use crate::schema::subscriptions::{
                    author_id as $target, table as $table, user_id as $user,
                };
                $body
            }
        }
    };
}

pub(crate) fn find_all_tags(conn: &MysqlConnection) -> QueryResult<Vec<Tag>> {
    tags::table.order(tags::id).load(conn)
}

pub(crate) fn find_tag(tag_id: i32, conn: &MysqlConnection) -> QueryResult<Tag> {
    tags::table.find(tag_id).first(conn)
}

pub(crate) fn find_ingredients(
    name_prefix: Option<&str>,
    conn: &MysqlConnection,
) -> QueryResult<Vec<Ingredient>> {
    let mut query = ingredients::table
        .order((ingredients::name, ingredients::id))
        .into_boxed();
    if let Some(prefix) = name_prefix {
        //default collation is case-insensitive
        query = query.filter(ingredients::name.like(format!("{}%", escape_like(prefix))));
    }
    query.load(conn)
}

pub(crate) fn find_ingredient(
    ingredient_id: i32,
    conn: &MysqlConnection,
) -> QueryResult<Ingredient> {
    ingredients::table.find(ingredient_id).first(conn)
}

pub(crate) fn get_or_create_ingredient(
    name: &str,
    measurement_unit: &str,
    conn: &MysqlConnection,
) -> QueryResult<bool> {
    conn.transaction(|| {
        let found: bool = select(exists(
            ingredients::table
                .filter(ingredients::name.eq(name))
                .filter(ingredients::measurement_unit.eq(measurement_unit)),
        ))
        .get_result(conn)?;
        if found {
            return Ok(false);
        }
        insert_into(ingredients::table)
            .values(&NewIngredient {
                name,
                measurement_unit,
            })
            .execute(conn)?;
        Ok(true)
    })
}

pub(crate) fn find_user(user_id: i32, conn: &MysqlConnection) -> QueryResult<User> {
    users::table.find(user_id).first(conn)
}

fn filtered_recipes(filter: &RecipeFilter) -> recipes::BoxedQuery<'static, Mysql> {
    let mut query = recipes::table.into_boxed();
    if !filter.tags.is_empty() {
        let tagged = recipe_tags::table
            .inner_join(tags::table)
            .filter(tags::slug.eq_any(filter.tags.clone()))
            .select(recipe_tags::recipe_id);
        query = query.filter(recipes::id.eq_any(tagged));
    }
    if let Some(author) = filter.author {
        query = query.filter(recipes::author_id.eq(author));
    }
    if let Some(user) = filter.favorited_by {
        let favorited = favorites::table
            .filter(favorites::user_id.eq(user))
            .select(favorites::recipe_id);
        query = query.filter(recipes::id.eq_any(favorited));
    }
    if let Some(user) = filter.in_cart_of {
        let purchased = purchases::table
            .filter(purchases::user_id.eq(user))
            .select(purchases::recipe_id);
        query = query.filter(recipes::id.eq_any(purchased));
    }
    query
}

pub(crate) fn find_recipes(
    filter: &RecipeFilter,
    offset: i64,
    limit: i64,
    conn: &MysqlConnection,
) -> QueryResult<(i64, Vec<Recipe>)> {
    let count = filtered_recipes(filter).count().get_result(conn)?;
    let page = filtered_recipes(filter)
        .order((recipes::pub_date.desc(), recipes::id.desc()))
        .offset(offset)
        .limit(limit)
        .load(conn)?;
    Ok((count, page))
}

pub(crate) fn find_recipe(recipe_id: i32, conn: &MysqlConnection) -> QueryResult<Recipe> {
    recipes::table.find(recipe_id).first(conn)
}

pub(crate) fn find_recipe_tags(recipe_id: i32, conn: &MysqlConnection) -> QueryResult<Vec<Tag>> {
    recipe_tags::table
        .inner_join(tags::table)
        .filter(recipe_tags::recipe_id.eq(recipe_id))
        .order(tags::id)
        .select(tags::all_columns)
        .load(conn)
}

pub(crate) fn find_recipe_ingredients(
    recipe_id: i32,
    conn: &MysqlConnection,
) -> QueryResult<Vec<IngredientLine>> {
    recipe_ingredients::table
        .inner_join(ingredients::table)
        .filter(recipe_ingredients::recipe_id.eq(recipe_id))
        .order(recipe_ingredients::id)
        .select((
            ingredients::id,
            ingredients::name,
            ingredients::measurement_unit,
            recipe_ingredients::amount,
        ))
        .load(conn)
}

fn replace_recipe_links(
    recipe_id: i32,
    draft: &RecipeDraft,
    conn: &MysqlConnection,
) -> QueryResult<()> {
    delete(recipe_ingredients::table.filter(recipe_ingredients::recipe_id.eq(recipe_id)))
        .execute(conn)?;
    delete(recipe_tags::table.filter(recipe_tags::recipe_id.eq(recipe_id))).execute(conn)?;

    let rows: Vec<NewRecipeIngredient> = draft
        .ingredients
        .iter()
        .map(|item| NewRecipeIngredient {
            recipe_id,
            ingredient_id: item.id,
            amount: item.amount,
        })
        .collect();
    if !rows.is_empty() {
        insert_into(recipe_ingredients::table)
            .values(&rows)
            .execute(conn)?;
    }

    let tag_rows: Vec<NewRecipeTag> = draft
        .tags
        .iter()
        .map(|&tag_id| NewRecipeTag { recipe_id, tag_id })
        .collect();
    if !tag_rows.is_empty() {
        insert_into(recipe_tags::table)
            .values(&tag_rows)
            .execute(conn)?;
    }
    Ok(())
}

pub(crate) fn insert_recipe(
    author_id: i32,
    draft: &RecipeDraft,
    conn: &MysqlConnection,
) -> StoreResult<i32> {
    conn.transaction::<_, StoreError, _>(|| {
        insert_into(recipes::table)
            .values(&NewRecipe {
                author_id,
                name: &draft.name,
                text: &draft.text,
                image: draft.image.as_deref().unwrap_or_default(),
                cooking_time: draft.cooking_time,
                pub_date: Utc::now().naive_utc(),
            })
            .execute(conn)?;
        let recipe_id = select(last_insert_id).get_result::<u64>(conn)? as i32;
        replace_recipe_links(recipe_id, draft, conn)?;
        Ok(recipe_id)
    })
}

pub(crate) fn update_recipe(
    recipe_id: i32,
    draft: &RecipeDraft,
    conn: &MysqlConnection,
) -> StoreResult<()> {
    conn.transaction::<_, StoreError, _>(|| {
        //mysql reports zero affected rows for an unchanged row, so look it up first
        find_recipe(recipe_id, conn)?;
        update(recipes::table.find(recipe_id))
            .set(&RecipeChanges {
                name: &draft.name,
                text: &draft.text,
                image: draft.image.as_deref(),
                cooking_time: draft.cooking_time,
            })
            .execute(conn)?;
        replace_recipe_links(recipe_id, draft, conn)?;
        Ok(())
    })
}

pub(crate) fn delete_recipe(recipe_id: i32, conn: &MysqlConnection) -> StoreResult<()> {
    match delete(recipes::table.find(recipe_id)).execute(conn)? {
        0 => Err(StoreError::NotFound),
        _ => Ok(()),
    }
}

pub(crate) fn insert_membership(
    kind: Membership,
    user: i32,
    target: i32,
    conn: &MysqlConnection,
) -> QueryResult<()> {
    on_membership_table!(kind, table, user_col, target_col => {
        insert_into(table)
            .values((user_col.eq(user), target_col.eq(target)))
            .execute(conn)?;
    });
    Ok(())
}

pub(crate) fn delete_membership(
    kind: Membership,
    user: i32,
    target: i32,
    conn: &MysqlConnection,
) -> StoreResult<()> {
    let deleted = on_membership_table!(kind, table, user_col, target_col => {
        delete(table.filter(user_col.eq(user)).filter(target_col.eq(target))).execute(conn)?
    });
    match deleted {
        0 => Err(StoreError::NotFound),
        _ => Ok(()),
    }
}

pub(crate) fn membership_exists(
    kind: Membership,
    user: i32,
    target: i32,
    conn: &MysqlConnection,
) -> QueryResult<bool> {
    on_membership_table!(kind, table, user_col, target_col => {
        select(exists(table.filter(user_col.eq(user)).filter(target_col.eq(target))))
            .get_result(conn)
    })
}

pub(crate) fn find_subscriptions(
    user: i32,
    offset: i64,
    limit: i64,
    conn: &MysqlConnection,
) -> QueryResult<(i64, Vec<User>)> {
    let count = subscriptions::table
        .filter(subscriptions::user_id.eq(user))
        .count()
        .get_result(conn)?;
    let authors = subscriptions::table
        .inner_join(users::table.on(users::id.eq(subscriptions::author_id)))
        .filter(subscriptions::user_id.eq(user))
        .order(subscriptions::id)
        .offset(offset)
        .limit(limit)
        .select(users::all_columns)
        .load(conn)?;
    Ok((count, authors))
}

pub(crate) fn find_author_recipes(
    author: i32,
    limit: Option<i64>,
    conn: &MysqlConnection,
) -> QueryResult<Vec<Recipe>> {
    let mut query = recipes::table
        .filter(recipes::author_id.eq(author))
        .order((recipes::pub_date.desc(), recipes::id.desc()))
        .into_boxed();
    if let Some(limit) = limit {
        query = query.limit(limit);
    }
    query.load(conn)
}

pub(crate) fn count_author_recipes(author: i32, conn: &MysqlConnection) -> QueryResult<i64> {
    recipes::table
        .filter(recipes::author_id.eq(author))
        .count()
        .get_result(conn)
}

pub(crate) fn find_shopping_cart(
    user: i32,
    conn: &MysqlConnection,
) -> QueryResult<Vec<IngredientLine>> {
    purchases::table
        .inner_join(
            recipe_ingredients::table.on(recipe_ingredients::recipe_id.eq(purchases::recipe_id)),
        )
        .inner_join(ingredients::table.on(ingredients::id.eq(recipe_ingredients::ingredient_id)))
        .filter(purchases::user_id.eq(user))
        .order((purchases::id, recipe_ingredients::id))
        .select((
            ingredients::id,
            ingredients::name,
            ingredients::measurement_unit,
            recipe_ingredients::amount,
        ))
        .load(conn)
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("мука"), "мука");
    }
}
