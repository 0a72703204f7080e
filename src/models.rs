use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::schema::{ingredients, recipe_ingredients, recipe_tags, recipes};

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Serialize, Deserialize)]
pub struct Tag {
    pub id: i32,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: i32,
    pub name: String,
    pub measurement_unit: String,
}

impl Ingredient {
    pub fn list_from_u8(bytes: &[u8]) -> Result<Vec<Self>, bincode::Error> {
        bincode::deserialize(bytes)
    }

    pub fn list_to_u8(ingredients: &[Self]) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(ingredients)
    }
}

#[derive(Insertable)]
#[table_name = "ingredients"]
pub(crate) struct NewIngredient<'a> {
    pub name: &'a str,
    pub measurement_unit: &'a str,
}

/// Profile of a user as published by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Serialize, Deserialize)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable)]
pub struct Recipe {
    pub id: i32,
    pub author_id: i32,
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,
    pub pub_date: NaiveDateTime,
}

#[derive(Insertable)]
#[table_name = "recipes"]
pub(crate) struct NewRecipe<'a> {
    pub author_id: i32,
    pub name: &'a str,
    pub text: &'a str,
    pub image: &'a str,
    pub cooking_time: i32,
    pub pub_date: NaiveDateTime,
}

// image is left untouched when None
#[derive(AsChangeset)]
#[table_name = "recipes"]
pub(crate) struct RecipeChanges<'a> {
    pub name: &'a str,
    pub text: &'a str,
    pub image: Option<&'a str>,
    pub cooking_time: i32,
}

#[derive(Insertable)]
#[table_name = "recipe_ingredients"]
pub(crate) struct NewRecipeIngredient {
    pub recipe_id: i32,
    pub ingredient_id: i32,
    pub amount: i32, //strictly positive, checked before insert
}

#[derive(Insertable)]
#[table_name = "recipe_tags"]
pub(crate) struct NewRecipeTag {
    pub recipe_id: i32,
    pub tag_id: i32,
}

/// One ingredient row of a recipe joined with its catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Serialize)]
pub struct IngredientLine {
    pub id: i32,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

/// User-keyed association sets. Favorite and Purchase point at a recipe,
/// Subscription points at another user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Membership {
    Favorite,
    Purchase,
    Subscription,
}

impl Membership {
    pub fn duplicate_message(self) -> &'static str {
        match self {
            Membership::Favorite => "Recipe is already in favorites.",
            Membership::Purchase => "Recipe is already in the shopping list.",
            Membership::Subscription => "You are already subscribed to this author.",
        }
    }

    pub fn missing_message(self) -> &'static str {
        match self {
            Membership::Favorite => "Recipe is not in favorites.",
            Membership::Purchase => "Recipe is not in the shopping list.",
            Membership::Subscription => "You are not subscribed to this author.",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    /// tag slugs, a recipe matches when it carries any of them
    pub tags: Vec<String>,
    pub author: Option<i32>,
    pub favorited_by: Option<i32>,
    pub in_cart_of: Option<i32>,
}
