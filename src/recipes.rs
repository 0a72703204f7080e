//! Recipe payloads and the rules they must satisfy before anything is
//! written. A draft that fails here never reaches the store, so an update
//! can not leave a recipe with half of its ingredient rows replaced.

use std::collections::HashSet;

use serde::Deserialize;
use thiserror::Error;

use crate::models::Recipe;
use crate::store::{Store, StoreError, StoreResult};

pub const MAX_NAME_LEN: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IngredientAmount {
    pub id: i32,
    pub amount: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecipeDraft {
    pub name: String,
    pub text: String,
    /// Reference to an already stored image. Required on create, kept as is
    /// on update when omitted.
    #[serde(default)]
    pub image: Option<String>,
    pub cooking_time: i32,
    #[serde(default)]
    pub tags: Vec<i32>,
    #[serde(default)]
    pub ingredients: Vec<IngredientAmount>,
}

/// Body of a PATCH: every field is optional and an omitted one keeps the
/// stored value. A given `tags` or `ingredients` list replaces the whole set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RecipePatch {
    pub name: Option<String>,
    pub text: Option<String>,
    pub image: Option<String>,
    pub cooking_time: Option<i32>,
    pub tags: Option<Vec<i32>>,
    pub ingredients: Option<Vec<IngredientAmount>>,
}

impl RecipePatch {
    pub fn fill_from(self, store: &dyn Store, recipe: &Recipe) -> StoreResult<RecipeDraft> {
        let tags = match self.tags {
            Some(tags) => tags,
            None => store
                .recipe_tags(recipe.id)?
                .into_iter()
                .map(|tag| tag.id)
                .collect(),
        };
        let ingredients = match self.ingredients {
            Some(ingredients) => ingredients,
            None => store
                .recipe_ingredients(recipe.id)?
                .into_iter()
                .map(|line| IngredientAmount {
                    id: line.id,
                    amount: line.amount,
                })
                .collect(),
        };
        Ok(RecipeDraft {
            name: self.name.unwrap_or_else(|| recipe.name.clone()),
            text: self.text.unwrap_or_else(|| recipe.text.clone()),
            image: self.image,
            cooking_time: self.cooking_time.unwrap_or(recipe.cooking_time),
            tags,
            ingredients,
        })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub String);

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("Tag {0} does not exist.")]
    UnknownTag(i32),
    #[error("Ingredient {0} does not exist.")]
    UnknownIngredient(i32),
    #[error(transparent)]
    Store(StoreError),
}

impl RecipeDraft {
    pub fn validate(&self, creating: bool) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(invalid("Recipe name must not be empty."));
        }
        if self.name.chars().count() > MAX_NAME_LEN {
            return Err(invalid(format!(
                "Recipe name must be at most {} characters.",
                MAX_NAME_LEN
            )));
        }
        if self.text.trim().is_empty() {
            return Err(invalid("Recipe description must not be empty."));
        }
        if self.cooking_time < 1 {
            return Err(invalid("Cooking time must be at least 1 minute."));
        }
        match &self.image {
            Some(image) if image.trim().is_empty() => {
                return Err(invalid("Image must not be empty."))
            }
            None if creating => return Err(invalid("Image is required.")),
            _ => {}
        }

        let mut seen = HashSet::new();
        for item in &self.ingredients {
            if item.amount <= 0 {
                return Err(invalid("Ingredient amount must be greater than 0."));
            }
            if !seen.insert(item.id) {
                return Err(invalid(format!(
                    "Ingredient {} is listed more than once.",
                    item.id
                )));
            }
        }

        let mut seen = HashSet::new();
        for tag in &self.tags {
            if !seen.insert(*tag) {
                return Err(invalid(format!("Tag {} is listed more than once.", tag)));
            }
        }
        Ok(())
    }

    /// Makes sure every tag and ingredient the draft points at exists.
    pub fn check_references(&self, store: &dyn Store) -> Result<(), ReferenceError> {
        for &tag in &self.tags {
            store.tag(tag).map_err(|err| match err {
                StoreError::NotFound => ReferenceError::UnknownTag(tag),
                other => ReferenceError::Store(other),
            })?;
        }
        for item in &self.ingredients {
            store.ingredient(item.id).map_err(|err| match err {
                StoreError::NotFound => ReferenceError::UnknownIngredient(item.id),
                other => ReferenceError::Store(other),
            })?;
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ValidationError {
    ValidationError(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn draft() -> RecipeDraft {
        RecipeDraft {
            name: "Pancakes".to_string(),
            text: "Mix and fry.".to_string(),
            image: Some("recipes/pancakes.png".to_string()),
            cooking_time: 20,
            tags: vec![1],
            ingredients: vec![
                IngredientAmount { id: 1, amount: 200 },
                IngredientAmount { id: 2, amount: 2 },
            ],
        }
    }

    #[test]
    fn accepts_well_formed_draft() {
        assert_eq!(draft().validate(true), Ok(()));
    }

    #[test]
    fn rejects_non_positive_amount() {
        let mut zero = draft();
        zero.ingredients[1].amount = 0;
        assert!(zero.validate(true).is_err());

        let mut negative = draft();
        negative.ingredients[0].amount = -5;
        assert!(negative.validate(false).is_err());
    }

    #[test]
    fn rejects_repeated_ingredient_and_tag() {
        let mut twice = draft();
        twice.ingredients.push(IngredientAmount { id: 1, amount: 10 });
        assert!(twice.validate(true).is_err());

        let mut tags = draft();
        tags.tags = vec![3, 3];
        assert!(tags.validate(true).is_err());
    }

    #[test]
    fn image_is_required_only_on_create() {
        let mut no_image = draft();
        no_image.image = None;
        assert!(no_image.validate(true).is_err());
        assert_eq!(no_image.validate(false), Ok(()));
    }

    #[test]
    fn rejects_bad_scalars() {
        let mut quick = draft();
        quick.cooking_time = 0;
        assert!(quick.validate(true).is_err());

        let mut unnamed = draft();
        unnamed.name = "   ".to_string();
        assert!(unnamed.validate(true).is_err());

        let mut long = draft();
        long.name = "x".repeat(MAX_NAME_LEN + 1);
        assert!(long.validate(true).is_err());
    }

    #[test]
    fn empty_ingredient_list_is_allowed() {
        let mut bare = draft();
        bare.ingredients.clear();
        assert_eq!(bare.validate(true), Ok(()));
    }

    #[test]
    fn patch_fills_omitted_fields_from_the_stored_recipe() {
        let store = MemoryStore::new();
        let cook = store.add_user("cook");
        let tag = store.add_tag("Breakfast", "#E26C2D", "breakfast");
        let flour = store.add_ingredient("flour", "g");
        let mut stored = draft();
        stored.tags = vec![tag.id];
        stored.ingredients = vec![IngredientAmount { id: flour.id, amount: 100 }];
        let id = store.create_recipe(cook.id, &stored).unwrap();
        let recipe = store.recipe(id).unwrap();

        let patch = RecipePatch {
            cooking_time: Some(5),
            ..RecipePatch::default()
        };
        let filled = patch.fill_from(&store, &recipe).unwrap();
        assert_eq!(filled.name, "Pancakes");
        assert_eq!(filled.text, "Mix and fry.");
        assert_eq!(filled.image, None);
        assert_eq!(filled.cooking_time, 5);
        assert_eq!(filled.tags, vec![tag.id]);
        assert_eq!(filled.ingredients, stored.ingredients);

        let cleared = RecipePatch {
            tags: Some(vec![]),
            ..RecipePatch::default()
        };
        assert!(cleared.fill_from(&store, &recipe).unwrap().tags.is_empty());
    }

    #[test]
    fn unknown_references_are_reported() {
        let store = MemoryStore::new();
        let tag = store.add_tag("Breakfast", "#E26C2D", "breakfast");
        let flour = store.add_ingredient("flour", "g");

        let mut ok = draft();
        ok.tags = vec![tag.id];
        ok.ingredients = vec![IngredientAmount { id: flour.id, amount: 100 }];
        assert!(ok.check_references(&store).is_ok());

        let mut bad_tag = ok.clone();
        bad_tag.tags = vec![tag.id + 100];
        assert!(matches!(
            bad_tag.check_references(&store),
            Err(ReferenceError::UnknownTag(_))
        ));

        let mut bad_ingredient = ok;
        bad_ingredient.ingredients[0].id = 999;
        assert!(matches!(
            bad_ingredient.check_references(&store),
            Err(ReferenceError::UnknownIngredient(999))
        ));
    }
}
