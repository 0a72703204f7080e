use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use super::{Store, StoreError, StoreResult};
use crate::models::{Ingredient, IngredientLine, Membership, Recipe, RecipeFilter, Tag, User};
use crate::recipes::RecipeDraft;

struct RecipeIngredientRow {
    id: i32,
    recipe_id: i32,
    ingredient_id: i32,
    amount: i32,
}

struct MembershipRow {
    kind: Membership,
    user_id: i32,
    target_id: i32,
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    tags: Vec<Tag>,
    ingredients: Vec<Ingredient>,
    recipes: Vec<Recipe>,
    recipe_ingredients: Vec<RecipeIngredientRow>,
    recipe_tags: Vec<(i32, i32)>,
    //insertion order doubles as id order
    memberships: Vec<MembershipRow>,
    last_id: i32,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn user(&self, id: i32) -> StoreResult<&User> {
        self.users
            .iter()
            .find(|user| user.id == id)
            .ok_or(StoreError::NotFound)
    }

    fn recipe(&self, id: i32) -> StoreResult<&Recipe> {
        self.recipes
            .iter()
            .find(|recipe| recipe.id == id)
            .ok_or(StoreError::NotFound)
    }

    fn ingredient(&self, id: i32) -> StoreResult<&Ingredient> {
        self.ingredients
            .iter()
            .find(|ingredient| ingredient.id == id)
            .ok_or(StoreError::NotFound)
    }

    fn has_membership(&self, kind: Membership, user_id: i32, target_id: i32) -> bool {
        self.memberships
            .iter()
            .any(|row| row.kind == kind && row.user_id == user_id && row.target_id == target_id)
    }

    fn lines(&self, recipe_id: i32) -> Vec<IngredientLine> {
        self.recipe_ingredients
            .iter()
            .filter(|row| row.recipe_id == recipe_id)
            .filter_map(|row| {
                let ingredient = self.ingredient(row.ingredient_id).ok()?;
                Some(IngredientLine {
                    id: ingredient.id,
                    name: ingredient.name.clone(),
                    measurement_unit: ingredient.measurement_unit.clone(),
                    amount: row.amount,
                })
            })
            .collect()
    }

    fn matches(&self, recipe: &Recipe, filter: &RecipeFilter) -> bool {
        if let Some(author) = filter.author {
            if recipe.author_id != author {
                return false;
            }
        }
        if let Some(user) = filter.favorited_by {
            if !self.has_membership(Membership::Favorite, user, recipe.id) {
                return false;
            }
        }
        if let Some(user) = filter.in_cart_of {
            if !self.has_membership(Membership::Purchase, user, recipe.id) {
                return false;
            }
        }
        if !filter.tags.is_empty() {
            let tagged = self
                .recipe_tags
                .iter()
                .filter(|(recipe_id, _)| *recipe_id == recipe.id)
                .filter_map(|(_, tag_id)| self.tags.iter().find(|tag| tag.id == *tag_id))
                .any(|tag| filter.tags.contains(&tag.slug));
            if !tagged {
                return false;
            }
        }
        true
    }

    //emulates the foreign keys of the recipe link tables
    fn check_links(&self, draft: &RecipeDraft) -> StoreResult<()> {
        for item in &draft.ingredients {
            self.ingredient(item.id)?;
        }
        for tag_id in &draft.tags {
            if !self.tags.iter().any(|tag| tag.id == *tag_id) {
                return Err(StoreError::NotFound);
            }
        }
        Ok(())
    }

    fn replace_links(&mut self, recipe_id: i32, draft: &RecipeDraft) {
        self.recipe_ingredients
            .retain(|row| row.recipe_id != recipe_id);
        self.recipe_tags.retain(|(id, _)| *id != recipe_id);
        for item in &draft.ingredients {
            let id = self.next_id();
            self.recipe_ingredients.push(RecipeIngredientRow {
                id,
                recipe_id,
                ingredient_id: item.id,
                amount: item.amount,
            });
        }
        for tag_id in &draft.tags {
            self.recipe_tags.push((recipe_id, *tag_id));
        }
    }
}

/// [`Store`] kept entirely in process memory. Enforces the same uniqueness
/// and reference rules as the MySQL schema.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_user(&self, username: &str) -> User {
        let mut tables = self.tables();
        let user = User {
            id: tables.next_id(),
            email: format!("{}@example.com", username),
            username: username.to_string(),
            first_name: username.to_string(),
            last_name: String::new(),
        };
        tables.users.push(user.clone());
        user
    }

    pub fn add_tag(&self, name: &str, color: &str, slug: &str) -> Tag {
        let mut tables = self.tables();
        let tag = Tag {
            id: tables.next_id(),
            name: name.to_string(),
            color: color.to_string(),
            slug: slug.to_string(),
        };
        tables.tags.push(tag.clone());
        tag
    }

    /// Adds a catalog row without the (name, unit) uniqueness check, so tests
    /// can build catalogs the seed loader would never produce.
    pub fn add_ingredient(&self, name: &str, measurement_unit: &str) -> Ingredient {
        let mut tables = self.tables();
        let ingredient = Ingredient {
            id: tables.next_id(),
            name: name.to_string(),
            measurement_unit: measurement_unit.to_string(),
        };
        tables.ingredients.push(ingredient.clone());
        ingredient
    }
}

impl Store for MemoryStore {
    fn tags(&self) -> StoreResult<Vec<Tag>> {
        Ok(self.tables().tags.clone())
    }

    fn tag(&self, id: i32) -> StoreResult<Tag> {
        self.tables()
            .tags
            .iter()
            .find(|tag| tag.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn ingredients(&self, name_prefix: Option<&str>) -> StoreResult<Vec<Ingredient>> {
        let prefix = name_prefix.map(str::to_lowercase);
        let mut found: Vec<Ingredient> = self
            .tables()
            .ingredients
            .iter()
            .filter(|ingredient| match &prefix {
                Some(prefix) => ingredient.name.to_lowercase().starts_with(prefix.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    fn ingredient(&self, id: i32) -> StoreResult<Ingredient> {
        self.tables().ingredient(id).map(Clone::clone)
    }

    fn seed_ingredient(&self, name: &str, measurement_unit: &str) -> StoreResult<bool> {
        let mut tables = self.tables();
        let exists = tables
            .ingredients
            .iter()
            .any(|row| row.name == name && row.measurement_unit == measurement_unit);
        if exists {
            return Ok(false);
        }
        let id = tables.next_id();
        tables.ingredients.push(Ingredient {
            id,
            name: name.to_string(),
            measurement_unit: measurement_unit.to_string(),
        });
        Ok(true)
    }

    fn user(&self, id: i32) -> StoreResult<User> {
        self.tables().user(id).map(Clone::clone)
    }

    fn recipes(
        &self,
        filter: &RecipeFilter,
        offset: i64,
        limit: i64,
    ) -> StoreResult<(i64, Vec<Recipe>)> {
        let tables = self.tables();
        let mut found: Vec<Recipe> = tables
            .recipes
            .iter()
            .filter(|recipe| tables.matches(recipe, filter))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        let count = found.len() as i64;
        let page = found
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((count, page))
    }

    fn recipe(&self, id: i32) -> StoreResult<Recipe> {
        self.tables().recipe(id).map(Clone::clone)
    }

    fn recipe_tags(&self, recipe_id: i32) -> StoreResult<Vec<Tag>> {
        let tables = self.tables();
        let mut found: Vec<Tag> = tables
            .tags
            .iter()
            .filter(|tag| tables.recipe_tags.contains(&(recipe_id, tag.id)))
            .cloned()
            .collect();
        found.sort_by_key(|tag| tag.id);
        Ok(found)
    }

    fn recipe_ingredients(&self, recipe_id: i32) -> StoreResult<Vec<IngredientLine>> {
        Ok(self.tables().lines(recipe_id))
    }

    fn create_recipe(&self, author_id: i32, draft: &RecipeDraft) -> StoreResult<i32> {
        let mut tables = self.tables();
        tables.user(author_id)?;
        tables.check_links(draft)?;
        let id = tables.next_id();
        tables.recipes.push(Recipe {
            id,
            author_id,
            name: draft.name.clone(),
            text: draft.text.clone(),
            image: draft.image.clone().unwrap_or_default(),
            cooking_time: draft.cooking_time,
            pub_date: Utc::now().naive_utc(),
        });
        tables.replace_links(id, draft);
        Ok(id)
    }

    fn update_recipe(&self, id: i32, draft: &RecipeDraft) -> StoreResult<()> {
        let mut tables = self.tables();
        tables.recipe(id)?;
        tables.check_links(draft)?;
        if let Some(recipe) = tables.recipes.iter_mut().find(|recipe| recipe.id == id) {
            recipe.name = draft.name.clone();
            recipe.text = draft.text.clone();
            if let Some(image) = &draft.image {
                recipe.image = image.clone();
            }
            recipe.cooking_time = draft.cooking_time;
        }
        tables.replace_links(id, draft);
        Ok(())
    }

    fn delete_recipe(&self, id: i32) -> StoreResult<()> {
        let mut tables = self.tables();
        tables.recipe(id)?;
        tables.recipes.retain(|recipe| recipe.id != id);
        tables.recipe_ingredients.retain(|row| row.recipe_id != id);
        tables.recipe_tags.retain(|(recipe_id, _)| *recipe_id != id);
        tables.memberships.retain(|row| {
            row.kind == Membership::Subscription || row.target_id != id
        });
        Ok(())
    }

    fn add_membership(&self, kind: Membership, user_id: i32, target_id: i32) -> StoreResult<()> {
        let mut tables = self.tables();
        tables.user(user_id)?;
        match kind {
            Membership::Subscription => tables.user(target_id).map(|_| ())?,
            Membership::Favorite | Membership::Purchase => {
                tables.recipe(target_id).map(|_| ())?
            }
        }
        if tables.has_membership(kind, user_id, target_id) {
            return Err(StoreError::Duplicate);
        }
        tables.memberships.push(MembershipRow {
            kind,
            user_id,
            target_id,
        });
        Ok(())
    }

    fn remove_membership(
        &self,
        kind: Membership,
        user_id: i32,
        target_id: i32,
    ) -> StoreResult<()> {
        let mut tables = self.tables();
        let position = tables
            .memberships
            .iter()
            .position(|row| {
                row.kind == kind && row.user_id == user_id && row.target_id == target_id
            })
            .ok_or(StoreError::NotFound)?;
        tables.memberships.remove(position);
        Ok(())
    }

    fn has_membership(
        &self,
        kind: Membership,
        user_id: i32,
        target_id: i32,
    ) -> StoreResult<bool> {
        Ok(self.tables().has_membership(kind, user_id, target_id))
    }

    fn subscriptions(
        &self,
        user_id: i32,
        offset: i64,
        limit: i64,
    ) -> StoreResult<(i64, Vec<User>)> {
        let tables = self.tables();
        let authors: Vec<User> = tables
            .memberships
            .iter()
            .filter(|row| row.kind == Membership::Subscription && row.user_id == user_id)
            .filter_map(|row| tables.user(row.target_id).ok().cloned())
            .collect();
        let count = authors.len() as i64;
        let page = authors
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((count, page))
    }

    fn author_recipes(&self, author_id: i32, limit: Option<i64>) -> StoreResult<Vec<Recipe>> {
        let filter = RecipeFilter {
            author: Some(author_id),
            ..RecipeFilter::default()
        };
        let (_, recipes) = self.recipes(&filter, 0, limit.unwrap_or(i64::MAX))?;
        Ok(recipes)
    }

    fn author_recipe_count(&self, author_id: i32) -> StoreResult<i64> {
        Ok(self
            .tables()
            .recipes
            .iter()
            .filter(|recipe| recipe.author_id == author_id)
            .count() as i64)
    }

    fn shopping_cart(&self, user_id: i32) -> StoreResult<Vec<IngredientLine>> {
        let tables = self.tables();
        Ok(tables
            .memberships
            .iter()
            .filter(|row| row.kind == Membership::Purchase && row.user_id == user_id)
            .flat_map(|row| tables.lines(row.target_id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipes::IngredientAmount;

    fn draft(ingredients: Vec<(i32, i32)>, tags: Vec<i32>) -> RecipeDraft {
        RecipeDraft {
            name: "Soup".to_string(),
            text: "Boil.".to_string(),
            image: Some("recipes/soup.png".to_string()),
            cooking_time: 30,
            tags,
            ingredients: ingredients
                .into_iter()
                .map(|(id, amount)| IngredientAmount { id, amount })
                .collect(),
        }
    }

    #[test]
    fn membership_is_unique_and_removal_requires_existence() {
        let store = MemoryStore::new();
        let cook = store.add_user("cook");
        let recipe = store.create_recipe(cook.id, &draft(vec![], vec![])).unwrap();

        store
            .add_membership(Membership::Favorite, cook.id, recipe)
            .unwrap();
        assert!(matches!(
            store.add_membership(Membership::Favorite, cook.id, recipe),
            Err(StoreError::Duplicate)
        ));
        //the same pair in another set is independent
        store
            .add_membership(Membership::Purchase, cook.id, recipe)
            .unwrap();

        store
            .remove_membership(Membership::Favorite, cook.id, recipe)
            .unwrap();
        assert!(matches!(
            store.remove_membership(Membership::Favorite, cook.id, recipe),
            Err(StoreError::NotFound)
        ));
        assert!(store
            .has_membership(Membership::Purchase, cook.id, recipe)
            .unwrap());
    }

    #[test]
    fn membership_target_must_exist() {
        let store = MemoryStore::new();
        let cook = store.add_user("cook");
        assert!(matches!(
            store.add_membership(Membership::Purchase, cook.id, 404),
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store.add_membership(Membership::Subscription, cook.id, 404),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn update_replaces_links_and_keeps_image() {
        let store = MemoryStore::new();
        let cook = store.add_user("cook");
        let salt = store.add_ingredient("salt", "g");
        let water = store.add_ingredient("water", "ml");
        let dinner = store.add_tag("Dinner", "#49B64E", "dinner");
        let id = store
            .create_recipe(cook.id, &draft(vec![(salt.id, 5)], vec![dinner.id]))
            .unwrap();

        let mut changed = draft(vec![(water.id, 500)], vec![]);
        changed.image = None;
        changed.name = "Broth".to_string();
        store.update_recipe(id, &changed).unwrap();

        let recipe = store.recipe(id).unwrap();
        assert_eq!(recipe.name, "Broth");
        assert_eq!(recipe.image, "recipes/soup.png");
        assert!(store.recipe_tags(id).unwrap().is_empty());
        let lines = store.recipe_ingredients(id).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].name, "water");
        assert_eq!(lines[0].amount, 500);
    }

    #[test]
    fn update_with_unknown_ingredient_leaves_recipe_untouched() {
        let store = MemoryStore::new();
        let cook = store.add_user("cook");
        let salt = store.add_ingredient("salt", "g");
        let id = store
            .create_recipe(cook.id, &draft(vec![(salt.id, 5)], vec![]))
            .unwrap();

        let result = store.update_recipe(id, &draft(vec![(9999, 1)], vec![]));
        assert!(matches!(result, Err(StoreError::NotFound)));
        assert_eq!(store.recipe_ingredients(id).unwrap().len(), 1);
    }

    #[test]
    fn delete_cascades_to_links_and_memberships() {
        let store = MemoryStore::new();
        let cook = store.add_user("cook");
        let fan = store.add_user("fan");
        let salt = store.add_ingredient("salt", "g");
        let id = store
            .create_recipe(cook.id, &draft(vec![(salt.id, 5)], vec![]))
            .unwrap();
        store
            .add_membership(Membership::Purchase, fan.id, id)
            .unwrap();
        store
            .add_membership(Membership::Subscription, fan.id, cook.id)
            .unwrap();

        store.delete_recipe(id).unwrap();
        assert!(matches!(store.recipe(id), Err(StoreError::NotFound)));
        assert!(store.shopping_cart(fan.id).unwrap().is_empty());
        assert!(store
            .has_membership(Membership::Subscription, fan.id, cook.id)
            .unwrap());
        assert!(matches!(store.delete_recipe(id), Err(StoreError::NotFound)));
    }

    #[test]
    fn recipes_filter_by_tag_and_author_newest_first() {
        let store = MemoryStore::new();
        let alice = store.add_user("alice");
        let bob = store.add_user("bob");
        let lunch = store.add_tag("Lunch", "#E26C2D", "lunch");
        let first = store
            .create_recipe(alice.id, &draft(vec![], vec![lunch.id]))
            .unwrap();
        let second = store.create_recipe(alice.id, &draft(vec![], vec![])).unwrap();
        let third = store
            .create_recipe(bob.id, &draft(vec![], vec![lunch.id]))
            .unwrap();

        let all = store.recipes(&RecipeFilter::default(), 0, 10).unwrap();
        let ids: Vec<i32> = all.1.iter().map(|recipe| recipe.id).collect();
        assert_eq!(all.0, 3);
        assert_eq!(ids, vec![third, second, first]);

        let tagged = RecipeFilter {
            tags: vec!["lunch".to_string()],
            author: Some(alice.id),
            ..RecipeFilter::default()
        };
        let (count, page) = store.recipes(&tagged, 0, 10).unwrap();
        assert_eq!(count, 1);
        assert_eq!(page[0].id, first);

        let (count, page) = store.recipes(&RecipeFilter::default(), 2, 2).unwrap();
        assert_eq!(count, 3);
        assert_eq!(page.len(), 1);
    }

    #[test]
    fn seed_is_get_or_create() {
        let store = MemoryStore::new();
        assert!(store.seed_ingredient("sugar", "g").unwrap());
        assert!(!store.seed_ingredient("sugar", "g").unwrap());
        assert!(store.seed_ingredient("sugar", "kg").unwrap());
        assert_eq!(store.ingredients(Some("SU")).unwrap().len(), 2);
        assert!(store.ingredients(Some("salt")).unwrap().is_empty());
    }
}
