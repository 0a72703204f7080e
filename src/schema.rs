table! {
    users (id) {
        id -> Int4,
        email -> Varchar,
        username -> Varchar,
        first_name -> Varchar,
        last_name -> Varchar,
    }
}

table! {
    tags (id) {
        id -> Int4,
        name -> Varchar,
        color -> Varchar,
        slug -> Varchar,
    }
}

table! {
    ingredients (id) {
        id -> Int4,
        name -> Varchar,
        measurement_unit -> Varchar,
    }
}

table! {
    recipes (id) {
        id -> Int4,
        author_id -> Int4,
        name -> Varchar,
        text -> Text,
        image -> Varchar,
        cooking_time -> Int4,
        pub_date -> Datetime,
    }
}

table! {
    recipe_ingredients (id) {
        id -> Int4,
        recipe_id -> Int4,
        ingredient_id -> Int4,
        amount -> Int4,
    }
}

table! {
    recipe_tags (recipe_id, tag_id) {
        recipe_id -> Int4,
        tag_id -> Int4,
    }
}

table! {
    favorites (id) {
        id -> Int4,
        user_id -> Int4,
        recipe_id -> Int4,
    }
}

table! {
    purchases (id) {
        id -> Int4,
        user_id -> Int4,
        recipe_id -> Int4,
    }
}

table! {
    subscriptions (id) {
        id -> Int4,
        user_id -> Int4,
        author_id -> Int4,
    }
}

joinable!(recipes -> users (author_id));
joinable!(recipe_ingredients -> recipes (recipe_id));
joinable!(recipe_ingredients -> ingredients (ingredient_id));
joinable!(recipe_tags -> recipes (recipe_id));
joinable!(recipe_tags -> tags (tag_id));
joinable!(favorites -> recipes (recipe_id));
joinable!(purchases -> recipes (recipe_id));

allow_tables_to_appear_in_same_query!(
    users,
    tags,
    ingredients,
    recipes,
    recipe_ingredients,
    recipe_tags,
    favorites,
    purchases,
    subscriptions,
);
