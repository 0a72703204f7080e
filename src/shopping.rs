//! Shopping list: one entry per ingredient name across every recipe in a
//! user's purchase set.

use std::collections::HashMap;
use std::fmt::Write;

use serde::Serialize;

use crate::models::IngredientLine;

pub const FOOTER: &str = "FoodGram, 2021";
/// Clients expect the download under this name and type even though the
/// body is the plain text of `render_text`.
pub const FILE_NAME: &str = "wishlist.pdf";
pub const CONTENT_TYPE: &str = "application/pdf";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingItem {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShoppingList {
    pub items: Vec<ShoppingItem>,
}

/// Merges ingredient rows keyed by name, not by catalog id: two catalog
/// entries sharing a name end up on one line carrying the unit that was seen
/// first. Entries keep first-seen order.
pub fn aggregate(lines: &[IngredientLine]) -> ShoppingList {
    let mut position: HashMap<&str, usize> = HashMap::new();
    let mut items: Vec<ShoppingItem> = Vec::new();

    for line in lines {
        match position.get(line.name.as_str()) {
            Some(&at) => items[at].amount += i64::from(line.amount),
            None => {
                position.insert(&line.name, items.len());
                items.push(ShoppingItem {
                    name: line.name.clone(),
                    measurement_unit: line.measurement_unit.clone(),
                    amount: i64::from(line.amount),
                });
            }
        }
    }
    ShoppingList { items }
}

pub fn render_text(list: &ShoppingList) -> String {
    let mut out = String::new();
    for item in &list.items {
        //writing into a String can not fail
        let _ = writeln!(out, "{} - {}{}", item.name, item.amount, item.measurement_unit);
    }
    out.push('\n');
    out.push_str(FOOTER);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: i32, name: &str, unit: &str, amount: i32) -> IngredientLine {
        IngredientLine {
            id,
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    #[test]
    fn same_name_across_recipes_is_summed() {
        let lines = vec![line(1, "Sugar", "g", 100), line(1, "Sugar", "g", 250)];
        let list = aggregate(&lines);
        assert_eq!(
            list.items,
            vec![ShoppingItem {
                name: "Sugar".to_string(),
                measurement_unit: "g".to_string(),
                amount: 350,
            }]
        );
        assert_eq!(render_text(&list), "Sugar - 350g\n\nFoodGram, 2021");
    }

    #[test]
    fn different_names_never_merge() {
        let lines = vec![
            line(1, "flour", "g", 100),
            line(2, "sugar", "g", 30),
            line(1, "flour", "g", 50),
        ];
        let list = aggregate(&lines);
        assert_eq!(list.items.len(), 2);
        assert_eq!(list.items[0].name, "flour");
        assert_eq!(list.items[0].amount, 150);
        assert_eq!(list.items[1].name, "sugar");
        assert_eq!(list.items[1].amount, 30);
    }

    #[test]
    fn merge_key_is_name_not_id() {
        let lines = vec![line(1, "milk", "ml", 200), line(7, "milk", "l", 1)];
        let list = aggregate(&lines);
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.items[0].measurement_unit, "ml");
        assert_eq!(list.items[0].amount, 201);
    }

    #[test]
    fn empty_cart_renders_footer_only() {
        let list = aggregate(&[]);
        assert!(list.items.is_empty());
        assert_eq!(render_text(&list), format!("\n{}", FOOTER));
    }

    #[test]
    fn totals_do_not_overflow_i32() {
        let lines = vec![line(1, "rice", "g", i32::MAX), line(1, "rice", "g", i32::MAX)];
        assert_eq!(aggregate(&lines).items[0].amount, 2 * i64::from(i32::MAX));
    }

    #[test]
    fn aggregation_is_repeatable() {
        let lines = vec![line(1, "egg", "pcs", 2), line(2, "salt", "g", 1)];
        assert_eq!(aggregate(&lines), aggregate(&lines));
    }
}
