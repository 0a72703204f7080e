//! One-time load of the ingredient catalog from a `name,unit` file.

use std::io::BufRead;

use crate::store::{Store, StoreError};

pub const DEFAULT_PATH: &str = "data/ingredients.csv";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub created: usize,
    pub existing: usize,
    pub skipped: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("could not read ingredient file: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Reads a `name,unit` row. Either field may be quoted, and `""` inside a
/// quoted field is a literal quote. Anything but exactly two non-empty
/// fields is malformed.
pub fn parse_row(row: &str) -> Option<(String, String)> {
    let mut fields = split_fields(row.trim())?;
    if fields.len() != 2 {
        return None;
    }
    let unit = fields.pop()?;
    let name = fields.pop()?;
    if name.is_empty() || unit.is_empty() {
        return None;
    }
    Some((name, unit))
}

//None for an unterminated quote
fn split_fields(row: &str) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = row.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    quoted = false;
                }
            }
            '"' if field.trim().is_empty() => {
                field.clear();
                quoted = true;
            }
            ',' if !quoted => fields.push(finish(&mut field)),
            other => field.push(other),
        }
    }
    if quoted {
        return None;
    }
    fields.push(finish(&mut field));
    Some(fields)
}

fn finish(field: &mut String) -> String {
    std::mem::take(field).trim().to_string()
}

pub fn load<R: BufRead>(store: &dyn Store, reader: R) -> Result<SeedReport, SeedError> {
    let mut report = SeedReport::default();
    for (number, row) in reader.lines().enumerate() {
        let row = row?;
        if row.trim().is_empty() {
            continue;
        }
        match parse_row(&row) {
            Some((name, unit)) => {
                if store.seed_ingredient(&name, &unit)? {
                    report.created += 1;
                } else {
                    report.existing += 1;
                }
            }
            None => {
                log::warn!("skipping malformed row {}: {:?}", number + 1, row);
                report.skipped += 1;
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn rows_have_two_fields() {
        assert_eq!(
            parse_row("сахар,г"),
            Some(("сахар".to_string(), "г".to_string()))
        );
        assert_eq!(
            parse_row("\"соус, томатный\",\"мл\""),
            Some(("соус, томатный".to_string(), "мл".to_string()))
        );
        assert_eq!(parse_row("no unit here"), None);
        assert_eq!(parse_row(",г"), None);
        assert_eq!(parse_row("соус, томатный,мл"), None);
        assert_eq!(parse_row("\"мука,г"), None);
    }

    #[test]
    fn doubled_quotes_are_literal() {
        assert_eq!(
            parse_row("\"сыр \"\"Гауда\"\"\",г"),
            Some(("сыр \"Гауда\"".to_string(), "г".to_string()))
        );
        assert_eq!(
            parse_row("\"a \"\"b\"\"\",g"),
            Some(("a \"b\"".to_string(), "g".to_string()))
        );
    }

    #[test]
    fn loading_twice_creates_nothing_new() {
        let store = MemoryStore::new();
        let data = "мука,г\nмолоко,мл\n\nbroken row\nмука,г\n";

        let first = load(&store, data.as_bytes()).unwrap();
        assert_eq!(
            first,
            SeedReport {
                created: 2,
                existing: 1,
                skipped: 1
            }
        );

        let second = load(&store, data.as_bytes()).unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.existing, 3);
        assert_eq!(store.ingredients(None).unwrap().len(), 2);
    }
}
