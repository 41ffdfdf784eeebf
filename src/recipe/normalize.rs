//! Canonical recipe text.
//!
//! Two recipes that differ only in key order or formatting normalize to the
//! same string. Text that cannot be parsed falls back to its trimmed form,
//! which turns comparisons textual instead of semantic.

use serde_json::{Map, Value};
use tracing::debug;

use super::Recipe;
use crate::error::{Error, Result};

/// Input accepted by [`normalize`].
pub enum NormalizeInput<'a> {
    Recipe(&'a Recipe),
    Text(&'a str),
}

impl<'a> From<&'a Recipe> for NormalizeInput<'a> {
    fn from(recipe: &'a Recipe) -> Self {
        NormalizeInput::Recipe(recipe)
    }
}

impl<'a> From<&'a str> for NormalizeInput<'a> {
    fn from(text: &'a str) -> Self {
        NormalizeInput::Text(text)
    }
}

impl<'a> From<&'a String> for NormalizeInput<'a> {
    fn from(text: &'a String) -> Self {
        NormalizeInput::Text(text.as_str())
    }
}

/// Canonicalize a recipe or recipe text. Never fails.
pub fn normalize<'a>(input: impl Into<NormalizeInput<'a>>) -> String {
    match input.into() {
        NormalizeInput::Recipe(recipe) => match try_normalize_recipe(recipe) {
            Ok(text) => text,
            Err(e) => {
                debug!("Recipe normalization failed, using debug form: {}", e);
                format!("{:?}", recipe)
            }
        },
        NormalizeInput::Text(text) => normalize_text(text),
    }
}

/// Canonicalize a structured recipe, reporting serializer failures.
pub fn try_normalize_recipe(recipe: &Recipe) -> Result<String> {
    let value =
        serde_json::to_value(recipe).map_err(|e| Error::SerializationFailure(e.to_string()))?;
    emit(value)
}

fn normalize_text(text: &str) -> String {
    // Going through `Recipe` first keeps text and structured input in the
    // same shape (bare `1.0` versions become strings on both paths).
    if let Ok(recipe) = Recipe::from_yaml(text) {
        if let Ok(canonical) = try_normalize_recipe(&recipe) {
            return canonical;
        }
    }

    match serde_yaml_ng::from_str::<Value>(text) {
        Ok(value) => emit(value).unwrap_or_else(|_| text.trim().to_string()),
        Err(e) => {
            debug!("Recipe text is not YAML, comparing textually: {}", e);
            text.trim().to_string()
        }
    }
}

fn emit(value: Value) -> Result<String> {
    serde_yaml_ng::to_string(&sort_keys(value))
        .map_err(|e| Error::SerializationFailure(e.to_string()))
}

/// Rebuild every mapping with its keys in sorted order.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (key, value) in entries {
                sorted.insert(key, sort_keys(value));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "name: tool\nversion: '1.0'\nbuild:\n  b: 2\n  a: 1\n";
    const B: &str = "version:    \"1.0\"\nbuild: {a: 1, b: 2}\nname: tool\n\n";

    #[test]
    fn test_key_order_and_whitespace_are_ignored() {
        assert_eq!(normalize(A), normalize(B));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for text in [A, B, "plain: [1, 2, {z: 1, y: 2}]\n"] {
            let once = normalize(text);
            let twice = normalize(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_recipe_and_its_text_agree() {
        let recipe = Recipe::from_yaml(B).unwrap();
        assert_eq!(normalize(&recipe), normalize(A));
    }

    #[test]
    fn test_keys_are_sorted() {
        let out = normalize("zeta: 1\nalpha: 2\nname: x\nversion: 1\n");
        let alpha = out.find("alpha").unwrap();
        let zeta = out.find("zeta").unwrap();
        assert!(alpha < zeta);
    }

    #[test]
    fn test_long_lines_are_not_wrapped() {
        let long = "word ".repeat(60);
        let text = format!("name: x\nversion: '1'\nreadme: \"{}\"\n", long.trim());
        let out = normalize(text.as_str());
        let readme_line = out.lines().find(|l| l.starts_with("readme")).unwrap();
        assert!(readme_line.len() > 250);
    }

    #[test]
    fn test_unparseable_text_falls_back_to_trimmed() {
        let broken = "  name: [unclosed\n";
        assert_eq!(normalize(broken), "name: [unclosed");
    }
}
