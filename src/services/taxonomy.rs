use crate::error::Error;
use serde::Deserialize;

/// Synonym and category tables, loaded as data so they can be extended or
/// replaced without touching the aggregation algorithm.
///
/// Entry order is significant: synonym folding returns the first matching
/// group, and category ties between equally long keywords keep the earlier
/// table entry.
#[derive(Debug, Clone, Deserialize)]
pub struct Taxonomy {
    synonyms: Vec<SynonymGroup>,
    generic_terms: Vec<String>,
    categories: Vec<Category>,
}

#[derive(Debug, Clone, Deserialize)]
struct SynonymGroup {
    key: String,
    terms: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Category {
    name: String,
    #[serde(default)]
    items: Vec<String>,
    #[serde(default)]
    subcategories: Vec<Subcategory>,
}

#[derive(Debug, Clone, Deserialize)]
struct Subcategory {
    name: String,
    items: Vec<String>,
}

const BUILTIN_TABLES: &str = include_str!("../../assets/taxonomy.json");

impl Taxonomy {
    /// The tables shipped with the crate.
    pub fn builtin() -> Self {
        serde_json::from_str(BUILTIN_TABLES).expect("builtin taxonomy tables are valid JSON")
    }

    /// Load replacement tables from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// Canonical grouping key for a label: the key of the first synonym group
    /// containing a term of the label, otherwise the lowercased, trimmed
    /// label itself.
    pub fn semantic_key(&self, label: &str) -> String {
        let normalized = label.to_lowercase().trim().to_string();
        for group in &self.synonyms {
            if group.terms.iter().any(|term| normalized.contains(term)) {
                return group.key.clone();
            }
        }
        normalized
    }

    /// Category for a label via keyword membership. The longest matching
    /// keyword wins; subcategory matches yield `main-sub`; unmatched labels
    /// fall into `general`. Total over all strings.
    pub fn categorize(&self, label: &str) -> String {
        let lower = label.to_lowercase();
        let mut best: Option<(usize, String)> = None;

        let mut consider = |keyword: &str, category: String| {
            if lower.contains(keyword) {
                let better = match &best {
                    Some((len, _)) => keyword.len() > *len,
                    None => true,
                };
                if better {
                    best = Some((keyword.len(), category));
                }
            }
        };

        for category in &self.categories {
            for sub in &category.subcategories {
                for item in &sub.items {
                    consider(item, format!("{}-{}", category.name, sub.name));
                }
            }
            for item in &category.items {
                consider(item, category.name.clone());
            }
        }

        best.map(|(_, category)| category)
            .unwrap_or_else(|| "general".to_string())
    }

    /// True when the label contains one of the generic terms that should not
    /// be used as a display name ("object", "thing", ...).
    pub fn is_generic(&self, label: &str) -> bool {
        let lower = label.to_lowercase();
        self.generic_terms.iter().any(|term| lower.contains(term))
    }
}

/// Normalize a raw model class name for display: keep the text before the
/// first comma, turn hyphens into spaces, break camelCase, Title Case words.
pub fn format_label(raw: &str) -> String {
    let first = raw.split(',').next().unwrap_or(raw);
    let spaced = first.replace('-', " ");

    let mut broken = String::with_capacity(spaced.len() + 4);
    let mut prev_lower = false;
    for c in spaced.chars() {
        if c.is_uppercase() && prev_lower {
            broken.push(' ');
        }
        prev_lower = c.is_lowercase();
        broken.push(c);
    }

    broken
        .to_lowercase()
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(f) => f.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synonyms_fold_to_one_key() {
        let tax = Taxonomy::builtin();
        assert_eq!(tax.semantic_key("dog"), "dog");
        assert_eq!(tax.semantic_key("Puppy"), "dog");
        assert_eq!(tax.semantic_key("basset hound"), "dog");
        assert_eq!(tax.semantic_key("Kitten"), "cat");
    }

    #[test]
    fn unknown_label_keys_to_itself() {
        let tax = Taxonomy::builtin();
        assert_eq!(tax.semantic_key("  Espresso Machine "), "espresso machine");
    }

    #[test]
    fn categorize_matches_subcategories() {
        let tax = Taxonomy::builtin();
        assert_eq!(tax.categorize("dog"), "animals-mammals");
        assert_eq!(tax.categorize("Golden Eagle"), "animals-birds");
        assert_eq!(tax.categorize("laptop"), "technology");
        assert_eq!(tax.categorize("xyzzy"), "general");
    }

    #[test]
    fn longest_keyword_wins() {
        let tax = Taxonomy::builtin();
        // "table" (furniture) vs the longer "tennis" (sports)
        assert_eq!(tax.categorize("table tennis"), "sports");
    }

    #[test]
    fn equal_length_ties_keep_table_order() {
        let tax = Taxonomy::builtin();
        // "mouse" appears in animals-mammals and technology; animals is first
        assert_eq!(tax.categorize("mouse"), "animals-mammals");
    }

    #[test]
    fn generic_terms() {
        let tax = Taxonomy::builtin();
        assert!(tax.is_generic("small object"));
        assert!(!tax.is_generic("labrador"));
    }

    #[test]
    fn label_formatting() {
        assert_eq!(format_label("Labrador retriever, golden"), "Labrador Retriever");
        assert_eq!(format_label("ice-cream"), "Ice Cream");
        assert_eq!(format_label("policeCar"), "Police Car");
        assert_eq!(format_label("TV"), "Tv");
    }

    #[test]
    fn tables_load_from_json() {
        let tax = Taxonomy::from_json(
            r#"{"synonyms":[{"key":"pup","terms":["pup"]}],"generic_terms":[],"categories":[]}"#,
        )
        .unwrap();
        assert_eq!(tax.semantic_key("puppy"), "pup");
        assert_eq!(tax.categorize("puppy"), "general");
    }
}
