//! Normalise layer names into unique SQL-safe identifiers.
//!
//! Layer names come straight from the service catalog and frequently repeat
//! across folders ("Confini", "confini (2)"). Each discovery run owns one
//! [`LayerNameRegistry`]; every resolved name is reserved in it so later
//! layers with the same base receive a numeric suffix.

use std::collections::{HashMap, HashSet};

/// Name used when normalisation leaves nothing behind.
pub const FALLBACK_LAYER_NAME: &str = "layer";

/// Normalise a raw layer name.
///
/// Trims and lowercases the input, drops parentheses, commas and semicolons,
/// collapses whitespace runs, turns spaces and hyphens into underscores and
/// collapses repeated underscores. Applying the function twice yields the
/// same result as applying it once.
///
/// # Examples
///
/// ```
/// use mapharvest_core::normalise_layer_name;
///
/// assert_eq!(normalise_layer_name("  Aree  Protette - (2010) "), "aree_protette_2010");
/// ```
#[must_use]
pub fn normalise_layer_name(raw: &str) -> String {
    let stripped: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .filter(|ch| !matches!(ch, '(' | ')' | ',' | ';'))
        .collect();
    let spaced = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut normalised = String::with_capacity(spaced.len());
    for ch in spaced.chars() {
        let ch = if matches!(ch, ' ' | '-') { '_' } else { ch };
        if ch == '_' && normalised.ends_with('_') {
            continue;
        }
        normalised.push(ch);
    }
    normalised
}

/// Registry of layer names reserved during one discovery run.
#[derive(Debug, Clone, Default)]
pub struct LayerNameRegistry {
    reserved: HashSet<String>,
    collisions: HashMap<String, u32>,
}

impl LayerNameRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalise `raw` and reserve a unique name derived from it.
    ///
    /// The first use of a base name returns it unchanged. Later uses append
    /// the smallest integer, counting from 1, that yields a name not already
    /// reserved.
    ///
    /// # Examples
    ///
    /// ```
    /// use mapharvest_core::LayerNameRegistry;
    ///
    /// let mut registry = LayerNameRegistry::new();
    /// assert_eq!(registry.resolve("Strade"), "strade");
    /// assert_eq!(registry.resolve("strade"), "strade1");
    /// assert_eq!(registry.resolve("STRADE "), "strade2");
    /// ```
    pub fn resolve(&mut self, raw: &str) -> String {
        let mut base = normalise_layer_name(raw);
        if base.is_empty() {
            base = FALLBACK_LAYER_NAME.to_owned();
        }
        if self.reserved.insert(base.clone()) {
            return base;
        }

        let counter = self.collisions.entry(base.clone()).or_insert(0);
        // The reserved set is finite, so some suffix is always free.
        loop {
            *counter += 1;
            let candidate = format!("{base}{counter}");
            if self.reserved.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    /// Whether `name` has already been handed out.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.reserved.contains(name)
    }

    /// Number of names reserved so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reserved.len()
    }

    /// Whether no name has been reserved yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reserved.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("Strade", "strade")]
    #[case("  Uso del suolo  ", "uso_del_suolo")]
    #[case("Carta-Tecnica  Regionale", "carta_tecnica_regionale")]
    #[case("Limiti (comunali), 2012; agg.", "limiti_comunali_2012_agg.")]
    #[case("a -- b", "a_b")]
    #[case("a__b", "a_b")]
    #[case("confini (", "confini")]
    fn normalises_names(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalise_layer_name(raw), expected);
    }

    #[rstest]
    fn suffixes_skip_names_already_taken() {
        let mut registry = LayerNameRegistry::new();
        assert_eq!(registry.resolve("fiumi1"), "fiumi1");
        assert_eq!(registry.resolve("Fiumi"), "fiumi");
        assert_eq!(registry.resolve("fiumi"), "fiumi2");
        assert_eq!(registry.resolve("fiumi"), "fiumi3");
        assert_eq!(registry.len(), 4);
    }

    #[rstest]
    fn empty_names_fall_back() {
        let mut registry = LayerNameRegistry::new();
        assert_eq!(registry.resolve("()"), FALLBACK_LAYER_NAME);
        assert_eq!(registry.resolve("  "), "layer1");
    }

    proptest! {
        #[test]
        fn resolved_names_are_pairwise_distinct(
            names in prop::collection::vec("[ a-zA-Z0-9_();,-]{0,12}", 0..40)
        ) {
            let mut registry = LayerNameRegistry::new();
            let resolved: Vec<String> = names.iter().map(|name| registry.resolve(name)).collect();
            let unique: HashSet<&String> = resolved.iter().collect();
            prop_assert_eq!(unique.len(), resolved.len());
        }

        #[test]
        fn normalisation_is_idempotent(raw in "[ \\ta-zA-Z0-9_();,.àèéìòùÀÈ-]{0,24}") {
            let once = normalise_layer_name(&raw);
            prop_assert_eq!(normalise_layer_name(&once), once.clone());
        }

        #[test]
        fn normalised_unused_names_resolve_to_themselves(raw in "[a-zA-Z][ a-zA-Z0-9-]{0,12}") {
            let normalised = normalise_layer_name(&raw);
            let mut from_raw = LayerNameRegistry::new();
            let mut from_normalised = LayerNameRegistry::new();
            prop_assert_eq!(from_normalised.resolve(&normalised), from_raw.resolve(&raw));
        }
    }
}
