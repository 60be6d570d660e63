//! # Translated Strings
//!
//! Attribute values and request labels are rendered per language. The wire
//! form is a JSON object keyed by language tag, with `""` carrying the
//! untranslated fallback.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A string with per-language renderings.
///
/// Serialized as `{"": v, "en": v, "nl": v}`. Lookups fall back to the
/// untranslated entry when the requested language is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TranslatedString(BTreeMap<String, String>);

impl TranslatedString {
    /// Build a translated string carrying `value` for the fallback and the
    /// two stock languages.
    pub fn uniform(value: impl Into<String>) -> Self {
        let value = value.into();
        let mut map = BTreeMap::new();
        map.insert(String::new(), value.clone());
        map.insert("en".to_string(), value.clone());
        map.insert("nl".to_string(), value);
        Self(map)
    }

    /// Look up the rendering for `lang`, falling back to the untranslated
    /// entry.
    pub fn translation(&self, lang: &str) -> Option<&str> {
        self.0
            .get(lang)
            .or_else(|| self.0.get(""))
            .map(String::as_str)
    }

    /// Insert or replace the rendering for `lang`.
    pub fn set(&mut self, lang: impl Into<String>, value: impl Into<String>) {
        self.0.insert(lang.into(), value.into());
    }
}
