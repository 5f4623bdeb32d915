//! Exact-match alias table.

use std::{collections::HashMap, path::Path};

use serde::Deserialize;
use tracing::{info, warn};

use crate::base::types::Res;

use super::{ClassifiedIntent, IntentCategory, IntentSource};

/// The canonical action an alias stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AliasTarget {
    Remote,
    Office,
    Clear,
}

impl AliasTarget {
    fn category(&self) -> IntentCategory {
        match self {
            AliasTarget::Remote => IntentCategory::SetRemote,
            AliasTarget::Office => IntentCategory::SetOffice,
            AliasTarget::Clear => IntentCategory::NotWorking,
        }
    }
}

/// Case-insensitive token to action table.
#[derive(Debug, Clone)]
pub struct AliasTable {
    entries: HashMap<String, AliasTarget>,
}

impl Default for AliasTable {
    fn default() -> Self {
        let entries = [
            ("wfh", AliasTarget::Remote),
            ("home", AliasTarget::Remote),
            ("remote", AliasTarget::Remote),
            ("office", AliasTarget::Office),
            ("onsite", AliasTarget::Office),
            ("off", AliasTarget::Clear),
            ("clear", AliasTarget::Clear),
        ];

        Self {
            entries: entries.into_iter().map(|(token, target)| (token.to_string(), target)).collect(),
        }
    }
}

impl AliasTable {
    /// Builds a table from explicit entries.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, AliasTarget)>) -> Self {
        Self {
            entries: entries.into_iter().map(|(token, target)| (token.trim().to_lowercase(), target)).collect(),
        }
    }

    /// Loads the table from a JSON file, or uses the built-in entries.
    ///
    /// A missing or broken file is logged and the built-in entries are used.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match Self::read_file(path) {
            Ok(table) => {
                info!("Loaded {} aliases from `{}`.", table.entries.len(), path.display());
                table
            }
            Err(err) => {
                warn!("Failed to load aliases from `{}`, using defaults: {err}", path.display());
                Self::default()
            }
        }
    }

    fn read_file(path: &Path) -> Res<Self> {
        let contents = std::fs::read_to_string(path)?;
        let entries: HashMap<String, AliasTarget> = serde_json::from_str(&contents)?;

        if entries.is_empty() {
            return Err(anyhow::anyhow!("Alias file is empty."));
        }

        Ok(Self::from_entries(entries))
    }

    /// Resolves a whole message to an alias target.
    pub fn resolve(&self, text: &str) -> Option<AliasTarget> {
        let token = text.trim().trim_end_matches(['.', '!']).trim().to_lowercase();
        self.entries.get(&token).copied()
    }

    /// Classifies a message, if it is exactly an alias.
    pub fn classify(&self, text: &str) -> Option<ClassifiedIntent> {
        let target = self.resolve(text)?;

        Some(ClassifiedIntent::new(target.category(), 1.0, IntentSource::Alias, text, format!("Matched the alias `{}`.", text.trim())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_is_case_insensitive_and_exact() {
        let table = AliasTable::default();

        assert_eq!(table.resolve("WFH"), Some(AliasTarget::Remote));
        assert_eq!(table.resolve("wfh"), Some(AliasTarget::Remote));
        assert_eq!(table.resolve("  Office! "), Some(AliasTarget::Office));
        assert_eq!(table.resolve("wfhh"), None);
        assert_eq!(table.resolve("wfh today"), None);
    }

    #[test]
    fn test_classify_alias_has_full_confidence() {
        let intent = AliasTable::default().classify("off").unwrap();

        assert_eq!(intent.category, IntentCategory::NotWorking);
        assert_eq!(intent.confidence, 1.0);
        assert_eq!(intent.source, IntentSource::Alias);
    }

    #[test]
    fn test_load_falls_back_on_broken_file() {
        let path = std::env::temp_dir().join(format!("aliases-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, "{ not json").unwrap();

        let table = AliasTable::load(Some(&path));
        assert_eq!(table.resolve("onsite"), Some(AliasTarget::Office));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_custom_file() {
        let path = std::env::temp_dir().join(format!("aliases-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{"HQ": "office", "sick": "clear"}"#).unwrap();

        let table = AliasTable::load(Some(&path));
        assert_eq!(table.resolve("hq"), Some(AliasTarget::Office));
        assert_eq!(table.resolve("sick"), Some(AliasTarget::Clear));
        assert_eq!(table.resolve("wfh"), None);

        std::fs::remove_file(&path).unwrap();
    }
}
