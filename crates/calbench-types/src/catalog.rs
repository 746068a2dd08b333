//! Catalog of known model codes per sensor family.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::types::{ModelFamily, UNSPECIFIED};

/// Known model codes for each canonical family.
///
/// Used to flag headers that name a model the production line does not
/// build. An unknown model is only ever a warning.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ModelCatalog {
    /// Models of the ЭнИ-100 family.
    pub eni100: Vec<String>,
    /// Models of the ЭнИ-12 family.
    pub eni12: Vec<String>,
    /// Models of the ЭнИ-12М family.
    pub eni12m: Vec<String>,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        fn codes(list: &[&str]) -> Vec<String> {
            list.iter().map(|s| s.to_string()).collect()
        }
        Self {
            eni100: codes(&["ДИ", "ДА", "ДВ", "ДИВ", "ДД", "ДГ"]),
            eni12: codes(&["ДИ", "ДА", "ДВ", "ДИВ"]),
            eni12m: codes(&["ДИ", "ДА", "ДВ", "ДИВ", "ДД"]),
        }
    }
}

impl ModelCatalog {
    /// Catalog with no entries. Every known-family model is then reported.
    pub fn empty() -> Self {
        Self {
            eni100: Vec::new(),
            eni12: Vec::new(),
            eni12m: Vec::new(),
        }
    }

    /// Models listed for a family. Unknown families have none.
    pub fn models(&self, family: ModelFamily) -> &[String] {
        match family {
            ModelFamily::EnI100 => &self.eni100,
            ModelFamily::EnI12 => &self.eni12,
            ModelFamily::EnI12M => &self.eni12m,
            ModelFamily::Unknown => &[],
        }
    }

    /// Whether a model should be reported as non-standard.
    ///
    /// Only families the catalog knows are checked, and an unspecified
    /// model (`-`) is reported elsewhere as an incomplete header.
    pub fn is_nonstandard(&self, family: ModelFamily, model: &str) -> bool {
        if family == ModelFamily::Unknown || model == UNSPECIFIED {
            return false;
        }
        !self.models(family).iter().any(|m| m == model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_knows_common_models() {
        let catalog = ModelCatalog::default();
        assert!(!catalog.is_nonstandard(ModelFamily::EnI100, "ДИ"));
        assert!(!catalog.is_nonstandard(ModelFamily::EnI12M, "ДД"));
        assert!(catalog.is_nonstandard(ModelFamily::EnI12, "ДД"));
    }

    #[test]
    fn test_unknown_family_never_flagged() {
        let catalog = ModelCatalog::empty();
        assert!(!catalog.is_nonstandard(ModelFamily::Unknown, "anything"));
    }

    #[test]
    fn test_unspecified_model_not_flagged() {
        let catalog = ModelCatalog::empty();
        assert!(!catalog.is_nonstandard(ModelFamily::EnI100, UNSPECIFIED));
        assert!(catalog.is_nonstandard(ModelFamily::EnI100, "ДИ"));
    }

    #[test]
    fn test_catalog_deserializes_partial_toml_shape() {
        let json = r#"{"eni100":["X1"]}"#;
        let catalog: ModelCatalog = serde_json::from_str(json).unwrap();
        assert_eq!(catalog.eni100, vec!["X1".to_string()]);
        // Missing families fall back to the defaults
        assert_eq!(catalog.eni12, ModelCatalog::default().eni12);
    }
}
