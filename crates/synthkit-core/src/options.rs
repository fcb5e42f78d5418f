use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Options applied when a generator is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorOptions {
    /// Locale tag handed to rules through the random context.
    pub locale: String,
    /// Strict mode for rule sets without an explicit override.
    pub strict_mode: bool,
    /// Local seed; when absent the shared stream is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            locale: "en".to_string(),
            strict_mode: false,
            seed: None,
        }
    }
}

impl GeneratorOptions {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }
}
