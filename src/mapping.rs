//! Model name mapping between the Ollama and upstream namespaces.
//!
//! The mapping is loaded once at startup and never mutated afterwards. Built-in
//! defaults are always present; entries from an optional JSON file override
//! them key by key. Names without an entry pass through unchanged in both
//! directions.
//!
//! ```rust
//! use ollama_openai_gateway::mapping::ModelMapping;
//!
//! let mapping = ModelMapping::with_overrides([("llama2", "gpt-3.5-turbo")]);
//! assert_eq!(mapping.map("llama2"), "gpt-3.5-turbo");
//! assert_eq!(mapping.reverse("gpt-3.5-turbo"), "llama2");
//! assert_eq!(mapping.map("phi3"), "phi3");
//! ```

use crate::{Error, ErrorContext, Result};
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info};

static DEFAULT_MAPPINGS: Lazy<BTreeMap<&'static str, &'static str>> = Lazy::new(|| {
    BTreeMap::from([
        ("llama2", "meta-llama/Llama-2-7b-chat-hf"),
        ("mistral", "mistralai/Mistral-7B-Instruct-v0.1"),
        ("codellama", "codellama/CodeLlama-7b-Instruct-hf"),
    ])
});

/// Immutable bidirectional model name lookup.
#[derive(Debug, Clone, Default)]
pub struct ModelMapping {
    forward: HashMap<String, String>,
    reverse: HashMap<String, String>,
}

impl ModelMapping {
    /// Built-in defaults only.
    pub fn defaults() -> Self {
        Self::with_overrides(std::iter::empty::<(String, String)>())
    }

    /// An empty mapping: every name is passed through.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Defaults overlaid with `custom`; custom entries win on conflict.
    pub fn with_overrides<I, K, V>(custom: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut merged: BTreeMap<String, String> = DEFAULT_MAPPINGS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        for (k, v) in custom {
            merged.insert(k.into(), v.into());
        }
        Self::from_entries(merged)
    }

    fn from_entries(entries: BTreeMap<String, String>) -> Self {
        let mut reverse = HashMap::with_capacity(entries.len());
        // BTreeMap order makes the inverse deterministic: the lexically first
        // inbound name wins when several share an upstream name.
        for (k, v) in &entries {
            if is_comment_key(k) {
                continue;
            }
            reverse.entry(v.clone()).or_insert_with(|| k.clone());
        }
        Self {
            forward: entries.into_iter().collect(),
            reverse,
        }
    }

    /// Loads defaults plus the JSON object at `path`, if any.
    ///
    /// Fails with [`Error::Configuration`] when the file is missing, is not a
    /// JSON object, or holds a non-string value under a regular key. Keys
    /// starting with `_` are treated as comments.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::defaults());
        };

        let ctx = || {
            ErrorContext::new()
                .with_field_path("MODEL_MAPPING_FILE")
                .with_details(path.display().to_string())
                .with_source("model_mapping")
        };

        if !path.exists() {
            return Err(Error::configuration_with_context(
                format!("Model mapping file not found: {}", path.display()),
                ctx(),
            ));
        }
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("Failed to read model mapping file: {}", e),
                ctx(),
            )
        })?;
        let value: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
            Error::configuration_with_context(
                format!("Invalid JSON in model mapping file: {}", e),
                ctx(),
            )
        })?;
        let serde_json::Value::Object(obj) = value else {
            return Err(Error::configuration_with_context(
                "Model mapping must be a JSON object",
                ctx(),
            ));
        };

        let mut custom = BTreeMap::new();
        for (k, v) in obj {
            if is_comment_key(&k) {
                continue;
            }
            match v {
                serde_json::Value::String(s) => {
                    custom.insert(k, s);
                }
                other => {
                    return Err(Error::configuration_with_context(
                        format!(
                            "Invalid mapping entry '{}': {}. Both must be strings",
                            k, other
                        ),
                        ctx(),
                    ))
                }
            }
        }

        info!(
            path = %path.display(),
            custom = custom.len(),
            "loaded model mapping"
        );
        Ok(Self::with_overrides(custom))
    }

    /// Inbound → upstream name.
    pub fn map<'a>(&'a self, name: &'a str) -> &'a str {
        match self.forward.get(name) {
            Some(mapped) => {
                debug!(from = name, to = %mapped, "mapped model name");
                mapped
            }
            None => name,
        }
    }

    /// Upstream → inbound name.
    pub fn reverse<'a>(&'a self, name: &'a str) -> &'a str {
        self.reverse.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.forward.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn is_comment_key(key: &str) -> bool {
    key.starts_with('_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_present() {
        let m = ModelMapping::defaults();
        assert_eq!(m.map("llama2"), "meta-llama/Llama-2-7b-chat-hf");
        assert_eq!(m.reverse("mistralai/Mistral-7B-Instruct-v0.1"), "mistral");
    }

    #[test]
    fn test_identity_passthrough() {
        let m = ModelMapping::defaults();
        for name in ["gpt-4o", "", "qwen2:7b"] {
            assert_eq!(m.map(name), name);
            assert_eq!(m.reverse(name), name);
        }
        let empty = ModelMapping::identity();
        assert_eq!(empty.map("llama2"), "llama2");
    }

    #[test]
    fn test_custom_wins_and_defaults_fill_gaps() {
        let m = ModelMapping::with_overrides([("llama2", "gpt-3.5-turbo")]);
        assert_eq!(m.map("llama2"), "gpt-3.5-turbo");
        assert_eq!(m.map("mistral"), "mistralai/Mistral-7B-Instruct-v0.1");
        assert_eq!(m.reverse("gpt-3.5-turbo"), "llama2");
        // The replaced default target no longer reverse-maps.
        assert_eq!(
            m.reverse("meta-llama/Llama-2-7b-chat-hf"),
            "meta-llama/Llama-2-7b-chat-hf"
        );
    }

    #[test]
    fn test_load_none_gives_defaults() {
        let m = ModelMapping::load(None).unwrap();
        assert_eq!(m.len(), 3);
    }
}
