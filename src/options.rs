//! Generation option normalization.
//!
//! Ollama clients send a loose `options` object. Only the sampling fields the
//! upstream dialect understands survive translation; every other field
//! (`num_ctx`, `num_gpu`, `mirostat`, ...) is collected in [`Options::extra`] and
//! dropped. Absent fields stay absent: nothing is defaulted here.
//!
//! | Ollama              | Upstream            |
//! |---------------------|---------------------|
//! | `temperature`       | `temperature`       |
//! | `top_p`             | `top_p`             |
//! | `top_k`             | `top_k`             |
//! | `num_predict`       | `max_tokens`        |
//! | `stop`              | `stop`              |
//! | `seed`              | `seed`              |
//! | `presence_penalty`  | `presence_penalty`  |
//! | `frequency_penalty` | `frequency_penalty` |

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Stop sequences: a single string or a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Stop {
    One(String),
    Many(Vec<String>),
}

impl Stop {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Stop::One(s) => vec![s],
            Stop::Many(v) => v,
        }
    }
}

/// Inbound (Ollama) generation options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Options {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Stop>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    /// Fields without an upstream counterpart.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Upstream (OpenAI) sampling parameters, flattened into the request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Stop>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
}

impl Options {
    /// Normalizes into upstream parameter names, dropping unsupported fields.
    pub fn to_upstream(&self) -> SamplingParams {
        if !self.extra.is_empty() {
            let dropped: Vec<&str> = self.extra.keys().map(String::as_str).collect();
            debug!(?dropped, "dropping options without an upstream equivalent");
        }
        // Ollama uses -1 / -2 for "unlimited" / "fill context".
        let max_tokens = self.num_predict.filter(|n| *n > 0);
        SamplingParams {
            temperature: self.temperature,
            top_p: self.top_p,
            top_k: self.top_k,
            max_tokens,
            stop: self.stop.clone(),
            seed: self.seed,
            presence_penalty: self.presence_penalty,
            frequency_penalty: self.frequency_penalty,
        }
    }
}

impl SamplingParams {
    /// The reverse direction, used when reporting effective options.
    pub fn to_options(&self) -> Options {
        Options {
            temperature: self.temperature,
            top_p: self.top_p,
            top_k: self.top_k,
            num_predict: self.max_tokens,
            stop: self.stop.clone(),
            seed: self.seed,
            presence_penalty: self.presence_penalty,
            frequency_penalty: self.frequency_penalty,
            extra: Map::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == SamplingParams::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalizes_and_drops_unknown() {
        let opts: Options = serde_json::from_value(json!({
            "temperature": 0.7,
            "num_predict": 128,
            "stop": "\n\n",
            "num_ctx": 4096,
            "mirostat": 2
        }))
        .unwrap();
        assert_eq!(opts.extra.len(), 2);

        let params = opts.to_upstream();
        let body = serde_json::to_value(&params).unwrap();
        assert_eq!(
            body,
            json!({"temperature": 0.7, "max_tokens": 128, "stop": "\n\n"})
        );
    }

    #[test]
    fn test_absent_fields_are_omitted() {
        let params = Options::default().to_upstream();
        assert!(params.is_empty());
        assert_eq!(serde_json::to_value(&params).unwrap(), json!({}));
    }

    #[test]
    fn test_negative_num_predict_is_unlimited() {
        let opts = Options {
            num_predict: Some(-1),
            ..Default::default()
        };
        assert_eq!(opts.to_upstream().max_tokens, None);
    }

    #[test]
    fn test_stop_list_and_reverse_direction() {
        let opts: Options =
            serde_json::from_value(json!({"stop": ["a", "b"], "seed": 42, "top_k": 40})).unwrap();
        let back = opts.to_upstream().to_options();
        assert_eq!(back.stop.clone().map(Stop::into_vec), Some(vec!["a".into(), "b".into()]));
        assert_eq!(back.seed, Some(42));
        assert_eq!(back.top_k, Some(40));
        assert!(back.extra.is_empty());
    }
}
