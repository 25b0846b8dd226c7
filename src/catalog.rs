//! Read-only view of the upstream model catalog in Ollama shape.

use crate::translate::DynChatTranslator;
use crate::types::{
    ModelDetails, ModelList, ModelObject, ModelTag, ShowRequest, ShowResponse, TagsResponse,
    VersionResponse,
};
use crate::{Error, Result};
use chrono::{TimeZone, Utc};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::debug;

const UPSTREAM_FORMAT: &str = "openai";
const UNKNOWN: &str = "unknown";
const DEFAULT_TAG: &str = ":latest";

/// Builds `/api/tags`, `/api/show` and `/api/version` answers from the
/// upstream `/models` list. Names go through the same translator contract as
/// requests, so listings agree with what `/api/chat` accepts.
#[derive(Clone)]
pub struct ModelCatalog {
    translator: DynChatTranslator,
}

impl ModelCatalog {
    pub fn new(translator: DynChatTranslator) -> Self {
        Self { translator }
    }

    pub fn tags(&self, list: &ModelList) -> TagsResponse {
        let models = list
            .data
            .iter()
            .map(|m| {
                let name = self.translator.reverse_map_model_name(&m.id);
                ModelTag {
                    model: name.clone(),
                    name,
                    modified_at: modified_at(m),
                    size: 0,
                    digest: digest(&m.id),
                    details: details(m),
                }
            })
            .collect();
        TagsResponse { models }
    }

    /// Finds `request.model` (inbound name, optionally tagged `:latest`) in the list.
    pub fn show(&self, list: &ModelList, request: &ShowRequest) -> Result<ShowResponse> {
        let wanted = request.model.trim();
        let bare = wanted.strip_suffix(DEFAULT_TAG).unwrap_or(wanted);
        let found = [wanted, bare].iter().find_map(|name| {
            let upstream = self.translator.map_model_name(name);
            list.data.iter().find(|m| m.id == upstream)
        });

        let Some(m) = found else {
            debug!(model = wanted, "model not present in upstream catalog");
            return Err(Error::ModelNotFound {
                model: wanted.to_string(),
            });
        };

        let details = details(m);
        Ok(ShowResponse {
            modelfile: format!("FROM {}\n", m.id),
            parameters: String::new(),
            template: "{{ .Prompt }}".to_string(),
            model_info: json!({
                "general.architecture": details.family,
                "upstream.id": m.id,
                "upstream.owned_by": m.owned_by,
            }),
            details,
            modified_at: modified_at(m),
        })
    }

    pub fn version() -> VersionResponse {
        VersionResponse {
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// `sha256:<hex>` of the upstream id; stable across calls.
pub fn digest(id: &str) -> String {
    format!("sha256:{:x}", Sha256::digest(id.as_bytes()))
}

/// `owned_by`, else the id's organisation prefix, else `unknown`.
pub fn family(m: &ModelObject) -> String {
    if let Some(owner) = m.owned_by.as_deref().filter(|o| !o.is_empty()) {
        return owner.to_string();
    }
    match m.id.split_once('/') {
        Some((prefix, _)) if !prefix.is_empty() => prefix.to_string(),
        _ => UNKNOWN.to_string(),
    }
}

fn details(m: &ModelObject) -> ModelDetails {
    let family = family(m);
    ModelDetails {
        format: UPSTREAM_FORMAT.to_string(),
        families: Some(vec![family.clone()]),
        family,
        parameter_size: String::new(),
        quantization_level: String::new(),
    }
}

fn modified_at(m: &ModelObject) -> String {
    Utc.timestamp_opt(m.created, 0)
        .single()
        .filter(|_| m.created > 0)
        .unwrap_or_else(Utc::now)
        .to_rfc3339()
}
