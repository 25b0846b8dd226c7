//! Loading model mappings from files.

use ollama_openai_gateway::config::GatewayConfig;
use ollama_openai_gateway::mapping::ModelMapping;
use ollama_openai_gateway::Error;
use std::io::Write;
use tempfile::NamedTempFile;

fn mapping_file(contents: &str) -> NamedTempFile {
    let mut f = NamedTempFile::new().unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    f
}

#[test]
fn test_custom_entries_override_defaults_and_keep_the_rest() {
    let f = mapping_file(
        r#"{
            "_comment": "local overrides",
            "llama2": "gpt-3.5-turbo",
            "phi3": "microsoft/phi-3-mini"
        }"#,
    );
    let mapping = ModelMapping::load(Some(f.path())).unwrap();

    assert_eq!(mapping.map("llama2"), "gpt-3.5-turbo");
    assert_eq!(mapping.map("phi3"), "microsoft/phi-3-mini");
    assert_eq!(mapping.map("mistral"), "mistralai/Mistral-7B-Instruct-v0.1");
    assert_eq!(mapping.reverse("gpt-3.5-turbo"), "llama2");
    assert_eq!(mapping.map("_comment"), "_comment");
}

#[test]
fn test_unmapped_names_pass_through() {
    let mapping = ModelMapping::load(None).unwrap();
    for name in ["qwen2:7b", "", "gpt-4o"] {
        assert_eq!(mapping.map(name), name);
        assert_eq!(mapping.reverse(name), name);
    }
}

#[test]
fn test_malformed_sources_fail_fast() {
    let cases = [
        ("[1, 2]", "JSON object"),
        ("{not json", "Invalid JSON"),
        (r#"{"llama2": 7}"#, "Both must be strings"),
    ];
    for (contents, expected) in cases {
        let f = mapping_file(contents);
        let err = ModelMapping::load(Some(f.path())).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }), "{contents}");
        assert!(err.to_string().contains(expected), "{err}");
        assert_eq!(err.context().unwrap().field_path.as_deref(), Some("MODEL_MAPPING_FILE"));
    }
}

#[test]
fn test_missing_file_is_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ModelMapping::load(Some(&dir.path().join("absent.json"))).unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn test_config_carries_mapping_path() {
    let f = mapping_file(r#"{"llama2": "gpt-4"}"#);
    let cfg = GatewayConfig::new("http://localhost:8000", "sk-test")
        .unwrap()
        .with_model_mapping_file(f.path());
    let mapping = ModelMapping::load(cfg.model_mapping_file.as_deref()).unwrap();
    assert_eq!(mapping.map("llama2"), "gpt-4");
}
