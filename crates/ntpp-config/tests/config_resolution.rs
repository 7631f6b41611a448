//! Config loading and resolution against real files.
//!
//! Covers:
//! - JSON and TOML loading through `ModelConfig::from_file`
//! - Resolution order (explicit > NTPP_CONFIG > NTPP_CONFIG_DIR)
//! - Fail-fast rejection of unknown kinds

use ntpp_config::resolve::{resolve_config, ConfigSource, ENV_CONFIG_DIR, ENV_CONFIG_PATH};
use ntpp_config::{DecoderKind, EncoderKind, HeadKind, ModelConfig, ValidationError};
use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};
use tempfile::TempDir;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

struct EnvGuard {
    keys: Vec<String>,
    saved: Vec<Option<String>>,
}

impl EnvGuard {
    fn new(keys: &[&str]) -> Self {
        let mut saved = Vec::with_capacity(keys.len());
        for key in keys {
            saved.push(env::var(key).ok());
            env::remove_var(key);
        }
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            saved,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in self.keys.iter().zip(&self.saved) {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}

#[test]
fn loads_toml_and_json_files() {
    let dir = TempDir::new().expect("tempdir");

    let toml_path = dir.path().join("model.toml");
    fs::write(
        &toml_path,
        "encoder = \"lstm\"\ndecoder = \"transformer\"\nnum_components = 3\n",
    )
    .expect("write toml");
    let config = ModelConfig::from_file(&toml_path).expect("toml config");
    assert_eq!(config.encoder, EncoderKind::Lstm);
    assert_eq!(config.decoder, DecoderKind::Transformer);
    assert_eq!(config.raw_output_width(), 9);

    let json_path = dir.path().join("model.json");
    fs::write(&json_path, r#"{"head": "point", "lookback": 3}"#).expect("write json");
    let config = ModelConfig::from_file(&json_path).expect("json config");
    assert_eq!(config.head, HeadKind::Point);
    assert_eq!(config.lookback, 3);
}

#[test]
fn invalid_values_surface_as_validation_errors() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("model.json");
    fs::write(&path, r#"{"num_components": 0}"#).expect("write json");
    let err = ModelConfig::from_file(&path).unwrap_err();
    assert!(matches!(err, ValidationError::InvalidValue { .. }));

    fs::write(&path, r#"{"decoder": "lstm"}"#).expect("write json");
    let err = ModelConfig::from_file(&path).unwrap_err();
    assert!(err.to_string().contains("unknown decoder kind"));
}

#[test]
fn resolution_order() {
    let _lock = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    let _guard = EnvGuard::new(&[ENV_CONFIG_PATH, ENV_CONFIG_DIR]);

    let dir = TempDir::new().expect("tempdir");
    let explicit = dir.path().join("explicit.json");
    fs::write(&explicit, r#"{"num_components": 2}"#).expect("write explicit");
    let env_file = dir.path().join("env.json");
    fs::write(&env_file, r#"{"num_components": 5}"#).expect("write env");
    let conf_dir = dir.path().join("confdir");
    fs::create_dir(&conf_dir).expect("mkdir");
    fs::write(conf_dir.join("model.toml"), "num_components = 7\n").expect("write dir");

    env::set_var(ENV_CONFIG_PATH, &env_file);
    env::set_var(ENV_CONFIG_DIR, &conf_dir);

    let resolved = resolve_config(Some(&explicit)).expect("explicit");
    assert_eq!(resolved.source, ConfigSource::Explicit);
    assert_eq!(resolved.config.num_components, 2);

    let resolved = resolve_config(None).expect("env path");
    assert_eq!(resolved.source, ConfigSource::Environment);
    assert_eq!(resolved.config.num_components, 5);

    env::remove_var(ENV_CONFIG_PATH);
    let resolved = resolve_config(None).expect("env dir");
    assert_eq!(resolved.source, ConfigSource::Environment);
    assert_eq!(resolved.config.num_components, 7);
}
