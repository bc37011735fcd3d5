//! Configuration loading with env-var overrides.
//!
//! Reads TOML files, supports `[meta] base = "..."` inheritance chains,
//! and applies the [`Overrides`] collected from the environment.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::AppError;

use super::raw::RawConfig;
use super::types::*;

/// Deep-merge two TOML values.
/// Tables are merged recursively; any other overlay value replaces the base
/// value wholesale.
fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_tbl), toml::Value::Table(overlay_tbl)) => {
            for (key, ov_val) in overlay_tbl {
                let merged = match base_tbl.remove(&key) {
                    Some(base_val) => merge_toml(base_val, ov_val),
                    None => ov_val,
                };
                base_tbl.insert(key, merged);
            }
            toml::Value::Table(base_tbl)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file, follow any `[meta] base` chain, and return the merged
/// value. `visited` holds canonical paths already seen in this chain.
fn load_raw_merged(path: &Path, visited: &mut HashSet<PathBuf>) -> Result<toml::Value, AppError> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical) {
        return Err(AppError::Config(format!(
            "circular base reference detected at: {}",
            path.display()
        )));
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let overlay_val: toml::Value = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    if let Some(base_str) = overlay_val
        .get("meta")
        .and_then(|m| m.get("base"))
        .and_then(|b| b.as_str())
    {
        let base_path = if Path::new(base_str).is_absolute() {
            PathBuf::from(base_str)
        } else {
            path.parent().unwrap_or(Path::new(".")).join(base_str)
        };
        let base_val = load_raw_merged(&base_path, visited)?;
        Ok(merge_toml(base_val, overlay_val))
    } else {
        Ok(overlay_val)
    }
}

/// Load config from the given path, or `config/default.toml`, then apply
/// environment overrides. When no path is given and the default file does not
/// exist, the built-in defaults are used.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let overrides = Overrides::from_env();

    if let Some(path) = config_path {
        return load_from(Path::new(path), &overrides);
    }

    let default_path = Path::new("config/default.toml");
    if default_path.exists() {
        load_from(default_path, &overrides)
    } else {
        Ok(resolve(RawConfig::default(), &overrides))
    }
}

/// Built-in configuration with the given overrides applied.
pub fn builtin(overrides: &Overrides) -> Config {
    resolve(RawConfig::default(), overrides)
}

/// Load a specific file. Tests pass overrides directly instead of mutating
/// env vars.
pub fn load_from(path: &Path, overrides: &Overrides) -> Result<Config, AppError> {
    let merged_val = load_raw_merged(path, &mut HashSet::new())?;

    let parsed: RawConfig = Deserialize::deserialize(merged_val).map_err(|e: toml::de::Error| {
        AppError::Config(format!("config error in {}: {e}", path.display()))
    })?;

    let cfg = resolve(parsed, overrides);
    validate(&cfg)?;
    Ok(cfg)
}

fn resolve(parsed: RawConfig, ov: &Overrides) -> Config {
    let s = parsed.server;

    let work_dir = expand_home(ov.work_dir.as_deref().unwrap_or(&s.work_dir));
    let log_level = ov.log_level.clone().unwrap_or(s.log_level);
    let log_file = s.log_file.map(|f| {
        let p = expand_home(&f);
        if p.is_absolute() { p } else { work_dir.join(p) }
    });

    let bind = match (&ov.bind, &ov.port) {
        (Some(bind), _) => bind.clone(),
        (None, Some(port)) => format!("0.0.0.0:{port}"),
        (None, None) => parsed.http.bind,
    };

    let prefer_local = ov
        .prefer_local
        .as_deref()
        .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no"))
        .unwrap_or(true);

    let ollama = parsed.llm.ollama;
    let openai = parsed.llm.openai;

    Config {
        name: s.name,
        work_dir,
        log_level,
        log_file,
        http: HttpConfig {
            enabled: parsed.http.enabled,
            bind,
            cors: parsed.http.cors,
            static_dir: parsed.http.static_dir.map(PathBuf::from),
        },
        store: StoreConfig {
            db_file: parsed.store.db_file,
            seed_defaults: parsed.store.seed_defaults,
        },
        engine: EngineConfig {
            max_context: parsed.engine.max_context.max(1),
            fallback_reply: parsed.engine.fallback_reply,
            builtin_fallback: parsed.engine.builtin_fallback,
        },
        assistant: AssistantConfig {
            history_limit: parsed.assistant.history_limit,
            context_messages: parsed.assistant.context_messages,
            knowledge_limit: parsed.assistant.knowledge_limit,
            chain: parsed
                .assistant
                .chain
                .into_iter()
                .map(|name| name.trim().to_ascii_lowercase())
                .collect(),
            fallback: parsed.assistant.fallback,
            prompts_dir: PathBuf::from(parsed.assistant.prompts_dir),
        },
        llm: LlmConfig {
            ollama: OllamaConfig {
                base_url: ov.ollama_url.clone().unwrap_or(ollama.base_url),
                model: ov.ollama_model.clone().unwrap_or(ollama.model),
                temperature: ollama.temperature,
                top_p: ollama.top_p,
                max_tokens: ollama.max_tokens,
                timeout_seconds: ollama.timeout_seconds,
            },
            openai: OpenAiConfig {
                api_base_url: openai.api_base_url,
                model: ov.openai_model.clone().unwrap_or(openai.model),
                temperature: openai.temperature,
                max_tokens: openai.max_tokens,
                timeout_seconds: openai.timeout_seconds,
            },
            openai_api_key: ov.openai_api_key.clone(),
            prefer_local,
        },
    }
}

fn validate(cfg: &Config) -> Result<(), AppError> {
    if cfg.store.db_file.trim().is_empty() {
        return Err(AppError::Config("store.db_file must not be empty".into()));
    }
    if cfg.http.bind.trim().is_empty() {
        return Err(AppError::Config("http.bind must not be empty".into()));
    }
    Ok(())
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
