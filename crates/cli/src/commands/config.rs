use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;
use serde_json::json;
use toml::Value;

use crate::commands::{load_config, CommandResult};

#[derive(Debug, Serialize)]
struct ConfigEntry {
    key: &'static str,
    value: String,
    source: String,
}

/// Effective configuration with the layer each value came from
/// (env > file > default).
pub fn run() -> CommandResult {
    let config = match load_config() {
        Ok(config) => config,
        Err(failure) => return failure.into_result("config", "unassigned"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = match load_config_file_doc(config_file_path.as_deref()) {
        Ok(doc) => doc,
        Err(error) => {
            return CommandResult::failure("config", "config_validation", format!("{error:#}"), 2)
        }
    };
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let entries = vec![
        ConfigEntry {
            key: "database.url",
            value: config.database.url.clone(),
            source: source("database.url", &["TRIPFLOW_DATABASE_URL"]),
        },
        ConfigEntry {
            key: "database.max_connections",
            value: config.database.max_connections.to_string(),
            source: source("database.max_connections", &["TRIPFLOW_DATABASE_MAX_CONNECTIONS"]),
        },
        ConfigEntry {
            key: "database.timeout_secs",
            value: config.database.timeout_secs.to_string(),
            source: source("database.timeout_secs", &["TRIPFLOW_DATABASE_TIMEOUT_SECS"]),
        },
        ConfigEntry {
            key: "logging.level",
            value: config.logging.level.clone(),
            source: source("logging.level", &["TRIPFLOW_LOGGING_LEVEL", "TRIPFLOW_LOG_LEVEL"]),
        },
        ConfigEntry {
            key: "logging.format",
            value: format!("{:?}", config.logging.format).to_lowercase(),
            source: source("logging.format", &["TRIPFLOW_LOGGING_FORMAT", "TRIPFLOW_LOG_FORMAT"]),
        },
        ConfigEntry {
            key: "workflow.max_reason_length",
            value: config.workflow.max_reason_length.to_string(),
            source: source(
                "workflow.max_reason_length",
                &["TRIPFLOW_WORKFLOW_MAX_REASON_LENGTH"],
            ),
        },
        ConfigEntry {
            key: "workflow.list_limit",
            value: config.workflow.list_limit.to_string(),
            source: source("workflow.list_limit", &["TRIPFLOW_WORKFLOW_LIST_LIMIT"]),
        },
    ];

    let message = entries
        .iter()
        .map(|entry| format!("- {} = {} (source: {})", entry.key, entry.value, entry.source))
        .collect::<Vec<_>>()
        .join("\n");
    CommandResult::success_with_data(
        "config",
        format!("effective config (source precedence: env > file > default):\n{message}"),
        None,
        json!({ "entries": entries }),
    )
}

fn detect_config_path() -> Option<PathBuf> {
    ["tripflow.toml", "config/tripflow.toml"].into_iter().map(PathBuf::from).find(|p| p.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> anyhow::Result<Option<Value>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading config file `{}`", path.display()))?;
    let doc = raw
        .parse::<Value>()
        .with_context(|| format!("parsing config file `{}`", path.display()))?;
    Ok(Some(doc))
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}
