// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Format dispatch and validation for repository configuration.

use crate::repo::RepoConfig;
use graft_core::GraphError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Hcl,
    Json,
}

/// Errors from loading repository configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("HCL parse error: {0}")]
    Hcl(#[from] hcl::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config at {location}: {message}")]
    InvalidFormat { location: String, message: String },
    #[error("cannot tell config format of {0} (expected .toml, .hcl or .json)")]
    UnknownFormat(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Parse TOML configuration.
pub fn parse_config(content: &str) -> Result<RepoConfig, ConfigError> {
    parse_config_with_format(content, Format::Toml)
}

/// Parse configuration in the given format and validate it.
///
/// Project names come from the block label (`project "dev" {}`) or table key
/// (`[project.dev]`).
pub fn parse_config_with_format(content: &str, format: Format) -> Result<RepoConfig, ConfigError> {
    let mut config: RepoConfig = match format {
        Format::Toml => toml::from_str(content)?,
        Format::Hcl => hcl::from_str(content)?,
        Format::Json => serde_json::from_str(content)?,
    };
    for (name, def) in config.project.iter_mut() {
        def.name = name.clone();
    }
    validate(&config)?;
    Ok(config)
}

pub fn format_for_path(path: &Path) -> Option<Format> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => Some(Format::Toml),
        Some("hcl") => Some(Format::Hcl),
        Some("json") => Some(Format::Json),
        _ => None,
    }
}

fn invalid(location: String, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidFormat { location, message: message.into() }
}

fn validate(config: &RepoConfig) -> Result<(), ConfigError> {
    for (name, def) in &config.project {
        let location = format!("project.{name}");
        // '#' separates fields of the persisted lock key
        if name.is_empty() || name.contains('#') {
            return Err(invalid(location, "project name must be non-empty and not contain '#'"));
        }
        if def.workspace.is_empty() || def.workspace.contains('#') {
            return Err(invalid(
                format!("{location}.workspace"),
                "workspace must be non-empty and not contain '#'",
            ));
        }
        if def.workflow_file.trim().is_empty() {
            return Err(invalid(format!("{location}.workflow_file"), "workflow_file is empty"));
        }
        let patterns = def
            .include_patterns
            .iter()
            .map(|p| ("include_patterns", p))
            .chain(def.exclude_patterns.iter().map(|p| ("exclude_patterns", p)));
        for (field, pattern) in patterns {
            if let Err(e) = glob::Pattern::new(pattern) {
                return Err(invalid(
                    format!("{location}.{field}"),
                    format!("bad glob '{pattern}': {}", e.msg),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
