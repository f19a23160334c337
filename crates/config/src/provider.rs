// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sources of repository configuration.

use crate::parser::{format_for_path, parse_config_with_format, ConfigError, Format};
use crate::repo::RepoConfig;
use graft_core::ProjectGraph;
use std::path::{Path, PathBuf};

/// Loads repository configuration before any scheduling begins.
pub trait ConfigProvider: Send + Sync {
    fn load(&self) -> Result<RepoConfig, ConfigError>;

    /// Parse and validate the declared projects into an acyclic graph.
    fn load_projects(&self) -> Result<ProjectGraph, ConfigError> {
        let config = self.load()?;
        let graph = config.graph()?;
        tracing::debug!(projects = graph.len(), edges = graph.edge_count(), "loaded project graph");
        Ok(graph)
    }
}

/// Reads configuration from a file, picking the format from its extension.
#[derive(Debug, Clone)]
pub struct FileConfigProvider {
    path: PathBuf,
}

impl FileConfigProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigProvider for FileConfigProvider {
    fn load(&self) -> Result<RepoConfig, ConfigError> {
        let format = format_for_path(&self.path)
            .ok_or_else(|| ConfigError::UnknownFormat(self.path.clone()))?;
        let content = std::fs::read_to_string(&self.path)
            .map_err(|source| ConfigError::Io { path: self.path.clone(), source })?;
        parse_config_with_format(&content, format)
    }
}

/// Configuration held in memory (fetched from the VCS, or tests).
#[derive(Debug, Clone)]
pub struct StrConfigProvider {
    content: String,
    format: Format,
}

impl StrConfigProvider {
    pub fn new(content: impl Into<String>, format: Format) -> Self {
        Self { content: content.into(), format }
    }

    pub fn toml(content: impl Into<String>) -> Self {
        Self::new(content, Format::Toml)
    }

    pub fn hcl(content: impl Into<String>) -> Self {
        Self::new(content, Format::Hcl)
    }
}

impl ConfigProvider for StrConfigProvider {
    fn load(&self) -> Result<RepoConfig, ConfigError> {
        parse_config_with_format(&self.content, self.format)
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
