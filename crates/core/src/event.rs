// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inbound version-control events, already parsed by the surrounding layer.

use crate::batch::TriggerContext;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One VCS event (PR comment or push) to schedule work for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcsEvent {
    pub trigger: TriggerContext,
    /// Paths touched by the change, relative to the repository root
    #[serde(default)]
    pub changed_files: Vec<String>,
    /// Restrict the command to one project (`graft apply -p prod`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_filter: Option<String>,
    /// Extra variables passed to every job's work item
    #[serde(default)]
    pub vars: HashMap<String, String>,
}

impl VcsEvent {
    pub fn new(trigger: TriggerContext) -> Self {
        Self { trigger, changed_files: Vec::new(), project_filter: None, vars: HashMap::new() }
    }

    crate::setters! {
        set {
            changed_files: Vec<String>,
        }
        option {
            project_filter: String,
        }
    }

    pub fn var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}
