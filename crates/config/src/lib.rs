// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! graft-config: repository configuration parsing
//!
//! Reads the project list and scheduler switches from TOML, HCL or JSON and
//! turns them into a validated [`graft_core::ProjectGraph`].

mod parser;
mod provider;
mod repo;

pub use parser::{format_for_path, parse_config, parse_config_with_format, ConfigError, Format};
pub use provider::{ConfigProvider, FileConfigProvider, StrConfigProvider};
pub use repo::{ProjectDef, RepoConfig};
