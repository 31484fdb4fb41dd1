// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Engine configuration.
///
/// Options deserialize from JSON (or YAML with the `yaml` feature) so that
/// hosts can keep them alongside their layout configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct EngineOptions {
    /// Reject slice bounds whose global variable is missing or not an
    /// integer instead of treating them as open bounds.
    pub strict_slice_variables: bool,
}

impl EngineOptions {
    pub fn from_json_str(json: &str) -> Result<EngineOptions> {
        Ok(serde_json::from_str(json)?)
    }

    #[cfg(feature = "yaml")]
    pub fn from_yaml_str(yaml: &str) -> Result<EngineOptions> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}
