// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

/// Errors surfaced by the cache and the engine.
///
/// Malformed paths, unknown topics and traversal misses are not errors; they
/// are reported as `None` or as empty result lists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// A lookup named a path that was never declared with `set_paths`.
    #[error("`{0}` is not in the list of cached paths")]
    PathNotCached(String),

    /// Strict resolution found a slice bound variable that is missing or
    /// does not hold an integer.
    #[error("global variable `${variable}` used as a slice bound in `{path}` is not an integer")]
    NonNumericSliceBound { variable: String, path: String },
}
