// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

// Use README.md as crate documentation.
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

#[cfg(feature = "arc")]
pub(crate) use std::sync::{Arc as Rc, Weak};

#[cfg(not(feature = "arc"))]
pub(crate) use std::rc::{Rc, Weak};

mod ast;
mod batch;
mod cache;
mod engine;
mod error;
mod evaluator;
mod globals;
mod lexer;
mod message;
mod number;
mod options;
mod parser;
mod schema;
mod value;

pub use ast::{Filter, MessagePath, Modifier, Operand, PathComponent};
pub use batch::{decode_messages_by_topic, MessageAndData, MessagesByTopic, QueriedDataByPath};
pub use cache::{CachedItems, MessagePathCache};
pub use engine::Engine;
pub use error::QueryError;
pub use evaluator::{get_message_path_data_items, MessagePathDataItem};
pub use globals::{
    changed_variable_names, fill_in_global_variables, try_fill_in_global_variables,
    GlobalVariables, ResolvedPath,
};
pub use message::{MessageEvent, Time};
pub use number::Number;
pub use options::EngineOptions;
pub use parser::parse_message_path;
pub use schema::{DatatypeSchema, FieldDefinition, SchemaRegistry, Topic};
pub use value::Value;

/// Items in `unstable` are likely to change.
pub mod unstable {
    pub use crate::lexer::*;
    pub use crate::parser::*;
}
