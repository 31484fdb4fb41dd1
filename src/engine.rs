// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::MessagePath;
use crate::batch::{self, MessagesByTopic, QueriedDataByPath};
use crate::cache::{CachedItems, MessagePathCache};
use crate::error::QueryError;
use crate::evaluator::{self, MessagePathDataItem};
use crate::globals::{fill_in_global_variables, GlobalVariables};
use crate::message::MessageEvent;
use crate::options::EngineOptions;
use crate::parser::parse_message_path;
use crate::schema::SchemaRegistry;
use crate::value::Value;
use crate::Rc;

/// The message path query engine.
///
/// Holds the current schema registry, global variables and declared paths,
/// and memoizes the results of evaluating those paths against messages.
pub struct Engine {
    options: EngineOptions,
    cache: MessagePathCache,
}

/// Create an engine with an empty registry.
impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    pub fn with_options(options: EngineOptions) -> Self {
        let cache = MessagePathCache::with_options(Rc::new(SchemaRegistry::default()), &options);
        Self { options, cache }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: EngineOptions) {
        self.cache
            .set_strict_slice_variables(options.strict_slice_variables);
        self.options = options;
    }

    pub fn set_strict_slice_variables(&mut self, b: bool) {
        self.options.strict_slice_variables = b;
        self.cache.set_strict_slice_variables(b);
    }

    /// Parse a path. Returns `None` for malformed text.
    pub fn parse(text: &str) -> Option<MessagePath> {
        parse_message_path(text)
    }

    pub fn set_paths<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.cache.set_paths(paths)
    }

    pub fn paths(&self) -> impl Iterator<Item = &Rc<str>> + '_ {
        self.cache.paths()
    }

    pub fn set_registry(&mut self, registry: Rc<SchemaRegistry>) {
        self.cache.set_registry(registry)
    }

    pub fn registry(&self) -> &Rc<SchemaRegistry> {
        self.cache.registry()
    }

    pub fn set_global_variables(&mut self, globals: GlobalVariables) {
        self.cache.set_global_variables(globals)
    }

    /// Set or replace one global variable.
    pub fn set_global_variable(&mut self, name: &str, value: Value) {
        let mut globals = self.cache.global_variables().clone();
        globals.insert(name.into(), value);
        self.cache.set_global_variables(globals)
    }

    pub fn global_variables(&self) -> &GlobalVariables {
        self.cache.global_variables()
    }

    /// Cached evaluation of a declared path.
    pub fn get(
        &mut self,
        path: &str,
        message: &Rc<MessageEvent>,
    ) -> Result<CachedItems, QueryError> {
        self.cache.get(path, message)
    }

    /// Uncached evaluation of any path against the current registry and
    /// global variables. Returns `None` for malformed paths and unknown
    /// topics.
    pub fn eval_path(
        &self,
        path: &str,
        message: &MessageEvent,
    ) -> Option<Vec<MessagePathDataItem>> {
        let parsed = parse_message_path(path)?;
        let resolved = fill_in_global_variables(&parsed, self.cache.global_variables());
        evaluator::get_message_path_data_items(message, &resolved.path, self.cache.registry())
    }

    pub fn decode_messages_by_topic(
        &mut self,
        messages_by_topic: &MessagesByTopic,
    ) -> Result<QueriedDataByPath, QueryError> {
        batch::decode_messages_by_topic(&mut self.cache, messages_by_topic)
    }

    pub fn invalidate(&mut self, path: &str) -> bool {
        self.cache.invalidate(path)
    }

    pub fn invalidate_all(&mut self) {
        self.cache.invalidate_all()
    }

    pub fn invalidate_by_variable(&mut self, name: &str) -> usize {
        self.cache.invalidate_by_variable(name)
    }

    pub fn prune(&mut self) {
        self.cache.prune()
    }

    pub fn generation(&self) -> u64 {
        self.cache.generation()
    }
}
