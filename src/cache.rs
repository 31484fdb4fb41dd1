// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.
#![allow(clippy::as_conversions)]

//! Memoized path evaluation.
//!
//! The cache services a declared set of path texts. For each one it keeps
//! the parsed path, the global variables it depends on, the path resolved
//! against the current globals, and a memo from message identity to results.
//!
//! Invalidation happens only at generation boundaries:
//! * changing the declared set drops the entries of removed paths,
//! * publishing a registry with a different generation drops everything,
//! * changing global variables drops the entries that read a changed name.

use crate::ast::MessagePath;
use crate::error::QueryError;
use crate::evaluator::{get_message_path_data_items, MessagePathDataItem};
use crate::globals::*;
use crate::message::MessageEvent;
use crate::options::EngineOptions;
use crate::parser::parse_message_path;
use crate::schema::SchemaRegistry;
use crate::{Rc, Weak};

use std::collections::{BTreeSet, HashMap};

use indexmap::IndexMap;
use log::{debug, warn};

/// Results for one message. `None` when the path is invalid or its topic is
/// unknown to the registry.
pub type CachedItems = Option<Rc<[MessagePathDataItem]>>;

const MIN_PRUNE_THRESHOLD: usize = 64;

struct MemoSlot {
    // Identity check: the address alone could be reused by a later message.
    message: Weak<MessageEvent>,
    items: CachedItems,
}

struct CacheEntry {
    parsed: Option<MessagePath>,
    variables: BTreeSet<Rc<str>>,
    resolved: Option<MessagePath>,
    memo: HashMap<usize, MemoSlot>,
    prune_at: usize,
}

impl CacheEntry {
    fn new(text: &str) -> Self {
        let parsed = parse_message_path(text);
        let variables = parsed
            .as_ref()
            .map(MessagePath::variables)
            .unwrap_or_default();
        Self {
            parsed,
            variables,
            resolved: None,
            memo: HashMap::new(),
            prune_at: MIN_PRUNE_THRESHOLD,
        }
    }

    fn clear(&mut self) {
        self.resolved = None;
        self.memo.clear();
        self.prune_at = MIN_PRUNE_THRESHOLD;
    }

    fn prune(&mut self) {
        self.memo.retain(|_, slot| slot.message.strong_count() > 0);
        self.prune_at = MIN_PRUNE_THRESHOLD.max(self.memo.len() * 2);
    }

    fn resolve(
        &mut self,
        globals: &GlobalVariables,
        strict: bool,
    ) -> Result<Option<&MessagePath>, QueryError> {
        let Some(parsed) = &self.parsed else {
            return Ok(None);
        };
        if self.resolved.is_none() {
            let resolved = if strict {
                try_fill_in_global_variables(parsed, globals)?
            } else {
                fill_in_global_variables(parsed, globals)
            };
            self.resolved = Some(resolved.path);
        }
        Ok(self.resolved.as_ref())
    }

    fn lookup(&self, key: usize, message: &Rc<MessageEvent>) -> Option<&CachedItems> {
        let slot = self.memo.get(&key)?;
        match slot.message.upgrade() {
            Some(m) if Rc::ptr_eq(&m, message) => Some(&slot.items),
            _ => None,
        }
    }

    fn store(&mut self, key: usize, message: &Rc<MessageEvent>, items: CachedItems) {
        if self.memo.len() >= self.prune_at {
            self.prune();
        }
        self.memo.insert(
            key,
            MemoSlot {
                message: Rc::downgrade(message),
                items,
            },
        );
    }
}

/// Memoizing evaluator for a declared set of paths.
pub struct MessagePathCache {
    registry: Rc<SchemaRegistry>,
    globals: GlobalVariables,
    entries: IndexMap<Rc<str>, CacheEntry>,
    strict: bool,
    generation: u64,
}

impl MessagePathCache {
    pub fn new(registry: Rc<SchemaRegistry>) -> Self {
        Self {
            registry,
            globals: GlobalVariables::new(),
            entries: IndexMap::new(),
            strict: false,
            generation: 0,
        }
    }

    pub fn with_options(registry: Rc<SchemaRegistry>, options: &EngineOptions) -> Self {
        let mut cache = Self::new(registry);
        cache.strict = options.strict_slice_variables;
        cache
    }

    /// Changes whenever a lookup could return something different from
    /// before. Consumers can compare it to skip downstream recomputation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn registry(&self) -> &Rc<SchemaRegistry> {
        &self.registry
    }

    pub fn global_variables(&self) -> &GlobalVariables {
        &self.globals
    }

    /// Declared paths, in declaration order.
    pub fn paths(&self) -> impl Iterator<Item = &Rc<str>> + '_ {
        self.entries.keys()
    }

    /// Declared paths with the topic each one reads, or `None` for paths that
    /// do not parse.
    pub fn path_topics(&self) -> Vec<(Rc<str>, Option<Rc<str>>)> {
        self.entries
            .iter()
            .map(|(text, entry)| {
                (
                    text.clone(),
                    entry.parsed.as_ref().map(|p| p.topic_name.clone()),
                )
            })
            .collect()
    }

    pub fn set_strict_slice_variables(&mut self, strict: bool) {
        if self.strict != strict {
            self.strict = strict;
            self.invalidate_all();
        }
    }

    /// Declare the paths that `get` will service.
    ///
    /// Paths that stay declared keep their memoized results. The generation
    /// only changes if the set itself changed.
    pub fn set_paths<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut previous = core::mem::take(&mut self.entries);
        let mut added = 0usize;
        for text in paths {
            let text = text.as_ref();
            if self.entries.contains_key(text) {
                continue;
            }
            let entry = match previous.swap_remove(text) {
                Some(entry) => entry,
                None => {
                    added += 1;
                    CacheEntry::new(text)
                }
            };
            self.entries.insert(text.into(), entry);
        }

        let removed = previous.len();
        if added > 0 || removed > 0 {
            debug!("cached paths changed: {added} added, {removed} removed");
            self.generation += 1;
        }
        for entry in self.entries.values_mut() {
            entry.prune();
        }
    }

    /// Replace the registry. A registry from a different generation
    /// discards every memoized result, even if its contents are identical.
    pub fn set_registry(&mut self, registry: Rc<SchemaRegistry>) {
        if registry.generation() == self.registry.generation() {
            return;
        }
        debug!(
            "schema registry changed (generation {} -> {})",
            self.registry.generation(),
            registry.generation()
        );
        self.registry = registry;
        self.invalidate_all();
    }

    /// Replace the global variables. Only paths that reference a changed
    /// variable are invalidated.
    pub fn set_global_variables(&mut self, globals: GlobalVariables) {
        let changed = changed_variable_names(&self.globals, &globals);
        self.globals = globals;
        if changed.is_empty() {
            return;
        }

        let mut invalidated = 0usize;
        for entry in self.entries.values_mut() {
            if !entry.variables.is_disjoint(&changed) {
                entry.clear();
                invalidated += 1;
            }
        }
        if invalidated > 0 {
            debug!("global variables {changed:?} changed; invalidated {invalidated} paths");
            self.generation += 1;
        }
    }

    /// Drop the memoized results of one path. Returns false if the path is
    /// not declared.
    pub fn invalidate(&mut self, path: &str) -> bool {
        match self.entries.get_mut(path) {
            Some(entry) => {
                entry.clear();
                self.generation += 1;
                true
            }
            None => false,
        }
    }

    pub fn invalidate_all(&mut self) {
        for entry in self.entries.values_mut() {
            entry.clear();
        }
        self.generation += 1;
    }

    /// Drop the memoized results of every path that references `name`.
    /// Returns the number of paths invalidated.
    pub fn invalidate_by_variable(&mut self, name: &str) -> usize {
        let mut invalidated = 0usize;
        for entry in self.entries.values_mut() {
            if entry.variables.contains(name) {
                entry.clear();
                invalidated += 1;
            }
        }
        if invalidated > 0 {
            self.generation += 1;
        }
        invalidated
    }

    /// Forget memo slots whose message has been dropped.
    pub fn prune(&mut self) {
        for entry in self.entries.values_mut() {
            entry.prune();
        }
    }

    /// Items addressed by `path` in `message`.
    ///
    /// Calling this again with the same message instance returns the same
    /// shared result until an invalidation affects the path. Asking for a
    /// path that was not declared is a caller bug and fails with
    /// [`QueryError::PathNotCached`].
    pub fn get(
        &mut self,
        path: &str,
        message: &Rc<MessageEvent>,
    ) -> Result<CachedItems, QueryError> {
        let Self {
            registry,
            globals,
            entries,
            strict,
            ..
        } = self;
        let entry = entries
            .get_mut(path)
            .ok_or_else(|| QueryError::PathNotCached(path.to_string()))?;

        let key = Rc::as_ptr(message) as usize;
        if let Some(items) = entry.lookup(key, message) {
            return Ok(items.clone());
        }

        let items: CachedItems = match entry
            .resolve(globals, *strict)
            .inspect_err(|e| warn!("{e}"))?
        {
            Some(resolved) => {
                get_message_path_data_items(message, resolved, registry).map(Rc::from)
            }
            None => None,
        };
        entry.store(key, message, items.clone());
        Ok(items)
    }
}
