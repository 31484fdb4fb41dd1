// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Substitution of `$variable` references with global variable values.

use crate::ast::*;
use crate::error::QueryError;
use crate::value::Value;
use crate::Rc;

use std::collections::{BTreeMap, BTreeSet};

/// Snapshot of the host's global variables.
pub type GlobalVariables = BTreeMap<Rc<str>, Value>;

/// A path with every variable reference replaced, plus the variables it read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub path: MessagePath,
    pub variables: BTreeSet<Rc<str>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum BoundKind {
    Start,
    End,
}

fn resolve_offset(op: &Operand, globals: &GlobalVariables) -> Result<Operand, Rc<str>> {
    match op {
        Operand::Literal(_) => Ok(op.clone()),
        Operand::Variable { name, .. } => globals
            .get(name)
            .and_then(Value::as_offset)
            .map(|n| Operand::Literal(Value::from(n)))
            .ok_or_else(|| name.clone()),
    }
}

struct Resolver<'a> {
    globals: &'a GlobalVariables,
    strict: bool,
    source: &'a Rc<str>,
}

impl Resolver<'_> {
    fn unresolved(&self, variable: Rc<str>) -> Result<(), QueryError> {
        if self.strict {
            return Err(QueryError::NonNumericSliceBound {
                variable: variable.to_string(),
                path: self.source.to_string(),
            });
        }
        Ok(())
    }

    // Missing or non-integer start bounds fall back to the first element and
    // end bounds to the last one.
    fn bound(
        &self,
        bound: &Option<Operand>,
        kind: BoundKind,
    ) -> Result<Option<Operand>, QueryError> {
        let Some(op) = bound else {
            return Ok(None);
        };
        match resolve_offset(op, self.globals) {
            Ok(op) => Ok(Some(op)),
            Err(variable) => {
                self.unresolved(variable)?;
                Ok(match kind {
                    BoundKind::Start => Some(Operand::Literal(Value::from(0u64))),
                    BoundKind::End => None,
                })
            }
        }
    }

    fn component(&self, component: &PathComponent) -> Result<PathComponent, QueryError> {
        Ok(match component {
            PathComponent::Name(_) => component.clone(),
            PathComponent::Index(op) => match resolve_offset(op, self.globals) {
                Ok(op) => PathComponent::Index(op),
                Err(variable) => {
                    // `[$x]` behaves like `[$x:$x]`, so both bounds fall back.
                    self.unresolved(variable)?;
                    PathComponent::Slice {
                        start: Some(Operand::Literal(Value::from(0u64))),
                        end: None,
                    }
                }
            },
            PathComponent::Slice { start, end } => PathComponent::Slice {
                start: self.bound(start, BoundKind::Start)?,
                end: self.bound(end, BoundKind::End)?,
            },
            PathComponent::Filter(filter) => {
                let value = match &filter.value {
                    Operand::Variable { name, .. } => match self.globals.get(name) {
                        Some(v) => Operand::Literal(v.clone()),
                        None => filter.value.clone(),
                    },
                    Operand::Literal(_) => filter.value.clone(),
                };
                PathComponent::Filter(Filter {
                    value,
                    ..filter.clone()
                })
            }
        })
    }

    fn resolve(&self, path: &MessagePath) -> Result<ResolvedPath, QueryError> {
        let components = path
            .components
            .iter()
            .map(|c| self.component(c))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ResolvedPath {
            path: MessagePath {
                components,
                ..path.clone()
            },
            variables: path.variables(),
        })
    }
}

/// Replace variable references in `path` with values from `globals`.
///
/// Slice bounds whose variable is missing or not an integer become open
/// bounds. Filter values are substituted as-is; a filter whose variable is
/// missing keeps the reference and matches nothing.
pub fn fill_in_global_variables(path: &MessagePath, globals: &GlobalVariables) -> ResolvedPath {
    let resolver = Resolver {
        globals,
        strict: false,
        source: &path.source,
    };
    match resolver.resolve(path) {
        Ok(resolved) => resolved,
        // Lenient resolution has no failure mode.
        Err(_) => ResolvedPath {
            path: path.clone(),
            variables: path.variables(),
        },
    }
}

/// Like [`fill_in_global_variables`], but fails when a slice or index
/// variable does not resolve to an integer.
pub fn try_fill_in_global_variables(
    path: &MessagePath,
    globals: &GlobalVariables,
) -> Result<ResolvedPath, QueryError> {
    Resolver {
        globals,
        strict: true,
        source: &path.source,
    }
    .resolve(path)
}

/// Names whose value differs between two snapshots, including names present
/// in only one of them.
pub fn changed_variable_names(old: &GlobalVariables, new: &GlobalVariables) -> BTreeSet<Rc<str>> {
    let mut changed: BTreeSet<Rc<str>> = old
        .iter()
        .filter(|(name, value)| new.get(*name) != Some(*value))
        .map(|(name, _)| name.clone())
        .collect();
    changed.extend(
        new.keys()
            .filter(|name| !old.contains_key(*name))
            .cloned(),
    );
    changed
}
