// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::value::Value;
use crate::Rc;

use std::collections::BTreeSet;

/// Literal or `$variable` appearing in an index, slice bound or filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Literal(Value),
    Variable {
        name: Rc<str>,
        // Byte offset of the `$` in the path text.
        loc: u32,
    },
}

impl Operand {
    pub fn variable_name(&self) -> Option<&Rc<str>> {
        match self {
            Operand::Variable { name, .. } => Some(name),
            Operand::Literal(_) => None,
        }
    }
}

/// Equality predicate `{a.b==value}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub path: Vec<Rc<str>>,
    pub value: Operand,
    /// Text between the braces, as written.
    pub repr: Rc<str>,
    pub name_loc: u32,
    pub value_loc: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathComponent {
    Name(Rc<str>),
    Index(Operand),
    /// Inclusive on both ends. A missing start means the first element, a
    /// missing end means the last one.
    Slice {
        start: Option<Operand>,
        end: Option<Operand>,
    },
    Filter(Filter),
}

/// Trailing `.@modifier`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    /// Render the addressed value as full JSON. Evaluation is unaffected.
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePath {
    /// Path text exactly as given to the parser.
    pub source: Rc<str>,
    pub topic_name: Rc<str>,
    pub components: Vec<PathComponent>,
    pub modifier: Option<Modifier>,
}

impl MessagePath {
    fn operands(&self) -> impl Iterator<Item = &Operand> + '_ {
        self.components.iter().flat_map(|c| match c {
            PathComponent::Name(_) => vec![],
            PathComponent::Index(op) => vec![op],
            PathComponent::Slice { start, end } => start.iter().chain(end.iter()).collect(),
            PathComponent::Filter(f) => vec![&f.value],
        })
    }

    /// Names of the global variables referenced by this path.
    pub fn variables(&self) -> BTreeSet<Rc<str>> {
        self.operands()
            .filter_map(|op| op.variable_name().cloned())
            .collect()
    }

    pub fn has_variables(&self) -> bool {
        self.operands().any(|op| op.variable_name().is_some())
    }
}
