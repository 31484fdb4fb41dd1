// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Walks a resolved [`MessagePath`] through a message, guided by the
//! datatype schemas of the registry.

use crate::ast::*;
use crate::message::MessageEvent;
use crate::number::Number;
use crate::schema::*;
use crate::value::Value;
use crate::Rc;

use core::str::FromStr;

use serde::Serialize;

/// One value addressed by a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePathDataItem {
    pub value: Value,
    /// The path text as written, shared by every item it produced.
    pub path: Rc<str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constant_name: Option<Rc<str>>,
}

/// What the schema says about the value currently being visited.
#[derive(Clone, Copy)]
enum Structure<'a> {
    Message(&'a DatatypeSchema),
    /// Built-in `time` or `duration`.
    Time(&'a str),
    Primitive(&'a str),
    /// Array field; holds the element type.
    Array(&'a str),
    /// Opaque content; any key or index may be used.
    Json,
}

#[derive(Clone, Copy)]
struct State<'a> {
    value: &'a Value,
    structure: Structure<'a>,
    // Datatype declaring the field the value was read from. Its constants
    // name the final value.
    constants: Option<&'a DatatypeSchema>,
}

struct Walker<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> Walker<'a> {
    fn structure_for(&self, ty: &'a str) -> Structure<'a> {
        match ty {
            JSON_TYPE => Structure::Json,
            "time" | "duration" => Structure::Time(ty),
            _ => match self.registry.lookup_datatype(ty) {
                Some(schema) => Structure::Message(schema),
                None if is_primitive_type(ty) => Structure::Primitive(ty),
                // Unregistered nested datatype: walk it without a schema.
                None => Structure::Json,
            },
        }
    }

    fn field_structure(&self, field: &'a FieldDefinition) -> Structure<'a> {
        if field.is_array && &*field.ty != JSON_TYPE {
            Structure::Array(&field.ty)
        } else {
            self.structure_for(&field.ty)
        }
    }

    fn element_structure(&self, structure: Structure<'a>) -> Option<Structure<'a>> {
        match structure {
            Structure::Array(ty) => Some(self.structure_for(ty)),
            Structure::Json => Some(Structure::Json),
            _ => None,
        }
    }

    fn name(&self, state: State<'a>, name: &str) -> Option<State<'a>> {
        match state.structure {
            Structure::Message(schema) => {
                let field = schema.field(name)?;
                Some(State {
                    value: state.value.get(name)?,
                    structure: self.field_structure(field),
                    constants: Some(schema),
                })
            }
            Structure::Time(ty) => Some(State {
                value: state.value.get(name)?,
                structure: Structure::Primitive(time_field_type(ty, name)?),
                constants: None,
            }),
            Structure::Json => Some(State {
                value: state.value.get(name)?,
                structure: Structure::Json,
                constants: None,
            }),
            Structure::Primitive(_) | Structure::Array(_) => None,
        }
    }

    fn index(&self, state: State<'a>, index: &Operand) -> Option<State<'a>> {
        let structure = self.element_structure(state.structure)?;
        Some(State {
            value: state.value.at(literal_offset(index)?)?,
            structure,
            ..state
        })
    }

    fn slice(
        &self,
        state: State<'a>,
        start: &Option<Operand>,
        end: &Option<Operand>,
        out: &mut Vec<State<'a>>,
    ) {
        let Some(structure) = self.element_structure(state.structure) else {
            return;
        };
        let Ok(items) = state.value.as_array() else {
            return;
        };
        let Ok(len) = i64::try_from(items.len()) else {
            return;
        };
        if len == 0 {
            return;
        }

        let from_end = |offset: i64| if offset < 0 { len + offset } else { offset };
        let start = match start {
            Some(op) => match literal_offset(op) {
                Some(offset) => from_end(offset).max(0),
                None => return,
            },
            None => 0,
        };
        let end = match end {
            Some(op) => match literal_offset(op) {
                Some(offset) => from_end(offset).min(len - 1),
                None => return,
            },
            None => len - 1,
        };

        let (Ok(start), Ok(end)) = (usize::try_from(start), usize::try_from(end)) else {
            return;
        };
        if start > end {
            return;
        }
        out.extend(items[start..=end].iter().map(|value| State {
            value,
            structure,
            ..state
        }));
    }

    fn matches(&self, state: State<'a>, filter: &Filter) -> bool {
        let Operand::Literal(expected) = &filter.value else {
            // Unresolved variable.
            return false;
        };

        let mut current = state;
        for name in &filter.path {
            match self.name(current, name) {
                Some(next) => current = next,
                None => return false,
            }
        }
        filter_value_equal(current.value, current.structure, expected)
    }

    fn filter(&self, state: State<'a>, filter: &Filter, out: &mut Vec<State<'a>>) {
        match (state.structure, state.value) {
            (Structure::Array(_), Value::Array(items)) | (Structure::Json, Value::Array(items)) => {
                let Some(structure) = self.element_structure(state.structure) else {
                    return;
                };
                out.extend(
                    items
                        .iter()
                        .map(|value| State {
                            value,
                            structure,
                            ..state
                        })
                        .filter(|element| self.matches(*element, filter)),
                );
            }
            _ => {
                if self.matches(state, filter) {
                    out.push(state);
                }
            }
        }
    }

    fn step(&self, states: Vec<State<'a>>, component: &PathComponent) -> Vec<State<'a>> {
        let mut out = Vec::with_capacity(states.len());
        for state in states {
            match component {
                PathComponent::Name(name) => out.extend(self.name(state, name)),
                PathComponent::Index(index) => out.extend(self.index(state, index)),
                PathComponent::Slice { start, end } => self.slice(state, start, end, &mut out),
                PathComponent::Filter(filter) => self.filter(state, filter, &mut out),
            }
        }
        out
    }
}

fn literal_offset(op: &Operand) -> Option<i64> {
    match op {
        Operand::Literal(Value::Number(n)) => n.as_offset(),
        _ => None,
    }
}

// Equality used by filters. Numbers compare exactly; typed fields accept a
// literal spelled in another form of their declared type.
fn filter_value_equal(actual: &Value, structure: Structure, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Null, Value::Null) => true,
        (Value::Number(a), Value::String(s)) => match structure {
            Structure::Primitive(ty) if is_numeric_type(ty) => {
                Number::from_str(s).is_ok_and(|b| *a == b)
            }
            _ => false,
        },
        (Value::String(a), Value::Number(b)) => {
            matches!(structure, Structure::Primitive("string" | "wstring"))
                && **a == *b.format_decimal()
        }
        (Value::Bool(a), Value::Number(b)) => {
            matches!(structure, Structure::Primitive("bool")) && b.as_u64() == Some(u64::from(*a))
        }
        _ => false,
    }
}

/// Evaluate `path` against one message.
///
/// Returns `None` when the path's topic (or its datatype) is unknown to the
/// registry. Any part of the path that does not match the message yields an
/// empty list. Variable references must already be resolved; unresolved ones
/// match nothing.
pub fn get_message_path_data_items(
    message: &MessageEvent,
    path: &MessagePath,
    registry: &SchemaRegistry,
) -> Option<Vec<MessagePathDataItem>> {
    let datatype = registry.lookup_topic(&path.topic_name)?;
    let structure = match registry.lookup_datatype(datatype) {
        Some(schema) => Structure::Message(schema),
        None if datatype == JSON_TYPE => Structure::Json,
        None => return None,
    };

    let walker = Walker { registry };
    let root = State {
        value: &message.message,
        structure,
        constants: None,
    };

    let states = path
        .components
        .iter()
        .fold(vec![root], |states, component| walker.step(states, component));

    Some(
        states
            .into_iter()
            .map(|state| MessagePathDataItem {
                value: state.value.clone(),
                path: path.source.clone(),
                constant_name: match state.structure {
                    Structure::Primitive(_) => state
                        .constants
                        .and_then(|schema| schema.constant_name(state.value))
                        .cloned(),
                    _ => None,
                },
            })
            .collect(),
    )
}
