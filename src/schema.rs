// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Topic and datatype definitions consumed by the evaluator.
//!
//! A [`SchemaRegistry`] is an immutable snapshot. Every snapshot carries a
//! process-unique generation number; caches compare generations instead of
//! contents, so publishing a new snapshot (even an identical one) always
//! invalidates results computed against the previous one.

use crate::value::Value;
use crate::Rc;

use core::sync::atomic::{AtomicU64, Ordering};
use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// Field type for opaque structured content.
pub const JSON_TYPE: &str = "json";

const PRIMITIVE_TYPES: [&str; 18] = [
    "bool", "byte", "char", "int8", "uint8", "int16", "uint16", "int32", "uint32", "int64",
    "uint64", "float32", "float64", "string", "wstring", "time", "duration", JSON_TYPE,
];

pub fn is_primitive_type(ty: &str) -> bool {
    PRIMITIVE_TYPES.contains(&ty)
}

pub fn is_numeric_type(ty: &str) -> bool {
    matches!(
        ty,
        "byte"
            | "char"
            | "int8"
            | "uint8"
            | "int16"
            | "uint16"
            | "int32"
            | "uint32"
            | "int64"
            | "uint64"
            | "float32"
            | "float64"
    )
}

/// Sub-fields of the built-in `time` and `duration` types.
pub fn time_field_type(time_type: &str, field: &str) -> Option<&'static str> {
    match (time_type, field) {
        ("time", "sec" | "nsec") => Some("uint32"),
        ("duration", "sec" | "nsec") => Some("int32"),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub name: Rc<str>,
    #[serde(rename = "type")]
    pub ty: Rc<str>,
    #[serde(default)]
    pub is_array: bool,
    #[serde(default)]
    pub is_constant: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl FieldDefinition {
    pub fn new(name: &str, ty: &str) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            is_array: false,
            is_constant: false,
            value: None,
        }
    }

    pub fn array(name: &str, ty: &str) -> Self {
        Self {
            is_array: true,
            ..Self::new(name, ty)
        }
    }

    pub fn constant(name: &str, ty: &str, value: Value) -> Self {
        Self {
            is_constant: true,
            value: Some(value),
            ..Self::new(name, ty)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatatypeSchema {
    pub definitions: Vec<FieldDefinition>,
}

impl DatatypeSchema {
    pub fn new(definitions: Vec<FieldDefinition>) -> Self {
        Self { definitions }
    }

    /// Message field by name. Constants are metadata and are not returned.
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.definitions.iter().find(|d| !d.is_constant && *d.name == *name)
    }

    /// Name of the first constant whose declared value equals `value`.
    pub fn constant_name(&self, value: &Value) -> Option<&Rc<str>> {
        self.definitions
            .iter()
            .filter(|d| d.is_constant)
            .find(|d| d.value.as_ref() == Some(value))
            .map(|d| &d.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub name: Rc<str>,
    pub datatype: Rc<str>,
}

impl Topic {
    pub fn new(name: &str, datatype: &str) -> Self {
        Self {
            name: name.into(),
            datatype: datatype.into(),
        }
    }
}

#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryDef {
    #[serde(default)]
    topics: Vec<Topic>,
    #[serde(default)]
    datatypes: BTreeMap<Rc<str>, DatatypeSchema>,
}

/// Read-only snapshot of topics and datatypes.
#[derive(Debug)]
pub struct SchemaRegistry {
    generation: u64,
    topics: BTreeMap<Rc<str>, Topic>,
    datatypes: BTreeMap<Rc<str>, Rc<DatatypeSchema>>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new(vec![], BTreeMap::new())
    }
}

// A clone is a separate publication and gets its own generation.
impl Clone for SchemaRegistry {
    fn clone(&self) -> Self {
        Self {
            generation: next_generation(),
            topics: self.topics.clone(),
            datatypes: self.datatypes.clone(),
        }
    }
}

impl SchemaRegistry {
    pub fn new(
        topics: Vec<Topic>,
        datatypes: impl IntoIterator<Item = (Rc<str>, DatatypeSchema)>,
    ) -> Self {
        Self {
            generation: next_generation(),
            topics: topics.into_iter().map(|t| (t.name.clone(), t)).collect(),
            datatypes: datatypes
                .into_iter()
                .map(|(name, schema)| (name, Rc::new(schema)))
                .collect(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<SchemaRegistry> {
        let def: RegistryDef = serde_json::from_str(json)?;
        Ok(Self::new(def.topics, def.datatypes))
    }

    #[cfg(feature = "yaml")]
    pub fn from_yaml_str(yaml: &str) -> Result<SchemaRegistry> {
        let def: RegistryDef = serde_yaml::from_str(yaml)?;
        Ok(Self::new(def.topics, def.datatypes))
    }

    /// New snapshot with the topic list replaced and the datatypes kept.
    pub fn with_topics(&self, topics: Vec<Topic>) -> SchemaRegistry {
        Self {
            generation: next_generation(),
            topics: topics.into_iter().map(|t| (t.name.clone(), t)).collect(),
            datatypes: self.datatypes.clone(),
        }
    }

    /// New snapshot with the datatypes replaced and the topics kept.
    pub fn with_datatypes(
        &self,
        datatypes: impl IntoIterator<Item = (Rc<str>, DatatypeSchema)>,
    ) -> SchemaRegistry {
        Self {
            generation: next_generation(),
            topics: self.topics.clone(),
            datatypes: datatypes
                .into_iter()
                .map(|(name, schema)| (name, Rc::new(schema)))
                .collect(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn lookup_topic(&self, name: &str) -> Option<&str> {
        self.topics.get(name).map(|t| t.datatype.as_ref())
    }

    pub fn lookup_datatype(&self, name: &str) -> Option<&DatatypeSchema> {
        self.datatypes.get(name).map(|d| d.as_ref())
    }

    pub fn topics(&self) -> impl Iterator<Item = &Topic> + '_ {
        self.topics.values()
    }
}
