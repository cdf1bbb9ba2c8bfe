//! Preparing fetched entities for full-replace updates.

use serde_json::{Map, Value};
use strum::Display;

/// Entity types the file service exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum EntityKind {
    /// Plain file metadata (`DocumentFileSet`).
    DocumentFile,
    /// File content addressed by the business object key (`DocObjFileSet`).
    DocObjFile,
}

impl EntityKind {
    /// DateTime properties that must be sent as `null` rather than an empty string.
    pub fn date_fields(&self) -> &'static [&'static str] {
        match self {
            Self::DocumentFile | Self::DocObjFile => &[],
        }
    }

    /// Whether absent scalar properties are sent as empty strings.
    fn blanks_nulls(&self) -> bool {
        matches!(self, Self::DocumentFile)
    }
}

/// Copy an entity fetched from the service into an update payload:
/// transport metadata is dropped and empty values normalized for `kind`.
pub fn prepare_for_update(entity: &Value, kind: EntityKind) -> Value {
    let mut data: Map<String, Value> = match entity {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    data.remove("__metadata");

    if kind.blanks_nulls() {
        for value in data.values_mut() {
            if value.is_null() {
                *value = Value::String(String::new());
            }
        }
    }

    for field in kind.date_fields() {
        let empty = match data.get(*field) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(_) => false,
        };
        if empty {
            data.insert((*field).to_string(), Value::Null);
        }
    }

    Value::Object(data)
}
