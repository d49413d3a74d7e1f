//! Batch request decoding.
//!
//! A batch maps image keys to operation lists. Keys stay raw strings here;
//! whether they are valid ids is decided at admission time so one bad key
//! only costs its own entry. Entry order and duplicate keys are preserved
//! exactly as they appear in the input.
//!
//! Decoding is strict only at the top level. A badly shaped operation turns
//! into one that processing rejects on its own, and an entry that is not a
//! list or map of operations is kept as malformed and rejected at admission.

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::BatchError;

/// Wire code for an add operation.
pub const ADD_EFFECT: i64 = 1;
/// Wire code for a remove operation.
pub const REMOVE_EFFECT: i64 = 0;

/// What an operation does to a record's active set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "RawKind")]
pub enum OperationKind {
    Add,
    Remove,
    /// Anything else, as raw text; skipped during processing
    Unknown(String),
}

#[derive(Serialize)]
#[serde(untagged)]
enum RawKind {
    Code(i64),
    Text(String),
}

impl From<OperationKind> for RawKind {
    fn from(kind: OperationKind) -> Self {
        match kind {
            OperationKind::Add => RawKind::Code(ADD_EFFECT),
            OperationKind::Remove => RawKind::Code(REMOVE_EFFECT),
            OperationKind::Unknown(text) => RawKind::Text(text),
        }
    }
}

impl OperationKind {
    /// Decode a wire code: 1 is add, 0 is remove.
    pub fn from_code(code: i64) -> Self {
        match code {
            ADD_EFFECT => OperationKind::Add,
            REMOVE_EFFECT => OperationKind::Remove,
            other => OperationKind::Unknown(other.to_string()),
        }
    }

    /// Decode a textual kind: a wire code or `add`/`remove`.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if let Ok(code) = trimmed.parse::<i64>() {
            return Self::from_code(code);
        }
        match trimmed.to_lowercase().as_str() {
            "add" => OperationKind::Add,
            "remove" => OperationKind::Remove,
            _ => OperationKind::Unknown(text.to_string()),
        }
    }

    /// Decode any JSON kind. Non-integer numbers, booleans, null and
    /// structures are unknown kinds carrying their JSON text.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(code) => Self::from_code(code),
                None => OperationKind::Unknown(n.to_string()),
            },
            Value::String(text) => Self::parse(text),
            other => OperationKind::Unknown(other.to_string()),
        }
    }
}

/// One add/remove instruction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Operation {
    pub kind: OperationKind,

    #[serde(rename = "effectId")]
    pub effect_id: String,

    /// Effect parameter; ignored for removes
    #[serde(skip_serializing_if = "Value::is_null")]
    pub value: Value,
}

impl Operation {
    pub fn add(effect_id: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            kind: OperationKind::Add,
            effect_id: effect_id.into(),
            value: value.into(),
        }
    }

    pub fn remove(effect_id: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Remove,
            effect_id: effect_id.into(),
            value: Value::Null,
        }
    }

    /// Sequence form: `{"kind": 1, "effectId": "effect1", "value": 5}`.
    ///
    /// Never fails. A missing or non-integer kind becomes
    /// [`OperationKind::Unknown`]; a missing or non-string effect id is kept
    /// as its JSON text so the registry rejects it.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(obj) => Self {
                kind: OperationKind::from_value(obj.get("kind").unwrap_or(&Value::Null)),
                effect_id: effect_id(obj, &["effectId", "effect_id", "id"]),
                value: field(obj, &["value", "val"]),
            },
            other => Self {
                kind: OperationKind::Unknown(other.to_string()),
                effect_id: String::new(),
                value: Value::Null,
            },
        }
    }

    /// Keyed legacy form, where the map key is the kind:
    /// `"1": {"id": "effect1", "val": 5}`.
    pub fn from_keyed(kind: &str, body: &Value) -> Self {
        let kind = OperationKind::parse(kind);
        match body {
            Value::Object(obj) => Self {
                kind,
                effect_id: effect_id(obj, &["id", "effectId", "effect_id"]),
                value: field(obj, &["val", "value"]),
            },
            other => Self {
                kind,
                effect_id: other.to_string(),
                value: Value::Null,
            },
        }
    }
}

fn field(obj: &Map<String, Value>, names: &[&str]) -> Value {
    names
        .iter()
        .find_map(|name| obj.get(*name))
        .cloned()
        .unwrap_or(Value::Null)
}

fn effect_id(obj: &Map<String, Value>, names: &[&str]) -> String {
    match field(obj, names) {
        Value::String(id) => id,
        other => other.to_string(),
    }
}

/// Operations for one image, or why they could not be read.
enum OperationList {
    Valid(Vec<Operation>),
    Malformed(String),
}

impl<'de> Deserialize<'de> for OperationList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ListVisitor;

        impl ListVisitor {
            fn malformed<E: de::Error>(found: impl fmt::Display) -> Result<OperationList, E> {
                Ok(OperationList::Malformed(format!(
                    "expected a list or map of operations, found {found}"
                )))
            }
        }

        impl<'de> Visitor<'de> for ListVisitor {
            type Value = OperationList;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a list or map of operations")
            }

            /// `[{"kind": 1, "effectId": "effect1", "value": 5}, ...]`
            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut ops = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(value) = seq.next_element::<Value>()? {
                    ops.push(Operation::from_value(&value));
                }
                Ok(OperationList::Valid(ops))
            }

            /// `{"1": {"id": "effect1", "val": 5}}`, in input order
            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut ops = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((kind, body)) = map.next_entry::<String, Value>()? {
                    ops.push(Operation::from_keyed(&kind, &body));
                }
                Ok(OperationList::Valid(ops))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
                Self::malformed(v)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Self::malformed(v)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Self::malformed(v)
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Self::malformed(v)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Self::malformed(format_args!("{v:?}"))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Self::malformed("null")
            }

            fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
                Self::malformed("null")
            }
        }

        deserializer.deserialize_any(ListVisitor)
    }
}

/// Operations submitted for one image key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchEntry {
    /// Raw key as submitted; must parse as a non-negative integer
    pub key: String,
    pub operations: Vec<Operation>,
    /// Set when the entry's value was not a list or map of operations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub malformed: Option<String>,
}

impl BatchEntry {
    /// Rejection for an entry that could not be read, if any.
    pub fn error(&self) -> Option<BatchError> {
        self.malformed
            .as_ref()
            .map(|reason| BatchError::MalformedEntry(reason.clone()))
    }
}

/// One invocation's full set of per-image operation lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchRequest {
    entries: Vec<BatchEntry>,
}

impl BatchRequest {
    /// An empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Duplicate keys are kept; admission decides.
    pub fn push(&mut self, key: impl ToString, operations: Vec<Operation>) -> &mut Self {
        self.entries.push(BatchEntry {
            key: key.to_string(),
            operations,
            malformed: None,
        });
        self
    }

    /// Builder-style [`push`](Self::push).
    pub fn with(mut self, key: impl ToString, operations: Vec<Operation>) -> Self {
        self.push(key, operations);
        self
    }

    fn push_list(&mut self, key: impl ToString, list: OperationList) {
        let (operations, malformed) = match list {
            OperationList::Valid(ops) => (ops, None),
            OperationList::Malformed(reason) => (Vec::new(), Some(reason)),
        };
        self.entries.push(BatchEntry {
            key: key.to_string(),
            operations,
            malformed,
        });
    }

    /// Decode a request from JSON.
    ///
    /// Accepts an object keyed by image id or an array indexed by image id.
    /// Any other top level, or text that is not JSON, is an
    /// [`BatchError::InvalidBatch`].
    pub fn from_json(json: &str) -> Result<Self, BatchError> {
        serde_json::from_str(json).map_err(|e| BatchError::InvalidBatch(e.to_string()))
    }

    /// Decode a request from a reader containing JSON.
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, BatchError> {
        serde_json::from_reader(reader).map_err(|e| BatchError::InvalidBatch(e.to_string()))
    }

    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'de> Deserialize<'de> for BatchRequest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BatchVisitor;

        impl<'de> Visitor<'de> for BatchVisitor {
            type Value = BatchRequest;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object or array of per-image operation lists")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut request = BatchRequest::new();
                while let Some((key, list)) = map.next_entry::<String, OperationList>()? {
                    request.push_list(key, list);
                }
                Ok(request)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut request = BatchRequest::new();
                let mut index = 0usize;
                while let Some(list) = seq.next_element::<OperationList>()? {
                    request.push_list(index, list);
                    index += 1;
                }
                Ok(request)
            }
        }

        deserializer.deserialize_any(BatchVisitor)
    }
}
