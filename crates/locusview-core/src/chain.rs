use crate::registry::TransformChain;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One output record keyed by outname (`"assoc:position"`, `"ld:state"`, ...).
pub type Row = Map<String, Value>;

/// The value threaded through the sources of one request: `header` carries cross-source metadata
/// (for example the LD reference variant), `body` carries the records produced so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chain {
    pub header: Map<String, Value>,
    pub body: Vec<Row>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// The per-namespace slice of a field list: raw field names, the qualified names they are
/// emitted under, and their transforms (aligned by index).
#[derive(Debug, Clone, Default)]
pub struct FieldRequest {
    pub fields: Vec<String>,
    pub outnames: Vec<String>,
    pub trans: Vec<Option<TransformChain>>,
}

impl FieldRequest {
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn push(&mut self, field: impl Into<String>, outname: impl Into<String>) {
        self.fields.push(field.into());
        self.outnames.push(outname.into());
        self.trans.push(None);
    }

    /// Prepends `field` (emitted under its bare name) unless already requested.
    pub fn prepend_if_missing(&mut self, field: &str) {
        if self.fields.iter().any(|f| f == field) {
            return;
        }
        self.fields.insert(0, field.to_string());
        self.outnames.insert(0, field.to_string());
        self.trans.insert(0, None);
    }

    pub(crate) fn transform(&self, idx: usize, value: &Value) -> Value {
        match self.trans.get(idx) {
            Some(Some(chain)) => chain.apply(value),
            _ => value.clone(),
        }
    }
}
