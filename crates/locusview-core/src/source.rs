//! The data source abstraction.
//!
//! A source turns `(state, fields, chain)` into a new chain in four steps: `pre_get_data` may
//! rewrite the field request, `get_url` builds the request target, `fetch_request` performs the
//! I/O and `parse_response` maps the raw payload into records under the requested outnames.
//! Every step has a default, so concrete sources override only what differs.

use crate::chain::{Chain, FieldRequest, Row};
use crate::layout::json_kind;
use crate::state::State;
use crate::transport::{HttpRequest, Transport, fetch_json};
use crate::{Error, Result};
use futures::future::BoxFuture;
use serde_json::{Map, Value, json};
use std::sync::RwLock;

/// Mutable per-source parameters (`params` in the init object).
///
/// Some sources cache data here between requests (for example the full conditional-analysis
/// payload and the currently selected index), so access goes through a lock.
#[derive(Debug, Default)]
pub struct ParamBag(RwLock<Map<String, Value>>);

impl ParamBag {
    pub fn new(params: Map<String, Value>) -> Self {
        Self(RwLock::new(params))
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let guard = self.0.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.get(key).cloned()
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key)?.as_str().map(str::to_string)
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        let mut guard = self
            .0
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.insert(key.into(), value);
    }

    pub fn snapshot(&self) -> Map<String, Value> {
        let guard = self.0.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.clone()
    }
}

/// Configuration shared by every URL-backed source.
#[derive(Debug, Default)]
pub struct SourceBase {
    url: String,
    params: ParamBag,
    dependent: bool,
}

impl SourceBase {
    /// Accepts either a URL string or `{"url": ..., "params": {...}}`.
    pub fn parse_init(init: &Value) -> Result<Self> {
        let (url, params) = match init {
            Value::String(url) => (url.clone(), Map::new()),
            Value::Object(map) => {
                let url = map
                    .get("url")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let params = map
                    .get("params")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                (url, params)
            }
            _ => return Err(Error::MissingUrl),
        };
        if url.is_empty() {
            return Err(Error::MissingUrl);
        }
        let dependent = params
            .get("dependent")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Ok(Self {
            url,
            params: ParamBag::new(params),
            dependent,
        })
    }

    /// A base without a URL, for sources that never touch the network.
    pub fn detached(params: Map<String, Value>) -> Self {
        Self {
            url: String::new(),
            params: ParamBag::new(params),
            dependent: false,
        }
    }

    pub fn with_dependent(mut self, dependent: bool) -> Self {
        self.dependent = dependent;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn params(&self) -> &ParamBag {
        &self.params
    }

    pub fn is_dependent(&self) -> bool {
        self.dependent
    }

    /// First defined value among the state key, the chain header key and the params key.
    pub fn resolve_setting(
        &self,
        state: &State,
        state_key: &str,
        chain: &Chain,
        param_key: &str,
    ) -> Option<Value> {
        state
            .get(state_key)
            .filter(|v| is_truthy(v))
            .cloned()
            .or_else(|| chain.header.get(state_key).filter(|v| is_truthy(v)).cloned())
            .or_else(|| self.params.get(param_key).filter(is_truthy))
    }
}

pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|x| x != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub trait Source: Send + Sync {
    /// The registered type name (`"AssociationLZ"`, `"StaticJSON"`, ...).
    fn type_name(&self) -> &str;

    fn base(&self) -> &SourceBase;

    /// Dependent sources extend records produced by earlier namespaces and pass an empty chain
    /// through untouched.
    fn is_dependent(&self) -> bool {
        self.base().is_dependent()
    }

    fn pre_get_data(&self, _state: &State, _request: &mut FieldRequest) -> Result<()> {
        Ok(())
    }

    fn get_url(&self, _state: &State, _chain: &Chain, _fields: &[String]) -> Result<String> {
        Ok(self.base().url().to_string())
    }

    fn fetch_request<'a>(
        &'a self,
        state: &'a State,
        chain: &'a Chain,
        fields: &'a [String],
        transport: &'a dyn Transport,
    ) -> BoxFuture<'a, Result<Value>> {
        Box::pin(async move {
            let url = self.get_url(state, chain, fields)?;
            fetch_json(transport, HttpRequest::get(url)).await
        })
    }

    fn parse_response(&self, raw: Value, chain: Chain, request: &FieldRequest) -> Result<Chain> {
        let data = match raw {
            Value::Object(mut map) if map.get("data").is_some_and(is_truthy) => {
                map.remove("data").unwrap_or(Value::Null)
            }
            other => other,
        };
        let body = parse_records(self.type_name(), &data, request)?;
        Ok(Chain {
            header: chain.header,
            body,
        })
    }

    fn get_data<'a>(
        &'a self,
        state: &'a State,
        mut request: FieldRequest,
        chain: Chain,
        transport: &'a dyn Transport,
    ) -> BoxFuture<'a, Result<Chain>> {
        Box::pin(async move {
            self.pre_get_data(state, &mut request)?;
            if self.is_dependent() && chain.is_empty() {
                tracing::debug!(
                    source = self.type_name(),
                    "dependent source received an empty chain; passing through"
                );
                return Ok(chain);
            }
            let raw = self
                .fetch_request(state, &chain, &request.fields, transport)
                .await?;
            self.parse_response(raw, chain, &request)
        })
    }

    /// Serialized form `[type_name, {"url": ..., "params": ...}]`.
    fn to_json(&self) -> Value {
        json!([
            self.type_name(),
            { "url": self.base().url(), "params": self.base().params().snapshot() }
        ])
    }
}

/// Maps a response payload into records.
///
/// Arrays are read as one object per record; objects are read as column arrays keyed by field.
pub fn parse_records(source_name: &str, data: &Value, request: &FieldRequest) -> Result<Vec<Row>> {
    match data {
        Value::Array(records) => objects_to_records(records, request),
        Value::Object(columns) => columns_to_records(columns, request),
        other => Err(Error::invalid_response(
            source_name,
            format!("expected an array or object payload, got {}", json_kind(other)),
        )),
    }
}

/// Column form: `{"position": [..], "pvalue": [..]}`.
pub fn columns_to_records(
    columns: &Map<String, Value>,
    request: &FieldRequest,
) -> Result<Vec<Row>> {
    let mut arrays = Vec::with_capacity(request.len());
    for (field, outname) in request.fields.iter().zip(&request.outnames) {
        let Some(column) = columns.get(field) else {
            return Err(Error::MissingField {
                field: field.clone(),
                outname: outname.clone(),
            });
        };
        arrays.push(column.as_array());
    }

    let len = match arrays.first() {
        Some(first) => first.map_or(0, Vec::len),
        None => columns
            .values()
            .find_map(Value::as_array)
            .map_or(0, Vec::len),
    };

    let mut records = Vec::with_capacity(len);
    for i in 0..len {
        let mut row = Row::new();
        for (j, outname) in request.outnames.iter().enumerate() {
            let raw = arrays[j]
                .and_then(|column| column.get(i))
                .unwrap_or(&Value::Null);
            row.insert(outname.clone(), request.transform(j, raw));
        }
        records.push(row);
    }
    Ok(records)
}

/// Record form: `[{"position": .., "pvalue": ..}, ..]`.
///
/// A requested field absent from every record is an error; an empty payload yields no records.
pub fn objects_to_records(records: &[Value], request: &FieldRequest) -> Result<Vec<Row>> {
    let mut found = vec![false; request.len()];
    let mut out = Vec::with_capacity(records.len());
    for record in records {
        let mut row = Row::new();
        for (j, (field, outname)) in request.fields.iter().zip(&request.outnames).enumerate() {
            let raw = match record.get(field) {
                Some(value) => {
                    found[j] = true;
                    value
                }
                None => &Value::Null,
            };
            row.insert(outname.clone(), request.transform(j, raw));
        }
        out.push(row);
    }
    if !records.is_empty() {
        if let Some(j) = found.iter().position(|f| !f) {
            return Err(Error::MissingField {
                field: request.fields[j].clone(),
                outname: request.outnames[j].clone(),
            });
        }
    }
    Ok(out)
}
