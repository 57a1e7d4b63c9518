use super::association::{association_url, prepend_locus_fields};
use super::ld::row_lookup;
use crate::chain::{Chain, FieldRequest, Row};
use crate::source::{Source, SourceBase, columns_to_records};
use crate::state::{State, scalar_to_string};
use crate::{Error, Result};
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::Mutex;

/// Multi-dataset results (conditional analysis rounds, fine-mapping methods) where only one
/// dataset is shown at a time.
///
/// The response is an array of `{"type": .., "data": {column: [..]}}` datasets. Every dataset is
/// cached in `params.allData`, the shown one is `params.dataIndex`, and [`select_dataset`]
/// switches between them without another request. Columns listed in `params.trait_fields` are
/// copied from the association records already in the chain, matched by variant id.
///
/// [`select_dataset`]: ConditionalSource::select_dataset
#[derive(Debug)]
pub struct ConditionalSource {
    type_name: &'static str,
    base: SourceBase,
    last_request: Mutex<Option<FieldRequest>>,
}

impl ConditionalSource {
    pub const CONDITIONAL: &'static str = "ConditionalLZ";
    pub const FINE_MAPPING: &'static str = "FineMappingLZ";

    pub fn conditional(init: &Value) -> Result<Self> {
        Self::with_type(Self::CONDITIONAL, init)
    }

    pub fn fine_mapping(init: &Value) -> Result<Self> {
        Self::with_type(Self::FINE_MAPPING, init)
    }

    fn with_type(type_name: &'static str, init: &Value) -> Result<Self> {
        Ok(Self {
            type_name,
            base: SourceBase::parse_init(init)?,
            last_request: Mutex::new(None),
        })
    }

    fn id_field(&self) -> String {
        self.base
            .params()
            .get_str("id_field")
            .unwrap_or_else(|| "id".to_string())
    }

    fn trait_fields(&self) -> Vec<String> {
        self.base
            .params()
            .get("trait_fields")
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default()
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    }

    pub fn data_index(&self) -> usize {
        self.base
            .params()
            .get("dataIndex")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize
    }

    /// The `type` label of every cached dataset, in response order.
    pub fn dataset_types(&self) -> Vec<String> {
        let Some(Value::Array(all)) = self.base.params().get("allData") else {
            return Vec::new();
        };
        all.iter()
            .map(|d| d.get("type").and_then(scalar_to_string).unwrap_or_default())
            .collect()
    }

    /// Makes `index` the shown dataset and returns its records, parsed with the fields of the
    /// last request.
    pub fn select_dataset(&self, index: usize) -> Result<Vec<Row>> {
        let Some(Value::Array(all)) = self.base.params().get("allData") else {
            return Err(Error::invalid_response(self.type_name, "no dataset has been loaded"));
        };
        let Some(dataset) = all.get(index) else {
            return Err(Error::invalid_response(
                self.type_name,
                format!("dataset index {index} out of range ({} datasets)", all.len()),
            ));
        };
        let request = self
            .last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .unwrap_or_default();
        self.base.params().set("dataIndex", Value::from(index));
        self.parse_dataset(dataset, &request)
    }

    /// Selects the last dataset whose `type` equals `kind`.
    pub fn select_dataset_by_type(&self, kind: &str) -> Result<Vec<Row>> {
        let Some(index) = self.dataset_types().iter().rposition(|t| t == kind) else {
            return Err(Error::invalid_response(
                self.type_name,
                format!("no dataset of type {kind}"),
            ));
        };
        self.select_dataset(index)
    }

    fn parse_dataset(&self, dataset: &Value, request: &FieldRequest) -> Result<Vec<Row>> {
        let columns = dataset.get("data").unwrap_or(dataset);
        let Some(columns) = columns.as_object() else {
            return Err(Error::invalid_response(
                self.type_name,
                "dataset `data` must be an object of columns",
            ));
        };
        columns_to_records(columns, request)
    }
}

impl Source for ConditionalSource {
    fn type_name(&self) -> &str {
        self.type_name
    }

    fn base(&self) -> &SourceBase {
        &self.base
    }

    fn pre_get_data(&self, _state: &State, request: &mut FieldRequest) -> Result<()> {
        let id_field = self.id_field();
        if id_field == "id" {
            prepend_locus_fields(request);
        } else {
            request.prepend_if_missing("position");
            request.prepend_if_missing(&id_field);
        }
        Ok(())
    }

    fn get_url(&self, state: &State, chain: &Chain, _fields: &[String]) -> Result<String> {
        Ok(association_url(&self.base, state, chain))
    }

    fn parse_response(&self, raw: Value, chain: Chain, request: &FieldRequest) -> Result<Chain> {
        let Value::Array(mut datasets) = raw else {
            return Err(Error::invalid_response(
                self.type_name,
                "expected an array of datasets",
            ));
        };

        let mut lookup: FxHashMap<String, usize> = FxHashMap::default();
        for (idx, row) in chain.body.iter().enumerate() {
            if let Some(id) = row_lookup(row, "id").and_then(scalar_to_string) {
                lookup.insert(id, idx);
            }
        }

        let mut request = request.clone();
        for field in self.trait_fields() {
            for dataset in datasets.iter_mut() {
                let Some(columns) = dataset.get_mut("data").and_then(Value::as_object_mut) else {
                    continue;
                };
                let ids = columns
                    .get("id")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let column: Vec<Value> = ids
                    .iter()
                    .map(|id| {
                        scalar_to_string(id)
                            .and_then(|id| lookup.get(&id))
                            .and_then(|&idx| chain.body[idx].get(&field))
                            .cloned()
                            .unwrap_or_else(|| Value::String("n/a".to_string()))
                    })
                    .collect();
                columns.insert(field.clone(), Value::Array(column));
            }
            request.push(field.clone(), field);
        }

        let index = self.data_index();
        let params = self.base.params();
        params.set("dataIndex", Value::from(index));
        let body = match datasets.get(index) {
            Some(dataset) => self.parse_dataset(dataset, &request)?,
            None => Vec::new(),
        };
        params.set("allData", Value::Array(datasets));
        *self
            .last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(request);

        Ok(Chain {
            header: chain.header,
            body,
        })
    }
}
