use super::{region_of, setting_string};
use crate::chain::{Chain, FieldRequest};
use crate::source::{Source, SourceBase};
use crate::state::State;
use crate::{Error, Result};
use serde_json::Value;

/// Gene annotations overlapping the region. The response rows are passed through whole, since
/// gene records carry nested transcript and exon lists.
#[derive(Debug)]
pub struct GeneSource {
    base: SourceBase,
}

impl GeneSource {
    pub const TYPE_NAME: &'static str = "GeneLZ";

    pub fn new(init: &Value) -> Result<Self> {
        Ok(Self {
            base: SourceBase::parse_init(init)?,
        })
    }
}

impl Source for GeneSource {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn base(&self) -> &SourceBase {
        &self.base
    }

    fn get_url(&self, state: &State, chain: &Chain, _fields: &[String]) -> Result<String> {
        let source = setting_string(
            self.base.resolve_setting(state, "source", chain, "source"),
            "2",
        );
        let (chr, start, end) = region_of(state);
        Ok(format!(
            "{url}?filter=source in {source} and chrom eq '{chr}' and start le {end} and end ge {start}",
            url = self.base.url(),
        ))
    }

    fn parse_response(&self, raw: Value, chain: Chain, _request: &FieldRequest) -> Result<Chain> {
        let data = match raw {
            Value::Object(mut map) => map.remove("data").unwrap_or(Value::Null),
            other => other,
        };
        let Value::Array(records) = data else {
            return Err(Error::invalid_response(
                Self::TYPE_NAME,
                "expected `data` to be an array of gene records",
            ));
        };
        let body = records
            .into_iter()
            .filter_map(|record| match record {
                Value::Object(row) => Some(row),
                _ => None,
            })
            .collect();
        Ok(Chain {
            header: chain.header,
            body,
        })
    }
}
