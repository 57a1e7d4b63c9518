use super::region_of;
use crate::chain::{Chain, FieldRequest, Row};
use crate::source::{Source, SourceBase, parse_records};
use crate::state::{State, scalar_to_string};
use crate::transport::{HttpRequest, Transport};
use crate::{Error, Result};
use futures::future::BoxFuture;
use serde_json::Value;

/// Variant id written into every requested field when the catalog has no hits, so dependent
/// sources (LD in particular) still receive a well-formed reference variant.
pub const PLACEHOLDER_VARIANT: &str = "0:0_a/t";

/// GWAS catalog hits in the region, filtered by catalog ids from `params.id` (a number or a
/// list of numbers).
#[derive(Debug)]
pub struct GwasCatalogSource {
    base: SourceBase,
}

impl GwasCatalogSource {
    pub const TYPE_NAME: &'static str = "GWASCatSourceLZ";

    pub fn new(init: &Value) -> Result<Self> {
        Ok(Self {
            base: SourceBase::parse_init(init)?,
        })
    }

    fn catalog_ids(&self) -> String {
        match self.base.params().get("id") {
            Some(Value::Array(ids)) => ids
                .iter()
                .filter_map(scalar_to_string)
                .collect::<Vec<_>>()
                .join(","),
            Some(other) => scalar_to_string(&other).unwrap_or_default(),
            None => String::new(),
        }
    }
}

/// Parses a catalog payload, quoting bare `Infinity` tokens when the strict parse fails.
fn parse_catalog_json(url: &str, text: &str) -> Result<Value> {
    serde_json::from_str(text).or_else(|_| {
        tracing::debug!(%url, "retrying catalog payload with quoted Infinity");
        serde_json::from_str(&text.replace("Infinity", "\"Inf\"")).map_err(Error::Json)
    })
}

impl Source for GwasCatalogSource {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn base(&self) -> &SourceBase {
        &self.base
    }

    fn get_url(&self, state: &State, _chain: &Chain, _fields: &[String]) -> Result<String> {
        let (chr, start, end) = region_of(state);
        Ok(format!(
            "{url}results/?format=objects&filter=id in {ids} and chrom eq  '{chr}' and pos ge {start} and pos le {end}",
            url = self.base.url(),
            ids = self.catalog_ids(),
        ))
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
            let text = transport.send(HttpRequest::get(url.clone())).await?;
            parse_catalog_json(&url, &text)
        })
    }

    fn parse_response(&self, raw: Value, chain: Chain, request: &FieldRequest) -> Result<Chain> {
        let data = match raw {
            Value::Object(mut map) => map.remove("data").unwrap_or(Value::Null),
            other => other,
        };
        let Value::Array(mut records) = data else {
            return Err(Error::invalid_response(
                Self::TYPE_NAME,
                "expected `data` to be an array of catalog hits",
            ));
        };

        if records.is_empty() {
            let placeholder: Row = request
                .outnames
                .iter()
                .map(|outname| (outname.clone(), Value::from(PLACEHOLDER_VARIANT)))
                .collect();
            return Ok(Chain {
                header: chain.header,
                body: vec![placeholder],
            });
        }

        for record in &mut records {
            if let Value::Object(row) = record {
                if let Some(variant) = row.get("variant").cloned() {
                    row.insert("id".to_string(), variant);
                }
            }
        }
        let body = parse_records(self.type_name(), &Value::Array(records), request)?;
        Ok(Chain {
            header: chain.header,
            body,
        })
    }
}
