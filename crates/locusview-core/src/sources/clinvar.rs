use super::region_of;
use crate::chain::{Chain, FieldRequest, Row};
use crate::source::{Source, SourceBase, objects_to_records};
use crate::state::{State, scalar_to_string, value_as_f64};
use crate::transport::{HttpRequest, Transport, fetch_json};
use crate::{Error, Result};
use futures::future::BoxFuture;
use serde_json::{Value, json};
use url::Url;

/// Pathogenic ClinVar variants in the region, fetched from an E-utilities style service in two
/// steps: a search for matching record ids, then a summary lookup for those ids.
///
/// A search with no hits yields one placeholder record with every requested field set to `-1`, so
/// panels keep their axes.
#[derive(Debug)]
pub struct ClinvarSource {
    base: SourceBase,
}

impl ClinvarSource {
    pub const TYPE_NAME: &'static str = "ClinvarLZ";

    pub fn new(init: &Value) -> Result<Self> {
        Ok(Self {
            base: SourceBase::parse_init(init)?,
        })
    }

    fn build(&self) -> u64 {
        self.base
            .params()
            .get("build")
            .and_then(|v| value_as_f64(&v))
            .map_or(38, |b| b as u64)
    }

    fn assembly(&self) -> String {
        self.base.params().get_str("assembly").unwrap_or_else(|| {
            if self.build() == 37 {
                "GRCh37".to_string()
            } else {
                "GRCh38".to_string()
            }
        })
    }

    pub fn search_url(&self, state: &State) -> Result<String> {
        let (chr, start, end) = region_of(state);
        let position_tag = if self.build() == 37 { "chrpos37" } else { "chrpos" };
        let term = format!(
            "{chr}[chr]{start}:{end}[{position_tag}]\"clinsig pathogenic\"[Properties]"
        );
        let mut url = Url::parse(&format!("{}esearch.fcgi", self.base.url()))?;
        url.query_pairs_mut()
            .append_pair("db", "clinvar")
            .append_pair("retmode", "json")
            .append_pair("term", &term)
            .append_pair("retmax", "500");
        Ok(url.into())
    }

    pub fn summary_url(&self, ids: &[String]) -> Result<String> {
        let mut url = Url::parse(&format!("{}esummary.fcgi", self.base.url()))?;
        url.query_pairs_mut()
            .append_pair("db", "clinvar")
            .append_pair("retmode", "json")
            .append_pair("id", &ids.join(","));
        Ok(url.into())
    }

    fn summary_record(&self, entry: &Value, assembly: &str) -> Option<Value> {
        let variation = entry.get("variation_set")?.as_array()?.first()?;
        let loc = variation
            .get("variation_loc")?
            .as_array()?
            .iter()
            .find(|loc| loc.get("assembly_name").and_then(Value::as_str) == Some(assembly))?;
        let field = |v: &Value, key: &str| v.get(key).cloned().unwrap_or(Value::Null);
        let text = |v: &Value, key: &str| v.get(key).and_then(scalar_to_string).unwrap_or_default();
        let traits = entry
            .get("trait_set")
            .and_then(Value::as_array)
            .map(|set| {
                set.iter()
                    .map(|t| text(t, "trait_name"))
                    .collect::<Vec<_>>()
                    .join(":")
            })
            .unwrap_or_default();
        let key = format!(
            "{}:{}_{}/{}",
            text(loc, "chr"),
            text(loc, "start"),
            text(loc, "ref"),
            text(loc, "alt")
        );
        Some(json!({
            "start": field(loc, "start"),
            "stop": field(loc, "stop"),
            "ref": field(loc, "ref"),
            "alt": field(loc, "alt"),
            "chr": field(loc, "chr"),
            "varName": field(variation, "variation_name"),
            "clinical_sig": entry
                .get("clinical_significance")
                .map(|c| field(c, "description"))
                .unwrap_or(Value::Null),
            "trait": traits,
            "y": 5,
            "id": field(entry, "uid"),
            "clinvar:id": key,
        }))
    }
}

fn placeholder(request: &FieldRequest) -> Row {
    request
        .outnames
        .iter()
        .map(|outname| (outname.clone(), Value::from(-1)))
        .collect()
}

impl Source for ClinvarSource {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn base(&self) -> &SourceBase {
        &self.base
    }

    fn fetch_request<'a>(
        &'a self,
        state: &'a State,
        _chain: &'a Chain,
        _fields: &'a [String],
        transport: &'a dyn Transport,
    ) -> BoxFuture<'a, Result<Value>> {
        Box::pin(async move {
            let search_url = self.search_url(state)?;
            let search = fetch_json(transport, HttpRequest::get(search_url.clone())).await?;
            let result = search.get("esearchresult");
            let count = result
                .and_then(|r| r.get("count"))
                .and_then(value_as_f64)
                .unwrap_or(0.0);
            if count == 0.0 {
                tracing::debug!(url = %search_url, "clinvar search returned no records");
                return Ok(json!({ "noresults": "", "pos": state.get("start").cloned() }));
            }
            let Some(ids) = result
                .and_then(|r| r.get("idlist"))
                .and_then(Value::as_array)
            else {
                return Err(Error::invalid_response(
                    Self::TYPE_NAME,
                    format!("Failed to query clinvar: {search}"),
                ));
            };
            let ids: Vec<String> = ids.iter().filter_map(scalar_to_string).collect();
            let summary_url = self.summary_url(&ids)?;
            fetch_json(transport, HttpRequest::get(summary_url)).await
        })
    }

    fn parse_response(&self, raw: Value, chain: Chain, request: &FieldRequest) -> Result<Chain> {
        if raw.get("noresults").is_some() || raw.as_str() == Some("") {
            return Ok(Chain {
                header: chain.header,
                body: vec![placeholder(request)],
            });
        }
        let Some(result) = raw.get("result").and_then(Value::as_object) else {
            return Err(Error::invalid_response(
                Self::TYPE_NAME,
                format!(
                    "error while processing clinvar: {}",
                    raw.get("esummaryresult").cloned().unwrap_or(Value::Null)
                ),
            ));
        };
        let assembly = self.assembly();
        let records: Vec<Value> = result
            .iter()
            .filter(|(key, _)| key.as_str() != "uids")
            .filter_map(|(_, entry)| self.summary_record(entry, &assembly))
            .collect();
        let body = objects_to_records(&records, request)?;
        Ok(Chain {
            header: chain.header,
            body,
        })
    }
}
