use super::{region_of, setting_string};
use crate::chain::{Chain, FieldRequest, Row};
use crate::source::{Source, SourceBase, is_truthy};
use crate::state::{State, scalar_to_string, value_as_f64};
use crate::transport::{HttpRequest, Transport, fetch_json};
use crate::{Error, Result};
use futures::future::BoxFuture;
use serde_json::{Value, json};

/// Pairwise LD against a reference variant, joined onto the association records already in the
/// chain.
///
/// The single requested field names the reference variant: a literal id, `state` (read
/// `state.ldrefvar`, then `chain.header.ldrefvar`, then fall back to `best`) or `best` (the record
/// with the most extreme `params.pvalue_field`). The resolved id is written to
/// `chain.header.ldrefvar`.
#[derive(Debug)]
pub struct LdSource {
    base: SourceBase,
}

impl LdSource {
    pub const TYPE_NAME: &'static str = "LDLZ";

    pub fn new(init: &Value) -> Result<Self> {
        let base = SourceBase::parse_init(init)?.with_dependent(true);
        let params = base.params();
        for (key, default) in [
            ("id_field", "id"),
            ("position_field", "position"),
            ("pvalue_field", "pvalue|neglog10"),
        ] {
            if params.get(key).is_none_or(|v| !is_truthy(&v)) {
                params.set(key, Value::String(default.to_string()));
            }
        }
        Ok(Self { base })
    }

    fn param(&self, key: &str, default: &str) -> String {
        self.base
            .params()
            .get_str(key)
            .unwrap_or_else(|| default.to_string())
    }

    /// Resolves the reference variant for this request.
    pub fn reference_variant(
        &self,
        state: &State,
        chain: &Chain,
        fields: &[String],
    ) -> Result<String> {
        let mut ref_var = fields.first().cloned().unwrap_or_else(|| "state".to_string());
        if ref_var == "state" {
            ref_var = setting_string(
                state
                    .get("ldrefvar")
                    .filter(|v| is_truthy(v))
                    .or_else(|| chain.header.get("ldrefvar").filter(|v| is_truthy(v)))
                    .cloned(),
                "best",
            );
        }
        if ref_var == "best" {
            let pvalue_field = self.param("pvalue_field", "pvalue|neglog10");
            let id_field = self.param("id_field", "id");
            let Some(idx) = extreme_index(&chain.body, &pvalue_field) else {
                return Err(Error::InvalidRequest {
                    message: "No association data found to find best pvalue".to_string(),
                });
            };
            ref_var = row_lookup(&chain.body[idx], &id_field)
                .and_then(scalar_to_string)
                .ok_or_else(|| Error::InvalidRequest {
                    message: format!("best association record has no `{id_field}` value"),
                })?;
        }
        Ok(ref_var)
    }
}

/// Looks up `field` in a chain record, accepting a namespaced key (`assoc:id` for `id`).
pub(crate) fn row_lookup<'a>(row: &'a Row, field: &str) -> Option<&'a Value> {
    row.get(field).or_else(|| {
        row.iter()
            .find(|(key, _)| {
                key.split_once(':')
                    .is_some_and(|(_, rest)| rest == field)
            })
            .map(|(_, value)| value)
    })
}

fn extreme_index(body: &[Row], field: &str) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, row) in body.iter().enumerate() {
        let Some(value) = row_lookup(row, field).and_then(value_as_f64) else {
            continue;
        };
        if best.is_none_or(|(_, cur)| value > cur) {
            best = Some((idx, value));
        }
    }
    best.map(|(idx, _)| idx).or(if body.is_empty() { None } else { Some(0) })
}

impl Source for LdSource {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn base(&self) -> &SourceBase {
        &self.base
    }

    fn pre_get_data(&self, _state: &State, request: &mut FieldRequest) -> Result<()> {
        if request.len() > 1 {
            return Err(Error::InvalidRequest {
                message: "LD currently only supports one field".to_string(),
            });
        }
        Ok(())
    }

    fn get_url(&self, state: &State, chain: &Chain, fields: &[String]) -> Result<String> {
        let ref_source = setting_string(
            self.base.resolve_setting(state, "ldrefsource", chain, "source"),
            "1",
        );
        let ref_var = self.reference_variant(state, chain, fields)?;
        let (chr, start, end) = region_of(state);
        Ok(format!(
            "{url}results/?filter=reference eq {ref_source} and chromosome2 eq '{chr}' and position2 ge {start} and position2 le {end} and variant1 eq '{ref_var}'&fields=chr,pos,rsquare",
            url = self.base.url(),
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
            let ref_var = self.reference_variant(state, chain, fields)?;
            let url = self.get_url(state, chain, fields)?;
            let response = fetch_json(transport, HttpRequest::get(url)).await?;
            Ok(json!({ "ldrefvar": ref_var, "response": response }))
        })
    }

    fn parse_response(&self, raw: Value, chain: Chain, request: &FieldRequest) -> Result<Chain> {
        let Chain { mut header, mut body } = chain;
        if let Some(ref_var) = raw.get("ldrefvar") {
            header.insert("ldrefvar".to_string(), ref_var.clone());
        }

        let response = raw.get("response").unwrap_or(&raw);
        let data = response.get("data").unwrap_or(response);
        let positions = data.get("position2").and_then(Value::as_array);
        let rsquare = data.get("rsquare").and_then(Value::as_array);
        let (Some(positions), Some(rsquare)) = (positions, rsquare) else {
            return Err(Error::invalid_response(
                Self::TYPE_NAME,
                "expected `position2` and `rsquare` columns",
            ));
        };
        let Some(outname) = request.outnames.first() else {
            return Ok(Chain { header, body });
        };
        let position_field = self.param("position_field", "position");

        // Both sides are sorted by position; walk them together.
        let (mut i, mut j) = (0usize, 0usize);
        while i < body.len() && j < positions.len() {
            let left = row_lookup(&body[i], &position_field).and_then(value_as_f64);
            let right = value_as_f64(&positions[j]);
            match (left, right) {
                (Some(l), Some(r)) if l == r => {
                    let value = rsquare.get(j).cloned().unwrap_or(Value::Null);
                    body[i].insert(outname.clone(), request.transform(0, &value));
                    i += 1;
                    j += 1;
                }
                (Some(l), Some(r)) if l < r => i += 1,
                (None, _) => i += 1,
                _ => j += 1,
            }
        }
        Ok(Chain { header, body })
    }
}
