use super::{region_of, setting_string};
use crate::chain::{Chain, FieldRequest};
use crate::source::{Source, SourceBase};
use crate::state::State;
use crate::Result;
use serde_json::Value;

/// Association results filtered by analysis id and region.
///
/// The analysis id is read from `state.analysis`, then `chain.header.analysis`, then
/// `params.analysis`, defaulting to `3`. The `id` and `position` fields are always requested.
#[derive(Debug)]
pub struct AssociationSource {
    base: SourceBase,
}

impl AssociationSource {
    pub const TYPE_NAME: &'static str = "AssociationLZ";

    pub fn new(init: &Value) -> Result<Self> {
        Ok(Self {
            base: SourceBase::parse_init(init)?,
        })
    }
}

pub(crate) fn prepend_locus_fields(request: &mut FieldRequest) {
    // Inserted back to front so the final order is id, position.
    request.prepend_if_missing("position");
    request.prepend_if_missing("id");
}

pub(crate) fn association_url(
    base: &SourceBase,
    state: &State,
    chain: &Chain,
) -> String {
    let analysis = setting_string(base.resolve_setting(state, "analysis", chain, "analysis"), "3");
    let (chr, start, end) = region_of(state);
    format!(
        "{url}results/?filter=analysis in {analysis} and chromosome in  '{chr}' and position ge {start} and position le {end}",
        url = base.url(),
    )
}

impl Source for AssociationSource {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn base(&self) -> &SourceBase {
        &self.base
    }

    fn pre_get_data(&self, _state: &State, request: &mut FieldRequest) -> Result<()> {
        prepend_locus_fields(request);
        Ok(())
    }

    fn get_url(&self, state: &State, chain: &Chain, _fields: &[String]) -> Result<String> {
        Ok(association_url(&self.base, state, chain))
    }
}
