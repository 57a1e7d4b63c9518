use super::{region_of, setting_string};
use crate::chain::Chain;
use crate::source::{Source, SourceBase};
use crate::state::State;
use crate::Result;
use serde_json::Value;

/// Recombination rates over the region; the map id comes from `state.recombsource`, then the
/// chain header, then `params.source`, defaulting to `15`.
#[derive(Debug)]
pub struct RecombinationRateSource {
    base: SourceBase,
}

impl RecombinationRateSource {
    pub const TYPE_NAME: &'static str = "RecombLZ";

    pub fn new(init: &Value) -> Result<Self> {
        Ok(Self {
            base: SourceBase::parse_init(init)?,
        })
    }
}

impl Source for RecombinationRateSource {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn base(&self) -> &SourceBase {
        &self.base
    }

    fn get_url(&self, state: &State, chain: &Chain, _fields: &[String]) -> Result<String> {
        let source = setting_string(
            self.base.resolve_setting(state, "recombsource", chain, "source"),
            "15",
        );
        let (chr, start, end) = region_of(state);
        Ok(format!(
            "{url}?filter=id in {source} and chromosome eq '{chr}' and position le {end} and position ge {start}",
            url = self.base.url(),
        ))
    }
}
