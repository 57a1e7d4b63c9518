use crate::chain::Chain;
use crate::source::{Source, SourceBase};
use crate::state::State;
use crate::transport::Transport;
use crate::Result;
use futures::future::BoxFuture;
use serde_json::{Map, Value, json};

/// Serves a fixed payload without touching the network.
#[derive(Debug)]
pub struct StaticSource {
    base: SourceBase,
    data: Value,
}

impl StaticSource {
    pub const TYPE_NAME: &'static str = "StaticJSON";

    pub fn new(data: Value) -> Self {
        Self {
            base: SourceBase::detached(Map::new()),
            data,
        }
    }

    pub fn data(&self) -> &Value {
        &self.data
    }
}

impl Source for StaticSource {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn base(&self) -> &SourceBase {
        &self.base
    }

    fn get_url(&self, _state: &State, _chain: &Chain, _fields: &[String]) -> Result<String> {
        Ok(String::new())
    }

    fn fetch_request<'a>(
        &'a self,
        _state: &'a State,
        _chain: &'a Chain,
        _fields: &'a [String],
        _transport: &'a dyn Transport,
    ) -> BoxFuture<'a, Result<Value>> {
        Box::pin(async move { Ok(self.data.clone()) })
    }

    fn to_json(&self) -> Value {
        json!([Self::TYPE_NAME, self.data])
    }
}
