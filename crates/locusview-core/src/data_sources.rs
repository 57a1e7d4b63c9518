use crate::chain::{Chain, FieldRequest, Row};
use crate::registry::{TransformChain, TransformRegistry};
use crate::source::Source;
use crate::sources::SourceTypeRegistry;
use crate::state::State;
use crate::transport::Transport;
use crate::{Error, Result};
use indexmap::IndexMap;
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Namespace assumed for fields written without a `namespace:` prefix.
pub const DEFAULT_NAMESPACE: &str = "base";

/// Named sources, in insertion order.
#[derive(Clone, Default)]
pub struct DataSources {
    sources: IndexMap<String, Arc<dyn Source>>,
}

impl fmt::Debug for DataSources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.sources.iter().map(|(ns, s)| (ns, s.type_name())))
            .finish()
    }
}

impl DataSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `source` under `namespace`, replacing any previous source there.
    ///
    /// Namespaces outside `[A-Za-z0-9_]` are accepted but logged, since field strings cannot
    /// always address them unambiguously.
    pub fn add(&mut self, namespace: impl Into<String>, source: Arc<dyn Source>) -> &mut Self {
        let namespace = namespace.into();
        if !is_plain_namespace(&namespace) {
            tracing::warn!(
                %namespace,
                "data source namespace should only contain letters, digits and underscores"
            );
        }
        self.sources.insert(namespace, source);
        self
    }

    /// Builds a source from a `[TypeName, init]` description and registers it.
    pub fn add_spec(
        &mut self,
        namespace: impl Into<String>,
        spec: &Value,
        types: &SourceTypeRegistry,
    ) -> Result<&mut Self> {
        let source = source_from_spec(spec, types)?;
        Ok(self.add(namespace, source))
    }

    pub fn remove(&mut self, namespace: &str) -> Option<Arc<dyn Source>> {
        self.sources.shift_remove(namespace)
    }

    pub fn get(&self, namespace: &str) -> Option<&Arc<dyn Source>> {
        self.sources.get(namespace)
    }

    pub fn contains(&self, namespace: &str) -> bool {
        self.sources.contains_key(namespace)
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Builds a registry from `{namespace: [TypeName, init], ...}`.
    pub fn from_json(value: &Value, types: &SourceTypeRegistry) -> Result<Self> {
        let Some(map) = value.as_object() else {
            return Err(Error::InvalidLayout {
                message: "data sources must be described by a JSON object".to_string(),
            });
        };
        let mut out = Self::new();
        for (namespace, spec) in map {
            out.add_spec(namespace.clone(), spec, types)?;
        }
        Ok(out)
    }

    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .sources
            .iter()
            .map(|(ns, source)| (ns.clone(), source.to_json()))
            .collect();
        Value::Object(map)
    }
}

fn source_from_spec(spec: &Value, types: &SourceTypeRegistry) -> Result<Arc<dyn Source>> {
    let Some([type_name, rest @ ..]) = spec.as_array().map(Vec::as_slice) else {
        return Err(Error::InvalidLayout {
            message: format!("source spec must be [TypeName, init], got {spec}"),
        });
    };
    let Some(type_name) = type_name.as_str() else {
        return Err(Error::InvalidLayout {
            message: format!("source type name must be a string, got {type_name}"),
        });
    };
    let init = rest.first().cloned().unwrap_or(Value::Null);
    types.create(type_name, &init)
}

/// A parsed `namespace:field|trans1|trans2` identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub raw: String,
    pub namespace: String,
    pub field: String,
    /// The transform suffix including its leading pipe (`"|neglog10"`), empty when absent.
    pub transforms: String,
}

impl FieldSpec {
    pub fn parse(raw: &str) -> Result<Self> {
        let Some(caps) = field_re().captures(raw) else {
            return Err(Error::InvalidRequest {
                message: format!("unable to parse field identifier {raw:?}"),
            });
        };
        Ok(Self {
            raw: raw.to_string(),
            namespace: caps
                .get(1)
                .map_or(DEFAULT_NAMESPACE, |m| m.as_str())
                .to_string(),
            field: caps.get(2).map_or("", |m| m.as_str()).to_string(),
            transforms: caps.get(3).map_or("", |m| m.as_str()).to_string(),
        })
    }
}

pub(crate) fn is_plain_namespace(namespace: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("valid regex"))
        .is_match(namespace)
}

fn field_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:([^:]+):)?([^:|]*)(\|.+)*$").expect("valid regex"))
}

/// Resolves qualified field lists against a [`DataSources`] registry.
#[derive(Clone)]
pub struct Requester {
    sources: DataSources,
    transforms: Arc<TransformRegistry>,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for Requester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Requester")
            .field("sources", &self.sources)
            .finish_non_exhaustive()
    }
}

impl Requester {
    pub fn new(
        sources: DataSources,
        transforms: Arc<TransformRegistry>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            sources,
            transforms,
            transport,
        }
    }

    pub fn sources(&self) -> &DataSources {
        &self.sources
    }

    pub fn sources_mut(&mut self) -> &mut DataSources {
        &mut self.sources
    }

    pub fn transforms(&self) -> &TransformRegistry {
        &self.transforms
    }

    /// Groups `fields` by namespace in order of first appearance, keeping per-namespace field
    /// order and resolving every transform suffix.
    pub fn split_requests(&self, fields: &[String]) -> Result<IndexMap<String, FieldRequest>> {
        let mut requests: IndexMap<String, FieldRequest> = IndexMap::new();
        for raw in fields {
            let spec = FieldSpec::parse(raw)?;
            let trans: Option<TransformChain> = self.transforms.resolve(&spec.transforms)?;
            let request = requests.entry(spec.namespace).or_default();
            request.fields.push(spec.field);
            request.outnames.push(spec.raw);
            request.trans.push(trans);
        }
        Ok(requests)
    }

    /// Fetches `fields` for `state`, resolving namespaces one after another and threading the
    /// chain through each source. Returns the final chain's records.
    pub async fn get_data(&self, state: &State, fields: &[String]) -> Result<Vec<Row>> {
        let requests = self.split_requests(fields)?;

        let mut plan = Vec::with_capacity(requests.len());
        for (namespace, request) in requests {
            let Some(source) = self.sources.get(&namespace).cloned() else {
                return Err(Error::MissingDataSource { namespace });
            };
            plan.push((namespace, source, request));
        }

        let mut chain = Chain::new();
        for (namespace, source, request) in plan {
            tracing::debug!(
                %namespace,
                source = source.type_name(),
                fields = request.len(),
                "resolving namespace"
            );
            chain = source
                .get_data(state, request, chain, self.transport.as_ref())
                .await?;
        }
        Ok(chain.body)
    }
}
