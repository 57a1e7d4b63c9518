//! Concrete source variants and the registry of named constructors used to build sources from a
//! `[TypeName, init]` description.

mod association;
mod clinvar;
mod conditional;
mod gene;
mod gwas_catalog;
mod ld;
mod recomb;
mod static_json;

pub use association::AssociationSource;
pub use clinvar::ClinvarSource;
pub use conditional::ConditionalSource;
pub use gene::GeneSource;
pub use gwas_catalog::{GwasCatalogSource, PLACEHOLDER_VARIANT};
pub use ld::LdSource;
pub use recomb::RecombinationRateSource;
pub use static_json::StaticSource;

use crate::source::Source;
use crate::state::State;
use crate::{Error, Result};
use serde_json::Value;
use std::sync::Arc;

pub type SourceConstructor = fn(&Value) -> Result<Arc<dyn Source>>;

#[derive(Debug, Clone, Default)]
pub struct SourceTypeRegistry {
    constructors: std::collections::HashMap<&'static str, SourceConstructor>,
}

impl SourceTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, type_name: &'static str, constructor: SourceConstructor) {
        self.constructors.insert(type_name, constructor);
    }

    pub fn get(&self, type_name: &str) -> Option<SourceConstructor> {
        self.constructors.get(type_name).copied()
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.constructors.contains_key(type_name)
    }

    pub fn list(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.constructors.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn create(&self, type_name: &str, init: &Value) -> Result<Arc<dyn Source>> {
        let Some(constructor) = self.get(type_name) else {
            return Err(Error::UnknownSourceType {
                type_name: type_name.to_string(),
            });
        };
        constructor(init)
    }

    pub fn standard() -> Self {
        let mut reg = Self::new();
        reg.insert(StaticSource::TYPE_NAME, build_static);
        reg.insert(AssociationSource::TYPE_NAME, build_association);
        reg.insert(GeneSource::TYPE_NAME, build_gene);
        reg.insert(RecombinationRateSource::TYPE_NAME, build_recomb);
        reg.insert(LdSource::TYPE_NAME, build_ld);
        reg.insert(ConditionalSource::CONDITIONAL, build_conditional);
        reg.insert(ConditionalSource::FINE_MAPPING, build_fine_mapping);
        reg.insert(ClinvarSource::TYPE_NAME, build_clinvar);
        reg.insert(GwasCatalogSource::TYPE_NAME, build_gwas_catalog);
        reg
    }
}

fn build_static(init: &Value) -> Result<Arc<dyn Source>> {
    Ok(Arc::new(StaticSource::new(init.clone())))
}

fn build_association(init: &Value) -> Result<Arc<dyn Source>> {
    Ok(Arc::new(AssociationSource::new(init)?))
}

fn build_gene(init: &Value) -> Result<Arc<dyn Source>> {
    Ok(Arc::new(GeneSource::new(init)?))
}

fn build_recomb(init: &Value) -> Result<Arc<dyn Source>> {
    Ok(Arc::new(RecombinationRateSource::new(init)?))
}

fn build_ld(init: &Value) -> Result<Arc<dyn Source>> {
    Ok(Arc::new(LdSource::new(init)?))
}

fn build_conditional(init: &Value) -> Result<Arc<dyn Source>> {
    Ok(Arc::new(ConditionalSource::conditional(init)?))
}

fn build_fine_mapping(init: &Value) -> Result<Arc<dyn Source>> {
    Ok(Arc::new(ConditionalSource::fine_mapping(init)?))
}

fn build_clinvar(init: &Value) -> Result<Arc<dyn Source>> {
    Ok(Arc::new(ClinvarSource::new(init)?))
}

fn build_gwas_catalog(init: &Value) -> Result<Arc<dyn Source>> {
    Ok(Arc::new(GwasCatalogSource::new(init)?))
}

/// The `chr`/`start`/`end` triple most region endpoints filter on.
pub(crate) fn region_of(state: &State) -> (String, String, String) {
    let part = |key: &str| state.get_display(key).unwrap_or_default();
    (part("chr"), part("start"), part("end"))
}

pub(crate) fn setting_string(value: Option<Value>, default: &str) -> String {
    value
        .as_ref()
        .and_then(crate::state::scalar_to_string)
        .unwrap_or_else(|| default.to_string())
}
