#![forbid(unsafe_code)]

//! Data binding core for genomic region plots (headless).
//!
//! This crate owns everything that happens before geometry: layout values and their merge rules,
//! the shared plot state, the pluggable transform/scale/label registries, the [`Source`]
//! abstraction with its concrete variants, and the [`Requester`] that resolves qualified field
//! lists (`namespace:field|transform`) into a single row set by chaining sources in declaration
//! order.
//!
//! Design goals:
//! - registries are explicit values passed to the engine, never ambient globals
//! - runtime-agnostic async APIs (no specific executor required)
//! - the network boundary is a single [`Transport`] trait so tests never touch the network

pub mod chain;
pub mod data_sources;
pub mod error;
pub mod layout;
pub mod position;
pub mod registry;
pub mod source;
pub mod sources;
pub mod state;
pub mod template;
pub mod transport;

pub use chain::{Chain, FieldRequest, Row};
pub use data_sources::{DataSources, FieldSpec, Requester};
pub use error::{Error, Result};
pub use layout::{Layout, merge_layouts};
pub use registry::{
    LabelFn, LabelRegistry, Registries, ScaleFn, ScaleRegistry, TransformChain, TransformFn,
    TransformRegistry,
};
pub use source::{ParamBag, Source, SourceBase};
pub use sources::{SourceConstructor, SourceTypeRegistry};
pub use state::State;
pub use transport::{HttpRequest, Method, NoTransport, Transport};

#[cfg(test)]
mod tests;
