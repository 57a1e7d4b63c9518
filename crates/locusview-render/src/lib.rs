#![forbid(unsafe_code)]

//! Headless geometry and render cycle for genomic region plots.
//!
//! A [`Plot`] stacks [`Panel`]s vertically; each panel draws its [`DataLayer`]s against shared
//! x/y1/y2 axes. Data arrives through a [`locusview_core::Requester`] during a remap cycle, and
//! rendering produces a serializable [`PlotScene`] instead of touching any drawing surface.

pub mod data_layer;
pub mod geom;
pub mod kinds;
pub mod layout;
pub mod measure;
pub mod ordering;
pub mod panel;
pub mod plot;
pub mod scale;
pub mod scene;
pub mod ticks;
pub mod tooltip;

pub use data_layer::{DataLayer, Dimension, LayerFrame};
pub use kinds::{DataLayerKind, LayerKindRegistry};
pub use measure::{DeterministicTextMeasurer, TextMeasurer};
pub use ordering::OrderedIds;
pub use panel::{Panel, PanelAxis};
pub use plot::{Plot, PlotEvent, RemapCycle, RemapOutcome, RemapStatus};
pub use scene::{Mark, PlotScene};
pub use tooltip::{TooltipPlacement, TooltipSide};

use locusview_core::Registries;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] locusview_core::Error),
    #[error("{kind} with id [{id}] already exists")]
    DuplicateId { kind: &'static str, id: String },
    #[error("unknown data layer type: {type_name}")]
    UnknownLayerType { type_name: String },
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("invalid layout: {message}")]
    InvalidLayout { message: String },
    #[error("layout JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone)]
pub struct RenderOptions {
    pub text_measurer: Arc<dyn TextMeasurer + Send + Sync>,
    pub layer_kinds: Arc<LayerKindRegistry>,
    pub registries: Registries,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            text_measurer: Arc::new(DeterministicTextMeasurer::default()),
            layer_kinds: Arc::new(LayerKindRegistry::standard()),
            registries: Registries::standard(),
        }
    }
}
