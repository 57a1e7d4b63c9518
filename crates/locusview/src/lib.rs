#![forbid(unsafe_code)]

//! `locusview` is a headless engine for data-bound genomic region plots.
//!
//! It re-exports the data binding core (`locusview_core`) at the crate root and the geometry and
//! scene layer under [`render`]. [`populate`] is the mount entry point: it builds a [`Plot`] from a
//! layout, seeds its region from the host container and runs the first remap.
//!
//! # Features
//!
//! - `http`: a `reqwest`-backed [`Transport`] (`locusview::http::ReqwestTransport`)

pub use locusview_core::*;

pub mod render {
    pub use locusview_render::geom;
    pub use locusview_render::layout::{DataLayerLayout, PanelLayout, PlotLayout, Resizable};
    pub use locusview_render::scene::{AxisScene, LayerScene, PanelScene};
    pub use locusview_render::ticks::{TickClip, pretty_ticks};
    pub use locusview_render::{
        DataLayer, DataLayerKind, DeterministicTextMeasurer, LayerKindRegistry, Mark, Panel,
        PanelAxis, Plot, PlotEvent, PlotScene, RemapCycle, RemapOutcome, RemapStatus,
        RenderOptions, TextMeasurer, TooltipPlacement, TooltipSide,
    };
}

#[cfg(feature = "http")]
pub mod http;

use locusview_core::position::parse_position_query;
use locusview_render::{Plot, RenderOptions};
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error(transparent)]
    Core(#[from] locusview_core::Error),
    #[error(transparent)]
    Render(#[from] locusview_render::Error),
}

pub type MountResult<T> = std::result::Result<T, MountError>;

/// What the host knows about the element a plot is mounted into.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Container {
    /// Becomes the plot id. Containers without one are named `lz-<n>`.
    pub id: Option<String>,
    /// A region query (`chr:start-end`, `chr:center+offset` or `chr:position`) that overrides the
    /// layout's initial state.
    pub region: Option<String>,
    /// Current width of the container. Only responsive plots follow it.
    pub width: Option<f64>,
}

impl Container {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_width(mut self, width: f64) -> Self {
        self.width = Some(width);
        self
    }
}

#[derive(Clone)]
pub struct MountOptions {
    pub render: RenderOptions,
    pub transport: Arc<dyn Transport>,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            render: RenderOptions::default(),
            transport: Arc::new(NoTransport),
        }
    }
}

/// Builds a plot for `container` and, when any data source is registered, runs its first
/// refresh.
///
/// A failed first refresh is not an error here: it leaves the plot behind its curtain, exactly
/// as a later failed [`Plot::apply_state`] would.
pub async fn populate(
    container: &Container,
    data_sources: DataSources,
    mut layout: Value,
    options: MountOptions,
) -> MountResult<Plot> {
    let id = container.id.clone().unwrap_or_else(|| "lz-0".to_string());

    if let Some(region) = container.region.as_deref() {
        match parse_position_query(region) {
            Some(query) => {
                if let Some(map) = layout.as_object_mut() {
                    let state = map
                        .entry("state")
                        .or_insert_with(|| Value::Object(Map::new()));
                    if let Some(state) = state.as_object_mut() {
                        state.extend(query.to_state_patch());
                    }
                }
            }
            None => tracing::warn!(plot = %id, %region, "ignoring unparseable region"),
        }
    }

    let has_sources = !data_sources.is_empty();
    let requester = Requester::new(
        data_sources,
        Arc::clone(&options.render.registries.transforms),
        options.transport,
    );
    let mut plot = Plot::new(id, layout, requester, options.render)?;

    if let Some(width) = container.width {
        let height = plot.size().height;
        plot.handle_resize(width, height);
    }

    if has_sources {
        let status = plot.refresh().await;
        tracing::debug!(plot = %plot.id(), ?status, "initial refresh finished");
    }
    Ok(plot)
}

/// Mounts one plot per container with a shared source registry and layout.
pub async fn populate_all(
    containers: &[Container],
    data_sources: DataSources,
    layout: Value,
    options: MountOptions,
) -> MountResult<Vec<Plot>> {
    let mut plots = Vec::with_capacity(containers.len());
    for (i, container) in containers.iter().enumerate() {
        let mut container = container.clone();
        if container.id.is_none() {
            container.id = Some(format!("lz-{i}"));
        }
        let plot = populate(&container, data_sources.clone(), layout.clone(), options.clone());
        plots.push(plot.await?);
    }
    Ok(plots)
}
