use futures::executor::block_on;
use locusview::render::{Mark, RemapStatus};
use locusview::sources::StaticSource;
use locusview::{Container, DataSources, MountError, MountOptions, populate, populate_all};
use serde_json::{Value, json};
use std::sync::Arc;

fn assoc_sources() -> DataSources {
    let mut sources = DataSources::new();
    sources.add(
        "assoc",
        Arc::new(StaticSource::new(json!({
            "id": ["1:120_A/G", "1:150_C/T", "1:180_G/A"],
            "position": [120, 150, 180],
            "pvalue": [0.01, 1e-8, 0.5]
        }))),
    );
    sources
}

fn layout() -> Value {
    json!({
        "width": 800,
        "height": 200,
        "resizable": "responsive",
        "state": { "chr": "2", "start": 1, "end": 2 },
        "panels": {
            "association": {
                "data_layers": {
                    "associationpvalues": {
                        "type": "scatter",
                        "id_field": "assoc:id",
                        "fields": ["assoc:id", "assoc:position", "assoc:pvalue|neglog10"],
                        "x_axis": { "field": "assoc:position" },
                        "y_axis": { "field": "assoc:pvalue|neglog10" }
                    }
                }
            }
        }
    })
}

#[test]
fn populate_seeds_region_and_binds_fields() {
    let container = Container::new("lz-plot").with_region("1:100-200");
    let plot = block_on(populate(
        &container,
        assoc_sources(),
        layout(),
        MountOptions::default(),
    ))
    .unwrap();

    assert_eq!(plot.id(), "lz-plot");
    assert_eq!(plot.state().chr().as_deref(), Some("1"));
    assert_eq!(plot.state().start(), Some(100.0));
    assert_eq!(plot.state().end(), Some(200.0));
    assert_eq!(plot.generation(), 1);
    assert_eq!(plot.curtain(), None);

    let rows = plot
        .data_layer("association", "associationpvalues")
        .unwrap()
        .data();
    assert_eq!(rows.len(), 3);
    for row in rows {
        assert!(row.contains_key("assoc:id"));
        assert!(row.contains_key("assoc:position"));
        assert!(row.contains_key("assoc:pvalue|neglog10"));
    }
    let top = rows[1]["assoc:pvalue|neglog10"].as_f64().unwrap();
    assert!((top - 8.0).abs() < 1e-9);

    let scene = plot.last_scene().expect("rendered");
    let ids: Vec<&str> = scene.panels[0].layers[0]
        .marks
        .iter()
        .filter_map(|mark| match mark {
            Mark::Point { id, .. } => Some(id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(ids, vec!["1:120_A/G", "1:150_C/T", "1:180_G/A"]);
}

#[test]
fn populate_without_sources_skips_the_first_refresh() {
    let plot = block_on(populate(
        &Container::default(),
        DataSources::new(),
        layout(),
        MountOptions::default(),
    ))
    .unwrap();
    assert_eq!(plot.id(), "lz-0");
    assert_eq!(plot.generation(), 0);
    assert!(plot.last_scene().is_none());
    assert_eq!(plot.state().chr().as_deref(), Some("2"));
}

#[test]
fn responsive_plot_takes_the_container_width() {
    let container = Container::new("wide").with_width(1200.0);
    let plot = block_on(populate(
        &container,
        DataSources::new(),
        layout(),
        MountOptions::default(),
    ))
    .unwrap();
    assert_eq!(plot.size().width, 1200.0);
    assert_eq!(plot.size().height, 300.0);
}

#[test]
fn failed_first_refresh_leaves_a_curtained_plot() {
    let mut sources = DataSources::new();
    sources.add("other", Arc::new(StaticSource::new(json!([]))));
    let plot = block_on(populate(
        &Container::new("broken"),
        sources,
        layout(),
        MountOptions::default(),
    ))
    .unwrap();
    let curtain = plot.curtain().expect("curtain");
    assert!(curtain.contains("assoc"), "{curtain}");
}

#[test]
fn invalid_layout_is_a_mount_error() {
    let err = block_on(populate(
        &Container::new("bad"),
        DataSources::new(),
        json!({ "width": -1, "height": 100 }),
        MountOptions::default(),
    ))
    .unwrap_err();
    assert!(matches!(err, MountError::Render(_)));
}

#[test]
fn populate_all_names_anonymous_containers_by_index() {
    let containers = vec![
        Container::default(),
        Container::new("named"),
        Container::default(),
    ];
    let plots = block_on(populate_all(
        &containers,
        assoc_sources(),
        layout(),
        MountOptions::default(),
    ))
    .unwrap();
    let ids: Vec<&str> = plots.iter().map(|p| p.id()).collect();
    assert_eq!(ids, vec!["lz-0", "named", "lz-2"]);
    assert!(plots.iter().all(|p| p.generation() == 1));

    let mut plot = plots.into_iter().next().unwrap();
    let status = block_on(plot.apply_state(
        json!({ "start": 140, "end": 160 })
            .as_object()
            .cloned()
            .unwrap(),
    ));
    assert_eq!(status, RemapStatus::Rendered);
    assert_eq!(plot.generation(), 2);
}
