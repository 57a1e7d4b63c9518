use futures::executor::block_on;
use locusview_core::sources::StaticSource;
use locusview_core::{DataSources, NoTransport, Requester, TransformRegistry};
use locusview_render::{Mark, PanelAxis, Plot, PlotEvent, RemapStatus, RenderOptions};
use serde_json::{Map, Value, json};
use std::sync::{Arc, Mutex};

fn requester_with(namespace: &str, rows: Value) -> Requester {
    let mut sources = DataSources::new();
    sources.add(namespace, Arc::new(StaticSource::new(rows)));
    Requester::new(
        sources,
        Arc::new(TransformRegistry::standard()),
        Arc::new(NoTransport),
    )
}

fn assoc_rows() -> Value {
    json!([
        { "id": "a", "x": 120, "y": 0.5 },
        { "id": "b", "x": 150, "y": 7.3 },
        { "id": "c", "x": 180, "y": 3.0 }
    ])
}

fn scatter_layout() -> Value {
    json!({
        "width": 800,
        "height": 300,
        "state": { "chr": "1", "start": 100, "end": 200 },
        "panels": {
            "association": {
                "axes": { "x": { "label": "Chromosome 1 (Mb)" }, "y1": { "label": "-log10 p" } },
                "data_layers": {
                    "points": {
                        "type": "scatter",
                        "id_field": "assoc:id",
                        "fields": ["assoc:id", "assoc:x", "assoc:y"],
                        "x_axis": { "field": "assoc:x" },
                        "y_axis": { "field": "assoc:y", "axis": 1 }
                    }
                }
            }
        }
    })
}

fn plot() -> Plot {
    Plot::new(
        "plot",
        scatter_layout(),
        requester_with("assoc", assoc_rows()),
        RenderOptions::default(),
    )
    .expect("plot")
}

fn patch(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("patch must be an object"),
    }
}

#[test]
fn refresh_binds_rows_and_renders() {
    let mut plot = plot();
    assert!(plot.state().contains_key("association"));
    assert!(plot.state().contains_key("association.points"));

    let status = block_on(plot.refresh());
    assert_eq!(status, RemapStatus::Rendered);
    assert_eq!(plot.generation(), 1);
    assert_eq!(plot.curtain(), None);

    let layer = plot.data_layer("association", "points").unwrap();
    assert!(layer.is_initialized());
    assert_eq!(layer.data().len(), 3);
    assert_eq!(layer.data()[1]["assoc:y"], json!(7.3));

    let scene = plot.last_scene().expect("scene");
    assert_eq!(scene.panels.len(), 1);
    let panel = &scene.panels[0];
    assert_eq!(panel.axes.len(), 2);
    assert_eq!(
        panel.axes[0].label.as_ref().map(|l| l.text.as_str()),
        Some("Chromosome 1 (Mb)")
    );
    assert_eq!(panel.layers.len(), 1);
    let marks = &panel.layers[0].marks;
    assert_eq!(marks.len(), 3);
    let Mark::Point { id, center, .. } = &marks[0] else {
        panic!("expected a point mark");
    };
    assert_eq!(id, "a");
    assert_eq!(center.x, 0.0);
}

#[test]
fn y_extent_widens_to_generated_ticks() {
    let mut plot = plot();
    block_on(plot.refresh());

    let panel = plot.panel("association").unwrap();
    assert_eq!(panel.extent(PanelAxis::X), Some([120.0, 180.0]));
    assert_eq!(panel.extent(PanelAxis::Y1), Some([0.0, 8.0]));
    let ticks = panel.ticks(PanelAxis::Y1);
    assert_eq!(ticks.first().map(|t| t.value), Some(0.0));
    assert_eq!(ticks.last().map(|t| t.value), Some(8.0));
    assert_eq!(panel.extent(PanelAxis::Y2), None);
}

#[test]
fn apply_state_merges_the_patch() {
    let mut plot = plot();
    let status = block_on(plot.apply_state(patch(json!({ "start": 110, "ldrefvar": "1:150" }))));
    assert_eq!(status, RemapStatus::Rendered);
    assert_eq!(plot.state().start(), Some(110.0));
    assert_eq!(plot.state().end(), Some(200.0));
    assert_eq!(plot.state().get_str("ldrefvar"), Some("1:150"));
}

#[test]
fn failing_layer_drops_the_curtain_and_skips_rendering() {
    let mut plot = Plot::new(
        "plot",
        scatter_layout(),
        requester_with("other", assoc_rows()),
        RenderOptions::default(),
    )
    .unwrap();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    plot.on_update(move |event| sink.lock().unwrap().push(event.clone()));

    let status = block_on(plot.refresh());
    let RemapStatus::Failed { message } = status else {
        panic!("expected failure, got {status:?}");
    };
    assert_eq!(plot.curtain(), Some(message.as_str()));
    assert_eq!(plot.panel("association").unwrap().curtain(), Some(message.as_str()));
    assert!(plot.last_scene().is_none());
    assert!(
        events
            .lock()
            .unwrap()
            .iter()
            .any(|e| matches!(e, PlotEvent::CurtainDropped { generation: 1, .. }))
    );

    plot.set_requester(requester_with("assoc", assoc_rows()));
    assert_eq!(block_on(plot.refresh()), RemapStatus::Rendered);
    assert_eq!(plot.curtain(), None);
    assert_eq!(plot.panel("association").unwrap().curtain(), None);
    assert!(
        events
            .lock()
            .unwrap()
            .contains(&PlotEvent::Rendered { generation: 2 })
    );
}

#[test]
fn superseded_cycle_is_discarded_even_when_it_fails() {
    let mut plot = plot();

    plot.set_requester(requester_with("other", json!([])));
    let first = plot.begin_remap(&patch(json!({ "start": 101 })));
    plot.set_requester(requester_with("assoc", assoc_rows()));
    let second = plot.begin_remap(&patch(json!({ "start": 102 })));
    assert_eq!(first.generation(), 1);
    assert_eq!(second.generation(), 2);

    let second = block_on(second.run());
    let first = block_on(first.run());
    assert!(first.layers.iter().any(|l| l.result.is_err()));

    assert_eq!(plot.finish_remap(second), RemapStatus::Rendered);
    assert_eq!(plot.finish_remap(first), RemapStatus::Stale);
    assert_eq!(plot.curtain(), None);
    assert_eq!(plot.state().start(), Some(102.0));
    assert_eq!(
        plot.data_layer("association", "points").unwrap().data().len(),
        3
    );
}

#[test]
fn stale_results_arriving_first_are_ignored() {
    let mut plot = plot();
    let first = plot.begin_remap(&Map::new());
    let second = plot.begin_remap(&Map::new());

    assert_eq!(plot.finish_remap(block_on(first.run())), RemapStatus::Stale);
    assert!(plot.last_scene().is_none());
    assert_eq!(plot.finish_remap(block_on(second.run())), RemapStatus::Rendered);
    assert!(plot.last_scene().is_some());
}

#[test]
fn toggling_selection_updates_the_layer_state_slot() {
    let mut plot = plot();
    block_on(plot.refresh());

    assert!(plot.toggle_selection("association", "points", "b").unwrap());
    assert_eq!(
        plot.state().get("association.points"),
        Some(&json!({ "selected": ["b"] }))
    );
    let scene = plot.render().unwrap();
    let selected: Vec<&str> = scene.panels[0].layers[0]
        .marks
        .iter()
        .filter_map(|mark| match mark {
            Mark::Point { id, selected: true, .. } => Some(id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(selected, vec!["b"]);

    assert!(!plot.toggle_selection("association", "points", "b").unwrap());
    assert_eq!(
        plot.state().get("association.points"),
        Some(&json!({ "selected": [] }))
    );
    assert!(plot.toggle_selection("association", "nope", "b").is_err());
}

#[test]
fn removing_a_layer_clears_its_state_slot() {
    let mut plot = plot();
    plot.add_data_layer(
        "association",
        "trace",
        json!({ "type": "line", "fields": ["assoc:x", "assoc:y"], "z_index": 0 }),
    )
    .unwrap();
    assert!(plot.state().contains_key("association.trace"));
    let panel = plot.panel("association").unwrap();
    let order: Vec<&str> = panel.z_order().iter().collect();
    assert_eq!(order, vec!["trace", "points"]);
    assert_eq!(panel.data_layer("points").unwrap().z_index(), 1);

    plot.remove_data_layer("association", "trace").unwrap();
    assert!(!plot.state().contains_key("association.trace"));
    assert_eq!(
        plot.panel("association")
            .unwrap()
            .data_layer("points")
            .unwrap()
            .z_index(),
        0
    );
}

#[test]
fn layout_value_reflects_live_state() {
    let mut plot = plot();
    block_on(plot.apply_state(patch(json!({ "end": 190 }))));
    let layout = plot.layout_value().unwrap();
    assert_eq!(layout["state"]["end"], json!(190));
    assert_eq!(layout["panels"]["association"]["height"], json!(300.0));
    assert_eq!(
        layout["panels"]["association"]["data_layers"]["points"]["type"],
        json!("scatter")
    );
}

#[test]
fn empty_region_keeps_the_min_extent_of_its_y_axis() {
    let mut layout = scatter_layout();
    layout["panels"]["association"]["data_layers"]["points"]["y_axis"] =
        json!({ "field": "assoc:y", "min_extent": [0, 10], "upper_buffer": 0.5 });
    let mut plot = Plot::new(
        "plot",
        layout,
        requester_with("assoc", json!([])),
        RenderOptions::default(),
    )
    .unwrap();

    assert_eq!(block_on(plot.refresh()), RemapStatus::Rendered);
    let panel = plot.panel("association").unwrap();
    assert!(panel.data_layer("points").unwrap().data().is_empty());
    assert_eq!(panel.extent(PanelAxis::Y1), Some([0.0, 10.0]));
    assert_eq!(panel.extent(PanelAxis::X), Some([100.0, 200.0]));
}

#[test]
fn decoupled_layer_contributes_no_extent() {
    let mut plot = plot();
    plot.add_data_layer(
        "association",
        "threshold",
        json!({
            "type": "line",
            "fields": ["assoc:x", "assoc:y"],
            "x_axis": { "field": "assoc:x", "decoupled": true, "floor": 0, "ceiling": 1000 },
            "y_axis": { "field": "assoc:y", "decoupled": true, "floor": 0, "ceiling": 100 }
        }),
    )
    .unwrap();

    assert_eq!(block_on(plot.refresh()), RemapStatus::Rendered);
    let panel = plot.panel("association").unwrap();
    assert_eq!(panel.data_layer("threshold").unwrap().data().len(), 3);
    assert_eq!(panel.extent(PanelAxis::X), Some([120.0, 180.0]));
    assert_eq!(panel.extent(PanelAxis::Y1), Some([0.0, 8.0]));
}

#[test]
fn layer_z_indexes_stay_dense_across_adds_and_removes() {
    let mut plot = plot();
    let line = |z: Option<i64>| {
        let mut layout = json!({ "type": "line", "fields": ["assoc:x", "assoc:y"] });
        if let Some(z) = z {
            layout["z_index"] = json!(z);
        }
        layout
    };
    let z_order = |plot: &Plot| -> Vec<(String, usize)> {
        let panel = plot.panel("association").unwrap();
        panel
            .z_order()
            .iter()
            .map(|id| (id.to_string(), panel.data_layer(id).unwrap().z_index()))
            .collect()
    };

    plot.add_data_layer("association", "a", line(Some(0))).unwrap();
    plot.add_data_layer("association", "b", line(Some(-1))).unwrap();
    plot.add_data_layer("association", "c", line(None)).unwrap();
    assert_eq!(
        z_order(&plot),
        vec![
            ("a".to_string(), 0),
            ("b".to_string(), 1),
            ("points".to_string(), 2),
            ("c".to_string(), 3),
        ]
    );

    plot.remove_data_layer("association", "b").unwrap();
    plot.add_data_layer("association", "d", line(Some(-10))).unwrap();
    plot.remove_data_layer("association", "points").unwrap();
    assert_eq!(
        z_order(&plot),
        vec![
            ("d".to_string(), 0),
            ("a".to_string(), 1),
            ("c".to_string(), 2),
        ]
    );
}

#[test]
fn unmatched_category_falls_through_to_the_next_color() {
    let mut layout = scatter_layout();
    layout["panels"]["association"]["data_layers"]["points"]["color"] = json!([
        {
            "scale_function": "categorical_bin",
            "field": "assoc:id",
            "parameters": { "categories": ["b"], "values": ["red"] }
        },
        "blue"
    ]);
    let mut plot = Plot::new(
        "plot",
        layout,
        requester_with("assoc", assoc_rows()),
        RenderOptions::default(),
    )
    .unwrap();
    assert_eq!(block_on(plot.refresh()), RemapStatus::Rendered);

    let colors: Vec<Value> = plot.last_scene().unwrap().panels[0].layers[0]
        .marks
        .iter()
        .filter_map(|mark| match mark {
            Mark::Point { color, .. } => Some(color.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(colors, vec![json!("blue"), json!("red"), json!("blue")]);
}
