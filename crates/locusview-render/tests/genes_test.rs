use futures::executor::block_on;
use futures::future::BoxFuture;
use locusview_core::sources::GeneSource;
use locusview_core::{DataSources, HttpRequest, Requester, TransformRegistry, Transport};
use locusview_render::{LayerKindRegistry, Mark, Plot, RemapStatus, RenderOptions, TooltipSide};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

/// Answers every request with the same body and remembers the URLs it saw.
struct CannedTransport {
    body: String,
    urls: Mutex<Vec<String>>,
}

impl Transport for CannedTransport {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, locusview_core::Result<String>> {
        self.urls.lock().unwrap().push(request.url);
        let body = self.body.clone();
        Box::pin(async move { Ok(body) })
    }
}

fn gene(id: &str, name: &str, start: u64, end: u64, strand: &str, exons: Value) -> Value {
    json!({
        "gene_id": id,
        "gene_name": name,
        "chrom": "1",
        "start": start,
        "end": end,
        "strand": strand,
        "transcripts": [{ "transcript_id": format!("{id}.1"), "exons": exons }]
    })
}

fn genes_plot() -> (Plot, Arc<CannedTransport>) {
    let payload = json!({
        "data": [
            gene("G1", "AAA", 1100, 1500, "+", json!([
                { "start": 1100, "end": 1200 },
                { "start": 1400, "end": 1500 }
            ])),
            gene("G2", "BBB", 1200, 1300, "-", json!([{ "start": 1200, "end": 1300 }])),
            gene("G3", "CCC", 1700, 1900, "+", json!([])),
            gene("G4", "DDDDDDDDDD", 900, 1010, "-", json!([]))
        ]
    });
    let transport = Arc::new(CannedTransport {
        body: payload.to_string(),
        urls: Mutex::new(Vec::new()),
    });
    let mut sources = DataSources::new();
    sources.add(
        "gene",
        Arc::new(GeneSource::new(&json!({ "url": "https://genes.test/annotation" })).unwrap()),
    );
    let requester = Requester::new(
        sources,
        Arc::new(TransformRegistry::standard()),
        transport.clone(),
    );
    let layout = json!({
        "width": 1000,
        "height": 300,
        "state": { "chr": "1", "start": 1000, "end": 2000 },
        "panels": {
            "genes": {
                "data_layers": {
                    "genes": {
                        "type": "genes",
                        "fields": ["gene:all"],
                        "tooltip": { "html": "<i>{{gene_name}}</i><br>{{gene_id}}" }
                    }
                }
            }
        }
    });
    let plot = Plot::new("plot", layout, requester, RenderOptions::default()).unwrap();
    (plot, transport)
}

fn gene_marks(plot: &mut Plot) -> Vec<Mark> {
    assert_eq!(block_on(plot.refresh()), RemapStatus::Rendered);
    plot.last_scene().unwrap().panels[0].layers[0].marks.clone()
}

#[test]
fn overlapping_genes_stack_on_separate_tracks() {
    let (mut plot, transport) = genes_plot();
    let marks = gene_marks(&mut plot);
    assert_eq!(marks.len(), 4);

    let tracks: Vec<(String, usize)> = marks
        .iter()
        .map(|mark| match mark {
            Mark::Gene { name, track, .. } => (name.clone(), *track),
            other => panic!("unexpected mark {other:?}"),
        })
        .collect();
    assert_eq!(
        tracks,
        vec![
            ("AAA".to_string(), 1),
            ("BBB".to_string(), 2),
            ("CCC".to_string(), 1),
            ("DDDDDDDDDD".to_string(), 2),
        ]
    );

    let urls = transport.urls.lock().unwrap().clone();
    assert_eq!(urls.len(), 1);
    assert!(urls[0].starts_with("https://genes.test/annotation?"));
    assert!(urls[0].contains("chrom eq '1'"));
}

#[test]
fn gene_geometry_follows_track_and_exons() {
    let (mut plot, _) = genes_plot();
    let marks = gene_marks(&mut plot);

    let Mark::Gene {
        id,
        bbox,
        boundary,
        exons,
        label,
        label_anchor,
        label_position,
        ..
    } = &marks[0]
    else {
        panic!("expected a gene mark");
    };
    assert_eq!(id, "G1");
    assert_eq!(label, "AAA→");
    assert_eq!(label_anchor, "middle");
    assert_eq!((bbox.origin.x, bbox.origin.y), (94.0, 0.0));
    assert_eq!((bbox.size.width, bbox.size.height), (412.0, 44.0));
    assert_eq!(label_position.x, 300.0);
    assert_eq!(label_position.y, 18.0);
    assert_eq!(boundary.origin.x, 100.0);
    assert_eq!(boundary.size.width, 400.0);
    assert_eq!(boundary.origin.y, 30.0);
    assert_eq!(exons.len(), 2);
    assert_eq!((exons[1].origin.x, exons[1].origin.y), (400.0, 22.0));
    assert_eq!((exons[1].size.width, exons[1].size.height), (100.0, 16.0));

    let Mark::Gene { label, bbox, .. } = &marks[1] else {
        panic!("expected a gene mark");
    };
    assert_eq!(label, "←BBB");
    assert_eq!(bbox.origin.y, 54.0);
}

#[test]
fn label_of_gene_clipped_by_view_start_is_anchored_at_start() {
    let (mut plot, _) = genes_plot();
    let marks = gene_marks(&mut plot);
    let Mark::Gene {
        label_anchor,
        bbox,
        label_position,
        ..
    } = &marks[3]
    else {
        panic!("expected a gene mark");
    };
    assert_eq!(label_anchor, "start");
    assert_eq!(bbox.origin.x, -6.0);
    assert_eq!(label_position.x, 0.0);
}

#[test]
fn gene_tooltip_sits_below_a_high_track() {
    let (mut plot, _) = genes_plot();
    block_on(plot.refresh());
    let row = plot.data_layer("genes", "genes").unwrap().data()[1].clone();
    let placement = plot
        .create_tooltip("genes", "genes", row, "g2", None)
        .unwrap()
        .expect("placed");
    assert_eq!(placement.side, TooltipSide::Below);
    assert!(placement.top > 98.0);

    let tooltip = plot.data_layer("genes", "genes").unwrap().tooltip("g2").unwrap();
    assert_eq!(tooltip.html, "<i>BBB</i><br>G2");
}

#[test]
fn unknown_layer_type_is_rejected() {
    let (mut plot, _) = genes_plot();
    let err = plot
        .add_data_layer("genes", "bars", json!({ "type": "bar_chart" }))
        .unwrap_err();
    assert!(matches!(err, locusview_render::Error::UnknownLayerType { .. }));

    let err = plot
        .add_data_layer("genes", "genes", json!({ "type": "genes" }))
        .unwrap_err();
    assert!(matches!(err, locusview_render::Error::DuplicateId { .. }));

    assert_eq!(
        LayerKindRegistry::standard().list(),
        vec!["genes", "line", "scatter"]
    );
}
