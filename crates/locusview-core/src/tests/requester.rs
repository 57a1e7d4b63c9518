use super::support::{RecordingTransport, fields};
use crate::sources::{AssociationSource, LdSource, StaticSource};
use crate::*;
use futures::executor::block_on;
use futures::future::BoxFuture;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

fn requester(sources: DataSources, transport: Arc<dyn Transport>) -> Requester {
    Requester::new(
        sources,
        Arc::new(TransformRegistry::standard()),
        transport,
    )
}

/// Logs when its fetch starts and finishes, and records the chain it was handed.
struct LoggingSource {
    name: &'static str,
    base: SourceBase,
    rows: Value,
    log: Arc<Mutex<Vec<String>>>,
    seen_chain: Mutex<Option<Chain>>,
}

impl LoggingSource {
    fn new(name: &'static str, rows: Value, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name,
            base: SourceBase::detached(Default::default()),
            rows,
            log,
            seen_chain: Mutex::new(None),
        }
    }
}

impl Source for LoggingSource {
    fn type_name(&self) -> &str {
        self.name
    }

    fn base(&self) -> &SourceBase {
        &self.base
    }

    fn fetch_request<'a>(
        &'a self,
        _state: &'a State,
        chain: &'a Chain,
        _fields: &'a [String],
        _transport: &'a dyn Transport,
    ) -> BoxFuture<'a, Result<Value>> {
        Box::pin(async move {
            self.log.lock().unwrap().push(format!("{}:start", self.name));
            *self.seen_chain.lock().unwrap() = Some(chain.clone());
            let rows = self.rows.clone();
            self.log.lock().unwrap().push(format!("{}:end", self.name));
            Ok(rows)
        })
    }
}

#[test]
fn fields_are_grouped_by_namespace_in_first_appearance_order() {
    let req = requester(DataSources::new(), Arc::new(NoTransport));
    let requests = req
        .split_requests(&fields(&[
            "b:y",
            "a:x|neglog10",
            "b:z",
            "plain",
        ]))
        .unwrap();
    let namespaces: Vec<&str> = requests.keys().map(String::as_str).collect();
    assert_eq!(namespaces, ["b", "a", "base"]);

    let b = &requests["b"];
    assert_eq!(b.fields, ["y", "z"]);
    assert_eq!(b.outnames, ["b:y", "b:z"]);

    let a = &requests["a"];
    assert_eq!(a.fields, ["x"]);
    assert_eq!(a.outnames, ["a:x|neglog10"]);
    assert_eq!(a.trans[0].as_ref().unwrap().names(), ["neglog10"]);
    assert!(requests["base"].trans[0].is_none());
}

#[test]
fn field_spec_parsing() {
    let spec = FieldSpec::parse("assoc:pvalue|neglog10|scinotation").unwrap();
    assert_eq!(spec.namespace, "assoc");
    assert_eq!(spec.field, "pvalue");
    assert_eq!(spec.transforms, "|neglog10|scinotation");

    let spec = FieldSpec::parse("position").unwrap();
    assert_eq!(spec.namespace, "base");
    assert_eq!(spec.field, "position");
    assert_eq!(spec.transforms, "");

    assert!(FieldSpec::parse("a:b:c").is_err());
}

#[test]
fn static_source_rows_are_keyed_by_outname() {
    let mut sources = DataSources::new();
    sources.add(
        "assoc",
        Arc::new(StaticSource::new(json!([
            { "id": "1:150_A/G", "pvalue": 0.001, "position": 150 },
            { "id": "1:170_C/T", "pvalue": 0.2, "position": 170 }
        ]))),
    );
    let req = requester(sources, Arc::new(NoTransport));
    let state = State::region("1", 100.0, 200.0);
    let rows = block_on(req.get_data(&state, &fields(&["assoc:id", "assoc:pvalue|neglog10"])))
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["assoc:id"], json!("1:150_A/G"));
    let p = rows[0]["assoc:pvalue|neglog10"].as_f64().unwrap();
    assert!((p - 3.0).abs() < 1e-9);
    assert!(!rows[0].contains_key("assoc:position"));
}

#[test]
fn column_payloads_are_parsed_too() {
    let mut sources = DataSources::new();
    sources.add(
        "recomb",
        Arc::new(StaticSource::new(json!({
            "data": { "position": [10, 20, 30], "recomb_rate": [0.1, 0.5, 2.0] }
        }))),
    );
    let req = requester(sources, Arc::new(NoTransport));
    let rows = block_on(req.get_data(
        &State::new(),
        &fields(&["recomb:position", "recomb:recomb_rate"]),
    ))
    .unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2]["recomb:position"], json!(30));
    assert_eq!(rows[2]["recomb:recomb_rate"], json!(2.0));
}

#[test]
fn missing_field_is_an_error() {
    let mut sources = DataSources::new();
    sources.add("a", Arc::new(StaticSource::new(json!([{ "x": 1 }]))));
    let req = requester(sources, Arc::new(NoTransport));
    let err = block_on(req.get_data(&State::new(), &fields(&["a:x", "a:nope"]))).unwrap_err();
    assert!(matches!(err, Error::MissingField { ref field, .. } if field == "nope"));
}

#[test]
fn missing_namespace_fails_before_any_fetch() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut sources = DataSources::new();
    sources.add("a", Arc::new(LoggingSource::new("a", json!([]), log.clone())));
    let req = requester(sources, Arc::new(NoTransport));

    let err = block_on(req.get_data(&State::new(), &fields(&["a:x", "ghost:y"]))).unwrap_err();
    assert!(matches!(err, Error::MissingDataSource { ref namespace } if namespace == "ghost"));
    assert!(err.to_string().contains("Datasource for namespace ghost not found"));
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn namespaces_resolve_sequentially_and_share_the_chain() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let a = Arc::new(LoggingSource::new("a", json!([{ "x": 1 }, { "x": 2 }]), log.clone()));
    let b = Arc::new(LoggingSource::new("b", json!([{ "y": 9 }]), log.clone()));
    let mut sources = DataSources::new();
    sources.add("a", a.clone()).add("b", b.clone());
    let req = requester(sources, Arc::new(NoTransport));

    let rows = block_on(req.get_data(&State::new(), &fields(&["a:x", "b:y"]))).unwrap();
    assert_eq!(rows, vec![json!({ "b:y": 9 }).as_object().unwrap().clone()]);
    assert_eq!(
        *log.lock().unwrap(),
        ["a:start", "a:end", "b:start", "b:end"]
    );

    let seen = b.seen_chain.lock().unwrap().clone().unwrap();
    assert_eq!(seen.body.len(), 2);
    assert_eq!(seen.body[1]["a:x"], json!(2));
    assert!(a.seen_chain.lock().unwrap().clone().unwrap().is_empty());
}

#[test]
fn dependent_source_passes_an_empty_chain_through() {
    let transport = Arc::new(RecordingTransport::new());
    let mut sources = DataSources::new();
    sources
        .add("assoc", Arc::new(StaticSource::new(json!([]))))
        .add(
            "ld",
            Arc::new(LdSource::new(&json!("https://ld.example/pair/LD/")).unwrap()),
        );
    let req = requester(sources, transport.clone());

    let rows = block_on(req.get_data(
        &State::region("1", 100.0, 200.0),
        &fields(&["assoc:id", "ld:state"]),
    ))
    .unwrap();
    assert!(rows.is_empty());
    assert!(transport.urls().is_empty());

    // Direct call on the source: the chain comes back untouched.
    let ld = LdSource::new(&json!("https://ld.example/pair/LD/")).unwrap();
    let mut chain = Chain::new();
    chain.header.insert("marker".to_string(), json!(true));
    let mut request = FieldRequest::default();
    request.push("state", "ld:state");
    let out = block_on(ld.get_data(&State::new(), request, chain.clone(), transport.as_ref()))
        .unwrap();
    assert_eq!(out, chain);
    assert!(transport.urls().is_empty());
}

#[test]
fn association_then_ld_joins_rsquare_by_position() {
    let transport = Arc::new(
        RecordingTransport::new()
            .respond(
                "https://api.example/assoc/",
                json!({ "data": {
                    "id": ["1:150_A/G", "1:170_C/T", "1:190_G/A"],
                    "position": [150, 170, 190],
                    "pvalue": [0.01, 1e-9, 0.3]
                }}),
            )
            .respond(
                "https://api.example/ld/",
                json!({ "data": {
                    "chromosome2": ["1", "1"],
                    "position2": [150, 170],
                    "rsquare": [0.4, 1.0]
                }}),
            ),
    );
    let mut sources = DataSources::new();
    sources
        .add(
            "assoc",
            Arc::new(AssociationSource::new(&json!("https://api.example/assoc/")).unwrap()),
        )
        .add(
            "ld",
            Arc::new(
                LdSource::new(&json!({
                    "url": "https://api.example/ld/",
                    "params": { "pvalue_field": "assoc:pvalue|neglog10" }
                }))
                .unwrap(),
            ),
        );
    let req = requester(sources, transport.clone());

    let rows = block_on(req.get_data(
        &State::region("1", 100.0, 200.0),
        &fields(&["assoc:pvalue|neglog10", "ld:state"]),
    ))
    .unwrap();

    let urls = transport.urls();
    assert_eq!(urls.len(), 2);
    assert_eq!(
        urls[0],
        "https://api.example/assoc/results/?filter=analysis in 3 and chromosome in  '1' and position ge 100 and position le 200"
    );
    assert!(urls[1].contains("variant1 eq '1:170_C/T'"));
    assert!(urls[1].contains("position2 ge 100 and position2 le 200"));

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["id"], json!("1:150_A/G"));
    assert_eq!(rows[0]["ld:state"], json!(0.4));
    assert_eq!(rows[1]["ld:state"], json!(1.0));
    assert!(!rows[2].contains_key("ld:state"));
}

#[test]
fn data_sources_round_trip_through_json() {
    let types = SourceTypeRegistry::standard();
    let description = json!({
        "assoc": ["AssociationLZ", { "url": "https://api.example/assoc/", "params": { "analysis": 45 } }],
        "gene": ["GeneLZ", "https://api.example/genes/"],
        "static": ["StaticJSON", [{ "x": 1 }]]
    });
    let sources = DataSources::from_json(&description, &types).unwrap();
    assert_eq!(sources.namespaces().collect::<Vec<_>>(), ["assoc", "gene", "static"]);
    assert_eq!(
        sources.to_json(),
        json!({
            "assoc": ["AssociationLZ", { "url": "https://api.example/assoc/", "params": { "analysis": 45 } }],
            "gene": ["GeneLZ", { "url": "https://api.example/genes/", "params": {} }],
            "static": ["StaticJSON", [{ "x": 1 }]]
        })
    );
}

#[test]
fn source_construction_errors() {
    let types = SourceTypeRegistry::standard();
    let mut sources = DataSources::new();

    let err = sources
        .add_spec("x", &json!(["NopeLZ", "https://x/"]), &types)
        .unwrap_err();
    assert!(matches!(err, Error::UnknownSourceType { .. }));

    let err = sources
        .add_spec("x", &json!(["AssociationLZ", { "params": {} }]), &types)
        .unwrap_err();
    assert!(matches!(err, Error::MissingUrl));
    assert!(err.is_configuration());

    // Re-adding under an existing key replaces the source.
    sources
        .add_spec("x", &json!(["StaticJSON", [1]]), &types)
        .unwrap();
    sources
        .add_spec("x", &json!(["GeneLZ", "https://genes/"]), &types)
        .unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources.get("x").unwrap().type_name(), "GeneLZ");
    assert!(sources.remove("x").is_some());
    assert!(sources.is_empty());
}

#[test]
fn namespaces_outside_word_characters_are_still_registered() {
    assert!(crate::data_sources::is_plain_namespace("assoc_2"));
    assert!(!crate::data_sources::is_plain_namespace("assoc-2"));
    assert!(!crate::data_sources::is_plain_namespace("gwas.cat"));
    assert!(!crate::data_sources::is_plain_namespace(""));

    let mut sources = DataSources::new();
    sources.add("assoc-2", Arc::new(StaticSource::new(json!([{ "id": "a" }]))));
    assert!(sources.contains("assoc-2"));
    let rows = block_on(
        Requester::new(
            sources,
            Arc::new(TransformRegistry::standard()),
            Arc::new(NoTransport),
        )
        .get_data(&State::new(), &fields(&["assoc-2:id"])),
    )
    .unwrap();
    assert_eq!(rows[0]["assoc-2:id"], json!("a"));
}
