use crate::*;
use serde_json::json;
use std::sync::Arc;

#[test]
fn standard_transforms_are_registered() {
    let reg = TransformRegistry::standard();
    assert_eq!(
        reg.list(),
        vec![
            "neglog10",
            "neglog10_or_100",
            "scinotation",
            "percent",
            "na",
            "logtoscinotation",
            "urlencode",
            "htmlescape",
        ]
    );
}

#[test]
fn transform_chain_applies_left_to_right() {
    let reg = TransformRegistry::standard();
    let chain = reg.resolve("|neglog10|scinotation").unwrap().unwrap();
    assert_eq!(chain.names(), ["neglog10", "scinotation"]);
    assert_eq!(chain.apply(&json!(1e-10)), json!("10.000"));

    let neglog = reg.resolve("|neglog10").unwrap().unwrap();
    let value = neglog.apply(&json!(0.01)).as_f64().unwrap();
    assert!((value - 2.0).abs() < 1e-12);

    assert!(reg.resolve("").unwrap().is_none());
}

#[test]
fn unknown_transform_is_an_error() {
    let reg = TransformRegistry::standard();
    let err = reg.resolve("|neglog10|nope").unwrap_err();
    assert!(matches!(err, Error::UnknownTransform { ref name } if name == "nope"));
}

#[test]
fn scinotation_switches_to_exponent_form() {
    let f = TransformRegistry::standard().get("scinotation").unwrap();
    assert_eq!(f(&json!(0.05)), json!("0.050"));
    assert_eq!(f(&json!(0.000123)), json!("1.23 × 10^-4"));
    assert_eq!(f(&json!(12345)), json!("1.23 × 10^4"));
    assert_eq!(f(&json!("not a number")), json!(null));
}

#[test]
fn percent_and_na() {
    let reg = TransformRegistry::standard();
    let percent = reg.get("percent").unwrap();
    assert_eq!(percent(&json!(1)), json!("100%"));
    assert_eq!(percent(&json!(0.5)), json!("50%"));
    assert_eq!(percent(&json!(0.123)), json!("12%"));
    assert_eq!(percent(&json!(0.0012)), json!("0.12%"));

    let na = reg.get("na").unwrap();
    assert_eq!(na(&json!(null)), json!("NA"));
    assert_eq!(na(&json!(3)), json!(3));

    let or_100 = reg.get("neglog10_or_100").unwrap();
    assert_eq!(or_100(&json!(0)), json!(100));
}

#[test]
fn add_refuses_to_overwrite_but_set_replaces() {
    let mut reg = TransformRegistry::standard();
    let double: TransformFn =
        Arc::new(|v: &serde_json::Value| json!(v.as_f64().unwrap_or(0.0) * 2.0));

    let err = reg.add("percent", double.clone()).unwrap_err();
    assert!(matches!(err, Error::RegistryConflict { .. }));

    reg.add("double", double.clone()).unwrap();
    assert_eq!(reg.get("double").unwrap()(&json!(2)), json!(4.0));

    reg.set("percent", Some(double)).unwrap();
    assert_eq!(reg.get("percent").unwrap()(&json!(1)), json!(2.0));

    reg.set("percent", None).unwrap();
    assert!(matches!(
        reg.get("percent").err().unwrap(),
        Error::UnknownFunction { .. }
    ));

    let err = reg.add("|piped", Arc::new(|v: &serde_json::Value| v.clone())).unwrap_err();
    assert!(matches!(err, Error::InvalidFunctionName { .. }));
}

#[test]
fn log_to_scinotation_inverts_neglog10() {
    let f = TransformRegistry::standard().get("logtoscinotation").unwrap();
    assert_eq!(f(&json!(0)), json!("1"));
    assert_eq!(f(&json!(0.5)), json!("0.3162"));
    assert_eq!(f(&json!(1.5)), json!("0.032"));
    assert_eq!(f(&json!(3.5)), json!("3.16 × 10^-4"));
    assert_eq!(f(&json!("4")), json!("1.00 × 10^-4"));
    assert_eq!(f(&json!("abc")), json!("NaN"));
}

#[test]
fn urlencode_matches_uri_component_encoding() {
    let f = TransformRegistry::standard().get("urlencode").unwrap();
    assert_eq!(f(&json!("1:100_A/G")), json!("1%3A100_A%2FG"));
    assert_eq!(f(&json!("a b&c=d")), json!("a%20b%26c%3Dd"));
    assert_eq!(f(&json!("keep-_.!~*'()")), json!("keep-_.!~*'()"));
    assert_eq!(f(&json!("µ")), json!("%C2%B5"));
    assert_eq!(f(&json!(12)), json!("12"));
}

#[test]
fn htmlescape_neutralizes_markup() {
    let f = TransformRegistry::standard().get("htmlescape").unwrap();
    assert_eq!(
        f(&json!("<b>\"x\" & y</b>")),
        json!("&lt;b&gt;&quot;x&quot; &amp; y&lt;/b&gt;")
    );
    assert_eq!(f(&json!("`run`")), json!("&#x60;run&#x60;"));
    assert_eq!(f(&json!(null)), json!(""));
    assert_eq!(f(&json!(42)), json!("42"));
}

#[test]
fn standard_scales_are_registered() {
    assert_eq!(
        ScaleRegistry::standard_scales().list(),
        vec!["if", "numerical_bin", "categorical_bin", "ordinal_cycle", "interpolate"]
    );
}

#[test]
fn numerical_bin_picks_the_bin_below() {
    let scales = ScaleRegistry::standard_scales();
    let bin = scales.get("numerical_bin").unwrap();
    let params = json!({
        "breaks": [0, 0.2, 0.4, 0.6, 0.8],
        "values": ["a", "b", "c", "d", "e"],
        "null_value": "grey"
    });
    assert_eq!(bin(&params, &json!(0.5), 0), json!("c"));
    assert_eq!(bin(&params, &json!(0.9), 0), json!("e"));
    assert_eq!(bin(&params, &json!(-1), 0), json!("a"));
    assert_eq!(bin(&params, &json!("0.25"), 0), json!("b"));
    assert_eq!(bin(&params, &json!(null), 0), json!("grey"));
    assert_eq!(bin(&params, &json!("n/a"), 0), json!("grey"));
}

#[test]
fn numerical_bin_without_null_value_yields_null() {
    let scales = ScaleRegistry::standard_scales();
    let bin = scales.get("numerical_bin").unwrap();
    let params = json!({ "breaks": [0, 1], "values": ["low", "high"] });
    assert_eq!(bin(&params, &json!(null), 0), json!(null));
    assert_eq!(bin(&params, &json!(5), 0), json!("high"));
}

#[test]
fn categorical_bin_falls_back_to_null_value() {
    let scales = ScaleRegistry::standard_scales();
    let bin = scales.get("categorical_bin").unwrap();
    let params = json!({ "categories": ["x", "y"], "values": [1, 2], "null_value": 0 });
    assert_eq!(bin(&params, &json!("y"), 0), json!(2));
    assert_eq!(bin(&params, &json!("z"), 0), json!(0));
}

#[test]
fn categorical_bin_without_null_value_yields_null() {
    let scales = ScaleRegistry::standard_scales();
    let bin = scales.get("categorical_bin").unwrap();
    let params = json!({ "categories": ["known"], "values": ["red"] });
    assert_eq!(bin(&params, &json!("known"), 0), json!("red"));
    assert_eq!(bin(&params, &json!("other"), 0), json!(null));
    assert_eq!(bin(&params, &json!(null), 0), json!(null));
}

#[test]
fn if_returns_then_or_else() {
    let scales = ScaleRegistry::standard_scales();
    let f = scales.get("if").unwrap();
    let params = json!({ "field_value": "lead", "then": "diamond", "else": "circle" });
    assert_eq!(f(&params, &json!("lead"), 0), json!("diamond"));
    assert_eq!(f(&params, &json!("other"), 0), json!("circle"));
    assert_eq!(f(&params, &json!(null), 0), json!("circle"));

    let without_else = json!({ "field_value": 1, "then": 10 });
    assert_eq!(f(&without_else, &json!(2), 0), json!(null));
}

#[test]
fn ordinal_cycle_repeats_values_by_index() {
    let scales = ScaleRegistry::standard_scales();
    let f = scales.get("ordinal_cycle").unwrap();
    let params = json!({ "values": ["a", "b", "c"] });
    let picked: Vec<_> = (0..5).map(|i| f(&params, &json!(null), i)).collect();
    assert_eq!(picked, vec![json!("a"), json!("b"), json!("c"), json!("a"), json!("b")]);
    assert_eq!(f(&json!({ "values": [] }), &json!(null), 3), json!(null));
}

#[test]
fn interpolate_blends_numbers_and_colors() {
    let scales = ScaleRegistry::standard_scales();
    let f = scales.get("interpolate").unwrap();
    let sizes = json!({ "breaks": [0, 10, 20], "values": [10, 20, 60] });
    assert_eq!(f(&sizes, &json!(-5), 0), json!(10));
    assert_eq!(f(&sizes, &json!(5), 0), json!(15.0));
    assert_eq!(f(&sizes, &json!(15), 0), json!(40.0));
    assert_eq!(f(&sizes, &json!(25), 0), json!(60));

    let colors = json!({ "breaks": [0, 1], "values": ["#000000", "#ff8000"] });
    assert_eq!(f(&colors, &json!(0.5), 0), json!("rgb(128, 64, 0)"));

    let mismatched = json!({ "breaks": [0, 1], "values": [1], "null_value": "none" });
    assert_eq!(f(&mismatched, &json!(0.5), 0), json!("none"));
    assert_eq!(f(&sizes, &json!("x"), 0), json!(null));
}

#[test]
fn chromosome_label_depends_on_numeric_chr() {
    let labels = LabelRegistry::standard_labels();
    let label = labels.get("chromosome").unwrap();
    assert_eq!(label(&State::region("1", 1.0, 2.0)), "Chromosome 1 (Mb)");
    assert_eq!(label(&State::region("X", 1.0, 2.0)), "Chromosome (Mb)");
    assert_eq!(label(&State::new()), "Chromosome (Mb)");
}
