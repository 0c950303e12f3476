use simdeck::{
    Error,
    codec::{DealerCard, ExpandedChart, RangeChart, canonicalize, compact, expand},
};
use std::collections::BTreeMap;

fn range_chart(raw: serde_json::Value) -> RangeChart {
    serde_json::from_value(raw).expect("range chart")
}

#[test]
fn expands_hard_sixteen() {
    let chart = range_chart(serde_json::json!({
        "hard_totals": {"16": {"2-6": "S", "7-10": "H", "11": "H"}}
    }));
    let expanded = expand(&chart).unwrap();
    let row = serde_json::to_value(&expanded["16"]).unwrap();
    assert_eq!(
        row,
        serde_json::json!({
            "2": "S", "3": "S", "4": "S", "5": "S", "6": "S",
            "7": "H", "8": "H", "9": "H", "T": "H", "A": "H"
        })
    );

    let compacted = compact(&expanded);
    let mut want = BTreeMap::new();
    want.insert("2-6".to_string(), "S".to_string());
    want.insert("7-11".to_string(), "H".to_string());
    assert_eq!(compacted.hard_totals["16"], want);
}

#[test]
fn display_keys_per_category() {
    let chart = range_chart(serde_json::json!({
        "soft_totals": {"7": {"2-11": "S"}},
        "pairs": {"8": {"2-11": "P"}, "T": {"2-11": "S"}, "11": {"2-11": "P"}},
        "surrender": {"16": {"9-11": "U"}}
    }));
    let expanded = expand(&chart).unwrap();
    let keys: Vec<&str> = expanded.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["88", "A7", "AA", "TT"]);
    assert_eq!(expanded["AA"][&DealerCard::Ten], "P");
}

#[test]
fn canonical_charts_survive_a_round_trip() {
    let shipped: RangeChart =
        serde_json::from_str(include_str!("../data/strategies/s17_basic_strategy.json")).unwrap();
    let canonical = canonicalize(&shipped).unwrap();
    assert_ne!(canonical, shipped, "shipped chart splits hard 16 at 10/11");
    assert_eq!(compact(&expand(&canonical).unwrap()), canonical);
    assert_eq!(expand(&canonical).unwrap(), expand(&shipped).unwrap());
    assert_eq!(canonical.hard_totals.len(), 16);
    assert_eq!(canonical.soft_totals.len(), 8);
    assert_eq!(canonical.pairs.len(), 10);
    assert_eq!(canonical.hard_totals["11"]["2-10"], "D");
}

#[test]
fn editor_chart_compacts_by_category() {
    let editor: ExpandedChart = serde_json::from_value(serde_json::json!({
        "11": {"2": "D", "3": "D", "4": "D", "5": "D", "6": "D", "7": "D", "8": "D", "9": "D", "T": "D", "A": "H"},
        "A4": {"2": "H", "3": "H", "4": "D", "5": "D", "6": "D", "7": "H", "8": "H", "9": "H", "T": "H", "A": "H"},
        "99": {"2": "P", "3": "P", "4": "P", "5": "P", "6": "P", "7": "S", "8": "P", "9": "P", "T": "S", "A": "S"},
        "12": {}
    }))
    .unwrap();
    let range = compact(&editor);
    assert_eq!(range.hard_totals.len(), 1, "empty rows are dropped");
    assert_eq!(range.hard_totals["11"].len(), 2);
    assert_eq!(range.soft_totals["4"]["4-6"], "D");
    let nines: Vec<(&str, &str)> = range.pairs["9"]
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    assert_eq!(
        nines,
        vec![("10-11", "S"), ("2-6", "P"), ("7", "S"), ("8-9", "P")]
    );
}

#[test]
fn partial_rows_keep_their_gaps() {
    let chart = range_chart(serde_json::json!({
        "hard_totals": {"12": {"4-6": "S"}}
    }));
    let expanded = expand(&chart).unwrap();
    assert_eq!(expanded["12"].len(), 3);
    assert_eq!(canonicalize(&chart).unwrap(), chart);
}

#[test]
fn malformed_ranges_are_rejected() {
    for token in ["1-6", "2-12", "T", "7-", "9-3"] {
        let mut chart = RangeChart::default();
        chart.hard_totals.insert(
            "16".to_string(),
            BTreeMap::from([(token.to_string(), "H".to_string())]),
        );
        assert!(
            matches!(expand(&chart), Err(Error::MalformedRange { .. })),
            "{token} accepted"
        );
    }
}

#[test]
fn unknown_dealer_card_in_editor_chart_fails_to_parse() {
    let parsed: Result<ExpandedChart, _> =
        serde_json::from_value(serde_json::json!({"16": {"X": "H"}}));
    assert!(parsed.is_err());
}
