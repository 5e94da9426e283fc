use chartflow::aggregate::build_series_view;
use chartflow::{
    DisplayMode, FieldMapping, FieldSpec, MergePolicy, PipelineError, RawDataset, Record, Scalar,
};

fn record(pairs: &[(&str, Scalar)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn text(s: &str) -> Scalar {
    Scalar::Text(s.to_string())
}

fn num(n: f64) -> Scalar {
    Scalar::Number(n)
}

fn mapping(specs: Vec<FieldSpec>) -> FieldMapping {
    FieldMapping::from_specs(specs).unwrap()
}

/// Ten daily rows, one y-field: all ten survive, chronologically ordered,
/// regardless of fetch order.
#[test]
fn daily_rows_sorted_chronologically() {
    let mut rows = Vec::new();
    for day in (1..=10).rev() {
        rows.push(record(&[
            ("date", text(&format!("2024-01-{day:02}"))),
            ("revenue", num(day as f64 * 10.0)),
        ]));
    }
    let ds = RawDataset::new(rows);
    let m = mapping(vec![FieldSpec::x("date"), FieldSpec::y("revenue")]);
    let view = build_series_view(&ds, &m, MergePolicy::Sum, DisplayMode::Absolute).unwrap();

    assert_eq!(view.len(), 10);
    assert_eq!(view.rows[0].x.canonical(), "2024-01-01");
    assert_eq!(view.rows[9].x.canonical(), "2024-01-10");
    for pair in view.rows.windows(2) {
        assert!(pair[0].date < pair[1].date);
    }
}

/// Duplicate x-values under max-reconciliation keep the larger observation.
#[test]
fn duplicate_x_max_policy() {
    let ds = RawDataset::new(vec![
        record(&[("date", text("2024-01-01")), ("revenue", num(100.0))]),
        record(&[("date", text("2024-01-01")), ("revenue", num(150.0))]),
    ]);
    let m = mapping(vec![FieldSpec::x("date"), FieldSpec::y("revenue")]);
    let view = build_series_view(&ds, &m, MergePolicy::Max, DisplayMode::Absolute).unwrap();

    assert_eq!(view.len(), 1);
    assert_eq!(view.rows[0].value("revenue"), Some(150.0));
}

#[test]
fn duplicate_x_sum_policy() {
    let ds = RawDataset::new(vec![
        record(&[("date", text("2024-01-01")), ("revenue", num(100.0))]),
        record(&[("date", text("2024-01-01")), ("revenue", num(150.0))]),
    ]);
    let m = mapping(vec![FieldSpec::x("date"), FieldSpec::y("revenue")]);
    let view = build_series_view(&ds, &m, MergePolicy::Sum, DisplayMode::Absolute).unwrap();

    assert_eq!(view.len(), 1);
    assert_eq!(view.rows[0].value("revenue"), Some(250.0));
}

/// Group-by pivots distinct group values into their own series columns.
#[test]
fn group_by_pivot() {
    let ds = RawDataset::new(vec![
        record(&[
            ("month", text("2024-01")),
            ("segment", text("DEX")),
            ("revenue", num(100.0)),
        ]),
        record(&[
            ("month", text("2024-01")),
            ("segment", text("Lending")),
            ("revenue", num(50.0)),
        ]),
    ]);
    let m = mapping(vec![
        FieldSpec::x("month"),
        FieldSpec::y("revenue"),
        FieldSpec::group("segment"),
    ]);
    let view = build_series_view(&ds, &m, MergePolicy::Sum, DisplayMode::Absolute).unwrap();

    assert_eq!(view.len(), 1);
    assert_eq!(view.series_keys, vec!["DEX".to_string(), "Lending".to_string()]);
    assert_eq!(view.rows[0].x.canonical(), "2024-01");
    assert_eq!(view.rows[0].value("DEX"), Some(100.0));
    assert_eq!(view.rows[0].value("Lending"), Some(50.0));
}

/// Multiple y-fields with a group-by produce cartesian `yfield_groupvalue`
/// series keys.
#[test]
fn group_by_with_multiple_y_fields() {
    let ds = RawDataset::new(vec![
        record(&[
            ("month", text("2024-01")),
            ("segment", text("DEX")),
            ("revenue", num(100.0)),
            ("fees", num(10.0)),
        ]),
        record(&[
            ("month", text("2024-01")),
            ("segment", text("Lending")),
            ("revenue", num(50.0)),
            ("fees", num(5.0)),
        ]),
    ]);
    let m = mapping(vec![
        FieldSpec::x("month"),
        FieldSpec::y("revenue"),
        FieldSpec::y("fees"),
        FieldSpec::group("segment"),
    ]);
    let view = build_series_view(&ds, &m, MergePolicy::Sum, DisplayMode::Absolute).unwrap();

    assert_eq!(view.rows[0].value("revenue_DEX"), Some(100.0));
    assert_eq!(view.rows[0].value("fees_Lending"), Some(5.0));
}

/// Repeated (x, group) partitions sum within the partition before pivoting.
#[test]
fn group_partitions_sum_internally() {
    let ds = RawDataset::new(vec![
        record(&[
            ("month", text("2024-01")),
            ("segment", text("DEX")),
            ("revenue", num(60.0)),
        ]),
        record(&[
            ("month", text("2024-01")),
            ("segment", text("DEX")),
            ("revenue", num(40.0)),
        ]),
    ]);
    let m = mapping(vec![
        FieldSpec::x("month"),
        FieldSpec::y("revenue"),
        FieldSpec::group("segment"),
    ]);
    let view = build_series_view(&ds, &m, MergePolicy::Sum, DisplayMode::Absolute).unwrap();
    assert_eq!(view.rows[0].value("DEX"), Some(100.0));
}

/// Percent mode: series values at each x sum to 100 when the total is
/// nonzero; a zero total leaves values at zero.
#[test]
fn percent_mode_sums_to_hundred() {
    let ds = RawDataset::new(vec![
        record(&[
            ("date", text("2024-01-01")),
            ("a", num(30.0)),
            ("b", num(70.0)),
        ]),
        record(&[
            ("date", text("2024-01-02")),
            ("a", num(0.0)),
            ("b", num(0.0)),
        ]),
    ]);
    let m = mapping(vec![FieldSpec::x("date"), FieldSpec::y("a"), FieldSpec::y("b")]);
    let view = build_series_view(&ds, &m, MergePolicy::Sum, DisplayMode::Percent).unwrap();

    let total: f64 = view.rows[0].values.values().sum();
    assert!((total - 100.0).abs() < 1e-9);
    assert_eq!(view.rows[0].value("a"), Some(30.0));
    assert_eq!(view.rows[1].value("a"), Some(0.0));
    assert_eq!(view.rows[1].value("b"), Some(0.0));
}

/// Same inputs, same output, twice.
#[test]
fn aggregation_is_deterministic() {
    let ds = RawDataset::new(vec![
        record(&[("date", text("2024-02-01")), ("v", num(5.0))]),
        record(&[("date", text("2024-01-01")), ("v", num(3.0))]),
        record(&[("date", text("2024-01-01")), ("v", num(4.0))]),
    ]);
    let m = mapping(vec![FieldSpec::x("date"), FieldSpec::y("v")]);
    let a = build_series_view(&ds, &m, MergePolicy::Sum, DisplayMode::Absolute).unwrap();
    let b = build_series_view(&ds, &m, MergePolicy::Sum, DisplayMode::Absolute).unwrap();
    assert_eq!(a, b);
}

/// Rows with a null or missing x are discarded; all-null input is an empty
/// view, not an error.
#[test]
fn null_x_rows_dropped_and_empty_is_ok() {
    let ds = RawDataset::new(vec![
        record(&[("date", Scalar::Null), ("v", num(1.0))]),
        record(&[("date", text("2024-01-01")), ("v", num(2.0))]),
    ]);
    let m = mapping(vec![FieldSpec::x("date"), FieldSpec::y("v")]);
    let view = build_series_view(&ds, &m, MergePolicy::Sum, DisplayMode::Absolute).unwrap();
    assert_eq!(view.len(), 1);

    let all_null = RawDataset::new(vec![record(&[("date", Scalar::Null), ("v", num(1.0))])]);
    let empty = build_series_view(&all_null, &m, MergePolicy::Sum, DisplayMode::Absolute).unwrap();
    assert!(empty.is_empty());
    assert_eq!(empty.series_keys, vec!["v".to_string()]);
}

/// Ordinal x-domains keep fetch order.
#[test]
fn ordinal_domain_preserves_fetch_order() {
    let ds = RawDataset::new(vec![
        record(&[("name", text("Zeta")), ("v", num(1.0))]),
        record(&[("name", text("Alpha")), ("v", num(2.0))]),
    ]);
    let m = mapping(vec![FieldSpec::x("name"), FieldSpec::y("v")]);
    let view = build_series_view(&ds, &m, MergePolicy::Sum, DisplayMode::Absolute).unwrap();
    assert_eq!(view.rows[0].x.canonical(), "Zeta");
    assert_eq!(view.rows[1].x.canonical(), "Alpha");
    assert!(view.rows[0].date.is_none());
}

/// A declared field absent from the data is a configuration error carrying
/// the available keys.
#[test]
fn unresolvable_field_is_configuration_error() {
    let ds = RawDataset::new(vec![record(&[("date", text("2024-01-01")), ("v", num(1.0))])]);
    let m = mapping(vec![FieldSpec::x("date"), FieldSpec::y("volume")]);
    match build_series_view(&ds, &m, MergePolicy::Sum, DisplayMode::Absolute) {
        Err(PipelineError::FieldNotFound { field, available }) => {
            assert_eq!(field, "volume");
            assert!(available.contains(&"date".to_string()));
        }
        other => panic!("expected FieldNotFound, got {other:?}"),
    }
}

/// Numeric strings in y-columns still aggregate.
#[test]
fn loosely_typed_numbers_coerce() {
    let ds = RawDataset::new(vec![record(&[
        ("date", text("2024-01-01")),
        ("v", text("1,234.5")),
    ])]);
    let m = mapping(vec![FieldSpec::x("date"), FieldSpec::y("v")]);
    let view = build_series_view(&ds, &m, MergePolicy::Sum, DisplayMode::Absolute).unwrap();
    assert_eq!(view.rows[0].value("v"), Some(1234.5));
}
