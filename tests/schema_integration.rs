//! Integration tests for building schemas end to end.
//!
//! These tests drive the engine with in-memory record batches and check the
//! published descriptors and the failures reported per schema.

use libra::schema::{
    DefaultValue, Engine, EngineConfig, Literal, RawRecord, RecordKind, SchemaError, Value,
    classify_default, error::PrimaryKeyFault, parse_type_spec,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn schema(name: &str) -> RawRecord {
    RawRecord::new(RecordKind::Schema)
        .with("schema_name", name)
        .with("description", format!("{} schema", name))
}

fn model(schema: &str, name: &str) -> RawRecord {
    RawRecord::new(RecordKind::Model)
        .with("schema_name", schema)
        .with("model_name", name)
}

fn column(schema: &str, name: &str, spec: &str) -> RawRecord {
    RawRecord::new(RecordKind::Column)
        .with("schema_name", schema)
        .with("column_name", name)
        .with("type_spec", spec)
}

fn assoc(schema: &str, model: &str, column: &str, position: i64, nullable: bool) -> RawRecord {
    RawRecord::new(RecordKind::Association)
        .with("schema_name", schema)
        .with("model_name", model)
        .with("column_name", column)
        .with("position", position)
        .with("nullable", nullable)
        .with("autoincrement", "auto")
}

fn constraint(schema: &str, model: &str, kind: &str, columns: &[&str]) -> RawRecord {
    RawRecord::new(RecordKind::Constraint)
        .with("schema_name", schema)
        .with("model_name", model)
        .with("constraint_type", kind)
        .with("columns", json!(columns))
}

/// `testmodel1` with four non-nullable columns, a pk and a composite uq.
fn testmodel1(columns: &[&str]) -> Vec<RawRecord> {
    let mut records = vec![
        schema("Libra"),
        model("Libra", "testmodel1"),
        column("Libra", "testcolumn1", "Integer"),
        column("Libra", "testcolumn2", "String(30)"),
        column("Libra", "testcolumn3", "String(30)"),
        column("Libra", "testcolumn4", "Float(precision = 53)"),
    ];
    for (position, name) in columns.iter().enumerate() {
        records.push(assoc("Libra", "testmodel1", name, position as i64, false));
    }
    records.push(constraint("Libra", "testmodel1", "pk", &["testcolumn1"]));
    records.push(constraint(
        "Libra",
        "testmodel1",
        "uq",
        &["testcolumn2", "testcolumn3"],
    ));
    records
}

/// Scenario A: keyword arguments are parsed into a typed mapping.
#[test]
fn test_float_keyword_spec() {
    let spec = parse_type_spec("Float(precision = 53, asdecimal = True, decimal_return_scale = 3)")
        .expect("Failed to parse type spec");

    assert_eq!(spec.base_type.as_str(), "Float");
    assert!(spec.args.is_empty());
    assert_eq!(spec.kwarg("precision"), Some(&Value::Int(53)));
    assert_eq!(spec.kwarg("asdecimal"), Some(&Value::Bool(true)));
    assert_eq!(spec.kwarg("decimal_return_scale"), Some(&Value::Int(3)));
    assert_eq!(spec.kwargs.len(), 3);
}

/// Scenario B: pk and composite uq validate; dropping the pk column fails.
#[test]
fn test_pk_and_uq_then_missing_pk_column() {
    init_tracing();
    let engine = Engine::new(EngineConfig::default());

    let all = ["testcolumn1", "testcolumn2", "testcolumn3", "testcolumn4"];
    let report = engine.build(testmodel1(&all)).expect("Build failed");
    assert!(report.is_success());
    let model = report.schema("Libra").unwrap().model("testmodel1").unwrap();
    assert_eq!(model.constraints.len(), 2);

    let report = engine
        .build(testmodel1(&["testcolumn2", "testcolumn3", "testcolumn4"]))
        .expect("Build failed");
    let errors = report.errors("Libra").expect("Libra should fail");
    assert!(matches!(
        &errors[0],
        SchemaError::InvalidPrimaryKey {
            reason: PrimaryKeyFault::MissingColumn(column),
            ..
        } if column == "testcolumn1"
    ));
}

/// Scenario C: two associations on one position name both columns.
#[test]
fn test_position_conflict() {
    let mut records = testmodel1(&["testcolumn1", "testcolumn2"]);
    records.push(assoc("Libra", "testmodel1", "testcolumn3", 2, false));
    records.push(assoc("Libra", "testmodel1", "testcolumn4", 2, false));

    let report = Engine::default().build(records).unwrap();
    match &report.errors("Libra").unwrap()[0] {
        SchemaError::PositionConflict {
            position,
            first,
            second,
            ..
        } => {
            assert_eq!(*position, 2);
            assert_eq!(first, "testcolumn3");
            assert_eq!(second, "testcolumn4");
        }
        other => panic!("Expected PositionConflict, got {:?}", other),
    }
}

/// Scenario D: a reference to a model no schema loads is dangling.
#[test]
fn test_dangling_reference() {
    let mut records = testmodel1(&["testcolumn1", "testcolumn2", "testcolumn3", "testcolumn4"]);
    records.push(
        constraint("Libra", "testmodel1", "fk", &["testcolumn4"])
            .with("reference", "columndescript.column_name"),
    );

    let report = Engine::default().build(records).unwrap();
    assert!(report.schema("Libra").is_none());
    assert!(matches!(
        &report.errors("Libra").unwrap()[0],
        SchemaError::DanglingForeignKey { reference, .. } if reference == "columndescript.column_name"
    ));
}

/// Scenario E: call expressions are deferred, numbers are literals.
#[test]
fn test_default_classification() {
    let deferred = classify_default("datetime.now(timezone.utc)").unwrap();
    let expr = deferred.as_deferred().expect("Expected a deferred expression");
    assert_eq!(expr.callable(), "datetime.now");
    assert_eq!(expr.args().len(), 1);
    assert_eq!(expr.args()[0].as_ident(), Some("timezone.utc"));

    let literal = classify_default("999.999").unwrap();
    assert!(matches!(
        literal,
        DefaultValue::Literal {
            value: Literal::Float(f)
        } if (f - 999.999).abs() < f64::EPSILON
    ));

    assert!(matches!(
        classify_default("-").unwrap().as_literal(),
        Some(Literal::Null)
    ));
    assert!(matches!(
        classify_default("not a default"),
        Err(SchemaError::UnresolvableDefault { .. })
    ));
}

#[test]
fn test_defaults_flow_into_resolved_columns() {
    let mut records = testmodel1(&["testcolumn1", "testcolumn2", "testcolumn3", "testcolumn4"]);
    records.push(
        column("Libra", "created", "DateTime(timezone=True)")
            .with("default_val", "datetime.now(timezone.utc)"),
    );
    records.push(
        assoc("Libra", "testmodel1", "created", 4, true)
            .with("onupdate", "datetime.now(timezone.utc)")
            .with("info", json!({ "format": "%Y-%m-%d" })),
    );

    let report = Engine::default().build(records).unwrap();
    let created = report
        .schema("Libra")
        .unwrap()
        .model("testmodel1")
        .unwrap()
        .column("created")
        .unwrap();
    assert!(created.default.as_ref().unwrap().is_deferred());
    assert!(created.onupdate.as_ref().unwrap().is_deferred());
    assert_eq!(created.info["format"], json!("%Y-%m-%d"));
    assert_eq!(created.position, 4);
}

/// Resolved positions are exactly 0..n-1 for every published model.
#[test]
fn test_positions_are_contiguous() {
    let mut records = testmodel1(&[]);
    let shuffled = [("testcolumn3", 2), ("testcolumn1", 0), ("testcolumn4", 3), ("testcolumn2", 1)];
    for (name, position) in shuffled {
        records.push(assoc("Libra", "testmodel1", name, position, false));
    }

    let report = Engine::default().build(records).unwrap();
    let model = report.schema("Libra").unwrap().model("testmodel1").unwrap();
    let positions: Vec<_> = model.columns.iter().map(|c| c.position).collect();
    assert_eq!(positions, (0..4).collect::<Vec<_>>());
    let names: Vec<_> = model.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["testcolumn1", "testcolumn2", "testcolumn3", "testcolumn4"]);
}

/// No published schema has a nullable pk column.
#[test]
fn test_nullable_pk_column_never_publishes() {
    let mut records = testmodel1(&["testcolumn2", "testcolumn3", "testcolumn4"]);
    records.push(assoc("Libra", "testmodel1", "testcolumn1", 3, true));

    let report = Engine::default().build(records).unwrap();
    assert!(report.published.is_empty());
    assert!(matches!(
        &report.errors("Libra").unwrap()[0],
        SchemaError::InvalidPrimaryKey {
            reason: PrimaryKeyFault::NullableColumn(_),
            ..
        }
    ));

    for descriptor in report.published.values() {
        for model in &descriptor.models {
            if let Some(pk) = model.primary_key() {
                for name in &pk.columns {
                    assert!(!model.column(name).unwrap().nullable);
                }
            }
        }
    }
}

/// Identical input renders identical JSON.
#[test]
fn test_build_is_idempotent() {
    let mut records = testmodel1(&["testcolumn1", "testcolumn2", "testcolumn3", "testcolumn4"]);
    records.push(column("Other", "id", "Integer"));
    records.push(schema("Other"));

    let first = Engine::default().build(records.clone()).unwrap();
    let second = Engine::default().build(records).unwrap();
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    assert_eq!(
        first.schema("Libra").unwrap().to_json().unwrap(),
        second.schema("Libra").unwrap().to_json().unwrap()
    );
}

#[test]
fn test_cross_schema_fk_publishes_in_order() {
    init_tracing();
    let mut records = testmodel1(&["testcolumn1", "testcolumn2", "testcolumn3", "testcolumn4"]);
    records.extend([
        schema("Sales"),
        model("Sales", "order"),
        column("Sales", "id", "Integer"),
        column("Sales", "owner", "Integer"),
        assoc("Sales", "order", "id", 0, false),
        assoc("Sales", "order", "owner", 1, true),
        constraint("Sales", "order", "pk", &["id"]),
        constraint("Sales", "order", "fk", &["owner"])
            .with("reference", "testmodel1.testcolumn1")
            .with("ondelete", "CASCADE"),
    ]);

    let report = Engine::default().build(records).unwrap();
    assert!(report.is_success(), "{:?}", report.failed);
    let order = report.schema("Sales").unwrap().model("order").unwrap();
    let fk = order.constraints[1].foreign_key.as_ref().unwrap();
    assert_eq!(fk.target.to_string(), "Libra.testmodel1.testcolumn1");
}

/// A cycle between schemas is reported and neither side publishes.
#[test]
fn test_cycle_is_detected_before_publication() {
    let mut records = Vec::new();
    for (name, other) in [("A", "B"), ("B", "A")] {
        records.extend([
            schema(name),
            model(name, "node"),
            column(name, "id", "Integer"),
            column(name, "peer", "Integer"),
            assoc(name, "node", "id", 0, false),
            assoc(name, "node", "peer", 1, true),
            constraint(name, "node", "pk", &["id"]),
            constraint(name, "node", "fk", &["peer"])
                .with("reference", format!("{}.node.id", other)),
        ]);
    }
    records.extend([schema("C"), model("C", "empty")]);

    let report = Engine::default().build(records).unwrap();
    assert_eq!(report.published.keys().collect::<Vec<_>>(), vec!["C"]);
    for name in ["A", "B"] {
        match &report.errors(name).unwrap()[0] {
            SchemaError::CyclicSchemaReference { cycle, .. } => {
                assert_eq!(cycle, &vec!["A".to_string(), "B".to_string()]);
            }
            other => panic!("Expected CyclicSchemaReference, got {:?}", other),
        }
    }
}

/// A failing schema does not stop unrelated schemas.
#[test]
fn test_failures_are_aggregated_per_schema() {
    let mut records = testmodel1(&["testcolumn1", "testcolumn2", "testcolumn3", "testcolumn4"]);
    records.extend([
        schema("Broken"),
        model("Broken", "thing"),
        column("Broken", "a", "Numeric(10,"),
        column("Broken", "b", "Integer").with("default_val", "bogus"),
        assoc("Broken", "thing", "missing", 0, false),
    ]);

    let report = Engine::default().build(records).unwrap();
    assert!(report.schema("Libra").is_some());
    let errors = report.errors("Broken").unwrap();
    assert_eq!(errors.len(), 2);
    assert!(matches!(errors[0], SchemaError::MalformedTypeSpec { .. }));
    assert!(matches!(errors[1], SchemaError::UnresolvableDefault { .. }));
}

#[test]
fn test_duplicate_keyword_notice_is_returned() {
    let mut records = testmodel1(&["testcolumn1", "testcolumn2", "testcolumn3", "testcolumn4"]);
    records.push(column("Libra", "testcolumn4", "Float(precision=10, precision=53)"));

    let report = Engine::default().build(records).unwrap();
    assert!(report.is_success());
    let descriptor = &report
        .schema("Libra")
        .unwrap()
        .model("testmodel1")
        .unwrap()
        .column("testcolumn4")
        .unwrap()
        .descriptor;
    assert_eq!(descriptor.kwarg("precision"), Some(&Value::Int(53)));

    let rendered: Vec<_> = report.notices.iter().map(ToString::to_string).collect();
    insta::assert_debug_snapshot!(rendered, @r###"
    [
        "keyword `precision` repeated in `Float(precision=10, precision=53)`; last value kept",
        "column record `Libra.testcolumn4` in schema `Libra` was overwritten",
    ]
    "###);
}
