//! Integration tests for `libra.toml` configuration.

use libra::schema::{
    DuplicatePolicy, Engine, EngineConfig, RawRecord, RecordBatch, RecordKind, SchemaError,
    SchemaSelector,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn schema_records() -> Vec<RawRecord> {
    vec![
        RawRecord::new(RecordKind::Schema).with("schema_name", "Libra"),
        RawRecord::new(RecordKind::Model)
            .with("schema_name", "Libra")
            .with("model_name", "testmodel1"),
        RawRecord::new(RecordKind::Column)
            .with("schema_name", "Libra")
            .with("column_name", "testcolumn1")
            .with("type_spec", "Integer"),
        RawRecord::new(RecordKind::Column)
            .with("schema_name", "Libra")
            .with("column_name", "testcolumn2")
            .with("type_spec", "String(30)"),
        RawRecord::new(RecordKind::Association)
            .with("schema_name", "Libra")
            .with("model_name", "testmodel1")
            .with("column_name", "testcolumn1")
            .with("position", 0)
            .with("nullable", false)
            .with("autoincrement", "auto"),
        RawRecord::new(RecordKind::Association)
            .with("schema_name", "Libra")
            .with("model_name", "testmodel1")
            .with("column_name", "testcolumn2")
            .with("position", 1)
            .with("nullable", true)
            .with("autoincrement", "auto"),
        RawRecord::new(RecordKind::Constraint)
            .with("schema_name", "Libra")
            .with("model_name", "testmodel1")
            .with("constraint_type", "pk")
            .with("columns", json!(["testcolumn1"])),
    ]
}

#[test]
fn test_empty_config_uses_defaults() {
    let config = EngineConfig::from_str("").expect("Failed to parse empty config");
    assert_eq!(config.ingest.duplicate_policy, DuplicatePolicy::Overwrite);
    assert_eq!(config.ingest.null_markers, vec!["None", "-"]);
    assert!(config.build.parallel);
    assert_eq!(config.naming.table_name("testmodel1"), "testmodel1");
}

#[test]
fn test_full_config() {
    let config = EngineConfig::from_str(
        r#"
        [ingest]
        duplicate_policy = "error"
        null_markers = ["NULL"]

        [build]
        parallel = false

        [naming]
        namespace = "meta"
        prefix = "t_"
        suffix = "_v1"

        [naming.tables]
        testmodel2 = "model_two"

        [types.overrides]
        String = "VARCHAR2"

        [tables]
        columnassoc = "column_assoc"
        "#,
    )
    .expect("Failed to parse config");

    assert_eq!(config.ingest.duplicate_policy, DuplicatePolicy::Error);
    assert_eq!(config.ingest.null_markers, vec!["NULL"]);
    assert!(!config.build.parallel);
    assert_eq!(config.naming.table_name("testmodel1"), "meta.t_testmodel1_v1");
    assert_eq!(config.naming.table_name("testmodel2"), "meta.model_two");
    assert_eq!(config.type_map().get("String"), Some("VARCHAR2"));
    assert_eq!(config.tables.columnassoc, "column_assoc");
    assert_eq!(config.tables.schemadescript, "schemadescript");
}

#[test]
fn test_unknown_keys_rejected() {
    let result = EngineConfig::from_str("[build]\nthreads = 4\n");
    assert!(matches!(result, Err(SchemaError::TomlError { .. })));
}

#[test]
fn test_config_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("libra.toml");
    std::fs::write(&path, "[naming]\nprefix = \"lib_\"\n").unwrap();

    let config = EngineConfig::from_file(&path).unwrap();
    assert_eq!(config.naming.prefix, "lib_");

    let missing = EngineConfig::from_file(dir.path().join("absent.toml"));
    assert!(matches!(missing, Err(SchemaError::IoError { .. })));
}

#[test]
fn test_env_var_expansion() {
    // SAFETY: no other test reads or writes this variable.
    unsafe { std::env::set_var("LIBRA_CONFIG_TEST_NAMESPACE", "warehouse") };

    let config = EngineConfig::from_str(
        "[naming]\nnamespace = \"${LIBRA_CONFIG_TEST_NAMESPACE}\"\n",
    )
    .unwrap();
    assert_eq!(config.naming.namespace.as_deref(), Some("warehouse"));

    let unset = EngineConfig::from_str("[naming]\nprefix = \"${LIBRA_CONFIG_TEST_UNSET}\"\n").unwrap();
    assert_eq!(unset.naming.prefix, "${LIBRA_CONFIG_TEST_UNSET}");
}

#[test]
fn test_environment_overrides() {
    let content = r#"
        [ingest]
        duplicate_policy = "error"

        [naming]
        prefix = "t_"

        [environments.ci.ingest]
        duplicate_policy = "overwrite"

        [environments.ci.build]
        parallel = false

        [environments.ci.naming]
        namespace = "ci"
    "#;

    let base = EngineConfig::from_str(content).unwrap();
    let ci = base.clone().with_environment("ci");
    assert_eq!(ci.ingest.duplicate_policy, DuplicatePolicy::Overwrite);
    assert!(!ci.build.parallel);
    assert_eq!(ci.naming.table_name("m"), "ci.t_m");

    let unchanged = base.with_environment("production");
    assert_eq!(unchanged.ingest.duplicate_policy, DuplicatePolicy::Error);
    assert_eq!(unchanged.naming.table_name("m"), "t_m");
}

#[test]
fn test_naming_and_type_overrides_reach_descriptors() {
    let config = EngineConfig::from_str(
        r#"
        [naming]
        prefix = "t_"

        [types.overrides]
        String = "VARCHAR2"
        "#,
    )
    .unwrap();

    let report = Engine::new(config).build(schema_records()).unwrap();
    let model = report.schema("Libra").unwrap().model("testmodel1").unwrap();
    assert_eq!(model.table_name, "t_testmodel1");

    let column = model.column("testcolumn2").unwrap();
    assert_eq!(column.type_spec, "String(30)");
    assert_eq!(column.descriptor.base_type, "VARCHAR2");
    assert_eq!(column.descriptor.to_string(), "VARCHAR2(30)");
}

#[test]
fn test_error_policy_rejects_duplicates() {
    let config = EngineConfig::from_str("[ingest]\nduplicate_policy = \"error\"\n").unwrap();
    let engine = Engine::new(config);

    let mut records = schema_records();
    records.push(
        RawRecord::new(RecordKind::Column)
            .with("schema_name", "Libra")
            .with("column_name", "testcolumn2")
            .with("type_spec", "String(60)"),
    );

    let report = engine.build(records).unwrap();
    assert!(report.schema("Libra").is_none());
    let errors = report.errors("Libra").unwrap();
    assert!(errors.iter().any(|e| matches!(
        e,
        SchemaError::DuplicateRecord { kind: RecordKind::Column, key } if key == "Libra.testcolumn2"
    )));
}

#[test]
fn test_configured_null_markers_and_table_names() {
    let config = EngineConfig::from_str(
        r#"
        [ingest]
        null_markers = ["NULL"]

        [tables]
        columndescript = "column_descript"
        "#,
    )
    .unwrap();

    let mut source = config.table_source();
    source
        .push_row(
            "column_descript",
            json!({
                "schema_name": "Libra",
                "column_name": "testcolumn1",
                "sa_coltype": "Integer",
                "default_val": "NULL"
            })
            .as_object()
            .cloned()
            .unwrap(),
        )
        .unwrap();
    assert!(source.push_row("columndescript", Default::default()).is_err());

    let mut rest = RecordBatch::new();
    for record in schema_records()
        .into_iter()
        .filter(|r| r.kind != RecordKind::Column || r.get_str("column_name") != Some("testcolumn1"))
    {
        rest.push(record);
    }

    let report = Engine::new(config)
        .build_from_sources(&[&rest, &source], &SchemaSelector::All)
        .unwrap();
    assert!(report.is_success(), "{:?}", report.failed);
    let column = report
        .schema("Libra")
        .unwrap()
        .model("testmodel1")
        .unwrap()
        .column("testcolumn1")
        .unwrap();
    assert!(column.default.is_none());
}
