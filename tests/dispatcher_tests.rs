use pgprompt::db::{ColumnInfo, TableInfo};
use pgprompt::{EngineError, QueryEngine, Settings};

mod support;

use support::{load_fixture_schema, schema, spatial_schema, table};

fn users_and_orders() -> QueryEngine {
    QueryEngine::new(Some(schema(vec![
        table("users", &["id", "email"]),
        table("orders", &["id", "user_id"]),
    ])))
}

fn gis() -> QueryEngine {
    QueryEngine::new(Some(load_fixture_schema("gis_schema.json")))
}

// ── Count ────────────────────────────────────────────────────────────────────

#[test]
fn how_many_resolves_single_table() {
    assert_eq!(
        users_and_orders().generate("how many users", "").unwrap(),
        r#"SELECT COUNT(*) AS count FROM "public"."users""#
    );
}

#[test]
fn count_each_table_unions_all_tables() {
    let sql = users_and_orders()
        .generate("how many records in each table", "")
        .unwrap();
    assert!(sql.contains("UNION ALL"), "{}", sql);
    assert!(sql.contains("'public.users'"));
    assert!(sql.contains("'public.orders'"));
    assert!(sql.ends_with("ORDER BY row_count DESC"));
}

#[test]
fn count_is_case_and_whitespace_tolerant() {
    assert_eq!(
        users_and_orders().generate("  How Many ORDERS  ", "").unwrap(),
        r#"SELECT COUNT(*) AS count FROM "public"."orders""#
    );
}

// ── Show / list ──────────────────────────────────────────────────────────────

#[test]
fn show_first_n_rows() {
    let engine = QueryEngine::new(Some(schema(vec![table("customers", &["id"])])));
    let sql = engine.generate("show me the first 10 customers", "").unwrap();
    assert!(sql.contains(r#"SELECT * FROM "public"."customers" LIMIT"#), "{}", sql);
    assert!(sql.ends_with("LIMIT 10"));

    let sql = engine.generate("display the first 5 customers", "").unwrap();
    assert!(sql.contains("LIMIT 5"), "{}", sql);
}

#[test]
fn show_rows_from_table_with_default_limit() {
    assert_eq!(
        gis().generate("show me parcels", "").unwrap(),
        r#"SELECT * FROM "public"."parcels" LIMIT 50"#
    );
    assert_eq!(
        gis().generate("show me 5 rows from parcels", "").unwrap(),
        r#"SELECT * FROM "public"."parcels" LIMIT 5"#
    );
}

// ── Table info ───────────────────────────────────────────────────────────────

#[test]
fn list_tables_falls_through_show_to_listing() {
    let sql = users_and_orders().generate("list tables", "").unwrap();
    assert!(sql.contains("FROM information_schema.tables t"), "{}", sql);
    assert!(sql.contains("AS column_count"));
}

#[test]
fn describe_uses_information_schema_for_table() {
    let sql = gis().generate("describe wells", "").unwrap();
    assert!(
        sql.contains("WHERE table_schema = 'hydro' AND table_name = 'wells'"),
        "{}",
        sql
    );
    assert!(sql.ends_with("ORDER BY ordinal_position"));
}

#[test]
fn largest_tables_are_ranked_and_limited() {
    let sql = users_and_orders()
        .generate("what are the largest tables", "")
        .unwrap();
    assert!(sql.contains("UNION ALL"), "{}", sql);
    assert!(sql.ends_with("ORDER BY row_count DESC LIMIT 10"));
}

// ── Spatial ──────────────────────────────────────────────────────────────────

#[test]
fn total_length_of_roads() {
    let engine = QueryEngine::new(Some(spatial_schema(vec![TableInfo::new("public", "roads")
        .with_columns(vec![
            ColumnInfo::new("id", "integer").primary_key(),
            ColumnInfo::new("geom", "geometry").geometry("LINESTRING", 4326),
        ])])));

    let sql = engine.generate("what is the total length of roads", "").unwrap();
    assert!(sql.contains("ST_Length"), "{}", sql);
    assert!(sql.starts_with("SELECT SUM(ST_Length("));

    let sql = engine.generate("find roads within 1km", "").unwrap();
    assert!(sql.contains("ST_DWithin"), "{}", sql);
    assert!(sql.contains("1 * 1000"));
}

#[test]
fn distance_in_miles_and_meters() {
    let sql = gis().generate("find wells within 2 miles", "").unwrap();
    assert!(sql.contains("2 * 1609.34)"), "{}", sql);

    let sql = gis().generate("find wells within 500 meters", "").unwrap();
    assert!(sql.contains("ST_MakePoint(0, 0)::geography, 500)"), "{}", sql);
}

#[test]
fn words_containing_unit_letters_keep_meters() {
    let sql = gis()
        .generate("find wells within 500 m of the admin office", "")
        .unwrap();
    assert!(sql.contains("ST_MakePoint(0, 0)::geography, 500)"), "{}", sql);
    assert!(!sql.contains("1609.34"));

    let sql = gis().generate("find wells within 300 meters of a mine", "").unwrap();
    assert!(sql.contains("ST_MakePoint(0, 0)::geography, 300)"), "{}", sql);
    assert!(!sql.contains("1609.34"));
}

#[test]
fn area_ranks_polygons() {
    assert_eq!(
        gis().generate("which parcels have the biggest area", "").unwrap(),
        r#"SELECT *, ST_Area("boundary"::geography) AS area_sqm FROM "public"."parcels" ORDER BY ST_Area("boundary"::geography) DESC LIMIT 50"#
    );
}

#[test]
fn length_without_total_lists_ranked_rows() {
    // "length" is not a table, so the show matcher declines
    let sql = gis().generate("show the length of each road", "").unwrap();
    assert!(sql.contains(r#"ST_Length("geom"::geography) AS length_meters"#), "{}", sql);
}

#[test]
fn spatial_matcher_skipped_when_disabled() {
    let settings = Settings {
        enable_spatial_ops: false,
        ..Default::default()
    };
    let engine = QueryEngine::with_settings(Some(load_fixture_schema("gis_schema.json")), settings);
    let sql = engine.generate("what is the total length of roads", "").unwrap();
    assert!(!sql.contains("ST_Length"), "{}", sql);
    assert!(sql.contains(r#""public"."roads""#));
}

// ── Select and fallbacks ─────────────────────────────────────────────────────

#[test]
fn generic_select_verbs() {
    let engine = users_and_orders();
    let expected = r#"SELECT * FROM "public"."orders" LIMIT 50"#;
    assert_eq!(engine.generate("select from orders", "").unwrap(), expected);
    assert_eq!(engine.generate("fetch all orders", "").unwrap(), expected);
    assert_eq!(engine.generate("retrieve orders", "").unwrap(), expected);
}

#[test]
fn literal_table_name_is_last_resort() {
    let engine = QueryEngine::new(Some(schema(vec![table("tax", &["id"])])));
    assert_eq!(
        engine.generate("tax", "").unwrap(),
        r#"SELECT * FROM "public"."tax" LIMIT 50"#
    );
}

#[test]
fn unmatched_question_reports_original_text() {
    assert_eq!(
        users_and_orders().generate("Hi!", ""),
        Err(EngineError::NoMatch("Hi!".into()))
    );
}

#[test]
fn missing_schema_is_reported() {
    let engine = QueryEngine::new(None);
    assert_eq!(
        engine.generate("how many users", ""),
        Err(EngineError::SchemaMissing)
    );
}

#[test]
fn context_text_does_not_change_rule_output() {
    let engine = users_and_orders();
    let context = "Previous conversation:\nUser: show orders\nSQL: SELECT 1\n\n";
    assert_eq!(
        engine.generate("how many users", context).unwrap(),
        engine.generate("how many users", "").unwrap()
    );
}
