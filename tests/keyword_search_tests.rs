use pgprompt::ai::{extract_keywords, find_semantic_matches, MatchKind, MatchTarget};
use pgprompt::QueryEngine;

mod support;

use support::{schema, table};

#[test]
fn near_tied_tables_union_over_shared_columns() {
    let engine = QueryEngine::new(Some(schema(vec![
        table("river_gauges", &["id", "name", "geom"]),
        table("river_segments", &["name", "id", "length"]),
        table("buildings", &["id"]),
    ])));
    assert_eq!(
        engine.generate("do i have any river data", "").unwrap(),
        "SELECT 'public.river_gauges' AS _source_table, \"id\", \"name\" FROM \"public\".\"river_gauges\" \
         UNION ALL SELECT 'public.river_segments' AS _source_table, \"id\", \"name\" FROM \"public\".\"river_segments\" \
         LIMIT 100"
    );
}

#[test]
fn near_tied_tables_without_shared_columns_are_sampled() {
    let engine = QueryEngine::new(Some(schema(vec![
        table("water_wells", &["well_id", "depth"]),
        table("water_rights", &["right_no", "holder"]),
    ])));
    assert_eq!(
        engine.generate("is there water information", "").unwrap(),
        "(SELECT 'public.water_wells' AS _source_table, * FROM \"public\".\"water_wells\" LIMIT 50) \
         UNION ALL (SELECT 'public.water_rights' AS _source_table, * FROM \"public\".\"water_rights\" LIMIT 50)"
    );
}

#[test]
fn sample_size_never_drops_below_ten_rows() {
    let tables: Vec<_> = ["a", "b", "c", "d", "e"]
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let column = format!("col{}", i);
            table(&format!("sensor_{}", s), &[column.as_str()])
        })
        .collect();
    let engine = QueryEngine::new(Some(schema(tables)));
    let sql = engine.generate("any sensor tables", "").unwrap();
    assert_eq!(sql.matches("UNION ALL").count(), 4, "{}", sql);
    assert!(sql.contains("LIMIT 20)"));
}

#[test]
fn similar_cluster_is_capped_at_five_tables() {
    let tables: Vec<_> = (0..7)
        .map(|i| table(&format!("sensor_{}", i), &["id"]))
        .collect();
    let engine = QueryEngine::new(Some(schema(tables)));
    let sql = engine.generate("any sensor tables", "").unwrap();
    assert_eq!(sql.matches("_source_table").count(), 5, "{}", sql);
    assert!(!sql.contains("sensor_5"));
}

#[test]
fn clear_outlier_is_queried_directly() {
    let engine = QueryEngine::new(Some(schema(vec![
        table("survey", &["id", "elevator"]),
        table("elevation_points", &["id", "z"]),
    ])));
    assert_eq!(
        engine.generate("which tables contain elevation", "").unwrap(),
        r#"SELECT * FROM "public"."elevation_points" LIMIT 50"#
    );
}

#[test]
fn single_match_selects_it() {
    let engine = QueryEngine::new(Some(schema(vec![
        table("users", &["id", "name"]),
        table("parcels", &["apn"]),
    ])));
    assert_eq!(
        engine.generate("find parcel data", "").unwrap(),
        r#"SELECT * FROM "public"."parcels" LIMIT 50"#
    );
}

#[test]
fn no_match_lists_tables_with_columns() {
    let engine = QueryEngine::new(Some(schema(vec![table("users", &["id", "name"])])));
    let sql = engine.generate("do i have any zebra data", "").unwrap();
    assert!(sql.contains("string_agg(column_name, ', ')"), "{}", sql);
}

#[test]
fn comment_words_are_matched() {
    let s = schema(vec![
        table("t_0042", &["id"]).with_comment("Groundwater monitoring wells"),
        table("users", &["id"]),
    ]);
    let matches = find_semantic_matches(&s, &["wells".to_string()]);
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].target, MatchTarget::Comment);
    assert_eq!(matches[0].kind, MatchKind::Exact);
    assert!((matches[0].score - 0.90).abs() < 1e-9);
    assert_eq!(matches[0].matched_on, "Groundwater monitoring wells");
}

#[test]
fn keyword_extraction_drops_stop_words_and_short_tokens() {
    assert_eq!(
        extract_keywords("search for road and rail related data"),
        vec!["road", "and", "rail"]
    );
    assert_eq!(
        extract_keywords("what data have soil samples?"),
        vec!["soil", "samples"]
    );
}
