//! Fusion component tests
//!
//! Exercises the matching-and-merging pipeline directly on handcrafted
//! baselines and observations, without adapters or a store: formatting
//! tolerance, field enrichment, dedup, carry-forward and quality scoring.

use gymdex_common::records::{BaselineRecord, Observation};
use gymdex_harvest::config::FusionConfig;
use gymdex_harvest::fusion::FusionPipeline;

/// Route pipeline debug output through the test harness
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("gymdex_harvest=debug")
        .with_test_writer()
        .try_init();
}

fn pipeline() -> FusionPipeline {
    FusionPipeline::new(FusionConfig::default())
}

fn baseline(name: &str, address: &str) -> BaselineRecord {
    BaselineRecord::new(name, address, "public_data", 0.9)
}

fn observation(name: &str, address: &str, source: &str) -> Observation {
    let mut obs = Observation::new(name, source, 0.75);
    obs.address = Some(address.to_string());
    obs
}

#[test]
fn test_formatting_variants_resolve_to_one_facility() {
    init_tracing();
    let baselines = vec![baseline("파워피트니스 강남점", "서울특별시 강남구 테헤란로 123")];
    // spacing and punctuation differ, the facility does not
    let observations = vec![observation(
        "파워 피트니스 강남점!",
        "서울특별시 강남구 테헤란로 123",
        "naver",
    )];

    let outcome = pipeline().run(&baselines, observations);

    assert_eq!(outcome.merged, 1);
    assert_eq!(outcome.inserted, 0);
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.records[0].name, "파워피트니스 강남점");
}

#[test]
fn test_each_baseline_takes_its_own_observation() {
    init_tracing();
    let baselines = vec![
        baseline("파워 피트니스", "서울특별시 강남구 테헤란로 123"),
        baseline("강남 요가원", "서울특별시 강남구 역삼로 45"),
    ];
    let observations = vec![
        observation("강남 요가원", "서울특별시 강남구 역삼로 45", "naver"),
        observation("파워 피트니스", "서울특별시 강남구 테헤란로 123", "daum"),
    ];

    let outcome = pipeline().run(&baselines, observations);

    assert_eq!(outcome.merged, 2);
    assert_eq!(outcome.records.len(), 2);
    let fitness = outcome
        .records
        .iter()
        .find(|r| r.name == "파워 피트니스")
        .unwrap();
    let yoga = outcome
        .records
        .iter()
        .find(|r| r.name == "강남 요가원")
        .unwrap();
    assert_eq!(fitness.source, "public_data + daum");
    assert_eq!(yoga.source, "public_data + naver");
}

#[test]
fn test_enrichment_fills_empty_fields_without_conflict() {
    init_tracing();
    let baselines = vec![baseline("파워 피트니스", "서울특별시 강남구 테헤란로 123")];
    let mut obs = observation("파워 피트니스", "서울특별시 강남구 테헤란로 123", "naver");
    obs.phone = Some("02-1234-5678".to_string());
    obs.rating = Some(4.3);
    obs.review_count = Some(57);
    obs.open_hour = Some("06:00".to_string());
    obs.close_hour = Some("23:00".to_string());
    obs.services = vec!["PT".to_string(), "GX".to_string()];

    let outcome = pipeline().run(&baselines, vec![obs]);

    assert!(outcome.conflicts.is_empty());
    let record = &outcome.records[0];
    assert_eq!(record.phone.as_deref(), Some("02-1234-5678"));
    assert_eq!(record.rating, Some(4.3));
    assert_eq!(record.review_count, Some(57));
    assert_eq!(record.open_hour.as_deref(), Some("06:00"));
    assert_eq!(record.has_pt, Some(true));
    assert_eq!(record.has_gx, Some(true));
    assert_eq!(record.is_24h, Some(false));
}

#[test]
fn test_duplicate_standalone_observations_collapse() {
    init_tracing();
    // no baselines, so both observations enter standalone; they are the
    // same facility written two ways
    let observations = vec![
        observation("서초 크로스핏", "서울특별시 서초구 서초대로 77", "naver"),
        observation("서초크로스핏", "서울특별시 서초구 서초대로 77", "google"),
    ];

    let outcome = pipeline().run(&[], observations);

    assert_eq!(outcome.inserted, 2);
    assert_eq!(outcome.duplicates_removed, 1);
    assert_eq!(outcome.records.len(), 1);
    // first insertion wins
    assert_eq!(outcome.records[0].source, "naver");
}

#[test]
fn test_unmatched_baseline_carries_forward_at_the_floor() {
    init_tracing();
    let mut weak = baseline("파워 피트니스", "서울특별시 강남구 테헤란로 123");
    weak.confidence = 0.1;

    let outcome = pipeline().run(&[weak], Vec::new());

    assert_eq!(outcome.carried, 1);
    assert_eq!(outcome.records.len(), 1);
    let record = &outcome.records[0];
    assert_eq!(record.name, "파워 피트니스");
    // never below the carry floor
    assert!((record.confidence - 0.3).abs() < f32::EPSILON);
}

#[test]
fn test_observation_without_address_cannot_stand_alone() {
    init_tracing();
    let mut nameless_address = Observation::new("유령 헬스장", "naver", 0.75);
    nameless_address.phone = Some("02-5555-6666".to_string());

    let outcome = pipeline().run(&[], vec![nameless_address]);

    assert_eq!(outcome.inserted, 0);
    assert_eq!(outcome.invalid_dropped, 1);
    assert!(outcome.records.is_empty());
}

#[test]
fn test_quality_report_summarizes_the_output() {
    init_tracing();
    let baselines = vec![baseline("파워 피트니스", "서울특별시 강남구 테헤란로 123")];
    let mut obs = observation("파워 피트니스", "서울특별시 강남구 테헤란로 123", "naver");
    obs.phone = Some("02-1234-5678".to_string());
    obs.rating = Some(4.3);
    obs.review_count = Some(57);

    let p = pipeline();
    let outcome = p.run(&baselines, vec![obs]);
    let report = p.quality_report(&outcome.records);

    assert_eq!(report["record_count"], 1);
    assert_eq!(report["status"], "pass");
    assert_eq!(report["field_coverage"]["phone"].as_f64().unwrap(), 1.0);
    assert_eq!(report["field_coverage"]["coordinates"].as_f64().unwrap(), 0.0);
    assert!(report["quality_score"].as_f64().unwrap() > 0.8);
}
