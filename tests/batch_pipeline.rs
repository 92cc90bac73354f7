// tests/batch_pipeline.rs - Runs the whole batch over temporary directories
use std::fs;
use std::path::Path;

use lease_string_dissim::pipeline::{run_batch, TableStatus};
use lease_string_dissim::table::read_table;
use lease_string_dissim::utils::config::{FailurePolicy, RunConfig, SentinelSource};
use lease_string_dissim::utils::progress_bars::progress_config::ProgressConfig;

const HEADER: &str = "unique_id.x,unique_id.y,group_final.x,group_final.y,grantor.x,grantor.y,alsgrantee.x,alsgrantee.y,grantor_weight,grantee_weight,volpage_dist,recordno_dist,insttype_dist,royalty_dist,startdate_dist,cluster_exprdate_dist";

fn write_table(dir: &Path, name: &str, rows: &[&str]) {
    let mut content = format!("{}\n", HEADER);
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    fs::write(dir.join(name), content).unwrap();
}

fn seed_inputs(dir: &Path) {
    write_table(
        dir,
        "T4N-R2W.csv",
        &[
            "3,4,B,B,Acme,Acme,Smith,Smith,5,5,4,0,0,0,0,0",
            "1,2,C2,A,Acme,Acme,Smith,Smith,1,1,0,0,0,0,0,0",
            "8,8,C,C,Acme,Zeta,Smith,Jones,1,1,9,9,9,9,9,9",
        ],
    );
    write_table(
        dir,
        "T5N-R1E.csv",
        &["10,11,A,A,Chevron,Chevron USA,NA,NA,1,2,0,0,0,0,0,0"],
    );
    fs::write(dir.join(".DS_Store"), b"\x00\x01junk").unwrap();
    fs::write(dir.join("README.txt"), "not a table").unwrap();
}

fn write_sentinel(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("local_inf.csv");
    fs::write(&path, "\"\",\"x\"\n\"1\",500\n").unwrap();
    path
}

fn config_for(input: &Path, output: &Path, sentinel: SentinelSource) -> RunConfig {
    let mut config = RunConfig::new(input.to_path_buf(), output.to_path_buf(), sentinel);
    config.max_concurrent_tables = 2;
    config
}

fn column<'a>(table: &'a lease_string_dissim::table::Table, row: usize, name: &str) -> &'a str {
    table.cell(row, table.column_index(name).unwrap())
}

#[tokio::test]
async fn test_batch_scores_every_table() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let sentinel_dir = tempfile::tempdir().unwrap();
    seed_inputs(input.path());
    let sentinel = write_sentinel(sentinel_dir.path());

    let mut config = config_for(input.path(), output.path(), SentinelSource::File(sentinel));
    config.summary_path = Some(output.path().join("summary").join("run.json"));

    let summary = run_batch(&config, &ProgressConfig::disabled()).await.unwrap();
    assert_eq!(summary.sentinel, 500.0);
    assert_eq!(summary.tables.len(), 2);
    assert!(!summary.has_failures());
    assert_eq!(summary.totals.rows, 4);
    assert_eq!(summary.totals.downweighted_overrides, 1);
    assert_eq!(summary.totals.self_pair_overrides, 1);
    assert!(summary.tables.iter().all(|t| t.status == TableStatus::Written));

    let scored = read_table(&output.path().join("T4N-R2W_stringmatched.csv")).unwrap();
    assert_eq!(scored.len(), 3);
    assert_eq!(scored.headers().len(), 22);
    assert_eq!(&scored.headers()[..16], HEADER.split(',').collect::<Vec<_>>().as_slice());

    // Row 0: identical names, only volpage_dist contributes
    assert_eq!(column(&scored, 0, "dist_raw"), "4");
    assert_eq!(column(&scored, 0, "dist"), "2");
    assert_eq!(column(&scored, 0, "grantor_score_dist"), "0");
    // Row 1: group C2 normalizes to C and takes the sentinel
    assert_eq!(column(&scored, 1, "group_final_C.x"), "C");
    assert_eq!(column(&scored, 1, "dist"), "500");
    // Row 2: a self-pair wins over group C
    assert_eq!(column(&scored, 2, "dist"), "0");
    assert_eq!(column(&scored, 2, "unique_id.x"), "8");

    let second = read_table(&output.path().join("T5N-R1E_stringmatched.csv")).unwrap();
    // Missing grantees count as completely dissimilar
    assert_eq!(column(&second, 0, "grantee_score_dist"), "2");
    assert_eq!(column(&second, 0, "grantor_score_dist"), "0");

    let json = fs::read_to_string(output.path().join("summary").join("run.json")).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["run_id"], summary.run_id.as_str());
    assert_eq!(parsed["tables"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_batch_output_is_deterministic() {
    let input = tempfile::tempdir().unwrap();
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    seed_inputs(input.path());

    for out in [first.path(), second.path()] {
        let config = config_for(input.path(), out, SentinelSource::Value(500.0));
        run_batch(&config, &ProgressConfig::disabled()).await.unwrap();
    }

    for name in ["T4N-R2W_stringmatched.csv", "T5N-R1E_stringmatched.csv"] {
        let a = fs::read(first.path().join(name)).unwrap();
        let b = fs::read(second.path().join(name)).unwrap();
        assert_eq!(a, b, "{} differs between runs", name);
    }
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let input = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let output = scratch.path().join("never_created");
    seed_inputs(input.path());

    let mut config = config_for(input.path(), &output, SentinelSource::Value(500.0));
    config.dry_run = true;

    let summary = run_batch(&config, &ProgressConfig::disabled()).await.unwrap();
    assert_eq!(summary.tables.len(), 2);
    assert!(summary.tables.iter().all(|t| t.status == TableStatus::DryRun));
    assert_eq!(summary.totals.rows, 4);
    assert!(!output.exists());
}

#[tokio::test]
async fn test_skip_policy_keeps_going_and_abort_stops() {
    let input = tempfile::tempdir().unwrap();
    seed_inputs(input.path());
    // Sorts between the two good tables
    write_table(
        input.path(),
        "T4N-R3W.csv",
        &["1,2,A,B,Acme,Acme,Smith,Smith,1,1,-9,0,0,0,0,0"],
    );

    let skip_out = tempfile::tempdir().unwrap();
    let mut config = config_for(input.path(), skip_out.path(), SentinelSource::Value(500.0));
    config.failure_policy = FailurePolicy::Skip;
    let summary = run_batch(&config, &ProgressConfig::disabled()).await.unwrap();
    assert_eq!(summary.tables.len(), 3);
    assert_eq!(summary.failed(), 1);
    match &summary.tables[1].status {
        TableStatus::Failed { error } => assert!(error.contains("negative")),
        other => panic!("expected a failure, got {:?}", other),
    }
    assert!(skip_out.path().join("T5N-R1E_stringmatched.csv").exists());
    assert!(!skip_out.path().join("T4N-R3W_stringmatched.csv").exists());

    let abort_out = tempfile::tempdir().unwrap();
    let mut config = config_for(input.path(), abort_out.path(), SentinelSource::Value(500.0));
    config.max_concurrent_tables = 1;
    let err = run_batch(&config, &ProgressConfig::disabled()).await.unwrap_err();
    assert!(format!("{:#}", err).contains("T4N-R3W.csv"));
    assert!(!abort_out.path().join("T4N-R3W_stringmatched.csv").exists());
}

#[tokio::test]
async fn test_missing_sentinel_file_fails_before_any_table() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    seed_inputs(input.path());

    let config = config_for(
        input.path(),
        output.path(),
        SentinelSource::File(input.path().join("no_such_inf.csv")),
    );
    assert!(run_batch(&config, &ProgressConfig::disabled()).await.is_err());
    assert_eq!(fs::read_dir(output.path()).unwrap().count(), 0);
}
