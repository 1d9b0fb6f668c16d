use assert_cmd::Command;
use predicates::prelude::*;

fn write_suite(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("cases.csv");
    std::fs::write(
        &path,
        "case_id,name,input_prompt,expected_output,severity,min_pass_rate\n\
         TC001,merchant payload,Emit the merchant JSON,\"{\"\"merchant_id\"\": \"\"m-1\"\"}\",S1,1.0\n\
         TC002,capital fact,What is the capital of France?,Paris,S2,\n",
    )
    .unwrap();
    path
}

#[test]
fn run_then_check_passes_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let suite = write_suite(dir.path());
    let log_dir = dir.path().join("runs");

    Command::cargo_bin("agentreg")
        .unwrap()
        .arg("run")
        .arg(&suite)
        .arg("--log-dir")
        .arg(&log_dir)
        .arg("--run-id")
        .arg("ci-1")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 passed"));

    // No baseline flags: absent-baseline note, floor checks only.
    Command::cargo_bin("agentreg")
        .unwrap()
        .arg("check")
        .arg("--log-dir")
        .arg(&log_dir)
        .arg("--cases-file")
        .arg(&suite)
        .assert()
        .success()
        .stdout(predicate::str::contains("**Verdict: ✅ PASS**"))
        .stdout(predicate::str::contains("baseline comparison was skipped"));
}

#[test]
fn run_accepts_a_directory_of_suite_files() {
    let dir = tempfile::tempdir().unwrap();
    let suite_dir = dir.path().join("suites");
    std::fs::create_dir_all(&suite_dir).unwrap();
    std::fs::write(
        suite_dir.join("api.csv"),
        "case_id,name,input_prompt,expected_output,severity\nTC001,a,p,Paris,S1\n",
    )
    .unwrap();
    std::fs::write(
        suite_dir.join("factual.csv"),
        "case_id,name,input_prompt,expected_output,severity\nTC002,b,p,Berlin,S2\n",
    )
    .unwrap();

    Command::cargo_bin("agentreg")
        .unwrap()
        .arg("run")
        .arg(&suite_dir)
        .arg("--log-dir")
        .arg(dir.path().join("runs"))
        .assert()
        .success()
        .stdout(predicate::str::contains("2 item(s), 2 passed"));
}

#[test]
fn duplicate_case_id_across_suite_files_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let suite_dir = dir.path().join("suites");
    std::fs::create_dir_all(&suite_dir).unwrap();
    for name in ["a.csv", "b.csv"] {
        std::fs::write(
            suite_dir.join(name),
            "case_id,name,input_prompt,expected_output,severity\nTC001,a,p,,S1\n",
        )
        .unwrap();
    }

    Command::cargo_bin("agentreg")
        .unwrap()
        .arg("run")
        .arg(&suite_dir)
        .arg("--log-dir")
        .arg(dir.path().join("runs"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("duplicate case_id 'TC001'"));
}

#[test]
fn check_with_no_records_fails_the_gate() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("agentreg")
        .unwrap()
        .arg("check")
        .arg("--log-dir")
        .arg(dir.path().join("empty"))
        .assert()
        .code(1)
        .stdout(predicate::str::contains("no records for run_id"));
}

#[test]
fn malformed_suite_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let suite = dir.path().join("cases.csv");
    std::fs::write(
        &suite,
        "case_id,name,input_prompt,expected_output,severity\nTC001,a,p,,S9\n",
    )
    .unwrap();

    Command::cargo_bin("agentreg")
        .unwrap()
        .arg("run")
        .arg(&suite)
        .arg("--log-dir")
        .arg(dir.path().join("runs"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown severity"));
}

#[test]
fn missing_cases_file_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("agentreg")
        .unwrap()
        .arg("run")
        .arg(dir.path().join("nope.csv"))
        .arg("--log-dir")
        .arg(dir.path().join("runs"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cases file not found"));
}

#[test]
fn report_writes_markdown_to_the_output_path() {
    let dir = tempfile::tempdir().unwrap();
    let suite = write_suite(dir.path());
    let log_dir = dir.path().join("runs");
    let out = dir.path().join("report.md");

    Command::cargo_bin("agentreg")
        .unwrap()
        .arg("run")
        .arg(&suite)
        .arg("--log-dir")
        .arg(&log_dir)
        .assert()
        .success();

    Command::cargo_bin("agentreg")
        .unwrap()
        .arg("report")
        .arg("--log-dir")
        .arg(&log_dir)
        .arg("--days")
        .arg("1")
        .arg("--baseline-days")
        .arg("7")
        .arg("-o")
        .arg(&out)
        .assert()
        .success();

    let md = std::fs::read_to_string(&out).unwrap();
    assert!(md.contains("## Agent Regression Gate"));
}

#[test]
fn check_honors_threshold_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let suite = write_suite(dir.path());
    let log_dir = dir.path().join("runs");

    Command::cargo_bin("agentreg")
        .unwrap()
        .arg("run")
        .arg(&suite)
        .arg("--log-dir")
        .arg(&log_dir)
        .assert()
        .success();

    // An out-of-range override is rejected before any evaluation.
    Command::cargo_bin("agentreg")
        .unwrap()
        .arg("check")
        .arg("--log-dir")
        .arg(&log_dir)
        .arg("--s1-threshold")
        .arg("1.5")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("out of range"));
}
