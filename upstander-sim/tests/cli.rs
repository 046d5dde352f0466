use std::process::Command;

fn temp_path(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "upstander-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

fn run(args: &[&str], output_path: &std::path::Path) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_upstander-sim"))
        .args(args)
        .arg("--output")
        .arg(output_path)
        .output()
        .expect("run cli")
}

#[test]
fn cli_writes_json_report() {
    let output_path = temp_path("json");
    let output = run(&["--report", "json", "--seed", "7"], &output_path);
    assert!(output.status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    let report: serde_json::Value = serde_json::from_str(&content).expect("valid json");
    assert_eq!(report["seed"], 7);
    assert_eq!(report["metrics"]["total_journeys"], 12);
    assert_eq!(report["metrics"]["completion_rate"], 1.0);
    let criteria = report["metrics"]["success_criteria_status"]
        .as_object()
        .expect("criteria map");
    assert_eq!(criteria.len(), 4);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Upstander Pilot Simulator"));
}

#[test]
fn cli_same_seed_same_csv() {
    let first = temp_path("csv-a");
    let second = temp_path("csv-b");
    let args = ["--report", "csv", "--strategy", "seeded-random", "--seed", "99"];
    assert!(run(&args, &first).status.success());
    assert!(run(&args, &second).status.success());
    let a = std::fs::read_to_string(first).expect("read first");
    let b = std::fs::read_to_string(second).expect("read second");
    assert_eq!(a, b);
    assert_eq!(a.lines().count(), 13);
    assert!(a.starts_with("persona_id,outcome,completed,elapsed_minutes,path"));
}

#[test]
fn cli_markdown_respects_persona_filters() {
    let output_path = temp_path("md");
    let output = run(
        &["--report", "markdown", "--only", "jordan_williams,maria_santos"],
        &output_path,
    );
    assert!(output.status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    assert!(content.contains("- **Journeys**: 2"));
    assert!(content.contains("| Criterion | Metric | Threshold | Observed | Status |"));
}

#[test]
fn cli_rejects_missing_scenario() {
    let output_path = temp_path("missing");
    let output = run(&["--scenario", "/nonexistent/scenario.json"], &output_path);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to prepare study"));
}

#[test]
fn cli_rejects_unknown_persona() {
    let output_path = temp_path("unknown");
    let output = run(&["--only", "nobody"], &output_path);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown persona `nobody`"));
}
