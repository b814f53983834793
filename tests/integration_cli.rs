use std::fs;
use std::process::{Command, Output};

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_oltc-sim"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("oltc-sim process should run")
}

fn run_ok(args: &[&str]) -> String {
    let output = run(args);
    assert!(
        output.status.success(),
        "run failed for {args:?}: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("stdout should be valid UTF-8")
}

fn parse_count(stdout: &str, label: &str) -> usize {
    let line = stdout
        .lines()
        .find(|line| line.trim_start().starts_with(label))
        .unwrap_or_else(|| panic!("missing summary line `{label}` in output: {stdout}"));
    line.split_once(':')
        .map(|(_, right)| right.trim())
        .and_then(|raw| raw.split_whitespace().next())
        .and_then(|n| n.parse().ok())
        .unwrap_or_else(|| panic!("invalid summary line `{line}`"))
}

#[test]
fn low_voltage_scenario_raises_taps_via_description_file() {
    let stdout = run_ok(&["--scenario", "scenarios/low_voltage.toml"]);

    // three controllers deciding every 10 s for 300 s
    assert_eq!(parse_count(&stdout, "Decisions:"), 90);
    let changes = parse_count(&stdout, "Tap changes:");
    assert!(changes >= 3, "expected every transformer to move, got {changes}");
    assert!(stdout.contains("BandTapController_2"));
}

#[test]
fn preset_with_same_seed_is_reproducible() {
    let a = run_ok(&["--preset", "fast_sampling", "--seed", "11"]);
    let b = run_ok(&["--preset", "fast_sampling", "--seed", "11"]);
    assert_eq!(a, b);
}

#[test]
fn telemetry_export_writes_one_row_per_entity_tick() {
    let path = std::env::temp_dir().join(format!("oltc-sim-cli-{}.csv", std::process::id()));
    let path_str = path.to_str().expect("utf-8 temp path");
    run_ok(&["--scenario", "scenarios/low_voltage.toml", "--telemetry-out", path_str]);

    let csv = fs::read_to_string(&path).expect("telemetry file should exist");
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some(
            "tick,time_s,entity,state,v_min_pu,v_max_pu,sampled,pending_messages,tap_output,applied_tap"
        )
    );
    assert_eq!(lines.count(), 300 * 3);
    let _ = fs::remove_file(&path);
}

#[test]
fn unknown_preset_fails_with_message() {
    let output = run(&["--preset", "does_not_exist"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown preset"), "stderr: {stderr}");
}

#[test]
fn scenario_and_preset_are_mutually_exclusive() {
    let output = run(&["--scenario", "scenarios/baseline.toml", "--preset", "baseline"]);
    assert_eq!(output.status.code(), Some(1));
}
