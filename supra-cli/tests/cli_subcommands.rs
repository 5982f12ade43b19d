use std::process::Command;

fn run_supra(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_supra"))
        .args(args)
        .output()
        .expect("run supra")
}

fn assert_schema_version(value: &serde_json::Value) {
    assert_eq!(
        value.get("schema_version").and_then(|v| v.as_u64()),
        Some(1),
        "missing schema_version=1 field"
    );
}

#[test]
fn help_lists_subcommands() {
    let output = run_supra(&["help"]);
    assert!(
        output.status.success(),
        "supra help failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("run"), "missing run in help output");
    assert!(stdout.contains("probe"), "missing probe in help output");
    assert!(stdout.contains("policy"), "missing policy in help output");
}

#[test]
fn run_help_lists_mode_scale_and_json() {
    let output = run_supra(&["run", "--help"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in ["--frames", "--width", "--height", "--mode", "--scale", "--planar", "--json"] {
        assert!(stdout.contains(flag), "missing {flag} in run help");
    }
}

#[test]
fn run_off_mode_passes_every_frame_through() {
    let output = run_supra(&["run", "--frames", "5", "--json"]);
    assert!(
        output.status.success(),
        "run failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("valid JSON report");
    assert_schema_version(&report);
    assert_eq!(report["frames_in"], 5);
    assert_eq!(report["frames_out"], 5);
    assert_eq!(report["passed"], 5);
    assert_eq!(report["rendered"], 0);
    assert_eq!(report["pool_allocated"], 0);
}

#[test]
fn run_nvidia_mode_renders_and_upscales() {
    let output = run_supra(&[
        "run", "--frames", "4", "--mode", "nvidia", "--scale", "1080p", "--json",
    ]);
    assert!(
        output.status.success(),
        "run failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("valid JSON report");
    assert_schema_version(&report);
    assert_eq!(report["rendered"], 4);
    assert_eq!(report["processor_rebuilds"], 1);
    assert_eq!(report["output_width"], 1920);
    assert_eq!(report["output_height"], 1080);
}

#[test]
fn run_planar_exercises_the_upload_path() {
    let output = run_supra(&[
        "run", "--frames", "2", "--planar", "--width", "720", "--height", "480", "--mode",
        "intel", "--json",
    ]);
    assert!(output.status.success());

    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("valid JSON report");
    assert_eq!(report["rendered"], 2);
    assert_eq!(report["output_width"], 1620);
    assert_eq!(report["output_height"], 1080);
}

#[test]
fn probe_mock_reports_one_adapter() {
    let output = run_supra(&["probe", "--mock", "--json"]);
    assert!(output.status.success());

    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("valid JSON report");
    assert_schema_version(&report);
    assert_eq!(report["available"], true);
    assert_eq!(report["adapters"].as_array().map(Vec::len), Some(1));
}

#[test]
fn policy_reports_height_clamped_fit() {
    let output = run_supra(&[
        "policy", "--width", "720", "--height", "480", "--scale", "1080p", "--json",
    ]);
    assert!(output.status.success());

    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("valid JSON report");
    assert_schema_version(&report);
    assert_eq!(report["output_width"], 1620);
    assert_eq!(report["output_height"], 1080);
}

#[test]
fn odd_dimensions_exit_nonzero() {
    let output = run_supra(&["run", "--frames", "1", "--width", "641", "--height", "360"]);
    assert!(
        !output.status.success(),
        "odd input dimensions must fail the stream"
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("odd"), "stderr should explain the failure: {stderr}");
}
