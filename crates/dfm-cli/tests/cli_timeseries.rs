use std::path::PathBuf;
use std::process::{Command, Output};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_dfm"))
}

fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..").canonicalize().unwrap()
}

fn fixture_path(name: &str) -> PathBuf {
    repo_root().join("tests/fixtures").join(name)
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

fn run_json(args: &[&str]) -> serde_json::Value {
    let out = run(args);
    assert!(
        out.status.success(),
        "{:?} should succeed, stderr={}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
    serde_json::from_slice(&out.stdout).expect("stdout should be valid JSON")
}

fn as_f64(v: &serde_json::Value) -> f64 {
    v.as_f64().expect("number")
}

#[test]
fn filter_scalar_contract() {
    let input = fixture_path("kalman_scalar.json");
    assert!(input.exists(), "missing fixture: {}", input.display());

    let v = run_json(&["filter", "--input", input.to_string_lossy().as_ref()]);

    let ll = as_f64(&v["log_likelihood"]);
    assert!((ll - (-3.3919063287464435)).abs() < 1e-10, "ll={ll}");

    let fm = v["filtered_means"].as_array().expect("filtered_means should be array");
    assert_eq!(fm.len(), 4);
    assert!((as_f64(&fm[0][0]) - 2.0 / 3.0).abs() < 1e-12);

    let terms = v["log_likelihood_terms"].as_array().expect("terms should be array");
    assert_eq!(terms.len(), 4);
    assert!(terms[1].is_null(), "missing step contributes no likelihood");

    assert!((as_f64(&v["forecast_mean"][0]) - 0.7280180590381766).abs() < 1e-12);
    assert_eq!(v["predicted_covs"].as_array().unwrap().len(), 4);
}

#[test]
fn smooth_reports_lag_one_covariances() {
    let input = fixture_path("kalman_scalar.json");

    let v = run_json(&["smooth", "--input", input.to_string_lossy().as_ref()]);

    let sm = v["smoothed_means"].as_array().unwrap();
    let lag = v["lag_one_covs"].as_array().unwrap();
    assert_eq!(sm.len(), 4);
    assert_eq!(lag.len(), 4);
    assert_eq!(as_f64(&lag[0][0][0]), 0.0);
    assert_eq!(as_f64(&lag[1][0][0]), 0.0);
    assert!((as_f64(&lag[3][0][0]) - 0.12816401916207604).abs() < 1e-12);
    assert!((as_f64(&sm[0][0]) - 0.8503224675555099).abs() < 1e-12);
}

#[test]
fn estep_partial_missing_shapes() {
    let input = fixture_path("kalman_2d_partial_missing.json");

    let v = run_json(&["estep", "--input", input.to_string_lossy().as_ref()]);

    let delta = v["delta"].as_array().unwrap();
    assert_eq!(delta.len(), 3);
    assert_eq!(delta[0].as_array().unwrap().len(), 2);
    for key in ["beta", "gamma", "gamma1", "gamma2", "p0"] {
        let m = v[key].as_array().unwrap_or_else(|| panic!("{key} should be array"));
        assert_eq!(m.len(), 2, "{key}");
    }
    assert_eq!(v["f0"].as_array().unwrap().len(), 2);
    assert!(as_f64(&v["log_likelihood"]).is_finite());
}

#[test]
fn unloaded_state_is_never_updated() {
    let input = fixture_path("kalman_unloaded_state.json");

    let v = run_json(&["filter", "--input", input.to_string_lossy().as_ref()]);

    for m in v["filtered_means"].as_array().unwrap() {
        assert_eq!(as_f64(&m[1]), 0.0);
    }
}

#[test]
fn output_file_matches_stdout() {
    let input = fixture_path("kalman_2d_partial_missing.json");
    let out_path = std::env::temp_dir().join(format!("dfm_cli_smooth_{}.json", std::process::id()));

    let stdout_json = run_json(&["smooth", "--input", input.to_string_lossy().as_ref()]);
    let out = run(&[
        "smooth",
        "--input",
        input.to_string_lossy().as_ref(),
        "--output",
        out_path.to_string_lossy().as_ref(),
    ]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));

    let bytes = std::fs::read(&out_path).unwrap();
    let file_json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let _ = std::fs::remove_file(&out_path);
    assert_eq!(file_json, stdout_json);
}

#[test]
fn simulate_is_seeded() {
    let input = fixture_path("kalman_2d_partial_missing.json");
    let p = input.to_string_lossy().into_owned();
    let args = ["simulate", "--input", &p, "--t-max", "7", "--seed", "3"];

    let a = run_json(&args);
    let b = run_json(&args);
    assert_eq!(a, b);
    assert_eq!(a["states"].as_array().unwrap().len(), 7);
    assert_eq!(a["x"].as_array().unwrap().len(), 7);
    assert_eq!(a["x"][0].as_array().unwrap().len(), 3);
}

#[test]
fn dimension_mismatch_fails() {
    let input = fixture_path("kalman_bad_shape.json");

    let out = run(&["filter", "--input", input.to_string_lossy().as_ref()]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Dimension mismatch") || stderr.contains("columns"), "stderr={stderr}");
}

#[test]
fn singular_fail_policy_is_honored() {
    let dir = std::env::temp_dir();
    let path = dir.join(format!("dfm_cli_noise_free_{}.json", std::process::id()));
    std::fs::write(
        &path,
        r#"{"model":{"a":[[1.0]],"c":[[1.0]],"q":[[0.0]],"r":[[0.0]],"f0":[0.0],"p0":[[1.0]]},
            "x":[[1.0],[1.0],[1.0]]}"#,
    )
    .unwrap();
    let p = path.to_string_lossy().into_owned();

    let ok = run(&["filter", "--input", &p]);
    let fail = run(&["filter", "--input", &p, "--singular", "fail"]);
    let _ = std::fs::remove_file(&path);

    assert!(ok.status.success(), "stderr={}", String::from_utf8_lossy(&ok.stderr));
    assert!(!fail.status.success());
    assert!(String::from_utf8_lossy(&fail.stderr).contains("singular"));
}

#[test]
fn version_prints_crate_version() {
    let out = run(&["version"]);
    assert!(out.status.success());
    let s = String::from_utf8_lossy(&out.stdout);
    assert!(s.starts_with("dfm "), "stdout={s}");
}
