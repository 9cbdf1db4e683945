use std::path::PathBuf;
use std::process::{Command, Output};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_limvid"))
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

const SMALL_CONFIG: &str = r#"{
  "transform": { "t_max": 25.0, "n_t": 256, "f_min": 1e-6, "f_max": 30.0 },
  "histogram": { "t_min": -5.0, "n_bins": 20, "binning": "linear" },
  "quadrature": { "ft": { "order": 8 }, "ft_panels": 64, "ift": { "order": 256 } },
  "population": {
    "mass_function": { "name": "power_law", "params": { "A": 1e-10, "alpha": -2.0 } },
    "bias": { "name": "constant", "params": { "b": 1.5 } },
    "luminosity": { "name": "constant", "params": { "L": 1e3 } },
    "m_min": 1e10,
    "m_max": 1e12,
    "n_mass": 20
  },
  "smoothing": { "enabled": false },
  "noise": { "sigma": 0.5 }
}"#;

fn write_config(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("small.json");
    std::fs::write(&path, SMALL_CONFIG).unwrap();
    path
}

#[test]
fn run_emits_report_json() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_config(&dir);
    let out = run(&["run", "--config", cfg.to_str().unwrap(), "--threads", "1"]);
    assert!(out.status.success(), "run should succeed, stderr={}", String::from_utf8_lossy(&out.stderr));

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("run output should be valid JSON");
    assert_eq!(v["pt"]["t"].as_array().expect("pt.t should be an array").len(), 256);
    assert_eq!(v["bi"]["probabilities"].as_array().expect("bi.probabilities should be an array").len(), 20);
    assert!(v["redshift"].as_f64().expect("redshift should be a number") > 0.0);
    assert!(v["pt_n"].is_object(), "noise-only density should be reported when noise is set");
}

#[test]
fn draw_writes_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_config(&dir);
    let dest = dir.path().join("draws.json");
    let out = run(&[
        "draw",
        "--config",
        cfg.to_str().unwrap(),
        "--draws",
        "3",
        "--voxels",
        "50",
        "--seed",
        "11",
        "--compare",
        "--output",
        dest.to_str().unwrap(),
    ]);
    assert!(out.status.success(), "draw should succeed, stderr={}", String::from_utf8_lossy(&out.stderr));

    let v: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&dest).unwrap()).unwrap();
    assert_eq!(v["counts"].as_array().unwrap().len(), 3);
    assert_eq!(v["analytic_probabilities"].as_array().unwrap().len(), 20);
    assert_eq!(v["channel"], "full");
}

#[test]
fn quadrature_table_round_trips_through_config() {
    let dir = tempfile::tempdir().unwrap();
    let table = dir.path().join("gl16.txt");
    let out = run(&["quadrature", "--order", "16", "--output", table.to_str().unwrap()]);
    assert!(out.status.success(), "quadrature should succeed, stderr={}", String::from_utf8_lossy(&out.stderr));
    let text = std::fs::read_to_string(&table).unwrap();
    assert!(text.lines().filter(|l| !l.trim().is_empty() && !l.starts_with('#')).count() >= 16);

    let cfg_path = dir.path().join("table.json");
    let cfg = SMALL_CONFIG.replace(r#""ft": { "order": 8 }"#, &format!(r#""ft": {{ "table": {:?} }}"#, table));
    std::fs::write(&cfg_path, cfg).unwrap();
    let out = run(&["run", "--config", cfg_path.to_str().unwrap()]);
    assert!(out.status.success(), "run with a table should succeed, stderr={}", String::from_utf8_lossy(&out.stderr));
}

#[test]
fn defaults_are_valid_json() {
    let out = run(&["defaults"]);
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("defaults should be valid JSON");
    assert_eq!(v["transform"]["n_t"], 262144);
    assert_eq!(v["histogram"]["binning"], "log");
}

#[test]
fn invalid_config_fails_with_message() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, r#"{ "transform": { "f_min": 0.0 } }"#).unwrap();
    let out = run(&["run", "--config", path.to_str().unwrap()]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("f_min"), "stderr should name the bad field: {}", stderr);
}
