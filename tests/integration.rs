use std::{env, fs, path::PathBuf, process::Command};

fn run_bin(args: &[&str]) {
    let bin = PathBuf::from(env!("CARGO_BIN_EXE_rssimap"));

    let output = Command::new(bin)
        .args(args)
        .output()
        .expect("failed to execute command");

    let stdout_str =
        std::str::from_utf8(&output.stdout).expect("failed to convert stdout to string");
    let stderr_str =
        std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");

    assert!(
        output.status.success(),
        "failed to run binary with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n"
    );
}

fn fresh_dir(name: &str) -> PathBuf {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join(name);
    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");
    test_dir
}

#[test]
fn basic_workflow() {
    let test_dir = fresh_dir("basic_workflow");

    let config_path = test_dir.join("config.toml");
    let config_contents = String::new()
        + "[layout]\n"
        + "width = 20.0\n"
        + "height = 12.0\n"
        + "resolution = 0.1\n"
        + "preset = \"office\"\n"
        + "\n"
        + "[sampling]\n"
        + "n_x = 41\n"
        + "n_y = 25\n"
        + "\n"
        + "[run]\n"
        + "seed = 2024\n"
        + "\n"
        + "[[walls]]\n"
        + "material = \"metal\"\n"
        + "x = 8.0\n"
        + "y = 3.0\n"
        + "w = 0.1\n"
        + "h = 2.0\n"
        + "\n"
        + "[[access_points]]\n"
        + "id = \"AP1\"\n"
        + "x = 5.0\n"
        + "y = 4.0\n"
        + "channel = 1\n"
        + "\n"
        + "[[access_points]]\n"
        + "id = \"AP2\"\n"
        + "x = 15.0\n"
        + "y = 8.0\n"
        + "channel = 6\n";

    fs::write(&config_path, config_contents).expect("failed to write config file");

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    run_bin(&["--sim-dir", test_dir_str, "simulate"]);
    run_bin(&["--sim-dir", test_dir_str, "simulate"]);
    run_bin(&["--sim-dir", test_dir_str, "simulate", "--seed", "7"]);

    let run_0 = test_dir.join("run-0000");
    let run_1 = test_dir.join("run-0001");
    let run_2 = test_dir.join("run-0002");

    let csv_0 = fs::read_to_string(run_0.join("dataset.csv")).expect("failed to read dataset");
    let csv_1 = fs::read_to_string(run_1.join("dataset.csv")).expect("failed to read dataset");
    let csv_2 = fs::read_to_string(run_2.join("dataset.csv")).expect("failed to read dataset");
    assert_eq!(csv_0, csv_1, "runs with the same seed differ");
    assert_ne!(csv_0, csv_2, "runs with different seeds agree");

    let mut lines = csv_0.lines();
    assert_eq!(
        lines.next(),
        Some("ap_id,channel,x,y,rssi_dbm,distance_m,material_loss_db")
    );
    assert_eq!(lines.count(), 2 * 41 * 25);

    let seed = fs::read_to_string(run_2.join("seed.txt")).expect("failed to read seed");
    assert_eq!(seed.trim(), "7");

    run_bin(&["--sim-dir", test_dir_str, "analyze"]);

    for run_dir in [&run_0, &run_1, &run_2] {
        let coverage =
            fs::read_to_string(run_dir.join("coverage.csv")).expect("failed to read coverage");
        assert_eq!(coverage.lines().count(), 1 + 41 * 25);

        let report =
            fs::read_to_string(run_dir.join("coverage.json")).expect("failed to read report");
        let report: serde_json::Value =
            serde_json::from_str(&report).expect("failed to parse report");
        let combined = &report["combined"];
        let good = combined["good_fraction"].as_f64().expect("missing good fraction");
        let fair = combined["fair_fraction"].as_f64().expect("missing fair fraction");
        assert!(good <= fair);
        assert_eq!(report["per_ap"].as_array().map(Vec::len), Some(2));
    }

    run_bin(&["--sim-dir", test_dir_str, "clean"]);
    assert!(!run_0.exists());
    assert!(config_path.exists());

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn init_writes_usable_config() {
    let test_dir = fresh_dir("init_writes_usable_config");
    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    run_bin(&["--sim-dir", test_dir_str, "init"]);
    let config = fs::read_to_string(test_dir.join("config.toml")).expect("failed to read config");
    assert!(config.contains("[layout]"));
    assert!(config.contains("AP4"));

    // Shrink the default grid to keep the test fast.
    let config = config
        .replace("n_x = 200", "n_x = 20")
        .replace("n_y = 120", "n_y = 12");
    fs::write(test_dir.join("config.toml"), config).expect("failed to write config");

    run_bin(&["--sim-dir", test_dir_str, "simulate", "--seed", "1"]);
    run_bin(&["--sim-dir", test_dir_str, "analyze"]);
    assert!(test_dir.join("run-0000").join("coverage.json").exists());

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn invalid_config_fails() {
    let test_dir = fresh_dir("invalid_config_fails");
    fs::write(
        test_dir.join("config.toml"),
        "[[walls]]\nmaterial = \"granite\"\nx = 1.0\ny = 1.0\nw = 1.0\nh = 1.0\n",
    )
    .expect("failed to write config file");

    let output = Command::new(env!("CARGO_BIN_EXE_rssimap"))
        .args(["--sim-dir", test_dir.to_str().expect("invalid path"), "simulate"])
        .output()
        .expect("failed to execute command");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("granite"));

    fs::remove_dir_all(&test_dir).ok();
}
