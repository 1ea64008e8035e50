use std::{env, fs, path::PathBuf, process::Command};

const MODEL: &str = r#"{
    "id": "toy",
    "metabolites": [
        {"id": "glc_e", "compartment": "e"},
        {"id": "glc_c", "compartment": "c"},
        {"id": "ac_c", "compartment": "c"},
        {"id": "ac_e", "compartment": "e"}
    ],
    "reactions": [
        {"id": "EX_glc_e", "metabolites": {"glc_e": -1.0}, "lower_bound": -10.0, "upper_bound": 1000.0},
        {"id": "EX_ac_e", "metabolites": {"ac_e": -1.0}, "lower_bound": 0.0, "upper_bound": 1000.0},
        {"id": "GLCt", "metabolites": {"glc_e": -1.0, "glc_c": 1.0}, "lower_bound": 0.0, "upper_bound": 1000.0},
        {"id": "ACt", "metabolites": {"ac_c": -1.0, "ac_e": 1.0}, "lower_bound": 0.0, "upper_bound": 1000.0},
        {"id": "MAINT", "metabolites": {"glc_c": -1.0}, "lower_bound": 1.0, "upper_bound": 1000.0},
        {"id": "BIOMASS", "metabolites": {"glc_c": -10.0, "ac_c": 5.0}, "lower_bound": 0.0, "upper_bound": 1000.0}
    ]
}"#;

#[test]
fn basic_workflow() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("basic_workflow");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    fs::write(test_dir.join("toy.json"), MODEL).expect("failed to write model file");

    let config_contents = String::new()
        + "[model]\n"
        + "file = \"toy.json\"\n"
        + "biomass_reaction = \"BIOMASS\"\n"
        + "\n"
        + "[kinetics]\n"
        + "uptake = { glc_e = { v_max = 10.0, k_m = 0.5 } }\n"
        + "inhibition = { ac_e = 20.0 }\n"
        + "\n"
        + "[init]\n"
        + "biomass = 0.1\n"
        + "concentrations = { glc_e = 20.0 }\n"
        + "\n"
        + "[run]\n"
        + "dt = 0.05\n"
        + "n_steps = 2000\n"
        + "\n"
        + "[output]\n"
        + "steps_per_save = 4\n";

    fs::write(test_dir.join("config.toml"), config_contents).expect("failed to write config file");

    fn run_bin(args: &[&str]) {
        let bin = PathBuf::from(env!("CARGO_BIN_EXE_dfba"));

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

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    run_bin(&["--sim-dir", test_dir_str, "create"]);
    run_bin(&["--sim-dir", test_dir_str, "create"]);

    let history_0 = fs::read_to_string(test_dir.join("run-0000").join("history.csv"))
        .expect("failed to read history");
    let history_1 = fs::read_to_string(test_dir.join("run-0001").join("history.csv"))
        .expect("failed to read history");
    assert_eq!(history_0, history_1);
    assert_eq!(
        history_0.lines().next(),
        Some("time,biomass,ac_e,glc_e,growth_rate,EX_ac_e,EX_glc_e")
    );

    run_bin(&["--sim-dir", test_dir_str, "analyze"]);

    let results = fs::read_to_string(test_dir.join("run-0000").join("results.json"))
        .expect("failed to read results");
    assert!(results.contains("\"halt_reason\": \"infeasible\""));

    run_bin(&["--sim-dir", test_dir_str, "clean"]);
    assert!(!test_dir.join("run-0000").exists());

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn rejects_unknown_metabolites() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("unknown_metabolites");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    fs::write(test_dir.join("toy.json"), MODEL).expect("failed to write model file");
    let config_contents = String::new()
        + "[model]\nfile = \"toy.json\"\n\n"
        + "[init]\nbiomass = 0.1\nconcentrations = { o2_e = 1.0 }\n\n"
        + "[run]\ndt = 0.05\nn_steps = 10\n";
    fs::write(test_dir.join("config.toml"), config_contents).expect("failed to write config file");

    let output = Command::new(env!("CARGO_BIN_EXE_dfba"))
        .args(["--sim-dir", test_dir.to_str().expect("invalid path"), "create"])
        .output()
        .expect("failed to execute command");
    assert!(!output.status.success());
    assert!(!test_dir.join("run-0000").exists());

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn failed_run_leaves_no_run_dir() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("failed_run");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    // Biomass overflows in the first step, so the acetate uptake bound of the
    // second step is not a number and the solve fails.
    fs::write(test_dir.join("toy.json"), MODEL).expect("failed to write model file");
    let config_contents = String::new()
        + "[model]\nfile = \"toy.json\"\nbiomass_reaction = \"BIOMASS\"\n\n"
        + "[kinetics]\n"
        + "uptake = { glc_e = { v_max = 10.0, k_m = 0.5 }, ac_e = { v_max = 1.0, k_m = 1.0 } }\n\n"
        + "[init]\nbiomass = 1e300\nconcentrations = { glc_e = 20.0 }\n\n"
        + "[run]\ndt = 1e10\nn_steps = 10\n";
    fs::write(test_dir.join("config.toml"), config_contents).expect("failed to write config file");

    let output = Command::new(env!("CARGO_BIN_EXE_dfba"))
        .args(["--sim-dir", test_dir.to_str().expect("invalid path"), "create"])
        .output()
        .expect("failed to execute command");
    assert!(!output.status.success());
    assert!(!test_dir.join("run-0000").exists());

    let output = Command::new(env!("CARGO_BIN_EXE_dfba"))
        .args(["--sim-dir", test_dir.to_str().expect("invalid path"), "analyze"])
        .output()
        .expect("failed to execute command");
    assert!(output.status.success());

    fs::remove_dir_all(&test_dir).ok();
}
