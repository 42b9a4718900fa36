use hydrate_core::{Database, EventOrigin};
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
    xdg_runtime: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");
        let xdg_runtime = base.join("xdg-runtime");

        for dir in [&home, &xdg_data, &xdg_config, &xdg_state, &xdg_runtime] {
            fs::create_dir_all(dir).expect("failed to create test directory");
        }

        seed_config(&xdg_config);

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_data,
            xdg_config,
            xdg_state,
            xdg_runtime,
        }
    }

    fn db_path(&self) -> PathBuf {
        self.xdg_data.join("hydrate/data.db")
    }

    fn shared_dir(&self) -> PathBuf {
        self.xdg_data.join("hydrate/shared")
    }
}

fn seed_config(xdg_config: &std::path::Path) {
    let dir = xdg_config.join("hydrate");
    fs::create_dir_all(&dir).expect("failed to create config dir");
    fs::write(
        dir.join("config.toml"),
        r#"
[tracking]
daily_goal_ml = 2000

[grid]
rows = 2
columns = 5
wave_animation = false
"#,
    )
    .expect("failed to write config");
}

fn run_bin(env: &CliTestEnv, bin_name: &str, args: &[&str]) -> Output {
    let bin_path = match bin_name {
        "hydrate" => PathBuf::from(assert_cmd::cargo::cargo_bin!("hydrate")),
        "hydrate-widget" => PathBuf::from(assert_cmd::cargo::cargo_bin!("hydrate-widget")),
        _ => panic!("unsupported binary in test harness: {bin_name}"),
    };

    Command::new(bin_path)
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_DATA_HOME", &env.xdg_data)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env("XDG_RUNTIME_DIR", &env.xdg_runtime)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("failed to execute {bin_name}: {e}"))
}

fn assert_success(bin_name: &str, args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "{bin_name} {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

fn run_ok(env: &CliTestEnv, bin_name: &str, args: &[&str]) -> String {
    let output = run_bin(env, bin_name, args);
    assert_success(bin_name, args, &output);
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn widget_quick_add_is_absorbed_by_reconcile() {
    let env = CliTestEnv::new();

    let added = run_ok(&env, "hydrate", &["add", "500"]);
    assert!(
        added.contains("Today: 500 ml of 2000 ml"),
        "unexpected add output:\n{added}"
    );
    assert!(env.shared_dir().join("todayWaterAmount.json").exists());

    let widget = run_ok(&env, "hydrate-widget", &["quick-add", "300"]);
    assert!(
        widget.contains("800 ml of 2000 ml") && widget.contains("(syncing)"),
        "unexpected widget output:\n{widget}"
    );

    let reconciled = run_ok(&env, "hydrate", &["reconcile"]);
    assert!(
        reconciled.contains("Absorbed widget change: +300 ml"),
        "unexpected reconcile output:\n{reconciled}"
    );

    let again = run_ok(&env, "hydrate", &["reconcile"]);
    assert!(again.contains("In sync"), "unexpected output:\n{again}");

    let today = run_ok(&env, "hydrate", &["today"]);
    assert!(
        today.contains("Today: 800 ml of 2000 ml (40%)"),
        "unexpected today output:\n{today}"
    );

    let shown = run_ok(&env, "hydrate-widget", &["show"]);
    assert!(shown.contains("800 ml of 2000 ml"));
    assert!(!shown.contains("(syncing)"));

    let db = Database::open(&env.db_path()).expect("failed to open db");
    db.migrate().expect("failed to migrate db");
    let events = db.all_events().expect("failed to list events");
    assert_eq!(events.len(), 2);
    assert_eq!(
        events
            .iter()
            .filter(|e| e.origin == EventOrigin::SyncCorrection)
            .count(),
        1
    );
}

#[test]
fn quick_presets_and_stats() {
    let env = CliTestEnv::new();

    let presets = run_ok(&env, "hydrate", &["quick"]);
    assert!(presets.contains("1. 250 ml Water"), "got:\n{presets}");

    run_ok(&env, "hydrate", &["quick", "3"]);
    run_ok(&env, "hydrate", &["add", "1800", "--kind", "tea"]);

    let stats = run_ok(&env, "hydrate", &["stats", "--period", "week"]);
    assert!(stats.contains("Last 7 days"));
    assert!(stats.contains("Best day:       2000 ml"), "got:\n{stats}");
    assert!(stats.contains("Goal reached:   14% of days"), "got:\n{stats}");
    assert!(stats.contains("Current streak: 1 day(s)"));

    let history = run_ok(&env, "hydrate", &["history", "--days", "3"]);
    assert_eq!(history.lines().count(), 3);
    assert!(history.lines().last().unwrap().contains("* 2000 ml"));

    let missing = run_bin(&env, "hydrate", &["quick", "99"]);
    assert!(!missing.status.success());
}

#[test]
fn invalid_input_is_rejected() {
    let env = CliTestEnv::new();

    let zero = run_bin(&env, "hydrate", &["add", "0"]);
    assert!(!zero.status.success());

    let widget_zero = run_bin(&env, "hydrate-widget", &["quick-add", "0"]);
    assert!(!widget_zero.status.success());

    let unknown_kind = run_bin(&env, "hydrate", &["add", "250", "--kind", "juice"]);
    assert!(!unknown_kind.status.success());

    let reset = run_bin(&env, "hydrate", &["reset"]);
    assert!(!reset.status.success());
}

#[test]
fn reset_clears_history() {
    let env = CliTestEnv::new();

    run_ok(&env, "hydrate", &["add", "750"]);
    let reset = run_ok(&env, "hydrate", &["reset", "--yes"]);
    assert!(reset.contains("Deleted 1 drink(s)"));

    let today = run_ok(&env, "hydrate", &["today"]);
    assert!(today.contains("Today: 0 ml of 2000 ml"));

    let shown = run_ok(&env, "hydrate-widget", &["show"]);
    assert!(shown.contains("0 ml of 2000 ml"));
}

#[test]
fn config_reports_isolated_paths() {
    let env = CliTestEnv::new();

    let config = run_ok(&env, "hydrate", &["config"]);
    assert!(config.contains(&env.db_path().display().to_string()));

    let log_file = env
        .xdg_state
        .join("hydrate")
        .join(format!("hydrate.log.{}", chrono::Utc::now().format("%Y-%m-%d")));
    assert!(
        config.contains(&log_file.display().to_string()),
        "unexpected config output:\n{config}"
    );
    assert!(config.contains("Daily goal:   2000 ml"));
    assert!(config.contains("Grid:         2x5 (GoalRelative)"));
}
