use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::path::Path;

const RAW: &str = "\
 Date ,Datetime,Cash_Type,Card,Money,Coffee Name
2024-03-01,2024-03-01 10:15:50.520,card,ANON-0000-0000-0001,38.7,Latte
2024-03-01,2024-03-01 10:15:50.520,card,ANON-0000-0000-0001,38.7,Latte
2024-03-01,2024-03-01 12:19:22.539,card,ANON-0000-0000-0002,38.7,Hot Chocolate
2024-03-02,2024-03-02 13:46:33.006,card,ANON-0000-0000-0003,28.9,Americano
";

/// Command running in `dir` with none of the pipeline variables inherited
fn salespipe(dir: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("salespipe");
    cmd.current_dir(dir)
        .env_remove("RAW_CSV_PATH")
        .env_remove("PROCESSED_CSV_PATH")
        .env_remove("DB_URL")
        .env_remove("PLOT_PATH")
        .env_remove("RUST_LOG");
    cmd
}

fn write_raw(dir: &Path, contents: &str) {
    std::fs::create_dir_all(dir.join("data/raw")).unwrap();
    std::fs::write(dir.join("data/raw/sales.csv"), contents).unwrap();
}

fn with_paths(cmd: &mut Command) -> &mut Command {
    cmd.env("RAW_CSV_PATH", "data/raw/sales.csv")
        .env("PROCESSED_CSV_PATH", "data/processed/sales.csv")
        .env("PLOT_PATH", "plots")
}

#[test]
fn test_help_lists_commands() {
    let dir = tempfile::tempdir().unwrap();
    salespipe(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("run")
                .and(predicate::str::contains("check"))
                .and(predicate::str::contains("query"))
                .and(predicate::str::contains("init")),
        );
}

#[test]
fn test_init_writes_templates() {
    let dir = tempfile::tempdir().unwrap();

    salespipe(dir.path()).arg("init").assert().success();

    let settings = std::fs::read_to_string(dir.path().join("salespipe.yaml")).unwrap();
    assert!(settings.contains("table_name: sales_data"));
    let env = std::fs::read_to_string(dir.path().join(".env")).unwrap();
    assert!(env.contains("RAW_CSV_PATH="));
    assert!(env.contains("DB_URL="));
    assert!(dir.path().join("data/raw").is_dir());

    // Refuses to overwrite without --force
    salespipe(dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already contains"));

    salespipe(dir.path())
        .args(["init", "--force"])
        .assert()
        .success();
}

#[test]
fn test_check_prints_report_and_writes_log_file() {
    let dir = tempfile::tempdir().unwrap();
    write_raw(dir.path(), RAW);

    with_paths(&mut salespipe(dir.path()))
        .arg("check")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("4 read, 1 duplicates removed, 3 cleaned")
                .and(predicate::str::contains("schema: ok")),
        );

    assert!(dir.path().join("data/processed/sales.csv").exists());
    let logs: Vec<_> = std::fs::read_dir(dir.path().join("logs"))
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].extension().unwrap(), "log");
    // Nothing is drawn during a check
    assert!(!dir.path().join("plots").exists());
}

#[test]
fn test_check_fails_on_missing_column() {
    let dir = tempfile::tempdir().unwrap();
    write_raw(
        dir.path(),
        "date,datetime,cash_type,card,money\n2024-03-01,2024-03-01 10:15:50,card,A,38.7\n",
    );

    with_paths(&mut salespipe(dir.path()))
        .args(["--no-log-file", "check"])
        .assert()
        .failure()
        .stderr(
            predicate::str::contains("validate stage")
                .and(predicate::str::contains("coffee_name")),
        );
}

#[test]
fn test_run_requires_raw_csv_path() {
    let dir = tempfile::tempdir().unwrap();
    salespipe(dir.path())
        .args(["--no-log-file", "run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("RAW_CSV_PATH is not set"));
}

#[test]
fn test_run_requires_db_url_before_any_stage() {
    let dir = tempfile::tempdir().unwrap();
    write_raw(dir.path(), RAW);

    // Running with no subcommand is the same as `run`
    with_paths(&mut salespipe(dir.path()))
        .arg("--no-log-file")
        .assert()
        .failure()
        .stderr(predicate::str::contains("DB_URL is not set"));

    assert!(!dir.path().join("data/processed").exists());
    assert!(!dir.path().join("plots").exists());
}

#[test]
fn test_run_with_unreachable_database_fails_at_load() {
    let dir = tempfile::tempdir().unwrap();
    write_raw(dir.path(), RAW);

    with_paths(&mut salespipe(dir.path()))
        .env("DB_URL", "not a database url")
        .args(["--no-log-file", "run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("load stage"));

    // Every stage before load completed
    for chart in ["sales_over_time.svg", "sales_distribution.svg", "top_products.svg"] {
        assert!(dir.path().join("plots").join(chart).exists(), "{chart} missing");
    }
}

#[test]
fn test_explicit_config_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    write_raw(dir.path(), RAW);

    with_paths(&mut salespipe(dir.path()))
        .args(["--no-log-file", "--config", "missing.yaml", "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration file not found"));
}

#[test]
fn test_settings_file_is_discovered() {
    let dir = tempfile::tempdir().unwrap();
    write_raw(dir.path(), RAW);
    std::fs::write(dir.path().join("salespipe.yaml"), "top_n: 0\n").unwrap();

    with_paths(&mut salespipe(dir.path()))
        .args(["--no-log-file", "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("top_n must be at least 1"));
}

#[test]
fn test_query_requires_db_url() {
    let dir = tempfile::tempdir().unwrap();
    salespipe(dir.path())
        .args(["query", "SELECT 1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("DB_URL is not set"));
}
