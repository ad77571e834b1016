use std::path::PathBuf;
use std::process::Command;

use serde_json::{Value, json};

fn temp_path(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "travelog-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

fn write_dump(label: &str, dump: &Value) -> PathBuf {
    let path = temp_path(label).with_extension("json");
    std::fs::write(&path, dump.to_string()).expect("write dump");
    path
}

fn legacy_dump() -> Value {
    let entries = json!([
        {"id": "1", "country": "Japan", "countryCode": "JP", "city": "Tokyo",
         "startDate": "2024-01-01", "endDate": "2024-01-05", "companions": "", "rating": 5},
        {"country": "Korea", "countryCode": "KR", "city": "Busan",
         "startDate": "2024-02-01", "endDate": "2024-02-03", "companions": "가족"}
    ]);
    json!({
        "travelEntries": entries.to_string(),
        "userResidence":
            json!({"country": "대한민국", "countryCode": "KR", "city": "서울"}).to_string()
    })
}

fn run(args: &[&str], store: &PathBuf) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_travelog"))
        .args(args)
        .arg("--store")
        .arg(store)
        .output()
        .expect("run cli")
}

#[test]
fn cli_stats_json_reports_overview() {
    let store = write_dump("stats", &legacy_dump());
    let output = run(&["stats", "--report", "json"], &store);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let report: Value = serde_json::from_slice(&output.stdout).expect("json report");
    assert_eq!(report["overview"]["trips"], json!(2));
    assert_eq!(report["overview"]["totalDays"], json!(8));
    assert_eq!(report["overview"]["overseasDays"], json!(5));
    assert_eq!(report["residence"], json!("KR"));

    // Statistics never write the dump back.
    let dump: Value = serde_json::from_str(&std::fs::read_to_string(&store).unwrap()).unwrap();
    assert_eq!(dump, legacy_dump());
}

#[test]
fn cli_migrate_dry_run_then_write() {
    let store = write_dump("migrate", &legacy_dump());

    let dry = run(&["migrate", "--dry-run", "--report", "json"], &store);
    assert!(dry.status.success());
    let summary: Value = serde_json::from_slice(&dry.stdout).unwrap();
    assert_eq!(summary["changed"], json!(2));
    assert_eq!(summary["written"], json!(false));

    let wet = run(&["migrate", "--report", "json"], &store);
    assert!(wet.status.success());
    let summary: Value = serde_json::from_slice(&wet.stdout).unwrap();
    assert_eq!(summary["written"], json!(true));

    let dump: Value = serde_json::from_str(&std::fs::read_to_string(&store).unwrap()).unwrap();
    let entries: Value = serde_json::from_str(dump["travelEntries"].as_str().unwrap()).unwrap();
    assert_eq!(entries[0]["companionType"], json!("solo"));
    assert_eq!(entries[1]["companionType"], json!("custom"));
    assert_eq!(entries[1]["companions"], json!("가족"));

    let again = run(&["migrate", "--report", "json"], &store);
    let summary: Value = serde_json::from_slice(&again.stdout).unwrap();
    assert_eq!(summary["changed"], json!(0));
}

#[test]
fn cli_export_then_import_into_user_namespace() {
    let store = write_dump("export", &legacy_dump());
    let dir = temp_path("export-dir");
    std::fs::create_dir_all(&dir).unwrap();

    let exported = run(
        &["export", "--report", "json", "--dir", dir.to_str().unwrap()],
        &store,
    );
    assert!(exported.status.success());
    let summary: Value = serde_json::from_slice(&exported.stdout).unwrap();
    let path = summary["path"].as_str().unwrap().to_string();
    assert!(path.contains("travel_data_"));
    let snapshot: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(snapshot["entries"].as_array().map(Vec::len), Some(2));

    let target = write_dump("import", &json!({}));
    let imported = run(
        &["import", &path, "--user", "42", "--report", "json"],
        &target,
    );
    assert!(imported.status.success(), "{}", String::from_utf8_lossy(&imported.stderr));
    let dump: Value = serde_json::from_str(&std::fs::read_to_string(&target).unwrap()).unwrap();
    assert!(dump.get("user_42_travelEntries").is_some());
    assert!(dump.get("user_42_residence").is_some());
    assert!(dump.get("travelEntries").is_none());
}

#[test]
fn cli_rejects_non_list_payload_on_migrate() {
    let store = write_dump("bad", &json!({"travelEntries": "{\"oops\":1}"}));
    let output = run(&["migrate"], &store);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("does not hold a list"));
}

#[test]
fn cli_usage_console_lists_keys() {
    let store = write_dump("usage", &legacy_dump());
    let output = run(&["usage"], &store);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Travelog Storage Tool"));
    assert!(stdout.contains("travelEntries"));
    assert!(stdout.contains("userResidence"));
}
