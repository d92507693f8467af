use serde_json::{Value, json};
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(assert_cmd::cargo::cargo_bin!("sheet-sync-cli"))
        .args(args)
        .output()
        .expect("run sheet-sync-cli")
}

fn parse_stdout_json(output: &std::process::Output) -> Value {
    let stdout = String::from_utf8(output.stdout.clone()).expect("stdout utf8");
    serde_json::from_str(&stdout).expect("valid json")
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("path utf8")
}

fn init_sheet(path: &Path) {
    let output = run_cli(&["init", path_str(path)]);
    assert!(output.status.success(), "stderr: {:?}", output.stderr);
}

fn call_names(journal: &Value) -> Vec<String> {
    journal
        .as_array()
        .expect("journal array")
        .iter()
        .map(|call| call["call"].as_str().expect("call tag").to_string())
        .collect()
}

#[test]
fn cli_init_edit_show_round_trip() {
    let tmp = tempdir().expect("tempdir");
    let sheet = tmp.path().join("sheet.json");
    init_sheet(&sheet);

    let edit = run_cli(&[
        "edit",
        path_str(&sheet),
        "A1=42",
        "B1==SUM(A1:A1)",
        "A2=hello",
        "B2=done",
        "row:2!hidden=true",
    ]);
    assert!(edit.status.success(), "stderr: {:?}", edit.stderr);
    let payload = parse_stdout_json(&edit);
    assert_eq!(payload["sheet"], "Sheet1");
    assert_eq!(payload["edits"], 5);
    assert_eq!(payload["flush"]["recalculated"], true);

    let show = run_cli(&["show", path_str(&sheet)]);
    assert!(show.status.success(), "stderr: {:?}", show.stderr);
    let payload = parse_stdout_json(&show);
    assert_eq!(payload["used_range"], "A1:B2");
    assert_eq!(
        payload["cells"]["A1"]["value"],
        json!({ "type": "number", "value": 42.0 })
    );
    assert_eq!(payload["cells"]["B1"]["formula"], "=SUM(A1:A1)");
    assert_eq!(
        payload["cells"]["A2"]["value"],
        json!({ "type": "text", "value": "hello" })
    );
    assert_eq!(payload["hidden_rows"], json!([1]));
}

#[test]
fn cli_edit_journal_lists_calls_inside_suspension() {
    let tmp = tempdir().expect("tempdir");
    let sheet = tmp.path().join("sheet.json");
    init_sheet(&sheet);

    let edit = run_cli(&[
        "--compact",
        "edit",
        path_str(&sheet),
        "A1:B1=1",
        "A1!bg=#FFCC00",
        "--journal",
    ]);
    assert!(edit.status.success(), "stderr: {:?}", edit.stderr);
    let payload = parse_stdout_json(&edit);
    assert_eq!(
        call_names(&payload["journal"]),
        vec!["suspend", "write_values", "set_style", "restore", "calculate"]
    );
    assert_eq!(payload["journal"][1]["rect"]["right"], 1);
}

#[test]
fn cli_init_refuses_to_overwrite_without_force() {
    let tmp = tempdir().expect("tempdir");
    let sheet = tmp.path().join("sheet.json");
    init_sheet(&sheet);

    let again = run_cli(&["init", path_str(&sheet)]);
    assert!(!again.status.success());
    let stderr = String::from_utf8_lossy(&again.stderr);
    assert!(stderr.contains("already exists"), "stderr: {stderr}");

    let forced = run_cli(&["init", path_str(&sheet), "--force", "--name", "Budget"]);
    assert!(forced.status.success(), "stderr: {:?}", forced.stderr);
    assert_eq!(parse_stdout_json(&forced)["sheet"], "Budget");
}

#[test]
fn cli_insert_rows_shifts_and_reports() {
    let tmp = tempdir().expect("tempdir");
    let sheet = tmp.path().join("sheet.json");
    init_sheet(&sheet);

    let edit = run_cli(&["--quiet", "edit", path_str(&sheet), "A1=1", "A2=2"]);
    assert!(edit.status.success(), "stderr: {:?}", edit.stderr);
    assert!(edit.stdout.is_empty());

    let insert = run_cli(&["insert-rows", path_str(&sheet), "2", "--count", "2", "--journal"]);
    assert!(insert.status.success(), "stderr: {:?}", insert.stderr);
    let payload = parse_stdout_json(&insert);
    assert_eq!(payload["operation"], "insert_rows");
    assert_eq!(payload["moved"], 1);
    assert_eq!(
        payload["journal"],
        json!([{ "call": "insert_rows", "start": 1, "count": 2 }])
    );

    let show = run_cli(&["show", path_str(&sheet), "--range", "A1:A4"]);
    assert!(show.status.success(), "stderr: {:?}", show.stderr);
    let payload = parse_stdout_json(&show);
    assert_eq!(payload["range"], "A1:A4");
    assert_eq!(
        payload["values"],
        json!([
            [{ "type": "number", "value": 1.0 }],
            [{ "type": "empty" }],
            [{ "type": "empty" }],
            [{ "type": "number", "value": 2.0 }],
        ])
    );
}

#[test]
fn cli_delete_cols_reports_evicted_cells() {
    let tmp = tempdir().expect("tempdir");
    let sheet = tmp.path().join("sheet.json");
    init_sheet(&sheet);

    let edit = run_cli(&["edit", path_str(&sheet), "A1=a", "B1=b", "C1=c"]);
    assert!(edit.status.success(), "stderr: {:?}", edit.stderr);

    let delete = run_cli(&["delete-cols", path_str(&sheet), "B"]);
    assert!(delete.status.success(), "stderr: {:?}", delete.stderr);
    let payload = parse_stdout_json(&delete);
    assert_eq!(payload["evicted"], json!(["B1"]));
    assert_eq!(payload["moved"], 1);

    let show = run_cli(&["show", path_str(&sheet)]);
    let payload = parse_stdout_json(&show);
    assert_eq!(
        payload["cells"]["B1"]["value"],
        json!({ "type": "text", "value": "c" })
    );
    assert!(payload["cells"]["C1"].is_null());
}

#[test]
fn cli_rejects_malformed_edits_before_touching_the_file() {
    let tmp = tempdir().expect("tempdir");
    let sheet = tmp.path().join("sheet.json");
    init_sheet(&sheet);
    let before = std::fs::read_to_string(&sheet).expect("read snapshot");

    let edit = run_cli(&["edit", path_str(&sheet), "A1=1", "A1!bogus=2"]);
    assert!(!edit.status.success());
    let stderr = String::from_utf8_lossy(&edit.stderr);
    assert!(stderr.contains("bogus"), "stderr: {stderr}");

    let after = std::fs::read_to_string(&sheet).expect("read snapshot");
    assert_eq!(before, after);
}

#[test]
fn cli_reports_missing_config_file() {
    let tmp = tempdir().expect("tempdir");
    let sheet = tmp.path().join("sheet.json");
    init_sheet(&sheet);
    let config = tmp.path().join("absent.yaml");

    let show = run_cli(&["show", path_str(&sheet), "--config", path_str(&config)]);
    assert!(!show.status.success());
    let stderr = String::from_utf8_lossy(&show.stderr);
    assert!(stderr.contains("does not exist"), "stderr: {stderr}");
}
