mod test_support;

use serde_json::json;
use test_support::{error_code, Sidecar};

fn seed_roster(sc: &mut Sidecar) {
    let text = "BOARD,LOCATION,SUB LOCATION,NAME OF SCHOOL\n\
                CBSE,Delhi,South,\"Modern School, Barakhamba\"\n\
                ICSE,Delhi,North,St Columba\n\
                CBSE,Delhi,East,Bal Bharati\n";
    sc.request_ok("schoolData.upload", json!({ "csvText": text }));
}

#[test]
fn school_data_exports_to_csv_and_pdf() {
    let (mut sc, ws) = Sidecar::with_workspace("sisd-reports-export");
    seed_roster(&mut sc);

    let csv_path = ws.join("exports").join("cbse.csv");
    let result = sc.request_ok(
        "reports.schoolData.exportCsv",
        json!({ "outPath": csv_path.to_string_lossy(), "board": "CBSE" }),
    );
    assert_eq!(result["rowCount"], 2);
    let csv = std::fs::read_to_string(&csv_path).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "SN,BOARD,LOCATION,SUB LOCATION,NAME OF SCHOOL,UID");
    assert_eq!(
        lines[1],
        "1,CBSE,Delhi,South,\"Modern School, Barakhamba\",SID-CBSE-001"
    );
    assert_eq!(lines.len(), 3);

    let pdf_path = ws.join("exports").join("all.pdf");
    let resp = sc.request(
        "reports.schoolData.exportPdf",
        json!({ "outPath": pdf_path.to_string_lossy() }),
    );
    assert_eq!(resp["ok"], true);
    assert_eq!(resp["notice"]["message"], "PDF generated successfully");
    assert_eq!(resp["result"]["rowCount"], 3);
    assert_eq!(resp["result"]["pageCount"], 1);
    let bytes = std::fs::read(&pdf_path).unwrap();
    assert!(bytes.starts_with(b"%PDF-"));
}

#[test]
fn report_font_path_is_used_for_pdf_exports() {
    let (mut sc, ws) = Sidecar::with_workspace("sisd-reports-font");
    seed_roster(&mut sc);
    let all = sc.request_ok("setup.get", json!({ "section": "reports" }));
    assert_eq!(all["value"]["fontPath"], "");

    let missing = ws.join("fonts").join("NotoSansDevanagari.ttf");
    sc.request_ok(
        "setup.update",
        json!({ "section": "reports", "patch": { "fontPath": missing.to_string_lossy() } }),
    );
    let pdf_path = ws.join("exports").join("font.pdf");
    let failed = sc.request_err(
        "reports.schoolData.exportPdf",
        json!({ "outPath": pdf_path.to_string_lossy() }),
    );
    assert_eq!(error_code(&failed), "io_failed");
    assert!(!pdf_path.exists());

    let bad = sc.request_err(
        "setup.update",
        json!({ "section": "reports", "patch": { "fontPath": 12 } }),
    );
    assert_eq!(error_code(&bad), "bad_params");

    sc.request_ok(
        "setup.update",
        json!({ "section": "reports", "patch": { "fontPath": "" } }),
    );
    let ok = sc.request_ok(
        "reports.schoolData.exportPdf",
        json!({ "outPath": pdf_path.to_string_lossy() }),
    );
    assert_eq!(ok["pageCount"], 1);
    assert!(pdf_path.exists());
}

#[test]
fn dashboard_counts_every_collection() {
    let (mut sc, _ws) = Sidecar::with_workspace("sisd-reports-dashboard");
    seed_roster(&mut sc);
    sc.request_ok("designations.create", json!({ "fields": { "name": "Counsellor" } }));
    sc.sign_up("lead@example.org", "admin");

    let summary = sc.request_ok("dashboard.summary", json!({}));
    let counts = &summary["counts"];
    assert_eq!(counts["schoolData"], 3);
    assert_eq!(counts["designations"], 1);
    assert_eq!(counts["users"], 1);
    assert_eq!(counts["institutions"], 0);
    assert_eq!(counts["dataForms"], 0);
    assert_eq!(summary["session"]["status"], "signedIn");
}

#[test]
fn setup_defaults_and_validated_updates() {
    let (mut sc, _ws) = Sidecar::with_workspace("sisd-setup");
    let all = sc.request_ok("setup.get", json!({}));
    assert_eq!(all["notifications"]["dismissAfterMs"], 3000);
    assert_eq!(all["reports"]["pageSize"], 30);
    assert_eq!(all["security"]["confirmDeletes"], true);

    let resp = sc.request(
        "setup.update",
        json!({ "section": "notifications", "patch": { "dismissAfterMs": 5000 } }),
    );
    assert_eq!(resp["ok"], true);
    assert_eq!(resp["notice"]["dismissAfterMs"], 5000);
    let one = sc.request_ok("setup.get", json!({ "section": "notifications" }));
    assert_eq!(one["value"]["dismissAfterMs"], 5000);

    let bad = sc.request_err(
        "setup.update",
        json!({ "section": "reports", "patch": { "pageSize": 0 } }),
    );
    assert_eq!(error_code(&bad), "bad_params");
    let unknown = sc.request_err(
        "setup.update",
        json!({ "section": "reports", "patch": { "colour": "red" } }),
    );
    assert_eq!(error_code(&unknown), "bad_params");
    let section = sc.request_err("setup.get", json!({ "section": "grading" }));
    assert_eq!(error_code(&section), "bad_params");
}

#[test]
fn settings_change_paging_and_delete_confirmation() {
    let (mut sc, _ws) = Sidecar::with_workspace("sisd-setup-applied");
    seed_roster(&mut sc);
    sc.request_ok(
        "setup.update",
        json!({ "section": "reports", "patch": { "pageSize": 5 } }),
    );
    let page = sc.request_ok("schoolData.list", json!({}));
    assert_eq!(page["pageSize"], 5);

    let created = sc.request_ok("streams.create", json!({
        "fields": { "streamName": "Science", "streamCode": "SCI" }
    }));
    let id = created["item"]["id"].as_str().unwrap().to_string();
    let blocked = sc.request_err("streams.delete", json!({ "id": id }));
    assert_eq!(error_code(&blocked), "confirm_required");

    sc.request_ok(
        "setup.update",
        json!({ "section": "security", "patch": { "confirmDeletes": false } }),
    );
    sc.request_ok("streams.delete", json!({ "id": id }));
    let left = sc.request_ok("streams.list", json!({}));
    assert!(left["items"].as_array().unwrap().is_empty());
}
