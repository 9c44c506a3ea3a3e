mod test_support;

use serde_json::json;
use test_support::{error_code, write_xlsx, Sidecar};

const HEADER: &str = "SN,BOARD,LOCATION,SUB LOCATION,NAME OF SCHOOL";

fn upload(sc: &mut Sidecar, body: &str) -> serde_json::Value {
    let text = format!("{}\n{}\n", HEADER, body);
    sc.request_ok("schoolData.upload", json!({ "csvText": text }))
}

fn uids(result: &serde_json::Value) -> Vec<String> {
    result["rows"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["uid"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn first_cbse_rows_get_001_and_002() {
    let (mut sc, _ws) = Sidecar::with_workspace("sisd-school-first");
    let result = upload(
        &mut sc,
        "1,CBSE,Delhi,South,Modern School\n2,CBSE,Delhi,North,Ramjas School",
    );
    assert_eq!(result["inserted"], 2);
    assert_eq!(uids(&result), vec!["SID-CBSE-001", "SID-CBSE-002"]);
    assert_eq!(result["rows"][1]["sn"], 2);
    assert_eq!(result["rows"][0]["schoolName"], "Modern School");
    assert_eq!(result["rows"][0]["subLocation"], "South");
}

#[test]
fn numbering_continues_across_uploads_per_board() {
    let (mut sc, _ws) = Sidecar::with_workspace("sisd-school-continue");
    upload(&mut sc, "1,CBSE,Pune,Camp,St Mary\n2,ICSE,Pune,Aundh,Loyola");
    let second = upload(
        &mut sc,
        "1,CBSE,Pune,Kothrud,Abhinava\n2,ICSE,Pune,Baner,Vibgyor\n3,CBSE,Pune,Camp,Bishops",
    );
    assert_eq!(
        uids(&second),
        vec!["SID-CBSE-002", "SID-ICSE-002", "SID-CBSE-003"]
    );

    let all = sc.request_ok("schoolData.list", json!({}));
    assert_eq!(all["total"], 5);
    let cbse = sc.request_ok("schoolData.list", json!({ "board": "CBSE" }));
    assert_eq!(cbse["total"], 3);
}

#[test]
fn whitespace_in_board_is_stripped_from_uid() {
    let (mut sc, _ws) = Sidecar::with_workspace("sisd-school-space");
    let result = upload(
        &mut sc,
        "1,State Board,Chennai,Adyar,PSBB\n2,StateBoard,Chennai,Anna Nagar,Chinmaya",
    );
    assert_eq!(
        uids(&result),
        vec!["SID-StateBoard-001", "SID-StateBoard-002"]
    );
    assert_eq!(result["rows"][0]["board"], "State Board");
}

#[test]
fn rows_without_board_are_skipped_with_a_warning() {
    let (mut sc, _ws) = Sidecar::with_workspace("sisd-school-warn");
    let result = upload(&mut sc, "1,,Goa,Panaji,Sharada Mandir\n2,CBSE,Goa,Margao,Manovikas");
    assert_eq!(result["rowsTotal"], 2);
    assert_eq!(result["inserted"], 1);
    assert_eq!(result["warnings"][0]["code"], "missing_board");
    assert_eq!(result["warnings"][0]["line"], 2);
    assert_eq!(uids(&result), vec!["SID-CBSE-001"]);
}

#[test]
fn empty_upload_gives_an_info_notice() {
    let (mut sc, _ws) = Sidecar::with_workspace("sisd-school-empty");
    let resp = sc.request(
        "schoolData.upload",
        json!({ "csvText": format!("{}\n", HEADER) }),
    );
    assert_eq!(resp["ok"], true);
    assert_eq!(resp["result"]["inserted"], 0);
    assert_eq!(resp["notice"]["kind"], "info");
}

#[test]
fn workbook_rosters_are_read_from_the_first_sheet() {
    let (mut sc, ws) = Sidecar::with_workspace("sisd-school-workbook");
    let xlsx = ws.join("roster.xlsx");
    write_xlsx(
        &xlsx,
        &[
            vec!["SN", "Board", "Location", "Sub_Location", "Name of School"],
            vec!["1", "CBSE", "Delhi", "North", "Delhi Public School"],
            vec!["2", "CBSE", "Delhi", "South", "Modern School"],
            vec![],
            vec!["3", "", "Pune", "", "Orphan Academy"],
            vec!["4", "ICSE", "Mumbai", "West", "St. Mary's & Co"],
        ],
    );
    let resp = sc.request(
        "schoolData.upload",
        json!({ "filePath": xlsx.to_string_lossy() }),
    );
    assert_eq!(resp["ok"], true, "{resp}");
    assert_eq!(resp["notice"]["message"], "3 schools uploaded");
    let result = &resp["result"];
    assert_eq!(uids(result), vec!["SID-CBSE-001", "SID-CBSE-002", "SID-ICSE-001"]);
    assert_eq!(result["rows"][0]["subLocation"], "North");
    assert_eq!(result["rows"][2]["schoolName"], "St. Mary's & Co");
    assert_eq!(result["rowsTotal"], 4);
    assert_eq!(result["warnings"][0]["code"], "missing_board");
    assert_eq!(result["warnings"][0]["line"], 5);
}

#[test]
fn broken_workbooks_and_headerless_rosters_are_rejected() {
    let (mut sc, ws) = Sidecar::with_workspace("sisd-school-reject");
    let xlsx = ws.join("roster.xlsx");
    std::fs::write(&xlsx, b"PK\x03\x04").unwrap();
    let resp = sc.request_err(
        "schoolData.upload",
        json!({ "csvPath": xlsx.to_string_lossy() }),
    );
    assert_eq!(error_code(&resp), "io_failed");

    let headerless = ws.join("headerless.xlsx");
    write_xlsx(&headerless, &[vec!["SN", "LOCATION"], vec!["1", "Delhi"]]);
    let resp = sc.request_err(
        "schoolData.upload",
        json!({ "filePath": headerless.to_string_lossy() }),
    );
    assert_eq!(error_code(&resp), "bad_params");

    let resp = sc.request_err(
        "schoolData.upload",
        json!({ "csvText": "SN,LOCATION\n1,Delhi\n" }),
    );
    assert_eq!(error_code(&resp), "bad_params");
    let count = sc.request_ok("schoolData.list", json!({}));
    assert_eq!(count["total"], 0);
}

#[test]
fn roster_can_be_read_from_a_file() {
    let (mut sc, ws) = Sidecar::with_workspace("sisd-school-file");
    let path = ws.join("roster.csv");
    std::fs::write(
        &path,
        "Board,Location,Sub_Location,Name of School\nIB,Mumbai,Powai,\"Hiranandani, Powai\"\n",
    )
    .unwrap();
    let result = sc.request_ok(
        "schoolData.upload",
        json!({ "csvPath": path.to_string_lossy() }),
    );
    assert_eq!(uids(&result), vec!["SID-IB-001"]);
    assert_eq!(result["rows"][0]["schoolName"], "Hiranandani, Powai");
}

#[test]
fn list_is_paged_thirty_rows_at_a_time() {
    let (mut sc, _ws) = Sidecar::with_workspace("sisd-school-pages");
    let body: Vec<String> = (1..=65)
        .map(|i| format!("{i},CBSE,Delhi,Central,School {i}"))
        .collect();
    upload(&mut sc, &body.join("\n"));

    let first = sc.request_ok("schoolData.list", json!({}));
    assert_eq!(first["pageSize"], 30);
    assert_eq!(first["pageCount"], 3);
    assert_eq!(first["rows"].as_array().unwrap().len(), 30);

    let last = sc.request_ok("schoolData.list", json!({ "page": 3 }));
    let rows = last["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[4]["uid"], "SID-CBSE-065");
}

#[test]
fn search_finds_schools_by_name() {
    let (mut sc, _ws) = Sidecar::with_workspace("sisd-school-search");
    upload(&mut sc, "1,CBSE,Delhi,South,Modern School\n2,CBSE,Delhi,North,Ramjas School");
    let found = sc.request_ok("schoolData.search", json!({ "text": "RAMJAS" }));
    let items = found["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["uid"], "SID-CBSE-002");
}
