#![allow(dead_code)]

use serde_json::json;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static TEMP_SEQ: AtomicUsize = AtomicUsize::new(0);

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}-{}-{}",
        prefix,
        std::process::id(),
        TEMP_SEQ.fetch_add(1, Ordering::SeqCst),
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

/// A running daemon. Event lines read while waiting for a response are
/// queued for [`Sidecar::next_event`].
pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    events: VecDeque<serde_json::Value>,
    seq: usize,
}

impl Sidecar {
    pub fn spawn() -> Self {
        let exe = env!("CARGO_BIN_EXE_sisd");
        let mut child = Command::new(exe)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn sisd");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Sidecar {
            child,
            stdin,
            reader: BufReader::new(stdout),
            events: VecDeque::new(),
            seq: 0,
        }
    }

    /// Spawns a daemon on a fresh workspace and drains the sign-out event
    /// that opening it produces.
    pub fn with_workspace(prefix: &str) -> (Self, PathBuf) {
        let workspace = temp_dir(prefix);
        let mut sc = Sidecar::spawn();
        sc.request_ok(
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
        let ev = sc.next_event();
        assert_eq!(ev["event"], "auth.stateChanged");
        (sc, workspace)
    }

    fn read_value(&mut self) -> serde_json::Value {
        let mut line = String::new();
        self.reader.read_line(&mut line).expect("read line");
        assert!(!line.trim().is_empty(), "daemon closed stdout");
        serde_json::from_str(line.trim()).expect("parse line json")
    }

    pub fn send_raw(&mut self, line: &str) {
        writeln!(self.stdin, "{}", line).expect("write request");
        self.stdin.flush().expect("flush request");
    }

    pub fn read_response(&mut self) -> serde_json::Value {
        loop {
            let value = self.read_value();
            if value.get("event").is_some() {
                self.events.push_back(value);
                continue;
            }
            return value;
        }
    }

    pub fn request(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.seq += 1;
        let id = self.seq.to_string();
        let payload = json!({ "id": id, "method": method, "params": params });
        self.send_raw(&payload.to_string());
        let value = self.read_response();
        assert_eq!(
            value.get("id").and_then(|v| v.as_str()),
            Some(id.as_str()),
            "response id for {}",
            method
        );
        value
    }

    pub fn request_ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or_default()
    }

    /// Response of a request that is expected to fail.
    pub fn request_err(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value
    }

    /// Next event line; blocks until the daemon writes one.
    pub fn next_event(&mut self) -> serde_json::Value {
        if let Some(ev) = self.events.pop_front() {
            return ev;
        }
        let value = self.read_value();
        assert!(value.get("event").is_some(), "expected an event, got {}", value);
        value
    }

    /// Events already read but not yet taken.
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Registers `email` and leaves it signed in with `role`. Self sign-up
    /// only ever yields a plain user, so other roles are granted afterwards.
    pub fn sign_up(&mut self, email: &str, role: &str) -> serde_json::Value {
        let result = self.request_ok(
            "auth.signUp",
            json!({
                "fields": {
                    "username": email.split('@').next().unwrap_or(email),
                    "email": email,
                    "role": "user",
                    "department": "Field"
                },
                "password": "secret123"
            }),
        );
        let ev = self.next_event();
        assert_eq!(ev["event"], "auth.stateChanged");
        if role == "user" {
            return result;
        }

        let uid = result["session"]["user"]["uid"].as_str().unwrap().to_string();
        self.request_ok("users.setRole", json!({ "id": uid, "role": role }));
        self.request_ok("auth.signOut", json!({}));
        let ev = self.next_event();
        assert_eq!(ev["event"], "auth.stateChanged");
        let result = self.request_ok(
            "auth.signIn",
            json!({ "email": email, "password": "secret123" }),
        );
        let ev = self.next_event();
        assert_eq!(ev["event"], "auth.stateChanged");
        result
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn error_code(resp: &serde_json::Value) -> &str {
    resp.get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Writes a single-sheet `.xlsx`. Numeric cells are stored as numbers, the
/// rest as shared strings; empty cells are left out of the sheet.
pub fn write_xlsx(path: &Path, rows: &[Vec<&str>]) {
    use zip::write::FileOptions;

    let mut strings: Vec<String> = Vec::new();
    let mut sheet_rows = String::new();
    for (r, row) in rows.iter().enumerate() {
        let mut cells = String::new();
        for (c, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            let cell_ref = format!("{}{}", (b'A' + c as u8) as char, r + 1);
            if value.parse::<f64>().is_ok() {
                cells.push_str(&format!(r#"<c r="{cell_ref}"><v>{value}</v></c>"#));
            } else {
                strings.push(xml_escape(value));
                cells.push_str(&format!(
                    r#"<c r="{cell_ref}" t="s"><v>{}</v></c>"#,
                    strings.len() - 1
                ));
            }
        }
        sheet_rows.push_str(&format!(r#"<row r="{}">{}</row>"#, r + 1, cells));
    }
    let shared: String = strings.iter().map(|s| format!("<si><t>{s}</t></si>")).collect();

    let main_ns = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
    let entries = [
        (
            "[Content_Types].xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/></Types>"#
                .to_string(),
        ),
        (
            "_rels/.rels",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#
                .to_string(),
        ),
        (
            "xl/workbook.xml",
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="{main_ns}" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Schools" sheetId="1" r:id="rId1"/></sheets></workbook>"#
            ),
        ),
        (
            "xl/_rels/workbook.xml.rels",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/></Relationships>"#
                .to_string(),
        ),
        (
            "xl/sharedStrings.xml",
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="{main_ns}" count="{n}" uniqueCount="{n}">{shared}</sst>"#,
                n = strings.len()
            ),
        ),
        (
            "xl/worksheets/sheet1.xml",
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="{main_ns}"><sheetData>{sheet_rows}</sheetData></worksheet>"#
            ),
        ),
    ];

    let file = std::fs::File::create(path).expect("create xlsx");
    let mut zip = zip::ZipWriter::new(file);
    for (name, body) in entries {
        zip.start_file(name, FileOptions::default()).expect("start entry");
        zip.write_all(body.as_bytes()).expect("write entry");
    }
    zip.finish().expect("finish xlsx");
}
