mod auth;
mod backup;
mod config;
mod db;
mod forms;
mod guard;
mod ipc;
mod model;
mod notice;
mod pdf;
mod reports;
mod roster;
mod search;
mod store;
mod uid;

use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

/// Stdout carries the protocol, so logs go to stderr. `SISD_LOG` takes
/// the usual filter directives.
fn init_logging() {
    let filter = EnvFilter::try_from_env("SISD_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .with_target(false)
        .try_init();
}

fn write_line(stdout: &mut io::Stdout, value: &serde_json::Value) {
    let text = serde_json::to_string(value).unwrap_or_else(|_| "{\"ok\":false}".to_string());
    let _ = writeln!(stdout, "{}", text);
}

fn main() {
    init_logging();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "sisd starting");

    let mut state = ipc::AppState::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to answer to.
                tracing::warn!(error = %e, "unparseable request line");
                write_line(
                    &mut stdout,
                    &serde_json::json!({
                        "ok": false,
                        "error": { "code": "bad_json", "message": e.to_string() }
                    }),
                );
                let _ = stdout.flush();
                continue;
            }
        };

        let method = req.method.clone();
        let resp = ipc::handle_request(&mut state, req);
        tracing::debug!(%method, ok = resp["ok"].as_bool().unwrap_or(false), "handled");
        write_line(&mut stdout, &resp);
        for event in state.outbox.drain(..) {
            write_line(&mut stdout, &event);
        }
        let _ = stdout.flush();
    }
    tracing::info!("sisd exiting");
}
