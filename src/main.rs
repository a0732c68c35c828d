mod attendance;
mod classes;
mod commit;
mod config;
mod db;
mod error;
mod export;
mod ingest;
mod ipc;
mod logging;
mod model;
mod report;
mod roster;
mod store;
#[cfg(test)]
mod testing;

use clap::Parser;
use std::io::{self, BufRead, Write};
use tracing::{error, info, warn};

fn main() {
    let config = config::Config::parse();
    logging::init(&config.log_filter);
    info!(version = env!("CARGO_PKG_VERSION"), "attendd starting");

    let startup_workspace = config.workspace.clone();
    let mut state = ipc::AppState::new(config);
    if let Some(path) = startup_workspace {
        match state.select_workspace(path) {
            Ok(()) => {
                if let Err(e) = state.reload() {
                    warn!(error = %e, "initial load failed");
                }
            }
            Err(e) => error!(error = %format!("{e:#}"), "could not open startup workspace"),
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to reply to.
                warn!(error = %e, "unparseable request line");
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() },
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    info!("stdin closed, exiting");
}
