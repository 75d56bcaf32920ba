//! Line-delimited JSON-RPC over stdin/stdout
//!
//! Each input line carries one envelope (or batch); each response is written
//! as a single line. Nothing but responses may reach stdout.

use serde_json::Value;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};

use crate::mcp::rpc::{json_rpc_error, INTERNAL_ERROR};
use crate::mcp::server::handle_json_rpc_payload;
use crate::AppState;

pub async fn serve(state: AppState) -> io::Result<()> {
    info!("stdio transport ready");

    let mut lines = BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();

    while let Some(line) = lines.next_line().await? {
        let Some(response) = handle_line(&state, &line).await else {
            continue;
        };

        let mut encoded = match serde_json::to_string(&response) {
            Ok(encoded) => encoded,
            Err(err) => {
                error!(error = %err, "failed to encode response");
                continue;
            }
        };
        encoded.push('\n');
        stdout.write_all(encoded.as_bytes()).await?;
        stdout.flush().await?;
    }

    info!("stdin closed, shutting down");
    Ok(())
}

/// Blank lines are skipped; undecodable lines get a parse error with a null id.
pub async fn handle_line(state: &AppState, line: &str) -> Option<Value> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(line) {
        Ok(payload) => handle_json_rpc_payload(state, payload).await,
        Err(err) => {
            error!(error = %err, "failed to parse stdin line");
            Some(json_rpc_error(None, INTERNAL_ERROR, "Parse error"))
        }
    }
}
