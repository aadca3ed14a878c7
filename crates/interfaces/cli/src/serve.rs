//! JSON-lines session: one request per input line, one response per output
//! line.  Logs never go to stdout.

use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use mnemo_cache::CacheManager;
use mnemo_tools::{ToolRouter, specs_to_openai_tools};

/// Pseudo-tool that returns the tool schemas instead of running anything.
const LIST_TOOLS: &str = "list_tools";

#[derive(Debug, Deserialize)]
struct Request {
    tool: String,
    #[serde(default)]
    args: serde_json::Value,
}

pub async fn run_serve(manager: Arc<CacheManager>) -> Result<()> {
    let reader = tokio::io::BufReader::new(tokio::io::stdin());
    let writer = tokio::io::stdout();
    serve(manager, reader, writer).await
}

/// Serve requests from `reader` until EOF, then wait for pending
/// auto-updates before returning.
pub async fn serve<R, W>(manager: Arc<CacheManager>, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let router = ToolRouter::for_session(manager);
    info!("session started");

    let mut lines = reader.lines();
    let result = async {
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let response = handle_line(&router, &line).await;
            let mut rendered = serde_json::to_string(&response)?;
            rendered.push('\n');
            writer.write_all(rendered.as_bytes()).await?;
            writer.flush().await?;
        }
        anyhow::Ok(())
    }
    .await;

    router.shutdown().await;
    info!("session ended");
    result
}

async fn handle_line(router: &ToolRouter, line: &str) -> serde_json::Value {
    let request = match serde_json::from_str::<Request>(line) {
        Ok(request) => request,
        Err(err) => {
            debug!(error = %err, "malformed request line");
            return json!({ "success": false, "output": format!("malformed request: {err}") });
        }
    };

    if request.tool == LIST_TOOLS {
        return json!({ "success": true, "tools": specs_to_openai_tools(&router.specs()) });
    }

    let output = router.call(&request.tool, &request.args).await;
    json!({ "success": output.success, "output": output.output })
}
