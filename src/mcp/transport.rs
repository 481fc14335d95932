use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use super::handlers;
use super::jsonrpc::{JsonRpcErrorResponse, JsonRpcReply, JsonRpcRequest};
use super::tools::ToolRegistry;

/// Serve newline-delimited JSON-RPC over the process's stdin and stdout.
pub async fn serve_stdio(registry: &ToolRegistry) -> anyhow::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    serve(registry, stdin, stdout).await
}

/// Read one request per line from `reader` and write one reply line per
/// request to `writer` until the reader reaches end of input. Only I/O
/// failures end the loop; a malformed line gets a parse-error reply.
pub async fn serve<R, W>(
    registry: &ToolRegistry,
    mut reader: R,
    mut writer: W,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    tracing::info!(provider = %registry.provider().provider, "serving MCP over stdio");

    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .context("failed to read request")?;
        if read == 0 {
            break;
        }

        let reply: Option<JsonRpcReply> = match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => match serde_json::from_str::<JsonRpcRequest>(line.trim()) {
                Ok(request) => handlers::handle_request(registry, &request).await,
                Err(e) => {
                    tracing::warn!(error = %e, "unparseable request line");
                    Some(JsonRpcErrorResponse::parse_error(e).into())
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "request line is not UTF-8");
                Some(JsonRpcErrorResponse::parse_error(e).into())
            }
        };

        if let Some(reply) = reply {
            let mut out = serde_json::to_vec(&reply).context("failed to encode reply")?;
            out.push(b'\n');
            writer
                .write_all(&out)
                .await
                .context("failed to write reply")?;
            writer.flush().await.context("failed to flush reply")?;
        }
    }

    tracing::info!("input closed, shutting down");
    Ok(())
}
