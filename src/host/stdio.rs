//! Stdin/stdout JSON bridge for the host command channel.
//!
//! Reads newline-delimited JSON `CommandEnvelope` messages, dispatches them
//! through the `HostCommandServer` router, and writes one `ResponseEnvelope`
//! line per command.
//!
//! Stdout is exclusively reserved for the JSON protocol; all diagnostic
//! output (tracing, logs) must be routed to stderr.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

use crate::error::{AppError, Result};
use crate::host::channel::{CommandHandler, HostCommandClient, command_channel};
use crate::host::contract::{CommandEnvelope, CommandName, ResponseEnvelope};

/// Default request channel capacity for the bridge.
const REQUEST_CAPACITY: usize = 64;

/// Request id used when a line cannot be parsed into an envelope.
pub const PARSE_ERROR_REQUEST_ID: &str = "parse-error";

/// Run the bridge on the process stdin/stdout until stdin closes or a
/// `runtime.stop` command is answered.
///
/// # Errors
///
/// [`AppError::Io`] when stdin or stdout fails.
pub async fn run_stdio_bridge<H: CommandHandler>(handler: H) -> Result<()> {
    let reader = BufReader::new(tokio::io::stdin());
    let writer = BufWriter::new(tokio::io::stdout());
    run_bridge(reader, writer, handler).await
}

/// Run the bridge over any line reader and writer.
///
/// Commands are answered in the order they arrive. The router runs on its
/// own task and exits once the reader finishes and drops the client.
///
/// # Errors
///
/// [`AppError::Io`] when reading or writing fails.
pub async fn run_bridge<R, W, H>(reader: R, mut writer: W, handler: H) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    H: CommandHandler,
{
    let (client, server) = command_channel(REQUEST_CAPACITY, handler);
    let server_handle = tokio::spawn(server.run());

    let reader_result = run_reader(reader, &mut writer, client).await;

    // The client was dropped by `run_reader`, closing the request channel.
    let _ = server_handle.await;
    reader_result
}

async fn run_reader<R, W>(mut reader: R, writer: &mut W, client: HostCommandClient) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;

        if bytes_read == 0 {
            tracing::info!("input closed (EOF); shutting down host bridge");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let envelope: CommandEnvelope = match serde_json::from_str(trimmed) {
            Ok(env) => env,
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse command envelope");
                let response = ResponseEnvelope::error(
                    PARSE_ERROR_REQUEST_ID,
                    "protocol",
                    format!("failed to parse command envelope: {e}"),
                );
                write_response(writer, &response).await?;
                continue;
            }
        };

        let request_id = envelope.request_id.clone();
        let is_stop = envelope.command == CommandName::RuntimeStop;

        let response = match client.send(envelope).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(error = %e, "host command dispatch failed");
                ResponseEnvelope::failure(request_id, &e)
            }
        };
        write_response(writer, &response).await?;

        if is_stop && response.ok {
            tracing::info!("runtime.stop received; shutting down host bridge");
            break;
        }
    }

    Ok(())
}

/// Write a single JSON line and flush.
async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &ResponseEnvelope,
) -> Result<()> {
    let json = serde_json::to_string(response)
        .map_err(|e| AppError::Protocol(format!("failed to serialize response envelope: {e}")))?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
