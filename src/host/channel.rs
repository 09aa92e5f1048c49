//! Host command channel and router.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::error::{AppError, Result};
use crate::host::contract::{CONTRACT_VERSION, CommandEnvelope, CommandName, ResponseEnvelope};
use crate::service::SearchInput;

/// What the router calls into for each command.
#[async_trait]
pub trait CommandHandler: Send + Sync + 'static {
    /// Run a search and return the response payload.
    async fn search(&self, input: SearchInput) -> Result<serde_json::Value>;

    /// Every subscription tier and what it allows.
    fn tiers(&self) -> serde_json::Value;

    /// Release long-lived resources before the bridge exits.
    async fn stop(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<H: CommandHandler> CommandHandler for Arc<H> {
    async fn search(&self, input: SearchInput) -> Result<serde_json::Value> {
        self.as_ref().search(input).await
    }

    fn tiers(&self) -> serde_json::Value {
        self.as_ref().tiers()
    }

    async fn stop(&self) -> Result<()> {
        self.as_ref().stop().await
    }
}

struct HostCommandRequest {
    envelope: CommandEnvelope,
    response_tx: oneshot::Sender<ResponseEnvelope>,
}

#[derive(Clone)]
pub struct HostCommandClient {
    request_tx: mpsc::Sender<HostCommandRequest>,
}

impl HostCommandClient {
    /// Dispatch one command and wait for its response.
    ///
    /// # Errors
    ///
    /// [`AppError::Protocol`] for an invalid envelope or a closed channel.
    pub async fn send(&self, envelope: CommandEnvelope) -> Result<ResponseEnvelope> {
        envelope.validate()?;

        let (response_tx, response_rx) = oneshot::channel();
        self.request_tx
            .send(HostCommandRequest {
                envelope,
                response_tx,
            })
            .await
            .map_err(|e| AppError::Protocol(format!("failed to send host command request: {e}")))?;

        response_rx
            .await
            .map_err(|e| AppError::Protocol(format!("host command response dropped: {e}")))
    }
}

pub struct HostCommandServer<H: CommandHandler> {
    request_rx: mpsc::Receiver<HostCommandRequest>,
    handler: Arc<H>,
}

#[must_use]
pub fn command_channel<H: CommandHandler>(
    request_capacity: usize,
    handler: H,
) -> (HostCommandClient, HostCommandServer<H>) {
    let (request_tx, request_rx) = mpsc::channel(request_capacity.max(1));
    (
        HostCommandClient { request_tx },
        HostCommandServer {
            request_rx,
            handler: Arc::new(handler),
        },
    )
}

impl<H: CommandHandler> HostCommandServer<H> {
    /// Serve requests until every client is dropped.
    ///
    /// Each command runs on its own task, so a panic in one handler call
    /// becomes an `internal` error response instead of ending the loop.
    pub async fn run(mut self) {
        while let Some(request) = self.request_rx.recv().await {
            let HostCommandRequest {
                envelope,
                response_tx,
            } = request;
            let handler = Arc::clone(&self.handler);
            let request_id = envelope.request_id.clone();
            let command = envelope.command;

            tokio::spawn(async move {
                let routed =
                    tokio::spawn(async move { route(handler.as_ref(), &envelope).await }).await;
                let response = match routed {
                    Ok(Ok(response)) => response,
                    Ok(Err(e)) => {
                        if e.is_client_error() {
                            tracing::debug!(command = command.as_str(), error = %e, "command rejected");
                        } else {
                            tracing::warn!(command = command.as_str(), error = %e, "command failed");
                        }
                        ResponseEnvelope::failure(request_id, &e)
                    }
                    Err(join_error) => {
                        tracing::error!(
                            command = command.as_str(),
                            error = %join_error,
                            "command handler panicked"
                        );
                        ResponseEnvelope::error(request_id, "internal", "internal error")
                    }
                };
                let _ = response_tx.send(response);
            });
        }
    }

    /// Route one envelope without going through the channel.
    ///
    /// # Errors
    ///
    /// Whatever the handler returns for the command.
    pub async fn route(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        route(self.handler.as_ref(), envelope).await
    }
}

async fn route<H: CommandHandler + ?Sized>(
    handler: &H,
    envelope: &CommandEnvelope,
) -> Result<ResponseEnvelope> {
    let request_id = envelope.request_id.clone();
    match envelope.command {
        CommandName::HostPing => Ok(ResponseEnvelope::ok(
            request_id,
            serde_json::json!({"pong": true}),
        )),
        CommandName::HostVersion => Ok(ResponseEnvelope::ok(
            request_id,
            serde_json::json!({
                "contract_version": CONTRACT_VERSION,
                "version": env!("CARGO_PKG_VERSION"),
            }),
        )),
        CommandName::TiersList => Ok(ResponseEnvelope::ok(
            request_id,
            serde_json::json!({"tiers": handler.tiers()}),
        )),
        CommandName::Search => {
            let input = parse_search_input(&envelope.payload)?;
            let payload = handler.search(input).await?;
            Ok(ResponseEnvelope::ok(request_id, payload))
        }
        CommandName::RuntimeStop => {
            handler.stop().await?;
            Ok(ResponseEnvelope::ok(
                request_id,
                serde_json::json!({"stopping": true}),
            ))
        }
    }
}

fn parse_search_input(payload: &serde_json::Value) -> Result<SearchInput> {
    if !payload.is_object() {
        return Err(AppError::Protocol(
            "search requires an object payload".to_owned(),
        ));
    }
    serde_json::from_value(payload.clone())
        .map_err(|e| AppError::Protocol(format!("invalid search payload: {e}")))
}
