//! Server lifecycle: transport, then identity handshake, then serving.
//!
//! ```text
//! Unconnected -> TransportConnected -> IdentityPending -> Ready
//!      \                 \                    \
//!       +-----------------+--------------------+--> Failed
//! ```
//!
//! Transitions only move forward. While the handshake is pending the server
//! keeps answering protocol requests (`initialize`, `ping`, `tools/list`,
//! resources), but `tools/call` requests are held back and answered in
//! arrival order once the identity is established. If the handshake fails
//! the held calls are never answered and the run ends with an error.

use std::collections::VecDeque;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::{debug, error, info};

use crate::config::IdentityConfig;
use crate::dispatch::ToolSet;
use crate::error::{HandshakeError, LifecycleError, ServeError};
use crate::identity::{
    AztpClient, IdentityHandshake, IdentityProvider, IdentitySlot, SecuredIdentity,
};
use crate::jsonrpc::{rpc_error, PARSE_ERROR};
use crate::server::{is_tool_call, McpServer};
use crate::transport::{Incoming, StdioTransport};

/// Lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unconnected,
    TransportConnected,
    IdentityPending,
    Ready,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_advance_to(self, next: Phase) -> bool {
        use Phase::*;
        match (self, next) {
            (Unconnected, TransportConnected)
            | (TransportConnected, IdentityPending)
            | (IdentityPending, Ready) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// Owns the server and the process-wide identity slot, and drives them
/// through the phases above.
pub struct ServerLifecycle<T: ToolSet> {
    phase: Phase,
    server: McpServer<T>,
    identity: IdentitySlot,
}

impl<T: ToolSet> ServerLifecycle<T> {
    pub fn new(server: McpServer<T>) -> Self {
        let identity = server.dispatcher().identity().clone();
        Self {
            phase: Phase::Unconnected,
            server,
            identity,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn identity(&self) -> &IdentitySlot {
        &self.identity
    }

    pub fn server(&self) -> &McpServer<T> {
        &self.server
    }

    fn advance(&mut self, next: Phase) -> Result<(), LifecycleError> {
        if !self.phase.can_advance_to(next) {
            return Err(LifecycleError {
                from: self.phase,
                to: next,
            });
        }
        debug!(from = ?self.phase, to = ?next, "lifecycle transition");
        self.phase = next;
        Ok(())
    }

    /// Serve until the input closes.
    ///
    /// Returns an error if the handshake fails (phase becomes `Failed`) or
    /// the transport breaks. A clean end of input after a successful
    /// handshake returns `Ok`.
    pub async fn run<R, W, P>(
        &mut self,
        transport: &mut StdioTransport<R, W>,
        handshake: &IdentityHandshake,
        provider: &P,
    ) -> Result<(), ServeError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
        P: IdentityProvider + ?Sized,
    {
        let handle = self.server.info().handle();
        self.advance(Phase::TransportConnected)?;
        info!("{} running on stdio", handle.name);

        self.advance(Phase::IdentityPending)?;
        info!(name = handshake.name(), "securing server identity");
        let establish = handshake.establish(provider, &handle);
        tokio::pin!(establish);
        let mut deferred: VecDeque<Value> = VecDeque::new();

        loop {
            tokio::select! {
                outcome = &mut establish, if self.phase == Phase::IdentityPending => {
                    self.complete_handshake(outcome)?;
                    self.flush_deferred(transport, &mut deferred).await?;
                }
                frame = transport.recv() => {
                    match frame? {
                        None => break,
                        Some(Incoming::Malformed(e)) => {
                            let err = rpc_error(Value::Null, PARSE_ERROR, format!("parse error: {e}"));
                            transport.send(&err).await?;
                        }
                        Some(Incoming::Request(request)) => {
                            if self.phase != Phase::Ready && is_tool_call(&request) {
                                debug!("identity pending, deferring tool call");
                                deferred.push_back(request);
                            } else {
                                self.respond(transport, request).await?;
                            }
                        }
                    }
                }
            }
        }

        // Input closed before the handshake finished: its outcome still
        // decides the exit status.
        if self.phase == Phase::IdentityPending {
            let outcome = establish.await;
            self.complete_handshake(outcome)?;
            self.flush_deferred(transport, &mut deferred).await?;
        }

        info!("input closed, shutting down");
        Ok(())
    }

    fn complete_handshake(
        &mut self,
        outcome: Result<SecuredIdentity, HandshakeError>,
    ) -> Result<(), ServeError> {
        let established = outcome.and_then(|identity| {
            let id = identity.id.clone();
            self.identity.establish(identity).map(|()| id)
        });
        match established {
            Ok(id) => {
                self.advance(Phase::Ready)?;
                info!(%id, "AZTP secured connection established");
                Ok(())
            }
            Err(e) => {
                self.advance(Phase::Failed)?;
                error!("identity handshake failed: {e}");
                Err(e.into())
            }
        }
    }

    async fn flush_deferred<R, W>(
        &self,
        transport: &mut StdioTransport<R, W>,
        deferred: &mut VecDeque<Value>,
    ) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        while let Some(request) = deferred.pop_front() {
            self.respond(transport, request).await?;
        }
        Ok(())
    }

    async fn respond<R, W>(
        &self,
        transport: &mut StdioTransport<R, W>,
        request: Value,
    ) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        if let Some(response) = self.server.handle_request(request).await {
            transport.send(&response).await?;
        }
        Ok(())
    }
}

/// Serve on the process's stdin/stdout under the identity described by
/// `config`.
pub async fn serve_stdio<T: ToolSet>(
    server: McpServer<T>,
    config: &IdentityConfig,
) -> Result<(), ServeError> {
    let provider = AztpClient::from_config(config).map_err(HandshakeError::from)?;
    let handshake = config.handshake()?;
    let mut transport = StdioTransport::stdio();
    ServerLifecycle::new(server)
        .run(&mut transport, &handshake, &provider)
        .await
}
