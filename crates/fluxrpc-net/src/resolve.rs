//! Asynchronous name resolution.

use std::net::SocketAddr;

use fluxrpc_core::{CancelSignal, TransportError, TransportResult};

/// One name-resolution operation, cancellable while in flight.
#[derive(Debug, Default)]
pub struct ResolveOp {
    cancel: CancelSignal,
}

impl ResolveOp {
    /// Create a standalone operation.
    pub fn new() -> Self {
        Self {
            cancel: CancelSignal::new(),
        }
    }

    /// Create an operation whose cancellation chains to `parent`.
    pub fn with_parent(parent: &CancelSignal) -> Self {
        Self {
            cancel: parent.child(),
        }
    }

    /// Cancel the resolve, failing it with `err`.
    pub fn cancel(&self, err: TransportError) {
        self.cancel.cancel(err);
    }

    /// Resolve `host:port` to its socket addresses.
    ///
    /// A cancel delivered before the call is observed immediately; a cancel
    /// delivered mid-flight surfaces as the recorded reason.
    pub async fn run(&self, host: &str, port: u16) -> TransportResult<Vec<SocketAddr>> {
        tracing::trace!("resolving {}:{}", host, port);
        let addrs: Vec<SocketAddr> = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(self.cancel.reason()),
            result = tokio::net::lookup_host((host, port)) => result
                .map_err(|e| TransportError::Resolve(e.to_string()))?
                .collect(),
        };
        if addrs.is_empty() {
            return Err(TransportError::Resolve(format!(
                "no addresses found for {host}"
            )));
        }
        tracing::trace!("resolved {}:{} to {} addresses", host, port, addrs.len());
        Ok(addrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_to_completion() {
        let op = ResolveOp::new();
        let addrs = op.run("localhost", 443).await.unwrap();
        assert!(!addrs.is_empty());
    }

    #[tokio::test]
    async fn immediate_cancel_aborts_the_resolve() {
        let op = ResolveOp::new();
        op.cancel(TransportError::Aborted);

        let result = op.run("localhost", 443).await;
        assert_eq!(result, Err(TransportError::Aborted));
    }

    #[tokio::test]
    async fn cancel_reason_is_reported() {
        let op = ResolveOp::new();
        op.cancel(TransportError::ConnectionAborted);

        let result = op.run("localhost", 443).await;
        assert_eq!(result, Err(TransportError::ConnectionAborted));
    }
}
