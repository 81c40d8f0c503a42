//! Hermes Node - accept loop and peer following

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use hermes_core::{HermesError, HermesResult, NodeId};
use hermes_hub::{Hub, HubStats};
use hermes_wire::ClientMode;

use crate::session;
use crate::NodeConfig;

/// Hermes node - one per process
///
/// Cloning is cheap and every clone drives the same hub.
#[derive(Clone, Debug)]
pub struct Node {
    id: NodeId,
    hub: Arc<Hub>,
    config: NodeConfig,
}

impl Node {
    /// Create a node with a random id and an empty hub
    pub fn new() -> Self {
        Self::with_config(NodeConfig::default())
    }

    pub fn with_config(config: NodeConfig) -> Self {
        let hub = Arc::new(Hub::with_dedup_capacity(config.dedup_capacity));
        Self::with_hub(hub, config)
    }

    /// Create a node around an existing hub
    pub fn with_hub(hub: Arc<Hub>, config: NodeConfig) -> Self {
        Node {
            id: NodeId::generate(),
            hub,
            config,
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn stats(&self) -> HubStats {
        self.hub.stats()
    }

    /// Dial a peer and replicate with it
    ///
    /// Only the dial and handshake can fail; the replica link itself runs in
    /// the background until a transport error ends it.
    pub async fn follow_addr(&self, addr: &str) -> HermesResult<()> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| HermesError::Connect {
                addr: addr.to_string(),
                source,
            })?;
        tracing::info!(node = %self.id, peer = %addr, "following peer");
        self.follow_stream(stream, addr.to_string()).await
    }

    /// Replicate over an already established duplex stream
    pub async fn follow<S>(&self, stream: S) -> HermesResult<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        self.follow_stream(stream, "stream".to_string()).await
    }

    async fn follow_stream<S>(&self, stream: S, peer: String) -> HermesResult<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, mut writer) = tokio::io::split(stream);
        writer
            .write_all(ClientMode::Replica.handshake_line().as_bytes())
            .await?;

        let node = self.clone();
        tokio::spawn(async move {
            session::replicate(&node, reader, writer, &peer).await;
        });
        Ok(())
    }

    /// Accept connections until the listener fails
    ///
    /// Each connection is served on its own task; errors on a connection
    /// never reach this loop.
    pub async fn serve(&self, listener: TcpListener) -> HermesResult<()> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(node = %self.id, %addr, "serving");
        }

        loop {
            let (stream, peer) = listener.accept().await?;
            let node = self.clone();
            tokio::spawn(async move {
                session::handle_connection(&node, stream, &peer.to_string()).await;
            });
        }
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_uses_configured_dedup_capacity() {
        let node = Node::with_config(NodeConfig::default().with_dedup_capacity(1));
        node.hub().publish(Arc::new(hermes_core::Message::new("a", "")));
        node.hub().publish(Arc::new(hermes_core::Message::new("b", "")));

        assert!(!node.hub().has_seen(&"a".into()));
        assert!(node.hub().has_seen(&"b".into()));
    }

    #[test]
    fn test_nodes_get_distinct_ids() {
        // 4 base32 chars leave a small collision chance; compare a few
        let ids: std::collections::HashSet<String> =
            (0..8).map(|_| Node::new().id().to_string()).collect();
        assert!(ids.len() > 1);
    }

    #[test]
    fn test_clones_share_hub() {
        let node = Node::new();
        let clone = node.clone();
        assert!(Arc::ptr_eq(node.hub(), clone.hub()));
        assert_eq!(node.id(), clone.id());
    }

    #[tokio::test]
    async fn test_follow_unreachable_peer() {
        // bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let node = Node::new();
        let err = node.follow_addr(&addr).await.unwrap_err();
        assert!(matches!(err, HermesError::Connect { .. }));
    }
}
