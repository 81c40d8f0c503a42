//! Per-connection protocol handling
//!
//! A connection is split into independent read and write halves so that a
//! stalled socket write never holds up reading, and the other way round.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use hermes_core::{HermesError, IdGenerator, Message};
use hermes_hub::{Hub, Subscription};
use hermes_wire::{
    line_text, parse_v1_line, read_line_bounded, v1_line, ClientMode, ReplicaDecoder,
    ReplicaEncoder, UNKNOWN_CLIENT_RESPONSE,
};

use crate::Node;

/// Negotiate the protocol from the first line and run it to completion
pub(crate) async fn handle_connection<S>(node: &Node, stream: S, peer: &str)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);

    let mut raw = Vec::new();
    match read_line_bounded(&mut reader, &mut raw, node.config().max_line_size).await {
        Ok(0) => {
            tracing::debug!(%peer, "connection closed before mode line");
            return;
        }
        Ok(_) => {}
        Err(HermesError::FrameTooLarge { size, max }) => {
            // too long to be a known mode
            tracing::debug!(%peer, size, max, "oversized mode line");
            raw.clear();
        }
        Err(e) => {
            tracing::debug!(%peer, error = %e, "cannot read mode line");
            return;
        }
    }
    let line = line_text(&raw);

    match ClientMode::parse(&line) {
        Some(ClientMode::Replica) => {
            tracing::info!(node = %node.id(), %peer, "replica client connected");
            replicate(node, reader, writer, peer).await;
        }
        Some(ClientMode::V1) => {
            tracing::info!(node = %node.id(), %peer, "v1 client connected");
            serve_v1(node, reader, writer, peer).await;
        }
        None => {
            tracing::debug!(%peer, mode = %line.trim(), "unknown client type");
            let _ = writer.write_all(UNKNOWN_CLIENT_RESPONSE.as_bytes()).await;
            let _ = writer.shutdown().await;
        }
    }
}

/// Run a replica link: decoded messages go into the hub, hub messages go out
///
/// The reader ending (clean EOF or a decode error) stops only the reader.
/// A write error ends the whole link.
pub(crate) async fn replicate<R, W>(node: &Node, reader: R, writer: W, peer: &str)
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
{
    let mut subscription = node.hub().subscribe_channel(node.config().replica_buffer);

    let decoder = ReplicaDecoder::with_max_frame_size(reader, node.config().max_frame_size);
    let reader_task = tokio::spawn(read_replica(
        Arc::clone(node.hub()),
        decoder,
        peer.to_string(),
    ));

    let mut encoder = ReplicaEncoder::new(writer);
    while let Some(msg) = subscription.recv().await {
        if let Err(e) = encoder.send(&msg).await {
            tracing::warn!(%peer, error = %e, "cannot write to replica");
            break;
        }
    }

    reader_task.abort();
    tracing::info!(%peer, "replica link closed");
}

async fn read_replica<R>(hub: Arc<Hub>, mut decoder: ReplicaDecoder<R>, peer: String)
where
    R: AsyncRead + Unpin,
{
    loop {
        match decoder.next_message().await {
            Ok(Some(msg)) => {
                tracing::debug!(%peer, message_id = %msg.id, "received replica message");
                hub.publish(Arc::new(msg));
            }
            Ok(None) => {
                tracing::debug!(%peer, "replica stream ended");
                return;
            }
            Err(e) => {
                tracing::warn!(%peer, error = %e, "cannot decode message");
                return;
            }
        }
    }
}

/// Serve a text client until either direction fails
///
/// Clients are subscribed like any other, so they also receive the lines
/// they publish themselves.
async fn serve_v1<R, W>(node: &Node, mut reader: R, writer: W, peer: &str)
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let subscription = node.hub().subscribe_channel(node.config().v1_buffer);
    let mut writer_task = tokio::spawn(write_v1(subscription, writer, peer.to_string()));

    let mut ids = IdGenerator::new(node.id().clone());
    tokio::select! {
        _ = read_v1(node, &mut reader, &mut ids, peer) => {}
        _ = &mut writer_task => {}
    }

    writer_task.abort();
    tracing::info!(%peer, "v1 client disconnected");
}

/// Publish every non-blank line; bytes that are not UTF-8 are replaced
async fn read_v1<R>(node: &Node, reader: &mut R, ids: &mut IdGenerator, peer: &str)
where
    R: AsyncBufRead + Unpin,
{
    let max_line_size = node.config().max_line_size;
    let mut raw = Vec::new();
    loop {
        raw.clear();
        match read_line_bounded(reader, &mut raw, max_line_size).await {
            Ok(0) => return,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(%peer, error = %e, "cannot read from client");
                return;
            }
        }
        // a trailing fragment without a newline is not a complete line
        if raw.last() != Some(&b'\n') {
            return;
        }

        let line = line_text(&raw);
        let Some(content) = parse_v1_line(&line) else {
            continue;
        };
        let msg = Message::new(ids.next_id(), content);
        tracing::debug!(%peer, message_id = %msg.id, "client message");
        node.hub().publish(Arc::new(msg));
    }
}

async fn write_v1<W>(mut subscription: Subscription, mut writer: W, peer: String)
where
    W: AsyncWrite + Unpin,
{
    while let Some(msg) = subscription.recv().await {
        let line = v1_line(&msg);
        let result = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = result {
            tracing::warn!(%peer, subscriber = %subscription.id(), error = %e, "cannot write to client");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::NodeConfig;

    use tokio::io::{duplex, AsyncBufReadExt, AsyncReadExt, DuplexStream};
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    async fn wait_for_subscribers(node: &Node, count: usize) {
        timeout(WAIT, async {
            while node.hub().subscriber_count() != count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("subscriber count not reached");
    }

    fn spawn_connection(node: &Node) -> DuplexStream {
        let (client, server) = duplex(4096);
        let node = node.clone();
        tokio::spawn(async move {
            handle_connection(&node, server, "test").await;
        });
        client
    }

    async fn read_line(reader: &mut BufReader<DuplexStream>) -> String {
        let mut line = String::new();
        timeout(WAIT, reader.read_line(&mut line))
            .await
            .expect("timed out reading line")
            .unwrap();
        line
    }

    #[tokio::test]
    async fn test_unknown_client_type() {
        let node = Node::new();
        let mut client = spawn_connection(&node);
        client.write_all(b"http/1.1\n").await.unwrap();

        let mut response = String::new();
        timeout(WAIT, client.read_to_string(&mut response))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response, "unknown client type\n");
        assert_eq!(node.hub().subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_v1_client_receives_own_lines() {
        let node = Node::new();
        let mut client = BufReader::new(spawn_connection(&node));
        client.get_mut().write_all(b"v1\n").await.unwrap();
        wait_for_subscribers(&node, 1).await;

        client.get_mut().write_all(b"\n   \nhello\n").await.unwrap();
        assert_eq!(read_line(&mut client).await, "hello\n");
        assert_eq!(node.stats().published, 1);
    }

    #[tokio::test]
    async fn test_v1_messages_get_sequential_ids() {
        let node = Node::new();
        let mut watcher = node.hub().subscribe_channel(8);
        let mut client = spawn_connection(&node);
        client.write_all(b"v1\none\ntwo\n").await.unwrap();

        let first = timeout(WAIT, watcher.recv()).await.unwrap().unwrap();
        let second = timeout(WAIT, watcher.recv()).await.unwrap().unwrap();
        assert_eq!(first.content, "one");
        assert_eq!(second.content, "two");

        let prefix = format!("{}.", node.id());
        assert!(first.id.as_str().starts_with(&prefix));
        assert!(first.id.as_str().ends_with(":1"));
        assert!(second.id.as_str().ends_with(":2"));
    }

    #[tokio::test]
    async fn test_v1_disconnect_unsubscribes() {
        let node = Node::new();
        let mut client = spawn_connection(&node);
        client.write_all(b"v1\n").await.unwrap();
        wait_for_subscribers(&node, 1).await;

        drop(client);
        wait_for_subscribers(&node, 0).await;
    }

    #[tokio::test]
    async fn test_replica_messages_are_published() {
        let node = Node::new();
        let mut watcher = node.hub().subscribe_channel(8);
        let mut client = spawn_connection(&node);
        client
            .write_all(b"replica\n{\"MessageID\":\"peer:1\",\"Created\":\"2016-03-01T10:00:00Z\",\"Content\":\"from peer\"}")
            .await
            .unwrap();

        let msg = timeout(WAIT, watcher.recv()).await.unwrap().unwrap();
        assert_eq!(msg.id.as_str(), "peer:1");
        assert_eq!(msg.content, "from peer");
    }

    #[tokio::test]
    async fn test_replica_link_streams_hub_messages() {
        let node = Node::new();
        let client = spawn_connection(&node);
        let (reader, mut writer) = tokio::io::split(client);
        writer.write_all(b"replica\n").await.unwrap();
        wait_for_subscribers(&node, 1).await;

        node.hub().publish(Arc::new(Message::new("local:1", "outbound")));

        let mut decoder = ReplicaDecoder::new(reader);
        let msg = timeout(WAIT, decoder.next_message())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(msg.content, "outbound");
    }

    #[tokio::test]
    async fn test_replica_decode_error_keeps_writer() {
        let node = Node::new();
        let client = spawn_connection(&node);
        let (reader, mut writer) = tokio::io::split(client);
        writer.write_all(b"replica\n{ this is not json }").await.unwrap();
        wait_for_subscribers(&node, 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        // the reader gave up, the outbound direction still works
        node.hub().publish(Arc::new(Message::new("local:1", "still here")));
        let mut decoder = ReplicaDecoder::new(reader);
        let msg = timeout(WAIT, decoder.next_message())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(msg.content, "still here");
    }

    #[tokio::test]
    async fn test_non_utf8_mode_line_is_unknown() {
        let node = Node::new();
        let mut client = spawn_connection(&node);
        client.write_all(b"\xff\xfe\n").await.unwrap();

        let mut response = String::new();
        timeout(WAIT, client.read_to_string(&mut response))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response, "unknown client type\n");
    }

    #[tokio::test]
    async fn test_oversized_mode_line_is_unknown() {
        let node = Node::with_config(NodeConfig::default().with_max_line_size(16));
        let mut client = spawn_connection(&node);
        client.write_all(&[b'v'; 64]).await.unwrap();

        let mut response = String::new();
        timeout(WAIT, client.read_to_string(&mut response))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response, "unknown client type\n");
    }

    #[tokio::test]
    async fn test_v1_non_utf8_line_is_published() {
        let node = Node::new();
        let mut watcher = node.hub().subscribe_channel(8);
        let mut client = spawn_connection(&node);
        client.write_all(b"v1\ncaf\xe9\nafter\n").await.unwrap();

        let first = timeout(WAIT, watcher.recv()).await.unwrap().unwrap();
        let second = timeout(WAIT, watcher.recv()).await.unwrap().unwrap();
        assert_eq!(first.content, "caf\u{fffd}");
        assert_eq!(second.content, "after");

        // the connection is still subscribed and serving
        assert_eq!(node.hub().subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_v1_oversized_line_closes_client() {
        let node = Node::with_config(NodeConfig::default().with_max_line_size(16));
        let mut client = spawn_connection(&node);
        client.write_all(b"v1\n").await.unwrap();
        wait_for_subscribers(&node, 1).await;

        let line = format!("{}\n", "x".repeat(32));
        client.write_all(line.as_bytes()).await.unwrap();
        wait_for_subscribers(&node, 0).await;
        assert_eq!(node.stats().published, 0);
    }

    #[tokio::test]
    async fn test_replica_write_error_ends_link() {
        let node = Node::new();
        let (mut input, server_in) = duplex(64);
        let (client_out, server_out) = duplex(64);
        drop(client_out);

        let link = {
            let node = node.clone();
            tokio::spawn(async move { replicate(&node, server_in, server_out, "test").await })
        };
        wait_for_subscribers(&node, 1).await;

        node.hub().publish(Arc::new(Message::new("local:1", "nowhere to go")));
        timeout(WAIT, link).await.expect("link still open").unwrap();
        assert_eq!(node.hub().subscriber_count(), 0);

        // the reader went down with the link, so its input is no longer read
        timeout(WAIT, async {
            while input.write_all(b" ").await.is_ok() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("replica reader still running");
    }

    #[tokio::test]
    async fn test_v1_write_error_ends_session() {
        let node = Node::new();
        let (mut input, server_in) = duplex(64);
        let (client_out, server_out) = duplex(64);
        drop(client_out);

        let session = {
            let node = node.clone();
            tokio::spawn(async move {
                serve_v1(&node, BufReader::new(server_in), server_out, "test").await
            })
        };
        wait_for_subscribers(&node, 1).await;

        node.hub().publish(Arc::new(Message::new("local:1", "nowhere to go")));
        timeout(WAIT, session).await.expect("session still open").unwrap();
        assert_eq!(node.hub().subscriber_count(), 0);
        assert!(input.write_all(b"late\n").await.is_err());
    }
}
