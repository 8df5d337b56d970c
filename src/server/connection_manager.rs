use crate::domain_model::*;
use crate::server::*;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);

type SharedSender = Arc<Mutex<Box<dyn ConnSender>>>;
type Registry = DashMap<UserId, HashMap<ConnectionId, ConnectionRecord>>;

struct ConnectionRecord {
    sender: SharedSender,
    cancel: CancellationToken,
    liveness: Option<JoinHandle<()>>,
    status: Arc<ConnectionStatus>,
}

/// Caller-side view of one registered connection.
pub struct ConnectionHandle {
    pub user_id: UserId,
    pub id: ConnectionId,
    cancel: CancellationToken,
    status: Arc<ConnectionStatus>,
}

impl ConnectionHandle {
    /// Resolves once the manager has torn the connection down.
    pub async fn closed(&self) {
        self.cancel.cancelled().await
    }

    pub fn state(&self) -> ConnectionState {
        self.status.get()
    }
}

/// Registry of live realtime connections, keyed by user.
pub struct ConnectionManager {
    connections: Arc<Registry>,
    ping_interval: Duration,
}

impl ConnectionManager {
    pub fn new(ping_interval: Duration) -> Self {
        Self {
            connections: Arc::new(DashMap::new()),
            ping_interval,
        }
    }

    pub fn connect(&self, user_id: UserId, sender: Box<dyn ConnSender>) -> ConnectionHandle {
        let id = ConnectionId::generate();
        let sender: SharedSender = Arc::new(Mutex::new(sender));
        let cancel = CancellationToken::new();
        let status = Arc::new(ConnectionStatus::new());

        let registered = Arc::new(Notify::new());
        let liveness = tokio::spawn(liveness_probe(
            self.connections.clone(),
            user_id,
            id.clone(),
            sender.clone(),
            cancel.clone(),
            registered.clone(),
            self.ping_interval,
        ));

        self.connections.entry(user_id).or_default().insert(
            id.clone(),
            ConnectionRecord {
                sender,
                cancel: cancel.clone(),
                liveness: Some(liveness),
                status: status.clone(),
            },
        );
        // nothing else knows the id yet, so the record cannot have been closed
        let opened = status.open();
        debug_assert!(opened, "fresh connection {id} was already closed");
        registered.notify_one();

        tracing::debug!(%user_id, connection_id = %id, "connection registered");
        ConnectionHandle {
            user_id,
            id,
            cancel,
            status,
        }
    }

    /// Idempotent. Once this returns no further ping reaches the connection.
    pub async fn disconnect(&self, user_id: UserId, id: &ConnectionId) -> bool {
        match deregister(&self.connections, user_id, id) {
            Some(record) => {
                // an in-flight ping finishes before we return
                drop(record.sender.lock().await);
                tracing::debug!(%user_id, connection_id = %id, "connection removed");
                true
            }
            None => false,
        }
    }

    pub async fn send_to_user(
        &self,
        user_id: UserId,
        message: &ServerMessage,
    ) -> anyhow::Result<usize> {
        let text = serde_json::to_string(message)?;
        let targets: Vec<(ConnectionId, SharedSender)> = match self.connections.get(&user_id) {
            Some(conns) => conns
                .iter()
                .map(|(id, record)| (id.clone(), record.sender.clone()))
                .collect(),
            None => return Ok(0),
        };

        let mut delivered = 0;
        for (id, sender) in targets {
            let result = sender
                .lock()
                .await
                .send_text(text.clone())
                .await;
            match result {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(%user_id, connection_id = %id, "send failed: {e}");
                    self.disconnect(user_id, &id).await;
                }
            }
        }
        Ok(delivered)
    }

    pub async fn broadcast(&self, message: &ServerMessage) -> anyhow::Result<usize> {
        let users: Vec<UserId> = self.connections.iter().map(|entry| *entry.key()).collect();
        let mut delivered = 0;
        for user_id in users {
            delivered += self.send_to_user(user_id, message).await?;
        }
        Ok(delivered)
    }

    /// Read loop for one socket. Returns after the peer leaves or the manager closes it.
    pub async fn serve(
        &self,
        user_id: UserId,
        sender: Box<dyn ConnSender>,
        mut receiver: Box<dyn ConnReceiver>,
    ) {
        let handle = self.connect(user_id, sender);
        tracing::info!(%user_id, connection_id = %handle.id, "connection opened");

        loop {
            tokio::select! {
                biased;
                _ = handle.closed() => break,
                frame = receiver.next() => match frame {
                    Some(Ok(ConnMessage::Text(text))) => {
                        match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(ClientFrame::Pong) => tracing::trace!(%user_id, "pong"),
                            Err(_) => tracing::debug!(%user_id, "ignoring client frame"),
                        }
                    }
                    Some(Ok(ConnMessage::Close | ConnMessage::CloseWith { .. })) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(%user_id, "read error: {e}");
                        break;
                    }
                }
            }
        }

        self.disconnect(user_id, &handle.id).await;
        tracing::info!(%user_id, connection_id = %handle.id, "connection closed");
    }

    pub fn connection_count(&self, user_id: UserId) -> usize {
        self.connections
            .get(&user_id)
            .map(|conns| conns.len())
            .unwrap_or(0)
    }

    pub fn total_connections(&self) -> usize {
        self.connections.iter().map(|entry| entry.len()).sum()
    }

    pub async fn shutdown(&self) {
        tracing::info!("ConnectionManager shutting down...");

        let users: Vec<UserId> = self.connections.iter().map(|entry| *entry.key()).collect();
        let mut records = Vec::new();
        for user_id in users {
            if let Some((_, conns)) = self.connections.remove(&user_id) {
                records.extend(conns.into_values());
            }
        }

        for record in &records {
            record.cancel.cancel();
            record.status.close();
        }
        for record in &mut records {
            if let Some(handle) = record.liveness.take() {
                let _ = handle.await;
            }
        }
        for record in records {
            let _ = record.sender.lock().await.send(ConnMessage::Close).await;
        }

        tracing::info!("All connections closed.");
    }
}

#[async_trait::async_trait]
impl NotificationSink for ConnectionManager {
    async fn deliver(&self, receiver: UserId, message: &ServerMessage) -> anyhow::Result<usize> {
        self.send_to_user(receiver, message).await
    }
}

fn deregister(
    connections: &Registry,
    user_id: UserId,
    id: &ConnectionId,
) -> Option<ConnectionRecord> {
    let removed = connections
        .get_mut(&user_id)
        .and_then(|mut conns| conns.remove(id));
    connections.remove_if(&user_id, |_, conns| conns.is_empty());

    removed.inspect(|record| {
        record.cancel.cancel();
        record.status.close();
    })
}

async fn liveness_probe(
    connections: Arc<Registry>,
    user_id: UserId,
    id: ConnectionId,
    sender: SharedSender,
    cancel: CancellationToken,
    registered: Arc<Notify>,
    interval: Duration,
) {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        _ = registered.notified() => {}
    }

    let ping = match serde_json::to_string(&ControlFrame::Ping) {
        Ok(ping) => ping,
        Err(e) => {
            tracing::error!("failed to encode ping: {e}");
            return;
        }
    };

    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let result = {
                    let mut sender = sender.lock().await;
                    if cancel.is_cancelled() {
                        break;
                    }
                    sender.send_text(ping.clone()).await
                };
                if let Err(e) = result {
                    tracing::warn!(%user_id, connection_id = %id, "liveness probe failed: {e}");
                    deregister(&connections, user_id, &id);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn channel() -> (Box<dyn ConnSender>, mpsc::Receiver<ConnMessage>) {
        let (tx, rx) = mpsc::channel(16);
        (Box::new(tx), rx)
    }

    fn message() -> ServerMessage {
        ServerMessage::now(ServerEvent::CommentAdded(CommentAdded {
            task_id: 1,
            author: "ana".into(),
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn pings_on_interval_while_open() {
        let manager = ConnectionManager::new(DEFAULT_PING_INTERVAL);
        let (tx, mut rx) = channel();
        let handle = manager.connect(UserId(1), tx);
        assert_eq!(handle.state(), ConnectionState::Open);

        let started = tokio::time::Instant::now();
        let frame = rx.recv().await.unwrap();
        assert_eq!(frame, ConnMessage::Text(r#"{"type":"ping"}"#.to_owned()));
        assert!(started.elapsed() >= DEFAULT_PING_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn no_ping_after_disconnect() {
        let manager = ConnectionManager::new(DEFAULT_PING_INTERVAL);
        let (tx, mut rx) = channel();
        let handle = manager.connect(UserId(1), tx);

        assert!(manager.disconnect(UserId(1), &handle.id).await);
        assert!(!manager.disconnect(UserId(1), &handle.id).await);
        assert_eq!(handle.state(), ConnectionState::Closed);
        assert_eq!(manager.connection_count(UserId(1)), 0);

        // the channel closes once the liveness task drops its sender, without a ping first
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_ping_deregisters_connection() {
        let manager = ConnectionManager::new(DEFAULT_PING_INTERVAL);
        let (tx, rx) = channel();
        let handle = manager.connect(UserId(1), tx);
        drop(rx);

        tokio::time::sleep(DEFAULT_PING_INTERVAL + Duration::from_secs(1)).await;
        assert_eq!(manager.connection_count(UserId(1)), 0);
        assert_eq!(handle.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn fan_out_drops_only_the_failing_connection() {
        let manager = ConnectionManager::new(DEFAULT_PING_INTERVAL);
        let (good_tx, mut good_rx) = channel();
        let (bad_tx, bad_rx) = channel();
        manager.connect(UserId(1), good_tx);
        manager.connect(UserId(1), bad_tx);
        drop(bad_rx);

        let delivered = manager.send_to_user(UserId(1), &message()).await.unwrap();
        assert_eq!(delivered, 1);
        assert_eq!(manager.connection_count(UserId(1)), 1);

        match good_rx.recv().await {
            Some(ConnMessage::Text(text)) => assert!(text.contains(r#""type":"comment_added""#)),
            other => panic!("unexpected frame: {other:?}"),
        }
        assert_eq!(manager.send_to_user(UserId(2), &message()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn broadcast_reaches_every_user() {
        let manager = ConnectionManager::new(DEFAULT_PING_INTERVAL);
        let (a, mut a_rx) = channel();
        let (b, mut b_rx) = channel();
        manager.connect(UserId(1), a);
        manager.connect(UserId(2), b);

        assert_eq!(manager.broadcast(&message()).await.unwrap(), 2);
        assert!(matches!(a_rx.recv().await, Some(ConnMessage::Text(_))));
        assert!(matches!(b_rx.recv().await, Some(ConnMessage::Text(_))));
    }

    #[tokio::test]
    async fn shutdown_closes_and_drains() {
        let manager = ConnectionManager::new(DEFAULT_PING_INTERVAL);
        let (tx, mut rx) = channel();
        let handle = manager.connect(UserId(1), tx);

        manager.shutdown().await;
        assert_eq!(manager.total_connections(), 0);
        assert_eq!(handle.state(), ConnectionState::Closed);
        assert_eq!(rx.recv().await, Some(ConnMessage::Close));
    }

    #[tokio::test]
    async fn serve_consumes_pong_and_ends_on_close() {
        let manager = Arc::new(ConnectionManager::new(DEFAULT_PING_INTERVAL));
        let (tx, _rx) = channel();
        let (client_tx, client_rx) = mpsc::channel(16);

        let serving = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.serve(UserId(7), tx, Box::new(client_rx)).await })
        };

        client_tx
            .send(ConnMessage::Text(r#"{"type":"pong"}"#.to_owned()))
            .await
            .unwrap();
        client_tx
            .send(ConnMessage::Text("not json".to_owned()))
            .await
            .unwrap();
        client_tx.send(ConnMessage::Close).await.unwrap();

        serving.await.unwrap();
        assert_eq!(manager.connection_count(UserId(7)), 0);
    }
}
