use crate::domain_model::*;
use crate::server::NotificationSink;
use std::sync::Arc;

/// Emits task events to a user's live connections. Delivery is best effort:
/// failures are logged and never surface to the caller.
pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
}

impl Notifier {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    pub async fn task_assigned(&self, receiver: UserId, task_id: i64, project: &str) {
        self.emit(
            receiver,
            ServerEvent::TaskAssigned(TaskAssigned {
                task_id,
                project: project.to_owned(),
            }),
        )
        .await
    }

    pub async fn comment_added(&self, receiver: UserId, task_id: i64, author: &str) {
        self.emit(
            receiver,
            ServerEvent::CommentAdded(CommentAdded {
                task_id,
                author: author.to_owned(),
            }),
        )
        .await
    }

    pub async fn status_changed(&self, receiver: UserId, task_id: i64, old: &str, new: &str) {
        self.emit(
            receiver,
            ServerEvent::StatusChanged(StatusChanged {
                task_id,
                old: old.to_owned(),
                new: new.to_owned(),
            }),
        )
        .await
    }

    async fn emit(&self, receiver: UserId, event: ServerEvent) {
        let message = ServerMessage::now(event);
        match self.sink.deliver(receiver, &message).await {
            Ok(0) => tracing::trace!(%receiver, "no live connection for notification"),
            Ok(n) => tracing::debug!(%receiver, delivered = n, "notification delivered"),
            Err(e) => tracing::warn!(%receiver, "notification delivery failed: {e:#}"),
        }
    }
}
