//! Background history refresh.
//!
//! Polls `GET /history` on a fixed interval so transcript changes made
//! elsewhere (another client, a server-side cleanup) appear without user
//! action. A tick is skipped while a send is in flight or while the user
//! is editing; poll failures are logged and never surface in the UI.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::api::ChatBackend;
use crate::controller::ChatController;
use crate::message::Message;

/// Update pushed to the UI when the poller adopts new history.
#[derive(Debug, Clone, PartialEq)]
pub enum PollUpdate {
    HistoryChanged(Vec<Message>),
}

pub struct HistoryPoller {
    backend: Arc<dyn ChatBackend>,
    controller: Arc<ChatController>,
    editing: Arc<AtomicBool>,
    interval: Duration,
}

impl HistoryPoller {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        controller: Arc<ChatController>,
        editing: Arc<AtomicBool>,
        interval: Duration,
    ) -> Self {
        Self {
            backend,
            controller,
            editing,
            interval,
        }
    }

    /// Spawn the poll loop. It ends when the receiver side of `updates`
    /// is dropped.
    pub fn spawn(self, updates: mpsc::UnboundedSender<PollUpdate>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if updates.is_closed() {
                    break;
                }
                if self.controller.is_busy() || self.editing.load(Ordering::SeqCst) {
                    continue;
                }
                match self.backend.history().await {
                    Ok(messages) => {
                        if self.controller.sync_history(messages.clone())
                            && updates.send(PollUpdate::HistoryChanged(messages)).is_err()
                        {
                            break;
                        }
                    }
                    Err(error) => {
                        debug!(%error, "history poll failed");
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ByteStream, HealthStatus, SessionInfo};
    use crate::controller::{ChatController, ControllerOptions};
    use crate::error::ClientError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct StaticBackend {
        messages: Mutex<Vec<Message>>,
    }

    impl StaticBackend {
        fn new(messages: Vec<Message>) -> Self {
            Self {
                messages: Mutex::new(messages),
            }
        }
    }

    #[async_trait]
    impl ChatBackend for StaticBackend {
        async fn history(&self) -> Result<Vec<Message>, ClientError> {
            Ok(self.messages.lock().unwrap().clone())
        }
        async fn send_chat(&self, _text: &str) -> Result<(), ClientError> {
            Ok(())
        }
        async fn open_stream(&self, _text: &str) -> Result<ByteStream, ClientError> {
            Err(ClientError::api("no stream", Some(503)))
        }
        async fn delete_last(&self, _count: usize) -> Result<usize, ClientError> {
            Ok(0)
        }
        async fn update_message(&self, _index: usize, _content: &str) -> Result<(), ClientError> {
            Ok(())
        }
        async fn reset(&self) -> Result<(), ClientError> {
            Ok(())
        }
        async fn health(&self) -> Result<HealthStatus, ClientError> {
            Ok(HealthStatus {
                status: "ok".to_string(),
                backend: None,
            })
        }
        async fn sessions(&self) -> Result<Vec<SessionInfo>, ClientError> {
            Ok(Vec::new())
        }
        async fn create_session(&self) -> Result<SessionInfo, ClientError> {
            Err(ClientError::SessionsUnavailable)
        }
        async fn activate_session(&self, _id: &str) -> Result<(), ClientError> {
            Ok(())
        }
        async fn delete_session(&self, _id: &str) -> Result<(), ClientError> {
            Ok(())
        }
    }

    fn setup(messages: Vec<Message>) -> (Arc<StaticBackend>, Arc<ChatController>) {
        let backend = Arc::new(StaticBackend::new(messages));
        let controller = Arc::new(ChatController::new(
            backend.clone(),
            ControllerOptions::default(),
        ));
        (backend, controller)
    }

    #[tokio::test]
    async fn test_poller_adopts_changed_history() {
        let (backend, controller) = setup(vec![Message::user("from server")]);
        let editing = Arc::new(AtomicBool::new(false));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = HistoryPoller::new(
            backend,
            controller.clone(),
            editing,
            Duration::from_millis(5),
        )
        .spawn(tx);

        let update = tokio::time::timeout(Duration::from_millis(500), rx.recv())
            .await
            .expect("poller never reported")
            .expect("channel closed early");
        assert_eq!(
            update,
            PollUpdate::HistoryChanged(vec![Message::user("from server")])
        );
        assert_eq!(controller.transcript_len(), 1);

        // Unchanged history produces no further updates.
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(rx.try_recv().is_err());
        handle.abort();
    }

    #[tokio::test]
    async fn test_poller_skips_while_editing() {
        let (backend, controller) = setup(vec![Message::user("from server")]);
        let editing = Arc::new(AtomicBool::new(true));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = HistoryPoller::new(
            backend,
            controller.clone(),
            editing.clone(),
            Duration::from_millis(5),
        )
        .spawn(tx);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(controller.transcript_len(), 0);

        // Releasing the edit flag lets the next tick adopt.
        editing.store(false, Ordering::SeqCst);
        let update = tokio::time::timeout(Duration::from_millis(500), rx.recv())
            .await
            .expect("poller never resumed");
        assert!(update.is_some());
        handle.abort();
    }

    #[tokio::test]
    async fn test_poller_stops_when_receiver_dropped() {
        let (backend, controller) = setup(Vec::new());
        let editing = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        let handle =
            HistoryPoller::new(backend, controller, editing, Duration::from_millis(5)).spawn(tx);
        tokio::time::timeout(Duration::from_millis(500), handle)
            .await
            .expect("poller kept running")
            .expect("poller panicked");
    }
}
