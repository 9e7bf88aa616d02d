//! Main-context handle to the worker actor.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::domain::entities::CacheGeneration;
use crate::domain::errors::{CacheError, CacheResult};
use crate::domain::ports::{CacheStorePort, KeyValueStorePort, WorkerControlPort};

use super::actor::{NetworkPort, WorkerActor};
use super::protocol::{ClientMessage, FetchOutcome, FetchRequest, WorkerCommand, WorkerEvent};

/// Handle to a spawned worker actor. Cloneable; every clone posts to the
/// same mailbox.
#[derive(Clone)]
pub struct WorkerHandle {
    cmd_tx: mpsc::UnboundedSender<WorkerCommand>,
    waiting: Arc<AtomicBool>,
}

impl WorkerHandle {
    /// Spawns the actor and returns the handle plus its lifecycle events.
    pub fn spawn(
        generation: CacheGeneration,
        store: Arc<dyn CacheStorePort>,
        network: Arc<dyn NetworkPort>,
        kv: Arc<dyn KeyValueStorePort>,
    ) -> (Self, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let waiting = Arc::new(AtomicBool::new(false));

        let actor = WorkerActor::new(
            generation,
            store,
            network,
            kv,
            event_tx,
            cmd_rx,
            waiting.clone(),
        );
        tokio::spawn(actor.run());

        (Self { cmd_tx, waiting }, event_rx)
    }

    /// Runs the install step.
    ///
    /// # Errors
    /// Returns [`CacheError::WorkerGone`] if the actor stopped.
    pub fn install(&self) -> CacheResult<()> {
        self.send(WorkerCommand::Install)
    }

    /// Runs the activate step.
    ///
    /// # Errors
    /// Returns [`CacheError::WorkerGone`] if the actor stopped.
    pub fn activate(&self) -> CacheResult<()> {
        self.send(WorkerCommand::Activate)
    }

    /// Serves one intercepted request through the worker.
    ///
    /// # Errors
    /// Returns [`CacheError::WorkerGone`] if the actor stopped, or the
    /// fetch error the strategy chose to propagate.
    pub async fn fetch(&self, request: FetchRequest) -> CacheResult<FetchOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(WorkerCommand::Fetch { request, reply })?;
        rx.await.map_err(|_| CacheError::WorkerGone)?
    }

    /// Posts a raw protocol message, as a page client would.
    ///
    /// # Errors
    /// Returns [`CacheError::WorkerGone`] if the actor stopped.
    pub fn post_message(&self, message: ClientMessage) -> CacheResult<()> {
        self.send(WorkerCommand::Client(message))
    }

    /// Stops the actor.
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(WorkerCommand::Shutdown);
    }

    fn send(&self, command: WorkerCommand) -> CacheResult<()> {
        self.cmd_tx
            .send(command)
            .map_err(|_| CacheError::WorkerGone)
    }
}

#[async_trait]
impl WorkerControlPort for WorkerHandle {
    async fn update(&self) -> CacheResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(WorkerCommand::Update { reply })?;
        rx.await.map_err(|_| CacheError::WorkerGone)
    }

    async fn skip_waiting(&self) -> CacheResult<()> {
        self.post_message(ClientMessage::SkipWaiting)
    }

    async fn clear_cache(&self) -> CacheResult<()> {
        self.post_message(ClientMessage::ClearCache)
    }

    async fn has_waiting(&self) -> bool {
        self.waiting.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    use crate::domain::entities::{CachedResponse, ResponseSource};
    use crate::domain::ports::mocks::MockKeyValueStore;
    use crate::infrastructure::cache::MemoryCacheStore;
    use crate::infrastructure::worker::actor::tests::FakeNetwork;
    use crate::infrastructure::worker::protocol::RequestDestination;

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<WorkerEvent>) -> WorkerEvent {
        tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .expect("event timeout")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_install_activate_fetch_through_handle() {
        let store: Arc<MemoryCacheStore> = Arc::new(MemoryCacheStore::new());
        let network = Arc::new(FakeNetwork::new());
        network.serve("/", 200, b"<html>");
        network.serve("/img/a.webp", 200, b"img");

        let (handle, mut events) = WorkerHandle::spawn(
            CacheGeneration::new("test"),
            store.clone(),
            network,
            Arc::new(MockKeyValueStore::new()),
        );

        handle.install().unwrap();
        handle.activate().unwrap();
        assert!(matches!(
            next_event(&mut events).await,
            WorkerEvent::Installed { .. }
        ));
        assert!(matches!(
            next_event(&mut events).await,
            WorkerEvent::Activated { .. }
        ));

        let outcome = handle
            .fetch(FetchRequest::new("/img/a.webp", RequestDestination::Image))
            .await
            .unwrap();
        assert_eq!(outcome.source, ResponseSource::Network);

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_update_after_activation_goes_to_waiting() {
        let store: Arc<MemoryCacheStore> = Arc::new(MemoryCacheStore::new());
        let network = Arc::new(FakeNetwork::new());
        network.serve("/", 200, b"<html>");
        network.serve("/manifest.json", 200, b"{}");

        let (handle, mut events) = WorkerHandle::spawn(
            CacheGeneration::new("test"),
            store,
            network,
            Arc::new(MockKeyValueStore::new()),
        );

        handle.install().unwrap();
        handle.activate().unwrap();
        let _ = next_event(&mut events).await;
        let _ = next_event(&mut events).await;

        handle.update().await.unwrap();
        let _ = next_event(&mut events).await; // Installed
        assert_eq!(next_event(&mut events).await, WorkerEvent::Waiting);
        assert!(handle.has_waiting().await);

        handle.skip_waiting().await.unwrap();
        assert!(matches!(
            next_event(&mut events).await,
            WorkerEvent::Activated { .. }
        ));
        assert_eq!(next_event(&mut events).await, WorkerEvent::SkippedWaiting);
        assert!(!handle.has_waiting().await);

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_worker_gone_error_after_shutdown() {
        let store: Arc<MemoryCacheStore> = Arc::new(MemoryCacheStore::new());
        let (handle, _events) = WorkerHandle::spawn(
            CacheGeneration::new("test"),
            store,
            Arc::new(FakeNetwork::new()),
            Arc::new(MockKeyValueStore::new()),
        );

        handle.shutdown();
        // let the actor drain its mailbox
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let result = handle
            .fetch(FetchRequest::new("/x", RequestDestination::Other))
            .await;
        assert!(result.is_err());
    }
}
