//! Task sources feeding the dispatcher.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};
use uuid::Uuid;

use super::{HandlerRequest, HandlerResponse};
use crate::config::DispatcherConfig;
use crate::error::{ReconcilerError, Result};

/// Delivery side of the dispatch framework
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Next delivery, or `None` once the source is closed
    async fn receive(&self) -> Option<HandlerRequest>;

    /// Report the handler's answer for `request`
    async fn respond(&self, request: &HandlerRequest, response: HandlerResponse) -> Result<()>;
}

/// Last known state of a task delivered through a [`ChannelTaskSource`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub attempts: u32,
    pub last_response: HandlerResponse,
}

#[derive(Default)]
struct Ledger {
    records: HashMap<Uuid, TaskRecord>,
    settled: usize,
}

/// Producers that can still put a task on the channel
#[derive(Debug, Clone, Copy)]
struct Producers {
    submitters_open: bool,
    pending_redeliveries: usize,
}

impl Producers {
    fn exhausted(&self) -> bool {
        !self.submitters_open && self.pending_redeliveries == 0
    }
}

/// In-process task source over a bounded tokio channel.
///
/// Answers of `Processing` are redelivered after `reconcile_after_seconds`
/// (capped by `max_redelivery_delay` when set), which is how the dispatch
/// framework behaves. Terminal answers are recorded and counted as settled.
///
/// The source closes once every [`TaskSubmitter`] is dropped, the channel is
/// drained and no redelivery is pending.
pub struct ChannelTaskSource {
    receiver: tokio::sync::Mutex<mpsc::Receiver<HandlerRequest>>,
    redelivery: mpsc::Sender<HandlerRequest>,
    producers: Arc<watch::Sender<Producers>>,
    redeliver: bool,
    max_redelivery_delay: Option<Duration>,
    ledger: Arc<Mutex<Ledger>>,
    settled_tx: watch::Sender<usize>,
    settled_rx: watch::Receiver<usize>,
}

/// Producer handle; clones share one registration with the source.
#[derive(Clone)]
pub struct TaskSubmitter {
    sender: mpsc::Sender<HandlerRequest>,
    _registration: Arc<SubmitterRegistration>,
}

/// Marks the submitters gone when the last clone is dropped
struct SubmitterRegistration {
    producers: Arc<watch::Sender<Producers>>,
}

impl Drop for SubmitterRegistration {
    fn drop(&mut self) {
        self.producers
            .send_modify(|producers| producers.submitters_open = false);
    }
}

impl TaskSubmitter {
    pub async fn submit(&self, request: HandlerRequest) -> Result<()> {
        self.sender
            .send(request)
            .await
            .map_err(|_| ReconcilerError::Dispatch("task source is closed".to_string()))
    }
}

impl ChannelTaskSource {
    pub fn new(capacity: usize, redeliver: bool) -> (Self, TaskSubmitter) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let (settled_tx, settled_rx) = watch::channel(0);
        let (producers, _) = watch::channel(Producers {
            submitters_open: true,
            pending_redeliveries: 0,
        });
        let producers = Arc::new(producers);

        let submitter = TaskSubmitter {
            sender: sender.clone(),
            _registration: Arc::new(SubmitterRegistration {
                producers: Arc::clone(&producers),
            }),
        };
        let source = Self {
            receiver: tokio::sync::Mutex::new(receiver),
            redelivery: sender,
            producers,
            redeliver,
            max_redelivery_delay: None,
            ledger: Arc::new(Mutex::new(Ledger::default())),
            settled_tx,
            settled_rx,
        };
        (source, submitter)
    }

    pub fn from_config(config: &DispatcherConfig) -> (Self, TaskSubmitter) {
        Self::new(config.queue_capacity, config.redeliver)
    }

    pub fn with_max_redelivery_delay(mut self, limit: Duration) -> Self {
        self.max_redelivery_delay = Some(limit);
        self
    }

    pub fn record(&self, task_id: Uuid) -> Option<TaskRecord> {
        self.ledger.lock().records.get(&task_id).cloned()
    }

    pub fn settled_count(&self) -> usize {
        *self.settled_rx.borrow()
    }

    /// Resolve once at least `count` tasks reached a terminal result
    pub async fn wait_for_settled(&self, count: usize) {
        let mut settled = self.settled_rx.clone();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = settled.wait_for(|settled| *settled >= count).await;
    }

    fn redelivery_delay(&self, response: &HandlerResponse) -> Duration {
        let requested = Duration::from_secs(response.reconcile_after_seconds);
        match self.max_redelivery_delay {
            Some(limit) => requested.min(limit),
            None => requested,
        }
    }

    fn schedule_redelivery(&self, request: HandlerRequest, delay: Duration) {
        self.producers
            .send_modify(|producers| producers.pending_redeliveries += 1);

        let sender = self.redelivery.clone();
        let producers = Arc::clone(&self.producers);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Fails only when the source itself is gone.
            let _ = sender.send(request).await;
            producers.send_modify(|producers| producers.pending_redeliveries -= 1);
        });
    }
}

#[async_trait]
impl TaskSource for ChannelTaskSource {
    async fn receive(&self) -> Option<HandlerRequest> {
        let mut receiver = self.receiver.lock().await;
        let mut producers = self.producers.subscribe();

        loop {
            if let Ok(request) = receiver.try_recv() {
                return Some(request);
            }
            if producers.borrow_and_update().exhausted() {
                return None;
            }
            tokio::select! {
                request = receiver.recv() => return request,
                changed = producers.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                }
            }
        }
    }

    async fn respond(&self, request: &HandlerRequest, response: HandlerResponse) -> Result<()> {
        let terminal = response.result.is_terminal();
        let delay = self.redelivery_delay(&response);

        let attempts = {
            let mut ledger = self.ledger.lock();
            let record = ledger
                .records
                .entry(request.task_id)
                .or_insert_with(|| TaskRecord {
                    attempts: 0,
                    last_response: response.clone(),
                });
            record.attempts += 1;
            record.last_response = response;
            let attempts = record.attempts;

            if terminal {
                ledger.settled += 1;
                self.settled_tx.send_replace(ledger.settled);
            }
            attempts
        };

        if terminal {
            info!(task_id = %request.task_id, attempts, "task settled");
            return Ok(());
        }
        if !self.redeliver {
            return Ok(());
        }

        debug!(
            task_id = %request.task_id,
            delay_ms = delay.as_millis() as u64,
            "scheduling redelivery"
        );
        self.schedule_redelivery(request.clone(), delay);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{ActionType, TaskResult};

    #[tokio::test]
    async fn test_processing_answers_are_redelivered() {
        let (source, submitter) = ChannelTaskSource::new(8, true);
        let source = source.with_max_redelivery_delay(Duration::from_millis(1));
        let request = HandlerRequest::new(ActionType::ProvisionTenant, Vec::new());
        submitter.submit(request.clone()).await.unwrap();

        let first = source.receive().await.unwrap();
        source
            .respond(&first, HandlerResponse::processing("step", 3))
            .await
            .unwrap();

        let second = source.receive().await.unwrap();
        assert_eq!(second.task_id, request.task_id);
        source
            .respond(&second, HandlerResponse::done("finished"))
            .await
            .unwrap();

        source.wait_for_settled(1).await;
        let record = source.record(request.task_id).unwrap();
        assert_eq!(record.attempts, 2);
        assert_eq!(record.last_response.result, TaskResult::Done);
    }

    #[tokio::test]
    async fn test_pending_redelivery_outlives_submitters() {
        let (source, submitter) = ChannelTaskSource::new(8, true);
        let source = source.with_max_redelivery_delay(Duration::from_millis(1));
        let request = HandlerRequest::new(ActionType::ProvisionTenant, Vec::new());
        submitter.submit(request.clone()).await.unwrap();
        drop(submitter);

        let first = source.receive().await.unwrap();
        source
            .respond(&first, HandlerResponse::processing("step", 3))
            .await
            .unwrap();

        let second = source.receive().await.unwrap();
        assert_eq!(second.task_id, request.task_id);
        source
            .respond(&second, HandlerResponse::done("finished"))
            .await
            .unwrap();

        assert!(source.receive().await.is_none());
        assert_eq!(source.record(request.task_id).unwrap().attempts, 2);
    }

    #[tokio::test]
    async fn test_buffered_tasks_are_drained_before_closing() {
        let (source, submitter) = ChannelTaskSource::new(4, false);
        let clone = submitter.clone();
        submitter
            .submit(HandlerRequest::new(ActionType::BlockTenant, Vec::new()))
            .await
            .unwrap();
        drop(submitter);
        drop(clone);

        assert!(source.receive().await.is_some());
        assert!(source.receive().await.is_none());
    }

    #[tokio::test]
    async fn test_source_closes_when_submitters_are_gone() {
        let (source, submitter) = ChannelTaskSource::new(1, false);
        drop(submitter);
        assert!(source.receive().await.is_none());
    }
}
