//! Transaction sequencer for a registry
//!
//! A single Tokio task owns the registry and applies transactions one at a
//! time, in mailbox order. This gives every variant the serial,
//! all-or-nothing execution its state machine assumes.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │              SequencerHandle (Clone)                  │
//! │   transact(|registry, now| ...) / query(|r| ...)     │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              Sequencer (Single Task)                  │
//! │  1. read Clock, clamp to last timestamp              │
//! │  2. run transaction against &mut R                   │
//! │  3. Journal::append_events(new events)               │
//! │  4. update metrics, reply on oneshot                 │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! Journal failures are logged and do not undo a committed transaction; the
//! in-memory registry stays authoritative.

use crate::{
    clock::Clock,
    metrics::Metrics,
    source::RecipientSource,
    storage::Journal,
    types::{Address, Timestamp},
    Error, Result,
};
use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};

/// Delivers a transaction's outcome once its events are journaled
type Reply = Box<dyn FnOnce() + Send>;

/// Mutation applied by the sequencer
type Transaction<R> = Box<dyn FnOnce(&mut R, Timestamp) -> Reply + Send>;

/// Read-only access to the registry
type Query<R> = Box<dyn FnOnce(&R) + Send>;

/// Message sent to the sequencer
pub enum SequencerMessage<R> {
    /// Apply a mutation
    Transact(Transaction<R>),

    /// Read registry state
    Query(Query<R>),

    /// Stop the sequencer
    Shutdown,
}

impl<R> std::fmt::Debug for SequencerMessage<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SequencerMessage::Transact(_) => f.write_str("Transact"),
            SequencerMessage::Query(_) => f.write_str("Query"),
            SequencerMessage::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Actor owning one registry
pub struct Sequencer<R, C> {
    registry: R,

    clock: C,

    /// Last timestamp handed to a transaction
    last_now: Timestamp,

    journal: Option<Arc<Journal>>,

    metrics: Option<Metrics>,

    mailbox: mpsc::Receiver<SequencerMessage<R>>,
}

impl<R, C> std::fmt::Debug for Sequencer<R, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("last_now", &self.last_now)
            .field("journaled", &self.journal.is_some())
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl<R, C> Sequencer<R, C>
where
    R: RecipientSource + Send + 'static,
    C: Clock,
{
    /// Create new sequencer
    pub fn new(
        registry: R,
        clock: C,
        journal: Option<Arc<Journal>>,
        metrics: Option<Metrics>,
        mailbox: mpsc::Receiver<SequencerMessage<R>>,
    ) -> Self {
        Self {
            registry,
            clock,
            last_now: 0,
            journal,
            metrics,
            mailbox,
        }
    }

    /// Run the sequencer loop until shutdown or every handle is dropped
    pub async fn run(mut self) -> R {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                SequencerMessage::Transact(transaction) => self.apply(transaction),
                SequencerMessage::Query(query) => query(&self.registry),
                SequencerMessage::Shutdown => break,
            }
        }

        tracing::info!(
            recipients = self.registry.recipient_count(),
            events = self.registry.events().len(),
            "Sequencer stopped"
        );
        self.registry
    }

    fn apply(&mut self, transaction: Transaction<R>) {
        let started = Instant::now();
        let now = self.tick();
        let cursor = self.registry.events().len();

        let reply = transaction(&mut self.registry, now);

        let emitted = self.registry.events().since(cursor);
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.append_events(emitted) {
                tracing::error!(count = emitted.len(), "Failed to journal events: {}", e);
            }
        }

        if let Some(metrics) = &self.metrics {
            for event in emitted {
                metrics.record_event(event);
            }
            metrics.set_active_recipients(self.registry.recipient_count());
            metrics.set_deposits_held(self.registry.deposits_held().to_f64().unwrap_or_default());
            metrics.record_transaction_duration(started.elapsed().as_secs_f64());
        }

        reply();
    }

    /// Clock reading, never earlier than the previous one
    fn tick(&mut self) -> Timestamp {
        let reading = self.clock.now();
        if reading < self.last_now {
            tracing::warn!(reading, last = self.last_now, "Clock went backwards, holding time");
        }
        self.last_now = self.last_now.max(reading);
        self.last_now
    }
}

/// Handle for submitting work to the sequencer
pub struct SequencerHandle<R> {
    sender: mpsc::Sender<SequencerMessage<R>>,
}

impl<R> Clone for SequencerHandle<R> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<R> std::fmt::Debug for SequencerHandle<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequencerHandle")
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

impl<R> SequencerHandle<R>
where
    R: RecipientSource + Send + 'static,
{
    /// Create new handle
    pub fn new(sender: mpsc::Sender<SequencerMessage<R>>) -> Self {
        Self { sender }
    }

    /// Apply `f` to the registry at the sequencer's current time
    pub async fn transact<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut R, Timestamp) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let transaction: Transaction<R> = Box::new(move |registry, now| {
            let result = f(registry, now);
            Box::new(move || {
                let _ = tx.send(result);
            })
        });

        self.sender
            .send(SequencerMessage::Transact(transaction))
            .await
            .map_err(|_| Error::Concurrency("Sequencer mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Read registry state
    pub async fn query<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&R) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let query: Query<R> = Box::new(move |registry| {
            let _ = tx.send(f(registry));
        });

        self.sender
            .send(SequencerMessage::Query(query))
            .await
            .map_err(|_| Error::Concurrency("Sequencer mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Address at `index` valid for the window `[start, end]`
    pub async fn recipient_address(&self, index: u64, start: Timestamp, end: Timestamp) -> Result<Address> {
        self.query(move |registry| registry.recipient_address(index, start, end))
            .await
    }

    /// Number of active recipients
    pub async fn recipient_count(&self) -> Result<u64> {
        self.query(|registry| registry.recipient_count()).await
    }

    /// Current recipient limit
    pub async fn max_recipients(&self) -> Result<u64> {
        self.query(|registry| registry.max_recipients()).await
    }

    /// Stop the sequencer
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(SequencerMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Sequencer mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn a sequencer owning `registry`
///
/// The join handle yields the registry back once the sequencer stops.
pub fn spawn_sequencer<R, C>(
    registry: R,
    clock: C,
    journal: Option<Arc<Journal>>,
    metrics: Option<Metrics>,
    mailbox_capacity: usize,
) -> (SequencerHandle<R>, tokio::task::JoinHandle<R>)
where
    R: RecipientSource + Send + 'static,
    C: Clock,
{
    let (tx, rx) = mpsc::channel(mailbox_capacity); // Bounded channel for backpressure
    let sequencer = Sequencer::new(registry, clock, journal, metrics, rx);

    let task = tokio::spawn(sequencer.run());

    (SequencerHandle::new(tx), task)
}
