//! The batch mutator: per-namespace single-writer pipeline.
//!
//! One dedicated consumer thread drains a bounded channel of queued
//! mutations. Each iteration seeds a batch with one item, then keeps
//! pulling while the namespace matches, the batch is under its count
//! limit, and the next item arrives within the timeout.
//!
//! The batch is applied against a [`WriteOverlay`] while holding only a
//! read-only scope, so hashing and tree folds never block readers or hold
//! a write lock. If any writes accumulated, they are replayed verbatim
//! under a short read-write scope together with the final size counter.
//! Since only this consumer writes a namespace, no optimistic-retry loop
//! is needed.
//!
//! Every queued item carries a completion promise. Promises resolve after
//! the containing batch commits; an applier error discards the overlay and
//! fails every promise in the batch with that error.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use vds_engine::apply;
#[cfg(test)]
use vds_storage::StorageReader;
use vds_storage::{replay, StorageWriter, WriteOverlay};
use vds_types::{Error, Mutation, Namespace, Result};

/// Batching limits for the mutator.
///
/// Each batch has a maximum item count and a per-wait timeout. The batch
/// closes when either limit is reached, or when an item for a different
/// namespace arrives (it seeds the next batch).
#[derive(Debug, Clone)]
pub struct MutatorConfig {
    /// Maximum mutations applied per transaction.
    pub batch_size: usize,
    /// Channel capacity. Enqueueing blocks when full, providing
    /// backpressure to writers.
    pub buffer_size: usize,
    /// How long to wait for the next item before closing the batch.
    pub timeout: Duration,
}

impl Default for MutatorConfig {
    fn default() -> Self {
        Self {
            batch_size: 256,
            buffer_size: 1024,
            timeout: Duration::from_millis(10),
        }
    }
}

impl MutatorConfig {
    /// One mutation per transaction. For tests and low-throughput
    /// deployments where batching latency is unwelcome.
    pub fn instant() -> Self {
        Self {
            batch_size: 1,
            timeout: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Completion handle for a queued mutation.
///
/// Resolves `Ok(())` once the mutation's effects are durable, or with the
/// first error of the batch that contained it. Dropping the promise does
/// not cancel the mutation: once queued it will be applied or its batch
/// will fail.
pub struct MutationPromise {
    rx: oneshot::Receiver<Result<()>>,
}

impl MutationPromise {
    /// Wait for the mutation to become durable.
    pub async fn wait(self) -> Result<()> {
        self.rx.await.unwrap_or(Err(Error::Cancelled))
    }

    /// Blocking variant of [`wait`](Self::wait) for synchronous callers.
    pub fn wait_blocking(self) -> Result<()> {
        self.rx.blocking_recv().unwrap_or(Err(Error::Cancelled))
    }
}

struct QueuedMutation {
    ns: Namespace,
    mutation: Mutation,
    done: oneshot::Sender<Result<()>>,
}

/// Handle to the mutation pipeline.
///
/// Cheap to clone; all clones feed the same consumer thread. The consumer
/// drains remaining work and exits when the last handle is dropped, at
/// which point unresolved promises observe [`Error::Cancelled`].
#[derive(Clone)]
pub struct BatchMutator {
    tx: Sender<QueuedMutation>,
}

impl BatchMutator {
    /// Spawn the consumer thread over the given storage writer.
    pub fn spawn<W: StorageWriter + 'static>(writer: Arc<W>, config: MutatorConfig) -> Self {
        let (tx, rx) = bounded(config.buffer_size);
        std::thread::Builder::new()
            .name("vds-mutator".into())
            .spawn(move || consume(writer, rx, config))
            .expect("failed to spawn mutator thread");
        Self { tx }
    }

    /// Queue a mutation for `ns`.
    ///
    /// Blocks while the channel is full. Within a namespace, mutations
    /// commit in exactly the order they were queued.
    pub fn queue(&self, ns: Namespace, mutation: Mutation) -> MutationPromise {
        let (done, rx) = oneshot::channel();
        let item = QueuedMutation { ns, mutation, done };
        if let Err(send_error) = self.tx.send(item) {
            let _ = send_error.into_inner().done.send(Err(Error::Cancelled));
        }
        MutationPromise { rx }
    }
}

fn consume<W: StorageWriter>(writer: Arc<W>, rx: Receiver<QueuedMutation>, config: MutatorConfig) {
    let mut carried: Option<QueuedMutation> = None;
    loop {
        let seed = match carried.take() {
            Some(seed) => seed,
            None => match rx.recv() {
                Ok(seed) => seed,
                Err(_) => return,
            },
        };
        carried = run_batch(&*writer, &rx, &config, seed);
    }
}

/// Run one batch seeded by `seed`. Returns a dequeued foreign-namespace
/// item, if one closed the batch, to seed the next one.
fn run_batch<W: StorageWriter>(
    writer: &W,
    rx: &Receiver<QueuedMutation>,
    config: &MutatorConfig,
    seed: QueuedMutation,
) -> Option<QueuedMutation> {
    let ns = seed.ns;
    let mut waiters: Vec<oneshot::Sender<Result<()>>> = Vec::new();
    let mut next_seed: Option<QueuedMutation> = None;

    let outcome = writer.execute_read_only(&ns, |kr| {
        let start_size = apply::read_object_size(kr)?;
        let mut overlay = WriteOverlay::new(kr);
        let mut size = start_size;
        let mut item = seed;
        let mut applied = 0usize;

        loop {
            let result = apply::apply_mutation(&mut overlay, size, &item.mutation);
            waiters.push(item.done);
            size = result?;

            applied += 1;
            if applied >= config.batch_size {
                break;
            }
            match recv_next(rx, config.timeout) {
                Some(next) if next.ns == ns => item = next,
                Some(foreign) => {
                    next_seed = Some(foreign);
                    break;
                }
                None => break,
            }
        }

        Ok((overlay.into_ops(), size))
    });

    let result = match outcome {
        Ok((ops, end_size)) => {
            if ops.is_empty() {
                // Nothing to persist (e.g. only deduplicated appends).
                Ok(())
            } else {
                let count = ops.len();
                let committed = writer.execute_update(&ns, |kw| {
                    replay(&ops, kw)?;
                    apply::write_object_size(kw, end_size)
                });
                match &committed {
                    Ok(()) => {
                        debug!(?ns, mutations = waiters.len(), writes = count, "batch committed")
                    }
                    Err(e) => warn!(?ns, error = %e, "batch commit failed"),
                }
                committed
            }
        }
        Err(e) => {
            warn!(?ns, error = %e, "batch aborted");
            Err(e)
        }
    };

    for waiter in waiters {
        let _ = waiter.send(result.clone());
    }
    next_seed
}

fn recv_next(rx: &Receiver<QueuedMutation>, timeout: Duration) -> Option<QueuedMutation> {
    if timeout.is_zero() {
        return rx.try_recv().ok();
    }
    match rx.recv_timeout(timeout) {
        Ok(item) => Some(item),
        Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
    }
}
