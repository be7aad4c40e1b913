//! Serialized command execution queue.
//!
//! Remote-control actions must reach the device one at a time, in the order
//! they were issued, no matter how quickly the caller enqueues them. The
//! [`CommandQueue`] turns arbitrary asynchronous actions (HTTP calls, timed
//! delays, socket handshakes) into a strict FIFO pipeline with a single
//! in-flight operation.
//!
//! The drain is an iterative loop in one background task, guarded by a single
//! `draining` flag -- there is no separate scheduler. Enqueuing while a drain
//! is in progress (including from inside a currently-executing action)
//! appends to the tail and is picked up by the same loop.
//!
//! An action that never resolves stalls the queue permanently for everything
//! behind it. There is deliberately no per-operation timeout or cancellation;
//! sequencing is the queue's only job, and actions report their own failures
//! through their [`CommandHandle`].

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use tokio::sync::oneshot;

use rokuctl_core::prelude::*;

/// One deferred unit of work held in the queue.
///
/// The boxed future is the action; its completion is the completion signal.
/// An operation has no identity beyond its queue position and is dropped as
/// soon as it resolves.
struct Operation {
    /// Short description for trace logging
    label: String,
    action: BoxFuture<'static, ()>,
}

/// Completion surface for a single queued command.
///
/// Awaiting the handle yields the action's own `Result`. Dropping the handle
/// does not cancel the operation -- it still executes in its queue slot; only
/// the result is discarded. If the operation is dropped without ever running
/// (queue torn down), awaiting yields [`Error::ChannelClosed`].
#[derive(Debug)]
pub struct CommandHandle<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> Future for CommandHandle<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| match received {
            Ok(result) => result,
            Err(_) => Err(Error::ChannelClosed),
        })
    }
}

/// Strict-FIFO executor for device commands.
///
/// Cloning is cheap and shares the same queue; the pending sequence is owned
/// exclusively by this type and never exposed.
#[derive(Clone, Default)]
pub struct CommandQueue {
    inner: Arc<QueueInner>,
}

#[derive(Default)]
struct QueueInner {
    /// Pending operations, head next to run. Insertion order is execution order.
    pending: Mutex<VecDeque<Operation>>,
    /// Sole re-entrancy guard: set while a drain task is running.
    draining: AtomicBool,
}

impl std::fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandQueue")
            .field("pending", &self.pending_count())
            .field("draining", &self.inner.draining.load(Ordering::Acquire))
            .finish()
    }
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action to the tail of the queue and start a drain if none is
    /// in progress. The action runs after everything already pending.
    pub fn enqueue<F>(&self, label: impl Into<String>, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.push(Operation {
            label: label.into(),
            action: Box::pin(action),
        });
    }

    /// Enqueue an action that produces a result, returning a handle the
    /// caller can await. The action's error travels through the handle; the
    /// queue itself never interprets it and keeps draining regardless.
    pub fn submit<T, F>(&self, label: impl Into<String>, action: F) -> CommandHandle<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.enqueue(label, async move {
            let result = action.await;
            // Caller may have dropped the handle; the operation still counts.
            let _ = tx.send(result);
        });
        CommandHandle { rx }
    }

    /// Number of operations waiting to run (excludes the one in flight).
    pub fn pending_count(&self) -> usize {
        self.lock_pending().len()
    }

    fn push(&self, op: Operation) {
        self.lock_pending().push_back(op);

        if self
            .inner
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(drain(inner));
        }
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, VecDeque<Operation>> {
        self.inner.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Drain loop: run pending operations head-first, one at a time, until the
/// queue is empty. Iterative by design -- long command sequences must not
/// grow the stack.
async fn drain(inner: Arc<QueueInner>) {
    loop {
        loop {
            let op = inner
                .pending
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .pop_front();

            let Some(op) = op else { break };
            trace!("command queue: running '{}'", op.label);
            op.action.await;
            trace!("command queue: finished '{}'", op.label);
        }

        inner.draining.store(false, Ordering::Release);

        // An enqueue may have appended between our last empty pop and the
        // flag clear; that enqueue saw `draining` still set and did not spawn
        // a drain of its own. Reclaim the flag and keep going if so.
        let refilled = !inner
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty();
        if !refilled
            || inner
                .draining
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
        {
            break;
        }
    }
}
