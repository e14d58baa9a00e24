// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Request batching
//!
//! Every task submitted during one scheduling tick is coalesced into a single
//! POST against the server's batch endpoint. Responses come back in arbitrary
//! order and are routed to their submitters by task id.
//!
//! - Submissions made before endpoint discovery completes are queued and
//!   flushed in submission order once the scheduler is marked ready
//! - A tick ends when every task that queued into the envelope has given
//!   control back to the runtime. On a current-thread runtime that is simply
//!   the first chance the flush task gets to run; on a multi-thread runtime the
//!   submitters are tracked by task id and report themselves when they wait
//!   on a [`TaskHandle`] or an entity
//! - A failed envelope fails every task it carried
//! - Errors reported for a single entry fail only that task

use crate::error::{Error, Result, ServerError};
use crate::transport::{HttpRequest, Method, Transport};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::{oneshot, watch, Notify};

/// Largest generated task id (ids stay exact as JSON numbers)
const MAX_TASK_ID: u64 = (1 << 53) - 1;

/// How long a multi-thread flush waits on a submitter that never reports a
/// yield, restarted while the envelope keeps growing
const QUIET_PERIOD: Duration = Duration::from_millis(10);

/// Task that queued into an envelope; `None` outside of a tokio task (`block_on`)
type Submitter = Option<tokio::task::Id>;

/// One logical REST call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub method: Method,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

impl Task {
    pub fn new(method: Method, to: impl Into<String>) -> Self {
        Self {
            method,
            to: to.into(),
            body: None,
            id: None,
        }
    }

    pub fn get(to: impl Into<String>) -> Self {
        Self::new(Method::Get, to)
    }

    pub fn post(to: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, to).with_body(body)
    }

    pub fn put(to: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Put, to).with_body(body)
    }

    pub fn delete(to: impl Into<String>) -> Self {
        Self::new(Method::Delete, to)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }
}

/// Completion of a submitted task
pub struct TaskHandle {
    id: u64,
    rx: oneshot::Receiver<Result<Value>>,
    scheduler: Arc<SchedulerInner>,
}

impl TaskHandle {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Future for TaskHandle {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(Error::BatchDispatch(format!(
                "Task {} was dropped before a response arrived",
                self.id
            )))),
            Poll::Pending => {
                self.scheduler.submitter_yielded();
                Poll::Pending
            }
        }
    }
}

struct PendingTask {
    id: u64,
    task: Task,
    reply: oneshot::Sender<Result<Value>>,
}

#[derive(Default)]
struct Queue {
    pending: Vec<PendingTask>,
    in_flight: HashSet<u64>,
    flush_scheduled: bool,
    /// Submitters of the pending envelope that have not yielded yet
    submitters: HashSet<Submitter>,
}

struct SchedulerInner {
    transport: Arc<dyn Transport>,
    root: String,
    headers: Vec<(String, String)>,
    queue: Mutex<Queue>,
    batch_url: watch::Sender<Option<String>>,
    yielded: Notify,
}

impl SchedulerInner {
    fn submitter_yielded(&self) {
        let me = tokio::task::try_id();
        let removed = self.queue.lock().submitters.remove(&me);
        if removed {
            self.yielded.notify_waiters();
        }
    }
}

/// Coalesces tasks into batch envelopes
#[derive(Clone)]
pub struct BatchScheduler {
    inner: Arc<SchedulerInner>,
}

impl BatchScheduler {
    /// Creates a scheduler that holds submissions until [`mark_ready`](Self::mark_ready)
    pub fn new(transport: Arc<dyn Transport>, root: impl Into<String>, headers: Vec<(String, String)>) -> Self {
        let (batch_url, _) = watch::channel(None);
        Self {
            inner: Arc::new(SchedulerInner {
                transport,
                root: root.into(),
                headers,
                queue: Mutex::new(Queue::default()),
                batch_url,
                yielded: Notify::new(),
            }),
        }
    }

    /// Opens the gate: queued and future envelopes go to `batch_url`
    pub fn mark_ready(&self, batch_url: impl Into<String>) {
        self.inner.batch_url.send_replace(Some(batch_url.into()));
    }

    pub fn is_ready(&self) -> bool {
        self.inner.batch_url.borrow().is_some()
    }

    /// Number of tasks waiting for the next envelope
    pub fn pending_len(&self) -> usize {
        self.inner.queue.lock().pending.len()
    }

    /// Queues a task for the current tick's envelope.
    ///
    /// Must be called from within a tokio runtime. The returned handle
    /// resolves once the envelope carrying the task has been answered.
    pub fn enqueue(&self, task: Task) -> Result<TaskHandle> {
        let mut handles = self.enqueue_all(vec![task])?;
        handles
            .pop()
            .ok_or_else(|| Error::BatchDispatch("Task was not queued".into()))
    }

    /// Queues several tasks at once; either all of them are admitted or none.
    pub fn enqueue_all(&self, tasks: Vec<Task>) -> Result<Vec<TaskHandle>> {
        let mut tasks = tasks;
        for task in &mut tasks {
            if task.to.trim().is_empty() {
                return Err(Error::Validation("Task target must not be empty".into()));
            }
            task.to = self.relative(&task.to);
        }

        let (handles, spawn_flush) = {
            let mut queue = self.inner.queue.lock();
            let mut explicit = HashSet::new();
            for id in tasks.iter().filter_map(|task| task.id) {
                if queue.in_flight.contains(&id) {
                    return Err(Error::Validation(format!("Task id {} is already in flight", id)));
                }
                if !explicit.insert(id) {
                    return Err(Error::Validation(format!("Duplicate task id {}", id)));
                }
            }

            let mut handles = Vec::with_capacity(tasks.len());
            for mut task in tasks {
                let id = match task.id {
                    Some(id) => id,
                    None => loop {
                        let candidate = fastrand::u64(1..=MAX_TASK_ID);
                        if !queue.in_flight.contains(&candidate) && !explicit.contains(&candidate) {
                            break candidate;
                        }
                    },
                };
                task.id = Some(id);
                queue.in_flight.insert(id);

                let (reply, rx) = oneshot::channel();
                queue.pending.push(PendingTask { id, task, reply });
                handles.push(TaskHandle {
                    id,
                    rx,
                    scheduler: Arc::clone(&self.inner),
                });
            }
            if handles.is_empty() {
                return Ok(handles);
            }
            queue.submitters.insert(tokio::task::try_id());

            let spawn_flush = !queue.flush_scheduled;
            queue.flush_scheduled = true;
            (handles, spawn_flush)
        };

        if spawn_flush {
            tokio::spawn(flush(Arc::clone(&self.inner)));
        }
        Ok(handles)
    }

    /// Reports that the calling task is about to wait, ending its tick
    pub(crate) fn yielding(&self) {
        self.inner.submitter_yielded();
    }

    pub async fn submit(&self, task: Task) -> Result<Value> {
        self.enqueue(task)?.await
    }

    /// Batch targets are relative to the service root
    fn relative(&self, to: &str) -> String {
        match to.strip_prefix(self.inner.root.as_str()) {
            Some(rest) if rest.is_empty() => "/".to_string(),
            Some(rest) => rest.to_string(),
            None => to.to_string(),
        }
    }
}

async fn flush(inner: Arc<SchedulerInner>) {
    let mut ready = inner.batch_url.subscribe();
    let Some(batch_url) = ready
        .wait_for(Option::is_some)
        .await
        .ok()
        .and_then(|url| url.as_ref().cloned())
    else {
        return;
    };

    match Handle::current().runtime_flavor() {
        // submitters can only have yielded for this task to run; let the rest
        // of the current tick join this envelope
        RuntimeFlavor::CurrentThread => tokio::task::yield_now().await,
        _ => submitters_yielded(&inner).await,
    }

    let batch = {
        let mut queue = inner.queue.lock();
        queue.flush_scheduled = false;
        queue.submitters.clear();
        std::mem::take(&mut queue.pending)
    };
    if batch.is_empty() {
        return;
    }
    dispatch(&inner, &batch_url, batch).await;
}

/// Waits until every submitter of the pending envelope has yielded
async fn submitters_yielded(inner: &SchedulerInner) {
    loop {
        let notified = inner.yielded.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        let queued = {
            let queue = inner.queue.lock();
            if queue.submitters.is_empty() {
                return;
            }
            queue.pending.len()
        };

        let timed_out = tokio::time::timeout(QUIET_PERIOD, notified).await.is_err();
        if timed_out && inner.queue.lock().pending.len() == queued {
            log::trace!("Flushing {} task(s) after a quiet period", queued);
            return;
        }
    }
}

#[derive(Debug, Deserialize)]
struct BatchEntry {
    id: u64,
    #[serde(default)]
    status: Option<u16>,
    #[serde(default)]
    body: Value,
}

impl BatchEntry {
    fn into_result(self) -> Result<Value> {
        let errors = ServerError::collect(&self.body);
        if !errors.is_empty() {
            for error in &errors {
                log::error!("Task {} failed: {}", self.id, error);
            }
            return Err(Error::Statement(errors));
        }
        match self.status {
            Some(status) if status >= 400 => Err(Error::Statement(vec![ServerError::new(
                format!("HTTP {}", status),
                self.body.to_string(),
            )])),
            _ => Ok(self.body),
        }
    }
}

async fn dispatch(inner: &SchedulerInner, batch_url: &str, batch: Vec<PendingTask>) {
    log::debug!("Dispatching batch of {} task(s) to {}", batch.len(), batch_url);
    let outcome = send_envelope(inner, batch_url, &batch).await;

    {
        let mut queue = inner.queue.lock();
        for pending in &batch {
            queue.in_flight.remove(&pending.id);
        }
    }

    match outcome {
        Ok(entries) => {
            let mut waiting: HashMap<u64, PendingTask> =
                batch.into_iter().map(|pending| (pending.id, pending)).collect();
            for entry in entries {
                match waiting.remove(&entry.id) {
                    Some(pending) => {
                        let _ = pending.reply.send(entry.into_result());
                    }
                    None => log::warn!("Batch response carries unknown task id {}", entry.id),
                }
            }
        }
        Err(message) => {
            log::warn!("Batch of {} task(s) failed: {}", batch.len(), message);
            for pending in batch {
                let _ = pending.reply.send(Err(Error::BatchDispatch(message.clone())));
            }
        }
    }
}

async fn send_envelope(
    inner: &SchedulerInner,
    batch_url: &str,
    batch: &[PendingTask],
) -> std::result::Result<Vec<BatchEntry>, String> {
    let tasks: Vec<&Task> = batch.iter().map(|pending| &pending.task).collect();
    let body = serde_json::to_value(&tasks).map_err(|e| e.to_string())?;
    let request = HttpRequest::new(Method::Post, batch_url)
        .with_body(body)
        .with_headers(inner.headers.clone());

    let response = inner
        .transport
        .call(request)
        .await
        .map_err(|e| e.to_string())?;
    if !response.is_success() {
        return Err(format!(
            "Batch endpoint answered with status {}: {}",
            response.status, response.body
        ));
    }

    let entries: Vec<BatchEntry> = serde_json::from_str(&response.body)
        .map_err(|e| format!("Undecodable batch response: {}", e))?;

    let mut seen: HashMap<u64, usize> = batch.iter().map(|pending| (pending.id, 0)).collect();
    for entry in &entries {
        if let Some(count) = seen.get_mut(&entry.id) {
            *count += 1;
        }
    }
    if let Some((id, count)) = seen.iter().find(|(_, count)| **count != 1) {
        return Err(format!(
            "Batch response covers task {} {} time(s), expected exactly once",
            id, count
        ));
    }
    Ok(entries)
}
