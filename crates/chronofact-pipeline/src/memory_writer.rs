// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fire-and-forget memory writes.
//!
//! Response paths must never wait on memory persistence. Writes go into a
//! bounded queue drained by a background worker; on overflow the oldest
//! entry is dropped and a counter incremented.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use chronofact_memory::{MemoryEngine, MemoryType};

/// One deferred memory write.
#[derive(Debug, Clone)]
pub enum MemoryTask {
    /// Reinforce session memories matching the query vector.
    Reinforce {
        session_id: String,
        query_vector: Vec<f32>,
    },
    /// Store an interaction memory summarizing a completed request.
    StoreInteraction {
        session_id: String,
        content: String,
    },
}

struct WriterShared {
    queue: Mutex<VecDeque<MemoryTask>>,
    notify: Notify,
    busy: AtomicBool,
    dropped: AtomicU64,
}

/// Handle to the background memory writer.
#[derive(Clone)]
pub struct MemoryWriter {
    shared: Arc<WriterShared>,
    capacity: usize,
}

impl MemoryWriter {
    /// Spawn the worker draining the queue against the engine.
    pub fn spawn(
        engine: Arc<MemoryEngine>,
        capacity: usize,
        cancel: CancellationToken,
    ) -> Self {
        let shared = Arc::new(WriterShared {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            busy: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        });

        let worker_shared = shared.clone();
        tokio::spawn(async move {
            loop {
                // busy goes up before the pop so `settle` never observes an
                // empty queue while a task is still in flight.
                worker_shared.busy.store(true, Ordering::SeqCst);
                let task = worker_shared
                    .queue
                    .lock()
                    .expect("memory queue lock")
                    .pop_front();

                match task {
                    Some(task) => {
                        run_task(&engine, task).await;
                    }
                    None => {
                        worker_shared.busy.store(false, Ordering::SeqCst);
                        tokio::select! {
                            _ = worker_shared.notify.notified() => {}
                            _ = cancel.cancelled() => {
                                debug!("memory writer shutting down");
                                break;
                            }
                        }
                    }
                }
            }
        });

        Self {
            shared,
            capacity: capacity.max(1),
        }
    }

    /// Queue a write; drops the oldest queued task on overflow.
    pub fn enqueue(&self, task: MemoryTask) {
        {
            let mut queue = self.shared.queue.lock().expect("memory queue lock");
            if queue.len() >= self.capacity {
                queue.pop_front();
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("memory write queue full, dropped oldest entry");
            }
            queue.push_back(task);
        }
        self.shared.notify.notify_one();
    }

    /// Total writes dropped due to overflow.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Wait until every queued write has been applied. Test hook.
    pub async fn settle(&self) {
        loop {
            let idle = {
                let queue = self.shared.queue.lock().expect("memory queue lock");
                queue.is_empty() && !self.shared.busy.load(Ordering::SeqCst)
            };
            if idle {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }
}

async fn run_task(engine: &MemoryEngine, task: MemoryTask) {
    match task {
        MemoryTask::Reinforce {
            session_id,
            query_vector,
        } => {
            if let Err(e) = engine
                .retrieve_and_reinforce(&session_id, &query_vector, 10, 0.0)
                .await
            {
                warn!(session_id = session_id.as_str(), error = %e, "memory reinforcement failed");
            }
        }
        MemoryTask::StoreInteraction {
            session_id,
            content,
        } => {
            if let Err(e) = engine
                .store(&session_id, &content, MemoryType::Interaction)
                .await
            {
                warn!(session_id = session_id.as_str(), error = %e, "interaction memory store failed");
            }
        }
    }
}
