//! Background execution of engine queries and sync actions.
//!
//! The worker thread owns the [`Session`]; jobs arrive over a channel and
//! run one at a time, so the engine's caches need no locking. Each job
//! completes through a reply channel, a callback, or not at all.
//!
//! Every mutating job clears the listing caches, notifies observers and
//! re-queries the node's status afterwards, whether it succeeded or not.
//! A connection transition queues a refresh so listings cached under the
//! old state are dropped.

use std::{
    sync::mpsc::{self, Receiver, Sender},
    thread::{self, JoinHandle},
};

use tracing::{debug, info, warn};

use crate::{
    engine::ChildStatus,
    model::{Coordinate, NodeStatus},
    session::Session,
    sync::{Action, SyncError},
};

/// Work the worker can do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    Status(Coordinate),
    Children(Coordinate),
    Apply(Action, Coordinate),
    /// Drop every cached listing and tell observers everything changed.
    Refresh,
}

/// The result of a job.
#[derive(Debug)]
pub enum Outcome {
    Status(NodeStatus),
    Children(Vec<ChildStatus>),
    Applied {
        action: Action,
        coordinate: Coordinate,
        result: Result<(), SyncError>,
        /// Status re-queried after the attempt.
        status: NodeStatus,
    },
    Refreshed,
}

type Callback = Box<dyn FnOnce(Outcome) + Send>;

enum Reply {
    Channel(Sender<Outcome>),
    Callback(Callback),
    Discard,
}

impl Reply {
    fn deliver(self, outcome: Outcome) {
        match self {
            Self::Channel(tx) => {
                if tx.send(outcome).is_err() {
                    debug!("job submitter hung up before completion");
                }
            }
            Self::Callback(callback) => callback(outcome),
            Self::Discard => {}
        }
    }
}

enum Message {
    Run(Job, Reply),
    Shutdown,
}

/// Cloneable submission side of a worker.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: Sender<Message>,
}

impl WorkerHandle {
    /// Queue a job and get a receiver for its outcome.
    ///
    /// If the worker has shut down the receiver reports disconnection.
    pub fn submit(&self, job: Job) -> Receiver<Outcome> {
        let (tx, rx) = mpsc::channel();
        self.send(job, Reply::Channel(tx));
        rx
    }

    /// Queue a job whose outcome is handed to `callback` on the worker thread.
    pub fn submit_with(&self, job: Job, callback: impl FnOnce(Outcome) + Send + 'static) {
        self.send(job, Reply::Callback(Box::new(callback)));
    }

    /// Queue a job and ignore its outcome.
    pub fn post(&self, job: Job) {
        self.send(job, Reply::Discard);
    }

    fn send(&self, job: Job, reply: Reply) {
        if self.tx.send(Message::Run(job, reply)).is_err() {
            warn!("worker is gone, job dropped");
        }
    }
}

/// A background thread owning one session.
pub struct Worker {
    handle: WorkerHandle,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn spawn(mut session: Session) -> Self {
        let (tx, rx) = mpsc::channel();
        let handle = WorkerHandle { tx };

        let refresh = handle.clone();
        session.remote().subscribe(move |connected| {
            debug!(connected, "connection changed, queueing refresh");
            refresh.post(Job::Refresh);
        });

        let thread = thread::spawn(move || {
            info!(project = session.project(), "worker started");
            for message in rx {
                match message {
                    Message::Run(job, reply) => {
                        let outcome = execute(&mut session, job);
                        reply.deliver(outcome);
                    }
                    Message::Shutdown => break,
                }
            }
            info!("worker stopped");
        });

        Self {
            handle,
            thread: Some(thread),
        }
    }

    pub fn handle(&self) -> WorkerHandle {
        self.handle.clone()
    }

    /// Finish queued jobs, then stop the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let _ = self.handle.tx.send(Message::Shutdown);
        if thread.join().is_err() {
            warn!("worker thread panicked");
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn execute(session: &mut Session, job: Job) -> Outcome {
    match job {
        Job::Status(coordinate) => Outcome::Status(session.engine_mut().status(&coordinate)),
        Job::Children(parent) => Outcome::Children(session.engine_mut().children(&parent)),
        Job::Apply(action, coordinate) => {
            let result = session.sync_ops().apply(action, &coordinate);
            if let Err(e) = &result {
                warn!(%coordinate, action = action.verb(), error = %e, "action failed");
            }
            let engine = session.engine_mut();
            engine.clear_all_caches();
            engine.notify_changed(Some(&coordinate));
            let status = engine.status(&coordinate);
            Outcome::Applied {
                action,
                coordinate,
                result,
                status,
            }
        }
        Job::Refresh => {
            let engine = session.engine_mut();
            engine.clear_all_caches();
            engine.notify_changed(None);
            Outcome::Refreshed
        }
    }
}
