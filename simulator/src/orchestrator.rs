//! Supervise long-running workload tasks.

use crate::Error;
use std::{future::Future, time::Duration};
use swarm_utils::signal::Signaler;
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

/// Configuration for the [Orchestrator].
#[derive(Clone, Debug)]
pub struct Config {
    /// Stop with [Error::Timeout] after this long (if set).
    pub timeout: Option<Duration>,

    /// Time tasks are given to stop after shutdown is signaled.
    pub grace: Duration,

    /// Number of task errors that can be buffered.
    pub capacity: usize,
}

/// Runs tasks until the first fatal error, the timeout, or all tasks complete, then signals
/// shutdown to everything holding a [swarm_utils::signal::Signal].
pub struct Orchestrator {
    cfg: Config,
    signaler: Signaler,
    sender: mpsc::Sender<Error>,
    receiver: mpsc::Receiver<Error>,
    handles: Vec<JoinHandle<()>>,
}

impl Orchestrator {
    pub fn new(cfg: Config, signaler: Signaler) -> Self {
        let (sender, receiver) = mpsc::channel(cfg.capacity.max(1));
        Self {
            cfg,
            signaler,
            sender,
            receiver,
            handles: Vec::new(),
        }
    }

    /// Spawn a task whose error stops the run.
    pub fn spawn<F>(&mut self, task: String, future: F)
    where
        F: Future<Output = Result<(), Error>> + Send + 'static,
    {
        let sender = self.sender.clone();
        let handle = tokio::spawn(async move {
            let err = match future.await {
                Ok(()) => {
                    debug!(task = %task, "task completed");
                    return;
                }
                Err(err) => err,
            };
            error!(task = %task, ?err, "task failed");
            let fatal = Error::Fatal {
                task,
                source: Box::new(err),
            };
            match sender.try_send(fatal) {
                Ok(()) => {}
                Err(TrySendError::Full(err)) => error!(?err, "error channel full, dropping error"),
                Err(TrySendError::Closed(_)) => {}
            }
        });
        self.handles.push(handle);
    }

    /// Wait for an already spawned task to stop on shutdown.
    ///
    /// Watched tasks do not count towards completion.
    pub fn watch(&mut self, handle: JoinHandle<()>) {
        self.handles.push(handle);
    }

    /// Run until the first task error, the timeout, or all spawned tasks complete.
    pub async fn run(self) -> Result<(), Error> {
        let Self {
            cfg,
            signaler,
            sender,
            mut receiver,
            handles,
        } = self;

        // Only spawned tasks hold a sender now
        drop(sender);
        let deadline = async {
            match cfg.timeout {
                Some(timeout) => {
                    tokio::time::sleep(timeout).await;
                    timeout
                }
                None => futures::future::pending().await,
            }
        };
        let result = tokio::select! {
            err = receiver.recv() => match err {
                Some(err) => Err(err),
                None => {
                    info!("all tasks completed");
                    Ok(())
                }
            },
            timeout = deadline => {
                warn!(?timeout, "timed out");
                Err(Error::Timeout(timeout))
            },
        };

        info!(tasks = handles.len(), "signaling shutdown");
        let _ = signaler.signal();
        if tokio::time::timeout(cfg.grace, futures::future::join_all(handles))
            .await
            .is_err()
        {
            warn!(grace = ?cfg.grace, "tasks did not stop in time");
        }
        result
    }
}
