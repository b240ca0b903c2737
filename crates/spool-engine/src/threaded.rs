//! Environment group running on a dedicated worker thread.
//!
//! ```text
//!   Collector thread                     Worker thread
//!   ────────────────                     ─────────────
//!   step_async(actions) ──[requests: bounded(1)]──► group.step_async
//!     (returns at once)                              group.step_wait
//!   ...other lumps...                                     │
//!   step_wait() ◄─────────[replies: bounded(1)]──────────┘
//! ```
//!
//! `step_async` only enqueues, so while the worker steps its group the
//! collector is free to query the policy and write the buffer for the
//! other lumps.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use spool_core::{EnvError, EnvGroup, StepBatch};

enum Request {
    Reset,
    Step(Vec<f32>),
    Close,
}

enum Reply {
    Reset(Result<Vec<f32>, EnvError>),
    Step(Result<StepBatch, EnvError>),
}

/// An [`EnvGroup`] that forwards every call to a group owned by a worker
/// thread.
///
/// Dropping the handle asks the worker to stop and joins it.
pub struct ThreadedEnvGroup {
    num_envs: usize,
    requests: Sender<Request>,
    replies: Receiver<Reply>,
    in_flight: bool,
    worker: Option<JoinHandle<()>>,
}

impl ThreadedEnvGroup {
    /// Move `group` onto a new worker thread named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::Failed`] if the thread cannot be spawned.
    pub fn spawn<G>(name: &str, group: G) -> Result<Self, EnvError>
    where
        G: EnvGroup + Send + 'static,
    {
        let num_envs = group.num_envs();
        let (request_tx, request_rx) = crossbeam_channel::bounded(1);
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run_worker(group, request_rx, reply_tx))
            .map_err(|e| EnvError::Failed {
                reason: format!("failed to spawn env worker: {e}"),
            })?;
        Ok(Self {
            num_envs,
            requests: request_tx,
            replies: reply_rx,
            in_flight: false,
            worker: Some(worker),
        })
    }

    fn send(&self, request: Request) -> Result<(), EnvError> {
        self.requests
            .send(request)
            .map_err(|_| EnvError::Disconnected)
    }

    fn recv(&self) -> Result<Reply, EnvError> {
        self.replies.recv().map_err(|_| EnvError::Disconnected)
    }

    /// Discard the reply of a step that was never waited on.
    fn drain_in_flight(&mut self) -> Result<(), EnvError> {
        if self.in_flight {
            self.in_flight = false;
            self.recv()?;
        }
        Ok(())
    }
}

impl EnvGroup for ThreadedEnvGroup {
    fn num_envs(&self) -> usize {
        self.num_envs
    }

    fn reset(&mut self) -> Result<Vec<f32>, EnvError> {
        self.drain_in_flight()?;
        self.send(Request::Reset)?;
        match self.recv()? {
            Reply::Reset(result) => result,
            Reply::Step(_) => Err(EnvError::Failed {
                reason: "worker answered reset with a step result".to_string(),
            }),
        }
    }

    fn step_async(&mut self, actions: &[f32]) -> Result<(), EnvError> {
        self.drain_in_flight()?;
        self.send(Request::Step(actions.to_vec()))?;
        self.in_flight = true;
        Ok(())
    }

    fn step_wait(&mut self) -> Result<StepBatch, EnvError> {
        if !self.in_flight {
            return Err(EnvError::Failed {
                reason: "step_wait called with no step in flight".to_string(),
            });
        }
        self.in_flight = false;
        match self.recv()? {
            Reply::Step(result) => result,
            Reply::Reset(_) => Err(EnvError::Failed {
                reason: "worker answered step with a reset result".to_string(),
            }),
        }
    }
}

impl Drop for ThreadedEnvGroup {
    fn drop(&mut self) {
        let _ = self.requests.send(Request::Close);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                tracing::warn!("Environment worker panicked");
            }
        }
    }
}

fn run_worker<G: EnvGroup>(mut group: G, requests: Receiver<Request>, replies: Sender<Reply>) {
    while let Ok(request) = requests.recv() {
        let reply = match request {
            Request::Reset => Reply::Reset(group.reset()),
            Request::Step(actions) => Reply::Step(
                group
                    .step_async(&actions)
                    .and_then(|()| group.step_wait()),
            ),
            Request::Close => break,
        };
        if replies.send(reply).is_err() {
            break;
        }
    }
}

// Compile-time assertion: the handle can move between threads.
const _: fn() = || {
    fn assert<T: Send>() {}
    assert::<ThreadedEnvGroup>();
};
