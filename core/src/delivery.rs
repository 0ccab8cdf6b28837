//! The delivery context: one FIFO of callbacks run on a single thread.
//!
//! Completions and response-code actions never run on the worker runtime.
//! They are queued here and executed one at a time, so a caller never sees two
//! callbacks at once. Each job is isolated with `catch_unwind`: a panicking
//! job is logged and dropped and the queue keeps going.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Handle used to schedule work on the delivery context.
#[derive(Debug, Clone)]
pub struct DeliveryQueue {
    sender: Sender<Job>,
}

impl DeliveryQueue {
    /// Start a dedicated delivery thread.
    ///
    /// The thread exits once every `DeliveryQueue` clone has been dropped and
    /// the remaining jobs have run.
    pub fn spawn(name: &str) -> io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();
        thread::Builder::new().name(name.to_string()).spawn(move || {
            for job in receiver {
                run_isolated(job);
            }
        })?;
        Ok(Self { sender })
    }

    /// A queue drained by the caller on its own thread through `Mailbox`.
    pub fn manual() -> (Self, Mailbox) {
        let (sender, receiver) = mpsc::channel();
        (Self { sender }, Mailbox { receiver })
    }

    pub fn dispatch(&self, job: impl FnOnce() + Send + 'static) {
        if self.sender.send(Box::new(job)).is_err() {
            tracing::warn!("delivery context is gone, dropping job");
        }
    }
}

/// Receiving end of a manual delivery queue.
#[derive(Debug)]
pub struct Mailbox {
    receiver: Receiver<Job>,
}

impl Mailbox {
    /// Wait up to `timeout` for one job and run it. Returns whether a job ran.
    pub fn run_next(&self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Ok(job) => {
                run_isolated(job);
                true
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Run every job that is already queued, without waiting.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.receiver.try_recv() {
            run_isolated(job);
            ran += 1;
        }
        ran
    }
}

fn run_isolated(job: Job) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
        tracing::warn!(panic = panic_message(&*payload), "delivery job panicked");
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
