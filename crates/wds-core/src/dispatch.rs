//! Background work with results delivered to the UI loop's inbox.
//!
//! Each dispatched unit runs on its own short-lived worker thread. When it
//! finishes, its outcome is turned into a message of the UI's choosing and
//! pushed onto a single-consumer channel. The UI loop drains that channel on
//! every tick, so results are always applied on the UI thread and each
//! dispatched unit yields exactly one message.

use std::fmt::Display;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use serde::{Deserialize, Serialize};

/// Result of a background generation, in the shape the pages consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOutcome {
    /// Generated text on success, `"Error: <message>"` on failure.
    pub text: String,
    /// Whether the work succeeded.
    pub ok: bool,
}

impl GenerationOutcome {
    /// Successful outcome.
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ok: true,
        }
    }

    /// Failed outcome carrying the error text.
    pub fn failure(error: impl Display) -> Self {
        Self {
            text: format!("Error: {error}"),
            ok: false,
        }
    }
}

impl<E: Display> From<Result<String, E>> for GenerationOutcome {
    fn from(result: Result<String, E>) -> Self {
        match result {
            Ok(text) => Self::success(text),
            Err(err) => Self::failure(err),
        }
    }
}

/// Runs work off the UI thread and queues one message per unit.
///
/// `M` is the UI's message type. Cloning a dispatcher shares the same inbox.
#[derive(Debug)]
pub struct Dispatcher<M> {
    sender: Sender<M>,
    inbox: Receiver<M>,
    in_flight: Arc<AtomicUsize>,
}

impl<M> Clone for Dispatcher<M> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            inbox: self.inbox.clone(),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<M: Send + 'static> Default for Dispatcher<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Send + 'static> Dispatcher<M> {
    /// Create a dispatcher with an empty inbox.
    pub fn new() -> Self {
        let (sender, inbox) = crossbeam_channel::unbounded();
        Self {
            sender,
            inbox,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Run `work` on a new worker thread; `on_result` builds the message that
    /// is queued for the UI loop.
    ///
    /// An `Err` from `work`, a panic inside it, or a worker thread that cannot
    /// be started becomes a failure outcome. There is no cancellation: once
    /// dispatched, the work runs to completion.
    pub fn dispatch<W, E, F>(&self, work: W, on_result: F)
    where
        W: FnOnce() -> Result<String, E> + Send + 'static,
        E: Display,
        F: FnOnce(GenerationOutcome) -> M + Send + 'static,
    {
        self.dispatch_on(work, on_result, |job| {
            thread::Builder::new()
                .name("wds-worker".to_string())
                .spawn(job)
                .map(|_| ())
        });
    }

    fn dispatch_on<W, E, F, S>(&self, work: W, on_result: F, spawn: S)
    where
        W: FnOnce() -> Result<String, E> + Send + 'static,
        E: Display,
        F: FnOnce(GenerationOutcome) -> M + Send + 'static,
        S: FnOnce(Job) -> io::Result<()>,
    {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let slot = Arc::new(Mutex::new(Some(on_result)));

        let job: Job = {
            let slot = Arc::clone(&slot);
            let sender = self.sender.clone();
            let in_flight = Arc::clone(&self.in_flight);
            Box::new(move || {
                let outcome = match panic::catch_unwind(AssertUnwindSafe(work)) {
                    Ok(result) => GenerationOutcome::from(result),
                    Err(payload) => GenerationOutcome::failure(panic_message(payload.as_ref())),
                };
                deliver(&slot, &sender, &in_flight, outcome);
            })
        };

        if let Err(err) = spawn(job) {
            tracing::error!(error = %err, "failed to spawn worker thread");
            let outcome = GenerationOutcome::failure(format!("could not start worker: {err}"));
            deliver(&slot, &self.sender, &self.in_flight, outcome);
        }
    }

    /// Take every message that is ready, without blocking.
    pub fn try_drain(&self) -> Vec<M> {
        let mut ready = Vec::new();
        loop {
            match self.inbox.try_recv() {
                Ok(message) => {
                    self.in_flight.fetch_sub(1, Ordering::SeqCst);
                    ready.push(message);
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        ready
    }

    /// Wait up to `timeout` for the next message.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<M> {
        match self.inbox.recv_timeout(timeout) {
            Ok(message) => {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                Some(message)
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Units dispatched whose message has not been drained yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Whether any unit is still running or waiting in the inbox.
    pub fn is_busy(&self) -> bool {
        self.in_flight() > 0
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Build and queue the message for one unit. The slot is emptied on first
/// use, so a unit never yields two messages.
fn deliver<M, F>(
    slot: &Mutex<Option<F>>,
    sender: &Sender<M>,
    in_flight: &AtomicUsize,
    outcome: GenerationOutcome,
) where
    F: FnOnce(GenerationOutcome) -> M,
{
    let on_result = match slot.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    };
    let Some(on_result) = on_result else {
        return;
    };
    if sender.send(on_result(outcome)).is_err() {
        // The receiving side is gone; nothing is left to update.
        in_flight.fetch_sub(1, Ordering::SeqCst);
        tracing::debug!("inbox closed, dropping worker result");
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
