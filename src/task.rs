use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use lottie_core::{CompositionLoader, CompositionModel, LoadError};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const PENDING: u8 = 0;
const DELIVERED: u8 = 1;
const CANCELLED: u8 = 2;

/// Shared between a [`LoadHandle`] and its worker. Delivery and
/// cancellation both leave the pending state exactly once, so whichever
/// happens first wins.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    state: Arc<AtomicU8>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if this call cancelled a pending load.
    pub fn cancel(&self) -> bool {
        self.transition(CANCELLED)
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    pub fn is_delivered(&self) -> bool {
        self.state.load(Ordering::Acquire) == DELIVERED
    }

    fn claim_delivery(&self) -> bool {
        self.transition(DELIVERED)
    }

    fn transition(&self, to: u8) -> bool {
        self.state
            .compare_exchange(PENDING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Receives the outcome of a background load. At most one method is called,
/// and neither is called once the load has been cancelled.
pub trait CompositionListener: Send + 'static {
    fn on_loaded(self: Box<Self>, composition: CompositionModel);

    fn on_failed(self: Box<Self>, error: LoadError) {
        tracing::error!(%error, "composition load failed");
    }
}

impl<F> CompositionListener for F
where
    F: FnOnce(CompositionModel) + Send + 'static,
{
    fn on_loaded(self: Box<Self>, composition: CompositionModel) {
        (*self)(composition)
    }
}

/// Handle to an in-flight background load.
#[derive(Debug)]
pub struct LoadHandle {
    token: CancellationToken,
    done: Receiver<()>,
}

impl LoadHandle {
    /// Stops the listener from being called. Returns `false` if the result
    /// was already delivered or the load was already cancelled.
    pub fn cancel(&self) -> bool {
        let cancelled = self.token.cancel();
        if cancelled {
            tracing::debug!("composition load cancelled");
        }
        cancelled
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Waits for the worker to finish. Returns `false` on timeout. Once this
    /// returns `true` any listener call has completed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        }
    }

    pub fn wait(&self) {
        // A closed channel also means the worker has exited.
        let _ = self.done.recv();
    }
}

/// Runs `job` on a worker thread and hands its result to `listener` unless
/// the returned handle is cancelled first.
pub fn spawn_load<J>(
    loader: CompositionLoader,
    job: J,
    listener: Box<dyn CompositionListener>,
) -> LoadHandle
where
    J: FnOnce(&CompositionLoader) -> Result<CompositionModel, LoadError> + Send + 'static,
{
    let token = CancellationToken::new();
    let (done_tx, done_rx) = bounded(1);
    let worker_token = token.clone();

    thread::spawn(move || {
        if worker_token.is_cancelled() {
            tracing::debug!("skipping cancelled composition load");
        } else {
            let result = job(&loader);
            if worker_token.claim_delivery() {
                match result {
                    Ok(composition) => listener.on_loaded(composition),
                    Err(error) => listener.on_failed(error),
                }
            } else {
                tracing::debug!("discarding result of cancelled composition load");
            }
        }
        let _ = done_tx.send(());
    });

    LoadHandle {
        token,
        done: done_rx,
    }
}
