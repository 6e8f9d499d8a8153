use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Delayed confirmation jobs keyed by appointment id.
///
/// Each job sleeps for the configured delay and then runs its callback,
/// unless the appointment is cancelled or rescheduled first. Scheduling a
/// second job for the same id replaces the first.
#[derive(Clone, Default)]
pub struct ConfirmationTasks {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    pending: DashMap<Uuid, (u64, CancellationToken)>,
    seq: AtomicU64,
}

impl ConfirmationTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule<F, Fut>(&self, appointment_id: Uuid, delay: Duration, job: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let seq = self.inner.seq.fetch_add(1, Ordering::Relaxed);
        if let Some((_, (_, previous))) = self.inner.pending.remove(&appointment_id) {
            previous.cancel();
        }
        self.inner.pending.insert(appointment_id, (seq, token.clone()));

        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!("Confirmation for appointment {} cancelled", appointment_id);
                }
                _ = tokio::time::sleep(delay) => {
                    job().await;
                }
            }
            inner.pending.remove_if(&appointment_id, |_, (current, _)| *current == seq);
        });
    }

    /// Returns true if a job was waiting
    pub fn cancel(&self, appointment_id: Uuid) -> bool {
        match self.inner.pending.remove(&appointment_id) {
            Some((_, (_, token))) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn pending(&self) -> usize {
        self.inner.pending.len()
    }

    pub fn is_pending(&self, appointment_id: Uuid) -> bool {
        self.inner.pending.contains_key(&appointment_id)
    }
}
