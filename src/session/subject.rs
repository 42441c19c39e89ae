//! Multicast outcome streams that replay the latest value.

use crate::decode::{DecodeError, ScanOutcome};
use futures::Stream;
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

enum Termination {
    Completed,
    Faulted(DecodeError),
}

#[derive(Default)]
struct SubjectState {
    latest: Option<ScanOutcome>,
    terminal: Option<Termination>,
    subscribers: Vec<mpsc::UnboundedSender<ScanOutcome>>,
}

/// Hot source of scan outcomes.
///
/// Subscribers joining a live subject first receive the most recent
/// outcome. Once the subject faults, late subscribers receive only the
/// fault. Once it completes, they receive nothing.
#[derive(Default)]
pub struct OutcomeSubject {
    state: Mutex<SubjectState>,
}

impl OutcomeSubject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a non-terminal outcome. Ignored after termination.
    pub fn next(&self, outcome: ScanOutcome) -> bool {
        let mut state = self.state.lock();
        if state.terminal.is_some() {
            return false;
        }
        state
            .subscribers
            .retain(|tx| tx.send(outcome.clone()).is_ok());
        state.latest = Some(outcome);
        true
    }

    /// Terminates the subject with a fatal fault.
    pub fn fail(&self, cause: DecodeError) -> bool {
        let mut state = self.state.lock();
        if state.terminal.is_some() {
            return false;
        }
        let fault = ScanOutcome::FatalFault {
            cause: cause.clone(),
        };
        for tx in state.subscribers.drain(..) {
            let _ = tx.send(fault.clone());
        }
        state.latest = None;
        state.terminal = Some(Termination::Faulted(cause));
        true
    }

    /// Terminates the subject without a fault.
    pub fn complete(&self) -> bool {
        let mut state = self.state.lock();
        if state.terminal.is_some() {
            return false;
        }
        state.subscribers.clear();
        state.terminal = Some(Termination::Completed);
        true
    }

    pub fn is_terminated(&self) -> bool {
        self.state.lock().terminal.is_some()
    }

    /// Most recent non-terminal outcome while the subject is live.
    pub fn latest(&self) -> Option<ScanOutcome> {
        self.state.lock().latest.clone()
    }

    pub fn subscribe(self: &Arc<Self>) -> ScanStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut guard = self.state.lock();
        let state = &mut *guard;
        match &state.terminal {
            Some(Termination::Faulted(cause)) => {
                let _ = tx.send(ScanOutcome::FatalFault {
                    cause: cause.clone(),
                });
            }
            Some(Termination::Completed) => {}
            None => {
                if let Some(latest) = &state.latest {
                    let _ = tx.send(latest.clone());
                }
                state.subscribers.push(tx);
            }
        }
        ScanStream {
            rx,
            subject: Arc::clone(self),
        }
    }
}

/// Subscription to one scan session's outcomes.
///
/// Yields outcomes in the order the decoder reported them. A
/// [`ScanOutcome::FatalFault`] is always the last item. The stream ends
/// when the session stops.
pub struct ScanStream {
    rx: mpsc::UnboundedReceiver<ScanOutcome>,
    subject: Arc<OutcomeSubject>,
}

impl ScanStream {
    /// True once the underlying session has completed or faulted. Items
    /// published before that may still be buffered.
    pub fn is_terminated(&self) -> bool {
        self.subject.is_terminated()
    }

    /// Opens another subscription to the same session.
    pub fn resubscribe(&self) -> ScanStream {
        self.subject.subscribe()
    }
}

impl Stream for ScanStream {
    type Item = ScanOutcome;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl std::fmt::Debug for ScanStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanStream")
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{BarcodeFormat, DecodedResult};
    use futures::StreamExt;

    fn success(text: &str) -> ScanOutcome {
        let mut payload = DecodedResult::new(text, BarcodeFormat::QrCode);
        payload.decoded_at = chrono::DateTime::<chrono::Utc>::MIN_UTC;
        ScanOutcome::Success { payload }
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_latest() {
        let subject = Arc::new(OutcomeSubject::new());
        subject.next(success("first"));
        subject.next(success("second"));

        let mut late = subject.subscribe();
        assert_eq!(late.next().await, Some(success("second")));
    }

    #[tokio::test]
    async fn test_fault_ends_all_streams() {
        let subject = Arc::new(OutcomeSubject::new());
        let mut early = subject.subscribe();

        subject.next(success("a"));
        assert!(subject.fail(DecodeError::device_lost("gone")));
        assert!(!subject.next(success("b")));

        assert_eq!(early.next().await, Some(success("a")));
        assert!(early.next().await.unwrap().is_fatal());
        assert_eq!(early.next().await, None);

        let mut late = subject.subscribe();
        assert!(late.next().await.unwrap().is_fatal());
        assert_eq!(late.next().await, None);
    }

    #[tokio::test]
    async fn test_complete_is_silent() {
        let subject = Arc::new(OutcomeSubject::new());
        let mut stream = subject.subscribe();

        assert!(subject.complete());
        assert!(!subject.fail(DecodeError::device_lost("late")));
        assert!(stream.is_terminated());
        assert_eq!(stream.next().await, None);
        assert_eq!(stream.resubscribe().next().await, None);
    }
}
