//! Retry-guarded listener acquisition tied to the daemon lifecycle
//!
//! A [`BindLifecycle`] walks through
//! `Unbound -> Binding -> Bound -> Unbinding -> Closed`:
//!
//! - it waits for the lifecycle's ready gate, then retries [`Binder::bind`]
//!   with backoff until it succeeds or the retry budget runs out;
//! - once bound it holds the [`BindHandle`] until the stop signal fires and
//!   then releases it exactly once.
//!
//! A stop that arrives before the gate opens ends the lifecycle without ever
//! binding. A stop that arrives while binding is remembered: the listener is
//! released as soon as a bind succeeds.

use crate::lifecycle::Lifecycle;
use crate::retry::{Retry, RetryAttempt, RetryPolicy};
use async_trait::async_trait;
use ferry_core::{Error, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Bind lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindState {
    /// Waiting for the ready gate
    Unbound,
    /// Attempting to acquire the listener
    Binding,
    /// Listener acquired
    Bound,
    /// Releasing the listener
    Unbinding,
    /// Terminal; nothing is held
    Closed,
}

impl fmt::Display for BindState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbound => write!(f, "unbound"),
            Self::Binding => write!(f, "binding"),
            Self::Bound => write!(f, "bound"),
            Self::Unbinding => write!(f, "unbinding"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Active listener owned by a [`BindLifecycle`]
pub trait BindHandle: Send {
    /// Stop listening and free the socket
    fn release(self) -> Result<()>;
}

/// Acquires one listener per call
#[async_trait]
pub trait Binder: Send + Sync {
    /// Handle returned on success
    type Handle: BindHandle;

    /// Human-readable target, e.g. `udp://0.0.0.0:25826`
    fn target(&self) -> String;

    /// Try once to acquire the listener
    async fn bind(&self) -> Result<Self::Handle>;
}

/// Receives bind lifecycle events
#[cfg_attr(test, mockall::automock)]
pub trait BindObserver: Send + Sync {
    /// A bind attempt succeeded
    fn bound(&self, target: &str, attempt: u32);

    /// A bind attempt failed and will be retried after `delay`
    fn attempt_failed(&self, target: &str, attempt: u32, delay: Duration, error: &Error);

    /// The retry budget ran out
    fn gave_up(&self, target: &str, attempts: u32, error: &Error);

    /// The listener is being released
    fn unbinding(&self, target: &str);

    /// Releasing the listener failed; shutdown continues regardless
    fn release_failed(&self, target: &str, error: &Error);
}

/// Observer that reports every event through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl BindObserver for TracingObserver {
    fn bound(&self, target: &str, attempt: u32) {
        info!(address = %target, attempt, "Bind on {} (attempt {})", target, attempt);
    }

    fn attempt_failed(&self, target: &str, attempt: u32, delay: Duration, error: &Error) {
        error!(
            address = %target,
            attempt,
            delay = ?delay,
            error = %error,
            "Failed to bind {} (attempt {}), retry in {:?}",
            target,
            attempt,
            delay
        );
    }

    fn gave_up(&self, target: &str, attempts: u32, error: &Error) {
        error!(address = %target, attempts, error = %error, "Giving up binding {}", target);
    }

    fn unbinding(&self, target: &str) {
        info!(address = %target, "Unbinding {}", target);
    }

    fn release_failed(&self, target: &str, error: &Error) {
        error!(address = %target, error = %error, "Failed to release {}", target);
    }
}

/// Retry-guarded bind of a single listener
pub struct BindLifecycle<B: Binder> {
    binder: B,
    lifecycle: Lifecycle,
    policy: RetryPolicy,
    observer: Arc<dyn BindObserver>,
    state: watch::Sender<BindState>,
}

impl<B: Binder> fmt::Debug for BindLifecycle<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindLifecycle")
            .field("target", &self.binder.target())
            .field("policy", &self.policy)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

impl<B: Binder> BindLifecycle<B> {
    /// Create a lifecycle for `binder`, gated and stopped by `lifecycle`
    pub fn new(binder: B, lifecycle: Lifecycle) -> Self {
        let (state, _) = watch::channel(BindState::Unbound);
        Self {
            binder,
            lifecycle,
            policy: RetryPolicy::default(),
            observer: Arc::new(TracingObserver),
            state,
        }
    }

    /// Set the retry policy
    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the default tracing observer
    pub fn observer(mut self, observer: Arc<dyn BindObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<BindState> {
        self.state.subscribe()
    }

    /// Current state
    pub fn state(&self) -> BindState {
        *self.state.borrow()
    }

    /// Drive the lifecycle until it is closed
    ///
    /// Returns `Err(Error::RetryExhausted)` if the retry budget ran out
    /// before a bind succeeded. Release failures are reported to the
    /// observer and never returned.
    pub async fn run(self) -> Result<()> {
        let target = self.binder.target();
        let stopping = self.lifecycle.stopping();
        let observer = Arc::clone(&self.observer);

        let retry = Retry::new(self.policy.clone())
            .depend_on(self.lifecycle.ready_gate())
            .on_error(|a: &RetryAttempt<'_, Error>| {
                observer.attempt_failed(&target, a.attempt, a.delay, a.error);
            });

        let binder = &self.binder;
        let state = &self.state;
        let address = target.as_str();
        let attempts = retry.run(move |attempt| {
            state.send_if_modified(|s| {
                let changed = *s != BindState::Binding;
                *s = BindState::Binding;
                changed
            });
            debug!(address, attempt, "Binding");
            binder.bind()
        });
        tokio::pin!(attempts);

        // Stop is polled first: a stop issued before the gate opens must win
        // over the first attempt.
        let outcome = tokio::select! {
            biased;
            _ = stopping.cancelled() => {
                if *state.borrow() == BindState::Unbound {
                    debug!(address = %target, "Stopped before binding started");
                    state.send_replace(BindState::Closed);
                    return Ok(());
                }
                debug!(address = %target, "Stop requested while binding, will unbind once bound");
                attempts.await
            }
            outcome = &mut attempts => outcome,
        };

        let handle = match outcome {
            Ok(done) => {
                state.send_replace(BindState::Bound);
                self.observer.bound(&target, done.attempts);
                done.value
            }
            Err(exhausted) => {
                self.observer.gave_up(&target, exhausted.attempts, &exhausted.error);
                state.send_replace(BindState::Closed);
                return Err(Error::RetryExhausted {
                    attempts: exhausted.attempts,
                    source: Box::new(exhausted.error),
                });
            }
        };

        // Resolves immediately if stop already fired while binding
        stopping.cancelled().await;

        state.send_replace(BindState::Unbinding);
        self.observer.unbinding(&target);

        if let Err(e) = handle.release() {
            self.observer.release_failed(&target, &e);
        }

        state.send_replace(BindState::Closed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Default)]
    struct Releases(AtomicU32);

    struct FakeHandle {
        releases: Arc<Releases>,
        fail: bool,
    }

    impl BindHandle for FakeHandle {
        fn release(self) -> Result<()> {
            self.releases.0.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Error::Runtime("release failed".to_string()))
            } else {
                Ok(())
            }
        }
    }

    /// Fails the first `failures` attempts, then succeeds
    struct FlakyBinder {
        failures: u32,
        calls: AtomicU32,
        releases: Arc<Releases>,
        fail_release: bool,
    }

    impl FlakyBinder {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                releases: Arc::new(Releases::default()),
                fail_release: false,
            }
        }
    }

    #[async_trait]
    impl Binder for FlakyBinder {
        type Handle = FakeHandle;

        fn target(&self) -> String {
            "tcp://127.0.0.1:9".to_string()
        }

        async fn bind(&self) -> Result<FakeHandle> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(Error::bind(
                    self.target(),
                    std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use"),
                ));
            }
            Ok(FakeHandle {
                releases: Arc::clone(&self.releases),
                fail: self.fail_release,
            })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Bound(u32),
        Failed(u32, Duration),
        GaveUp(u32),
        Unbinding,
        ReleaseFailed,
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Event>>);

    impl Recorder {
        fn events(&self) -> Vec<Event> {
            self.0.lock().clone()
        }
    }

    impl BindObserver for Recorder {
        fn bound(&self, _: &str, attempt: u32) {
            self.0.lock().push(Event::Bound(attempt));
        }
        fn attempt_failed(&self, _: &str, attempt: u32, delay: Duration, _: &Error) {
            self.0.lock().push(Event::Failed(attempt, delay));
        }
        fn gave_up(&self, _: &str, attempts: u32, _: &Error) {
            self.0.lock().push(Event::GaveUp(attempts));
        }
        fn unbinding(&self, _: &str) {
            self.0.lock().push(Event::Unbinding);
        }
        fn release_failed(&self, _: &str, _: &Error) {
            self.0.lock().push(Event::ReleaseFailed);
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            multiplier: 2.0,
            timeout: None,
        }
    }

    async fn wait_for_state(rx: &mut watch::Receiver<BindState>, wanted: BindState) {
        rx.wait_for(|s| *s == wanted).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_bind_after_two_failures() {
        let lifecycle = Lifecycle::new();
        let binder = FlakyBinder::new(2);
        let releases = Arc::clone(&binder.releases);
        let recorder = Arc::new(Recorder::default());

        let bind = BindLifecycle::new(binder, lifecycle.clone())
            .policy(policy())
            .observer(recorder.clone());
        let mut states = bind.subscribe();
        let task = tokio::spawn(bind.run());

        lifecycle.mark_ready();
        wait_for_state(&mut states, BindState::Bound).await;

        let events = recorder.events();
        assert_eq!(
            events,
            vec![
                Event::Failed(1, Duration::from_millis(100)),
                Event::Failed(2, Duration::from_millis(200)),
                Event::Bound(3),
            ]
        );
        assert_eq!(releases.0.load(Ordering::SeqCst), 0);

        lifecycle.stop();
        task.await.unwrap().unwrap();

        assert_eq!(recorder.events().last(), Some(&Event::Unbinding));
        assert_eq!(releases.0.load(Ordering::SeqCst), 1);
        assert_eq!(*states.borrow(), BindState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_ready_never_binds() {
        let lifecycle = Lifecycle::new();
        let binder = FlakyBinder::new(0);
        let releases = Arc::clone(&binder.releases);

        let mut observer = MockBindObserver::new();
        observer.expect_bound().never();
        observer.expect_unbinding().never();
        observer.expect_attempt_failed().never();

        let bind = BindLifecycle::new(binder, lifecycle.clone()).observer(Arc::new(observer));
        let mut states = bind.subscribe();
        let task = tokio::spawn(bind.run());

        lifecycle.stop();
        task.await.unwrap().unwrap();

        // Marking ready afterwards has no effect
        lifecycle.mark_ready();

        assert_eq!(*states.borrow_and_update(), BindState::Closed);
        assert_eq!(releases.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_then_ready_before_first_poll_never_binds() {
        for _ in 0..64 {
            let lifecycle = Lifecycle::new();
            let binder = FlakyBinder::new(0);
            let releases = Arc::clone(&binder.releases);
            let recorder = Arc::new(Recorder::default());

            let bind = BindLifecycle::new(binder, lifecycle.clone()).observer(recorder.clone());
            let states = bind.subscribe();

            lifecycle.stop();
            lifecycle.mark_ready();
            bind.run().await.unwrap();

            assert!(recorder.events().is_empty());
            assert_eq!(releases.0.load(Ordering::SeqCst), 0);
            assert_eq!(*states.borrow(), BindState::Closed);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_while_binding_unbinds_immediately() {
        let lifecycle = Lifecycle::new();
        let binder = FlakyBinder::new(3);
        let releases = Arc::clone(&binder.releases);
        let recorder = Arc::new(Recorder::default());

        let bind = BindLifecycle::new(binder, lifecycle.clone())
            .policy(policy())
            .observer(recorder.clone());
        let mut states = bind.subscribe();
        let task = tokio::spawn(bind.run());

        lifecycle.mark_ready();
        wait_for_state(&mut states, BindState::Binding).await;
        lifecycle.stop();

        task.await.unwrap().unwrap();

        let events = recorder.events();
        assert_eq!(events.len(), 5);
        assert_eq!(events[3], Event::Bound(4));
        assert_eq!(events[4], Event::Unbinding);
        assert_eq!(releases.0.load(Ordering::SeqCst), 1);
        assert_eq!(*states.borrow(), BindState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_exhausted() {
        let lifecycle = Lifecycle::new();
        lifecycle.mark_ready();

        let mut observer = MockBindObserver::new();
        observer.expect_attempt_failed().times(2).return_const(());
        observer
            .expect_gave_up()
            .withf(|_, attempts, _| *attempts == 3)
            .times(1)
            .return_const(());
        observer.expect_bound().never();

        let bind = BindLifecycle::new(FlakyBinder::new(u32::MAX), lifecycle)
            .policy(policy().with_timeout(Some(Duration::from_millis(500))))
            .observer(Arc::new(observer));

        let err = bind.run().await.unwrap_err();
        assert!(matches!(err, Error::RetryExhausted { attempts: 3, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_failure_is_not_propagated() {
        let lifecycle = Lifecycle::new();
        lifecycle.mark_ready();

        let mut binder = FlakyBinder::new(0);
        binder.fail_release = true;
        let releases = Arc::clone(&binder.releases);
        let recorder = Arc::new(Recorder::default());

        let bind = BindLifecycle::new(binder, lifecycle.clone()).observer(recorder.clone());
        let mut states = bind.subscribe();
        let task = tokio::spawn(bind.run());

        wait_for_state(&mut states, BindState::Bound).await;
        lifecycle.stop();

        assert!(task.await.unwrap().is_ok());
        assert_eq!(
            recorder.events(),
            vec![Event::Bound(1), Event::Unbinding, Event::ReleaseFailed]
        );
        assert_eq!(releases.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(BindState::Unbound.to_string(), "unbound");
        assert_eq!(BindState::Unbinding.to_string(), "unbinding");
        assert_eq!(BindState::Closed.to_string(), "closed");
    }
}
