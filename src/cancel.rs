//! Cooperative cancellation shared between the daemon, the supervisor and
//! running build actions.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Flag {
    cancelled: Mutex<bool>,
    cond: Condvar,
}

impl Flag {
    fn set(&self) {
        let mut cancelled = self.cancelled.lock().unwrap_or_else(PoisonError::into_inner);
        *cancelled = true;
        self.cond.notify_all();
    }

    fn get(&self) -> bool {
        *self.cancelled.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A clonable cancellation signal.
///
/// A token created with [`CancelToken::child`] is cancelled when either it or
/// any of its ancestors is cancelled; cancelling the child leaves the parent
/// untouched.
#[derive(Debug, Clone)]
pub struct CancelToken {
    own: Arc<Flag>,
    ancestors: Vec<Arc<Flag>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            own: Arc::new(Flag::default()),
            ancestors: Vec::new(),
        }
    }

    pub fn child(&self) -> Self {
        let mut ancestors = self.ancestors.clone();
        ancestors.push(Arc::clone(&self.own));
        Self {
            own: Arc::new(Flag::default()),
            ancestors,
        }
    }

    pub fn cancel(&self) {
        self.own.set();
    }

    pub fn is_cancelled(&self) -> bool {
        self.own.get() || self.ancestors.iter().any(|flag| flag.get())
    }

    /// Sleep for `timeout` or until this token is cancelled.
    ///
    /// Returns `true` if the token was cancelled. Ancestor cancellation is
    /// noticed within a short polling slice.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        const SLICE: Duration = Duration::from_millis(200);

        // a deadline past the end of the clock means wait until cancelled
        let deadline = Instant::now().checked_add(timeout);
        let mut cancelled = self.own.cancelled.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if *cancelled || self.ancestors.iter().any(|flag| flag.get()) {
                return true;
            }
            let step = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    (deadline - now).min(SLICE)
                }
                None => SLICE,
            };
            cancelled = self
                .own
                .cond
                .wait_timeout(cancelled, step)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_new_token_is_not_cancelled() {
        assert!(!CancelToken::new().is_cancelled());
    }

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_child_follows_parent_but_not_reverse() {
        let parent = CancelToken::new();
        let child = parent.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());

        let other = parent.child();
        parent.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn test_wait_timeout_expires() {
        let token = CancelToken::new();
        let start = Instant::now();
        assert!(!token.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_wait_timeout_wakes_on_cancel() {
        let token = CancelToken::new();
        let remote = token.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });
        let start = Instant::now();
        assert!(token.wait_timeout(Duration::from_secs(30)));
        assert!(start.elapsed() < Duration::from_secs(10));
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_timeout_with_unbounded_duration() {
        let parent = CancelToken::new();
        let token = parent.child();
        let remote = parent.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });
        assert!(token.wait_timeout(Duration::from_secs(u64::MAX)));
        assert!(token.wait_timeout(Duration::MAX));
        handle.join().unwrap();
    }
}
