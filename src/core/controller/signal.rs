use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Generation counter bumped on every resource or controller state change.
///
/// Waiters read the generation, check their condition, then sleep until the
/// generation moves or the poll interval runs out. The timeout covers state
/// changes made by code that never calls `notify`.
#[derive(Debug, Default)]
pub(crate) struct StateSignal {
    generation: Mutex<u64>,
    changed: Condvar,
}

impl StateSignal {
    pub(crate) fn generation(&self) -> u64 {
        *self.generation.lock()
    }

    pub(crate) fn notify(&self) {
        let mut generation = self.generation.lock();
        *generation = generation.wrapping_add(1);
        self.changed.notify_all();
    }

    /// Block until the generation differs from `seen` or `timeout` passes.
    pub(crate) fn wait_for_change(&self, seen: u64, timeout: Duration) {
        let mut generation = self.generation.lock();
        if *generation == seen {
            let _ = self.changed.wait_for(&mut generation, timeout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_stale_generation_returns_immediately() {
        let signal = StateSignal::default();
        let seen = signal.generation();
        signal.notify();
        let start = Instant::now();
        signal.wait_for_change(seen, Duration::from_secs(5));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_notify_wakes_waiter() {
        let signal = Arc::new(StateSignal::default());
        let seen = signal.generation();
        let notifier = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                signal.notify();
            })
        };
        let start = Instant::now();
        signal.wait_for_change(seen, Duration::from_secs(5));
        assert!(start.elapsed() < Duration::from_secs(4));
        notifier.join().unwrap();
    }

    #[test]
    fn test_timeout_without_notify() {
        let signal = StateSignal::default();
        let start = Instant::now();
        signal.wait_for_change(signal.generation(), Duration::from_millis(30));
        assert!(start.elapsed() >= Duration::from_millis(25));
    }
}
