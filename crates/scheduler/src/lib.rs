use std::fmt::Debug;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Totals of registration traffic seen by a [`FrameScheduler`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleCounts {
    pub registrations: u64,
    pub removals: u64,
}

/// Registry of recurring per-frame callbacks keyed by identity.
///
/// The host owns the frame loop: each tick it asks [`FrameScheduler::due`]
/// which keys should run and invokes the matching callback itself. Keys may be
/// scheduled and unscheduled from inside those callbacks because `due`
/// returns a snapshot rather than holding the lock while the host runs them.
pub struct FrameScheduler<K> {
    state: Mutex<SchedulerState<K>>,
}

struct SchedulerState<K> {
    entries: Vec<Entry<K>>,
    counts: ScheduleCounts,
}

struct Entry<K> {
    key: K,
    interval: Duration,
    last_run: Option<Instant>,
}

impl<K> Default for FrameScheduler<K> {
    fn default() -> Self {
        Self {
            state: Mutex::new(SchedulerState {
                entries: Vec::new(),
                counts: ScheduleCounts::default(),
            }),
        }
    }
}

impl<K: Clone + PartialEq + Debug> FrameScheduler<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `key` to run every tick once `interval` has elapsed since its
    /// last run. A zero interval runs it every tick. Re-scheduling an existing
    /// key only updates its interval and returns `false`.
    pub fn schedule(&self, key: K, interval: Duration) -> bool {
        let mut state = self.lock();
        if let Some(entry) = state.entries.iter_mut().find(|entry| entry.key == key) {
            tracing::trace!(?key, ?interval, "callback already scheduled; updating interval");
            entry.interval = interval;
            return false;
        }
        tracing::debug!(?key, ?interval, "scheduling frame callback");
        state.entries.push(Entry {
            key,
            interval,
            last_run: None,
        });
        state.counts.registrations += 1;
        true
    }

    /// Removes `key`; returns `false` when it was not scheduled.
    pub fn unschedule(&self, key: &K) -> bool {
        let mut state = self.lock();
        let before = state.entries.len();
        state.entries.retain(|entry| &entry.key != key);
        if state.entries.len() == before {
            return false;
        }
        tracing::debug!(?key, "unscheduled frame callback");
        state.counts.removals += 1;
        true
    }

    pub fn is_scheduled(&self, key: &K) -> bool {
        self.lock().entries.iter().any(|entry| &entry.key == key)
    }

    /// Keys currently registered, in registration order.
    pub fn scheduled(&self) -> Vec<K> {
        self.lock()
            .entries
            .iter()
            .map(|entry| entry.key.clone())
            .collect()
    }

    pub fn is_idle(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Returns the keys whose interval has elapsed at `now` and marks them as
    /// run. Entries are returned in registration order.
    pub fn due(&self, now: Instant) -> Vec<K> {
        let mut state = self.lock();
        let mut due = Vec::new();
        for entry in state.entries.iter_mut() {
            let ready = match entry.last_run {
                None => true,
                Some(last) => now.saturating_duration_since(last) >= entry.interval,
            };
            if ready {
                entry.last_run = Some(now);
                due.push(entry.key.clone());
            }
        }
        due
    }

    pub fn counts(&self) -> ScheduleCounts {
        self.lock().counts
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerState<K>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Task {
        Upload,
        Notify,
    }

    #[test]
    fn zero_interval_runs_every_tick() {
        let scheduler = FrameScheduler::new();
        assert!(scheduler.schedule(Task::Upload, Duration::ZERO));
        let mut now = Instant::now();
        assert_eq!(scheduler.due(now), vec![Task::Upload]);
        now += Duration::from_millis(16);
        assert_eq!(scheduler.due(now), vec![Task::Upload]);
        assert_eq!(scheduler.due(now), vec![Task::Upload]);
    }

    #[test]
    fn honours_interval_between_runs() {
        let scheduler = FrameScheduler::new();
        scheduler.schedule(Task::Notify, Duration::from_millis(100));
        let start = Instant::now();
        assert_eq!(scheduler.due(start), vec![Task::Notify]);
        assert!(scheduler.due(start + Duration::from_millis(50)).is_empty());
        assert_eq!(
            scheduler.due(start + Duration::from_millis(100)),
            vec![Task::Notify]
        );
    }

    #[test]
    fn rescheduling_updates_interval_only() {
        let scheduler = FrameScheduler::new();
        assert!(scheduler.schedule(Task::Upload, Duration::from_secs(5)));
        assert!(!scheduler.schedule(Task::Upload, Duration::ZERO));
        assert_eq!(scheduler.scheduled(), vec![Task::Upload]);
        assert_eq!(scheduler.counts().registrations, 1);

        let now = Instant::now();
        scheduler.due(now);
        assert_eq!(scheduler.due(now), vec![Task::Upload]);
    }

    #[test]
    fn unschedule_removes_and_counts() {
        let scheduler = FrameScheduler::new();
        scheduler.schedule(Task::Upload, Duration::ZERO);
        scheduler.schedule(Task::Notify, Duration::ZERO);
        assert!(scheduler.unschedule(&Task::Upload));
        assert!(!scheduler.unschedule(&Task::Upload));
        assert!(!scheduler.is_scheduled(&Task::Upload));
        assert_eq!(scheduler.scheduled(), vec![Task::Notify]);
        assert_eq!(
            scheduler.counts(),
            ScheduleCounts {
                registrations: 2,
                removals: 1
            }
        );
        scheduler.unschedule(&Task::Notify);
        assert!(scheduler.is_idle());
    }
}
