use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

static LAST_TICK: AtomicI64 = AtomicI64::new(0);

// Nanosecond clock reading, bumped past the previous one if the clock
// has not advanced (or went backwards) since the last id was issued.
fn next_tick() -> i64 {
    let now = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
    let mut last = LAST_TICK.load(Ordering::Relaxed);
    loop {
        let next = if now > last { now } else { last + 1 };
        match LAST_TICK.compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

fn prefixed(prefix: &str) -> String {
    format!("{}-{}", prefix, next_tick())
}

pub fn new_run_id() -> String {
    prefixed("run")
}

pub fn new_task_id() -> String {
    prefixed("task")
}

pub fn new_id() -> String {
    prefixed("id")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_prefixes() {
        assert!(new_run_id().starts_with("run-"));
        assert!(new_task_id().starts_with("task-"));
        assert!(new_id().starts_with("id-"));
    }

    #[test]
    fn test_ids_unique_in_a_tight_loop() {
        let ids: HashSet<String> = (0..10_000).map(|_| new_task_id()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_ids_unique_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| (0..1_000).map(|_| new_id()).collect::<Vec<_>>()))
            .collect();
        let mut all = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(all.insert(id));
            }
        }
    }
}
