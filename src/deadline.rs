use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

/// Cooperative wall clock budget for a sort invocation.
///
/// Every inner loop of the engine calls [Deadline::tick] and unwinds
/// when it returns false. A tick increments a counter; every
/// `ticks_until_check`-th call compares the elapsed time against the
/// budget. Once the budget is exceeded the deadline is expired for
/// good and `tick` returns false forever after.
///
/// Worker threads receive their own clone, so tick counting stays
/// thread local. Clones share an expiry latch: when any copy expires,
/// every copy reports [Deadline::expired] at its next check, and the
/// driver aborts the invocation.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use record_file_sort::deadline::Deadline;
///
/// let mut unlimited = Deadline::unlimited();
/// assert!(unlimited.tick());
///
/// let mut bounded = Deadline::new(Duration::from_secs(30), 1024);
/// assert!(bounded.tick());
/// ```
#[derive(Clone, Debug)]
pub struct Deadline {
    budget: Option<Budget>,
}

#[derive(Clone, Debug)]
struct Budget {
    ticks_until_check: u64,
    time_budget: Duration,
    start: Instant,
    current_ticks: u64,
    expired: bool,
    latch: Arc<AtomicBool>,
}

impl Deadline {
    /// A deadline that never expires; its tick is a no-op.
    pub fn unlimited() -> Deadline {
        Deadline {
            budget: None,
        }
    }

    /// A deadline that expires `time_budget` after [Deadline::restart],
    /// checking the clock every `ticks_until_check` ticks.
    pub fn new(time_budget: Duration, ticks_until_check: u64) -> Deadline {
        Deadline {
            budget: Some(
                Budget {
                    ticks_until_check: ticks_until_check.max(1),
                    time_budget,
                    start: Instant::now(),
                    current_ticks: 0,
                    expired: false,
                    latch: Arc::new(AtomicBool::new(false)),
                }
            ),
        }
    }

    /// Restart the clock and clear any previous expiry. Called by the
    /// sort entry point so the budget counts from the start of the
    /// invocation rather than from construction.
    pub(crate) fn restart(&mut self) {
        if let Some(budget) = &mut self.budget {
            budget.start = Instant::now();
            budget.current_ticks = 0;
            budget.expired = false;
            budget.latch = Arc::new(AtomicBool::new(false));
        }
    }

    /// Advance the tick counter, checking the clock on every
    /// `ticks_until_check`-th call. Returns false once the budget is
    /// exhausted, and keeps returning false.
    #[inline]
    pub fn tick(&mut self) -> bool {
        match &mut self.budget {
            None => true,
            Some(budget) => budget.tick(),
        }
    }

    /// Whether this copy, or any other copy of the same deadline, has
    /// run out of budget.
    pub fn expired(&self) -> bool {
        match &self.budget {
            None => false,
            Some(budget) => budget.expired || budget.latch.load(Ordering::Relaxed),
        }
    }
}

impl Budget {
    fn tick(&mut self) -> bool {
        self.current_ticks += 1;
        if self.expired {
            return false;
        }
        if self.current_ticks < self.ticks_until_check {
            return true;
        }
        self.current_ticks = 0;
        if self.latch.load(Ordering::Relaxed) || self.start.elapsed() > self.time_budget {
            self.expired = true;
            self.latch.store(true, Ordering::Relaxed);
            return false;
        }
        true
    }
}
