use talos_core::Timestamp;

/// Time source driving a run.
///
/// The engine never computes step timestamps itself: it reads `now` at
/// the top of each step and calls `tick` once the step is done. A live
/// clock returns wall time and ignores ticks; a simulated clock advances
/// by its configured interval on each tick, which makes every price and
/// accrual a pure function of the step counter.
pub trait Clock: Send + Sync {
    /// Instant the current step is evaluated at
    fn now(&self) -> Timestamp;

    /// Advance to the next step instant. Wall clocks ignore this.
    fn tick(&self) {}
}
