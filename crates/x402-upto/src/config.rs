//! Sweeper defaults (spec §4.3 trigger table).

#[derive(Debug, Clone, Copy)]
pub struct SweeperConfig {
    /// Tick cadence.
    pub tick_ms: u64,
    /// `idle_timeout` trigger threshold.
    pub idle_settle_ms: u64,
    /// `deadline_buffer` trigger threshold, in seconds-to-deadline.
    pub deadline_buffer_sec: u64,
    /// `cap_threshold` trigger numerator/denominator (default 9/10).
    pub cap_threshold_num: u128,
    pub cap_threshold_den: u128,
    /// Sessions idle this long are force-closed and evicted.
    pub long_idle_close_ms: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        SweeperConfig {
            tick_ms: 30_000,
            idle_settle_ms: 120_000,
            deadline_buffer_sec: 60,
            cap_threshold_num: 9,
            cap_threshold_den: 10,
            long_idle_close_ms: 1_800_000,
        }
    }
}
