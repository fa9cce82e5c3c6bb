//! Periodic deadline arithmetic.

/// Next instant on the grid `offset + k * period` strictly after `now_us`.
///
/// If `offset` itself is still in the future it is returned unchanged. A
/// zero `period` degenerates to `now_us + 1`, so callers never spin on the
/// same deadline.
///
/// ```
/// use maple_scheduler::compute_next_time_cadence;
///
/// assert_eq!(compute_next_time_cadence(100, 16, 500), 500);
/// assert_eq!(compute_next_time_cadence(1000, 16, 500), 1012);
/// assert_eq!(compute_next_time_cadence(1012, 16, 500), 1028);
/// ```
pub fn compute_next_time_cadence(now_us: u64, period_us: u64, offset_us: u64) -> u64 {
    if offset_us > now_us {
        return offset_us;
    }
    if period_us == 0 {
        return now_us.saturating_add(1);
    }
    let elapsed = now_us.saturating_sub(offset_us);
    let periods = (elapsed / period_us).saturating_add(1);
    offset_us.saturating_add(period_us.saturating_mul(periods))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_on_grid_moves_forward() {
        assert_eq!(compute_next_time_cadence(32, 16, 0), 48);
        assert_eq!(compute_next_time_cadence(0, 16, 0), 16);
    }

    #[test]
    fn test_between_grid_points() {
        assert_eq!(compute_next_time_cadence(33, 16, 0), 48);
        assert_eq!(compute_next_time_cadence(47, 16, 0), 48);
    }

    #[test]
    fn test_zero_period() {
        assert_eq!(compute_next_time_cadence(10, 0, 3), 11);
    }
}
