use std::fmt;

/// Offset into a video, in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }
}

/// Renders `HH:MM:SS`. Hours are not wrapped at 24 and may exceed two digits.
impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = self.0 / 3600;
        let minutes = (self.0 % 3600) / 60;
        let seconds = self.0 % 60;
        write!(f, "{:02}:{:02}:{:02}", hours, minutes, seconds)
    }
}

/// Timestamps for `count` frames: `initial_delay + i * interval`, produced lazily.
pub fn plan(
    count: u32,
    initial_delay: u64,
    interval: u64,
) -> impl ExactSizeIterator<Item = Timestamp> {
    (0..count).map(move |i| {
        Timestamp::from_secs(initial_delay.saturating_add(u64::from(i).saturating_mul(interval)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(timestamps: impl Iterator<Item = Timestamp>) -> Vec<String> {
        timestamps.map(|ts| ts.to_string()).collect()
    }

    #[test]
    fn plans_default_schedule() {
        assert_eq!(
            rendered(plan(3, 300, 180)),
            ["00:05:00", "00:08:00", "00:11:00"]
        );
    }

    #[test]
    fn zero_interval_repeats_the_initial_offset() {
        assert_eq!(rendered(plan(2, 61, 0)), ["00:01:01", "00:01:01"]);
    }

    #[test]
    fn zero_count_plans_nothing() {
        assert_eq!(plan(0, 300, 180).len(), 0);
    }

    #[test]
    fn offsets_follow_the_linear_formula() {
        let timestamps: Vec<_> = plan(50, 7, 13).collect();
        assert_eq!(timestamps.len(), 50);
        for (i, ts) in timestamps.iter().enumerate() {
            assert_eq!(ts.as_secs(), 7 + i as u64 * 13);
        }
        assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn hours_are_not_wrapped_or_truncated() {
        assert_eq!(Timestamp::from_secs(0).to_string(), "00:00:00");
        assert_eq!(Timestamp::from_secs(3599).to_string(), "00:59:59");
        assert_eq!(Timestamp::from_secs(25 * 3600).to_string(), "25:00:00");
        assert_eq!(Timestamp::from_secs(100 * 3600 + 61).to_string(), "100:01:01");
    }

    #[test]
    fn saturates_instead_of_overflowing() {
        let timestamps: Vec<_> = plan(3, u64::MAX - 1, u64::MAX).collect();
        assert_eq!(timestamps[2].as_secs(), u64::MAX);
    }

    #[test]
    fn huge_counts_are_planned_lazily() {
        let mut timestamps = plan(u32::MAX, 0, 60);
        assert_eq!(timestamps.len(), u32::MAX as usize);
        assert_eq!(timestamps.next(), Some(Timestamp::from_secs(0)));
        assert_eq!(timestamps.next(), Some(Timestamp::from_secs(60)));
        assert_eq!(timestamps.len(), u32::MAX as usize - 2);
    }
}
