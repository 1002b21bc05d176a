use std::collections::VecDeque;

use rust_decimal::Decimal;
use tracing::info;

use crate::types::Direction;

/// Bounded sample window for each directional differential.
pub const DEFAULT_WINDOW: usize = 500;

/// Current analyzer readout, for CSV rows, heartbeats and status lines.
/// Diffs/means are zero until the first sample, matching the empty columns
/// the data log writes during startup.
#[derive(Clone, Copy, Debug, Default)]
pub struct SpreadStats {
    pub sample_count: u64,
    pub warmed_up: bool,
    pub diff_long: Decimal,
    pub diff_short: Decimal,
    pub avg_long: Decimal,
    pub avg_short: Decimal,
}

/// Rolling-window analyzer of the two directional differentials:
///
///   diff_long  = T.bid - M.ask   (buy cheap on M, sell rich on T)
///   diff_short = M.bid - T.ask   (sell rich on M, buy cheap on T)
///
/// A signal fires when the live differential exceeds its rolling mean by the
/// configured threshold. The threshold is relative so it adapts to a slowly
/// drifting basis between the venues; the absolute `min_spread` floor stops
/// trading on noise when the basis collapses.
pub struct SpreadAnalyzer {
    warmup_samples: u64,
    long_threshold: Decimal,
    short_threshold: Decimal,
    min_spread: Decimal,
    window: usize,

    long_history: VecDeque<Decimal>,
    short_history: VecDeque<Decimal>,
    long_sum: Decimal,
    short_sum: Decimal,

    sample_count: u64,
    warmed_up: bool,

    last_diff_long: Option<Decimal>,
    last_diff_short: Option<Decimal>,
}

impl SpreadAnalyzer {
    pub fn new(
        warmup_samples: u64,
        long_threshold: Decimal,
        short_threshold: Decimal,
        min_spread: Decimal,
    ) -> Self {
        Self::with_window(
            warmup_samples,
            long_threshold,
            short_threshold,
            min_spread,
            DEFAULT_WINDOW,
        )
    }

    pub fn with_window(
        warmup_samples: u64,
        long_threshold: Decimal,
        short_threshold: Decimal,
        min_spread: Decimal,
        window: usize,
    ) -> Self {
        Self {
            warmup_samples,
            long_threshold,
            short_threshold,
            min_spread,
            window,
            long_history: VecDeque::with_capacity(window),
            short_history: VecDeque::with_capacity(window),
            long_sum: Decimal::ZERO,
            short_sum: Decimal::ZERO,
            sample_count: 0,
            warmed_up: false,
            last_diff_long: None,
            last_diff_short: None,
        }
    }

    pub fn is_warmed_up(&self) -> bool {
        self.warmed_up
    }

    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    pub fn warmup_samples(&self) -> u64 {
        self.warmup_samples
    }

    /// Ingest one tick of top-of-book from both venues. O(1): the running
    /// sums are adjusted by the evicted and appended samples, and the means
    /// are taken over the post-eviction window.
    pub fn update(&mut self, m_bid: Decimal, m_ask: Decimal, t_bid: Decimal, t_ask: Decimal) {
        let diff_long = t_bid - m_ask;
        let diff_short = m_bid - t_ask;
        self.last_diff_long = Some(diff_long);
        self.last_diff_short = Some(diff_short);

        if self.long_history.len() == self.window {
            if let Some(evicted) = self.long_history.pop_front() {
                self.long_sum -= evicted;
            }
        }
        self.long_history.push_back(diff_long);
        self.long_sum += diff_long;

        if self.short_history.len() == self.window {
            if let Some(evicted) = self.short_history.pop_front() {
                self.short_sum -= evicted;
            }
        }
        self.short_history.push_back(diff_short);
        self.short_sum += diff_short;

        self.sample_count += 1;
        if !self.warmed_up && self.sample_count >= self.warmup_samples {
            self.warmed_up = true;
            info!(samples = self.sample_count, "spread warm-up complete");
        }
    }

    fn avg_long(&self) -> Option<Decimal> {
        if self.long_history.is_empty() {
            return None;
        }
        Some(self.long_sum / Decimal::from(self.long_history.len() as u64))
    }

    fn avg_short(&self) -> Option<Decimal> {
        if self.short_history.is_empty() {
            return None;
        }
        Some(self.short_sum / Decimal::from(self.short_history.len() as u64))
    }

    /// Trigger predicate. Returns no signal until warmed up. When both
    /// directions fire on the same tick (pathological books), the long leg
    /// wins deterministically.
    pub fn signal(&self) -> Option<Direction> {
        if !self.warmed_up {
            return None;
        }

        if let (Some(diff), Some(avg)) = (self.last_diff_long, self.avg_long()) {
            if diff > (avg + self.long_threshold).max(self.min_spread) {
                return Some(Direction::LongMaker);
            }
        }

        if let (Some(diff), Some(avg)) = (self.last_diff_short, self.avg_short()) {
            if diff > (avg + self.short_threshold).max(self.min_spread) {
                return Some(Direction::ShortMaker);
            }
        }

        None
    }

    pub fn stats(&self) -> SpreadStats {
        SpreadStats {
            sample_count: self.sample_count,
            warmed_up: self.warmed_up,
            diff_long: self.last_diff_long.unwrap_or_default(),
            diff_short: self.last_diff_short.unwrap_or_default(),
            avg_long: self.avg_long().unwrap_or_default(),
            avg_short: self.avg_short().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn feed_flat(an: &mut SpreadAnalyzer, n: usize, diff_long: Decimal, diff_short: Decimal) {
        // m_bid/m_ask chosen so t_bid - m_ask = diff_long and m_bid - t_ask = diff_short
        for _ in 0..n {
            an.update(
                dec!(30000) + diff_short,
                dec!(30010),
                dec!(30010) + diff_long,
                dec!(30000),
            );
        }
    }

    /// Scenario: Warmup of 3; feed diff_long samples {5, 6, 7}, then a tick
    /// where T.bid sits 20 over M.ask against a rolling mean of 6 and threshold 10.
    /// Expected: No signal during warm-up; LongMaker fires on the fourth tick.
    #[test]
    fn test_long_signal_fires_after_warmup() {
        let mut an = SpreadAnalyzer::new(3, dec!(10), dec!(10), dec!(0));
        for diff in [dec!(5), dec!(6), dec!(7)] {
            assert_eq!(an.signal(), None);
            an.update(dec!(29000), dec!(30010), dec!(30010) + diff, dec!(31000));
        }
        assert!(an.is_warmed_up());
        // M = {bid: 30000, ask: 30010}, T = {bid: 30030, ask: 30035}
        an.update(dec!(30000), dec!(30010), dec!(30030), dec!(30035));
        assert_eq!(an.signal(), Some(Direction::LongMaker));
    }

    /// Scenario: sample_count below warmup_samples with a hugely favorable differential.
    /// Expected: signal() stays None until count >= warmup_samples.
    #[test]
    fn test_no_signal_before_warmup() {
        let mut an = SpreadAnalyzer::new(100, dec!(10), dec!(10), dec!(0));
        feed_flat(&mut an, 99, dec!(500), dec!(-500));
        assert_eq!(an.signal(), None);
        assert!(!an.is_warmed_up());
        feed_flat(&mut an, 1, dec!(500), dec!(-500));
        assert!(an.is_warmed_up());
    }

    /// Scenario: A 4-sample window fed 10 samples of known values.
    /// Expected: The window never exceeds its bound and the mean always equals
    /// the arithmetic mean of the surviving samples (running-sum maintenance).
    #[test]
    fn test_window_eviction_keeps_mean_exact() {
        let mut an = SpreadAnalyzer::with_window(1, dec!(10), dec!(10), dec!(0), 4);
        for i in 1..=10u32 {
            let d = Decimal::from(i);
            an.update(dec!(30000), dec!(30010), dec!(30010) + d, dec!(31000));
            assert!(an.long_history.len() <= 4);
            let expect: Decimal = an.long_history.iter().copied().sum::<Decimal>()
                / Decimal::from(an.long_history.len() as u64);
            assert_eq!(an.avg_long().unwrap(), expect);
        }
        // Last 4 samples are 7, 8, 9, 10 → mean 8.5
        assert_eq!(an.avg_long().unwrap(), dec!(8.5));
    }

    /// Scenario: Baseline near zero, live diff_long = 15 over threshold 10, but
    /// min_spread = 20.
    /// Expected: The absolute floor suppresses the signal; raising the diff over
    /// the floor lets it fire.
    #[test]
    fn test_min_spread_floor() {
        let mut an = SpreadAnalyzer::new(2, dec!(10), dec!(10), dec!(20));
        feed_flat(&mut an, 2, dec!(0), dec!(-100));
        an.update(dec!(29900), dec!(30010), dec!(30025), dec!(31000)); // diff_long = 15
        assert_eq!(an.signal(), None);
        an.update(dec!(29900), dec!(30010), dec!(30035), dec!(31000)); // diff_long = 25
        assert_eq!(an.signal(), Some(Direction::LongMaker));
    }

    /// Scenario: A pathological tick where both predicates hold at once
    /// (crossed books across venues in both directions).
    /// Expected: LongMaker wins the tie deterministically.
    #[test]
    fn test_tie_break_prefers_long() {
        let mut an = SpreadAnalyzer::new(2, dec!(1), dec!(1), dec!(0));
        feed_flat(&mut an, 2, dec!(0), dec!(0));
        // t_bid far above m_ask AND m_bid far above t_ask
        an.update(dec!(30100), dec!(30010), dec!(30110), dec!(30000));
        assert_eq!(an.signal(), Some(Direction::LongMaker));
    }

    /// Scenario: Short-side trigger: M.bid exceeds T.ask beyond baseline + threshold.
    /// Expected: ShortMaker fires when only the short predicate holds.
    #[test]
    fn test_short_signal_fires() {
        let mut an = SpreadAnalyzer::new(2, dec!(10), dec!(10), dec!(0));
        feed_flat(&mut an, 2, dec!(-50), dec!(2));
        // diff_short = m_bid - t_ask = 30030 - 30010 = 20 > avg(2) + 10
        an.update(dec!(30030), dec!(30040), dec!(29980), dec!(30010));
        assert_eq!(an.signal(), Some(Direction::ShortMaker));
    }
}
