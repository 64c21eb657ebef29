//! Fixed-length smoothing window over the most recent samples.
//!
//! The controller never reacts to the latest sample directly: it uses the
//! maximum of the window, so a single spike keeps cooling engaged until it
//! has aged out of the window.

use std::{collections::VecDeque, fmt};

use crate::sensors::MilliCelsius;

#[derive(Debug, Clone)]
pub struct SlidingWindow {
    samples: VecDeque<MilliCelsius>,
}

impl SlidingWindow {
    /// Creates a window of `len` neutral (zero) samples.
    pub fn new(len: usize) -> Self {
        Self {
            samples: std::iter::repeat_n(MilliCelsius::ZERO, len).collect(),
        }
    }

    /// Enqueues `sample` at the tail and drops the head.
    ///
    /// A zero-length window stays empty.
    pub fn push(&mut self, sample: MilliCelsius) {
        self.samples.push_back(sample);
        self.samples.pop_front();
    }

    /// Maximum held sample, or zero for an empty window.
    pub fn representative(&self) -> MilliCelsius {
        self.samples
            .iter()
            .copied()
            .max()
            .unwrap_or(MilliCelsius::ZERO)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MilliCelsius> {
        self.samples.iter()
    }
}

impl fmt::Display for SlidingWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (idx, sample) in self.samples.iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", sample.millis())?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn c(celsius: i64) -> MilliCelsius {
        MilliCelsius::from_celsius(celsius)
    }

    fn contents(window: &SlidingWindow) -> Vec<i64> {
        window.iter().map(|s| s.millis()).collect()
    }

    #[test]
    fn starts_with_neutral_samples() {
        let window = SlidingWindow::new(3);
        assert_eq!(contents(&window), vec![0, 0, 0]);
        assert_eq!(window.representative(), MilliCelsius::ZERO);
    }

    #[test]
    fn push_is_strict_fifo() {
        let mut window = SlidingWindow::new(3);
        for t in [50, 50, 61, 52] {
            window.push(c(t));
        }
        assert_eq!(contents(&window), vec![50_000, 61_000, 52_000]);
    }

    #[test]
    fn spike_ages_out_after_window_length() {
        let mut window = SlidingWindow::new(3);
        window.push(c(61));
        assert_eq!(window.representative(), c(61));
        window.push(c(50));
        window.push(c(50));
        assert_eq!(window.representative(), c(61));
        window.push(c(50));
        assert_eq!(window.representative(), c(50));
    }

    #[test]
    fn zero_length_window_stays_empty() {
        let mut window = SlidingWindow::new(0);
        window.push(c(80));
        assert!(window.is_empty());
        assert_eq!(window.representative(), MilliCelsius::ZERO);
    }

    #[test]
    fn display_lists_raw_millis() {
        let mut window = SlidingWindow::new(2);
        window.push(c(41));
        assert_eq!(window.to_string(), "[0 41000]");
    }

    proptest! {
        #[test]
        fn length_never_changes(
            len in 0usize..16,
            samples in prop::collection::vec(-20_000i64..150_000, 0..64)
        ) {
            let mut window = SlidingWindow::new(len);
            for s in samples {
                window.push(MilliCelsius(s));
                prop_assert_eq!(window.len(), len);
            }
        }

        #[test]
        fn representative_is_max_of_last_samples(
            len in 1usize..10,
            samples in prop::collection::vec(0i64..150_000, 1..64)
        ) {
            let mut window = SlidingWindow::new(len);
            for &s in &samples {
                window.push(MilliCelsius(s));
            }
            let tail = &samples[samples.len().saturating_sub(len)..];
            let mut expected = tail.iter().copied().max().unwrap_or(0);
            if samples.len() < len {
                expected = expected.max(0);
            }
            prop_assert_eq!(window.representative(), MilliCelsius(expected));
        }
    }
}
