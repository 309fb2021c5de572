//! Utility functions for the demand_forecast crate

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Shuffle `0..n` with a seeded RNG and split it into (train, test) indices.
///
/// The test partition holds `ceil(n * test_ratio)` rows, capped so that at
/// least one row is left for training.
pub fn train_test_split(n: usize, test_ratio: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    if n < 2 || test_ratio <= 0.0 {
        return (indices, Vec::new());
    }

    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_size = ((n as f64 * test_ratio).ceil() as usize).clamp(1, n - 1);
    let train = indices.split_off(test_size);
    (train, indices)
}

/// Every calendar day from `start` to `end`, inclusive; empty when `start > end`
pub fn daily_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut current = start;
    while current <= end {
        days.push(current);
        current = match current.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }
    days
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sizes() {
        let (train, test) = train_test_split(100, 0.2, 42);
        assert_eq!(train.len(), 80);
        assert_eq!(test.len(), 20);

        let (train, test) = train_test_split(11, 0.2, 42);
        assert_eq!(test.len(), 3);
        assert_eq!(train.len(), 8);
    }

    #[test]
    fn test_split_covers_every_index_once() {
        let (train, test) = train_test_split(37, 0.2, 7);
        let mut all: Vec<usize> = train.iter().chain(test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..37).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_is_deterministic() {
        assert_eq!(train_test_split(50, 0.2, 42), train_test_split(50, 0.2, 42));
        assert_ne!(train_test_split(50, 0.2, 42), train_test_split(50, 0.2, 43));
    }

    #[test]
    fn test_daily_range() {
        let start = NaiveDate::from_ymd_opt(2024, 2, 27).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();

        let days = daily_range(start, end);
        assert_eq!(days.len(), 5);
        assert_eq!(days[2], NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(daily_range(start, start), vec![start]);
        assert!(daily_range(end, start).is_empty());
    }

    #[test]
    fn test_daily_range_ends_on_last_date() {
        let end = NaiveDate::MAX;
        let start = end.pred_opt().and_then(|d| d.pred_opt()).unwrap();

        assert_eq!(daily_range(start, end), vec![start, start.succ_opt().unwrap(), end]);
        assert_eq!(daily_range(end, end), vec![end]);
    }
}
