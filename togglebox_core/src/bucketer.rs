//! Deterministic bucketing.
//!
//! Both flag rollout and experiment assignment hang off the same primitive: a stable hash of
//! `(seed key, subject id)` mapped onto `[0, 100)`. Because the hash is stable across processes
//! and languages, the same subject lands in the same bucket everywhere, which is what gives
//! sticky assignment without a persisted per-user table.
use md5;

/// Number of discrete shards the hash space is divided into. Scores have a granularity of
/// `100 / TOTAL_BUCKETS` percent.
pub const TOTAL_BUCKETS: u64 = 10_000;

pub trait Bucketer {
    fn get_shard(&self, input: impl AsRef<[u8]>, total_shards: u64) -> u64;

    /// Map `(seed_key, subject_id)` to a stable score in `[0, 100)`.
    ///
    /// The seed key is the entity key (flag key or experiment key), so a subject's bucket is
    /// independent between entities. Pure and total: empty strings are valid input.
    fn bucket(&self, seed_key: &str, subject_id: &str) -> f64 {
        let input = format!("{seed_key}:{subject_id}");
        self.get_shard(input, TOTAL_BUCKETS) as f64 * (100.0 / TOTAL_BUCKETS as f64)
    }
}

/// The default (and only) bucketer.
pub struct Md5Bucketer;

impl Bucketer for Md5Bucketer {
    fn get_shard(&self, input: impl AsRef<[u8]>, total_shards: u64) -> u64 {
        let hash = md5::compute(input);
        let value = u32::from_be_bytes(hash[0..4].try_into().unwrap());
        (value as u64) % total_shards
    }
}

#[cfg(test)]
mod tests {
    use super::{Bucketer, Md5Bucketer};

    #[test]
    fn bucket_is_stable_across_calls() {
        for id in ["user-1", "user-2", "", "日本語", "a:b:c"] {
            let first = Md5Bucketer.bucket("checkout-redesign", id);
            for _ in 0..10 {
                assert_eq!(Md5Bucketer.bucket("checkout-redesign", id), first);
            }
        }
    }

    #[test]
    fn bucket_is_in_range() {
        for i in 0..10_000 {
            let score = Md5Bucketer.bucket("some-flag", &format!("user-{i}"));
            assert!((0.0..100.0).contains(&score), "score {score} out of range");
        }
    }

    #[test]
    fn buckets_are_independent_between_seeds() {
        // A subject's bucket under one entity key must not predict its bucket under another.
        // Individual collisions are expected; wholesale agreement is not.
        let n = 1000;
        let same = (0..n)
            .filter(|i| {
                let id = format!("user-{i}");
                Md5Bucketer.bucket("experiment-a", &id) == Md5Bucketer.bucket("experiment-b", &id)
            })
            .count();
        assert!(same < n / 10, "{same}/{n} subjects bucketed identically");
    }

    #[test]
    fn bucket_distribution_is_approximately_uniform() {
        // Chi-square goodness-of-fit over 20 equal-width bins. Critical value for 19 degrees of
        // freedom at p=0.001 is 43.82; a correct implementation stays far below it.
        const BINS: usize = 20;
        const N: usize = 100_000;

        let mut counts = [0u32; BINS];
        for i in 0..N {
            let score = Md5Bucketer.bucket("uniformity", &format!("subject-{i}"));
            counts[(score / (100.0 / BINS as f64)) as usize] += 1;
        }

        let expected = (N / BINS) as f64;
        let chi_square: f64 = counts
            .iter()
            .map(|&observed| {
                let diff = observed as f64 - expected;
                diff * diff / expected
            })
            .sum();

        assert!(chi_square < 43.82, "chi-square {chi_square} rejects uniformity: {counts:?}");
    }

    #[test]
    fn empty_identifiers_are_valid() {
        let score = Md5Bucketer.bucket("", "");
        assert!((0.0..100.0).contains(&score));
        assert_eq!(Md5Bucketer.bucket("", ""), score);
    }
}
