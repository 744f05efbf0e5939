use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of "k distinct indices from [0, n)". Every random choice in a run
/// goes through this so a seed reproduces the whole dataset.
pub trait IndexSampler {
    fn sample(&mut self, n: usize, k: usize) -> Vec<usize>;
}

pub struct SeededSampler {
    seed: u64,
    rng: StdRng,
}

impl SeededSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seeds from the thread RNG; the chosen seed is still reported.
    pub fn from_entropy_seed() -> Self {
        Self::new(rand::thread_rng().gen())
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl IndexSampler for SeededSampler {
    fn sample(&mut self, n: usize, k: usize) -> Vec<usize> {
        rand::seq::index::sample(&mut self.rng, n, k.min(n)).into_vec()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSplit<T> {
    pub test: Vec<T>,
    pub train: Vec<T>,
}

/// Number of test videos for `test_pct` percent of `count` videos, rounded down.
pub fn test_count(test_pct: u32, count: usize) -> usize {
    (test_pct as usize * count) / 100
}

/// Picks `floor(test_pct * N / 100)` test videos at random; the rest, in
/// listing order, are train. Test videos are returned in listing order too.
pub fn split_videos<T: Clone>(
    videos: &[T],
    test_pct: u32,
    sampler: &mut dyn IndexSampler,
) -> VideoSplit<T> {
    let mut test_idx = sampler.sample(videos.len(), test_count(test_pct, videos.len()));
    test_idx.sort_unstable();

    let mut is_test = vec![false; videos.len()];
    for &i in &test_idx {
        is_test[i] = true;
    }

    let test = test_idx.iter().map(|&i| videos[i].clone()).collect();
    let train = videos
        .iter()
        .zip(&is_test)
        .filter(|(_, t)| !**t)
        .map(|(v, _)| v.clone())
        .collect();

    VideoSplit { test, train }
}

/// How many test clips move to validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationSize {
    /// One fifth of the test clips, at most `cap`.
    Fraction { cap: usize },
    /// A fixed count, clamped to what exists.
    Fixed(usize),
}

impl ValidationSize {
    pub fn count(self, test_clips: usize) -> usize {
        match self {
            ValidationSize::Fraction { cap } => cap.min(test_clips / 5),
            ValidationSize::Fixed(n) => n.min(test_clips),
        }
    }
}

/// Chooses which of `clips` (by position) move to validation.
pub fn pick_validation(
    clips: &[String],
    size: ValidationSize,
    sampler: &mut dyn IndexSampler,
) -> Vec<String> {
    sampler
        .sample(clips.len(), size.count(clips.len()))
        .into_iter()
        .map(|i| clips[i].clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("v{:02}.mp4", i)).collect()
    }

    #[test]
    fn split_sizes_follow_floor_of_percentage() {
        let mut s = SeededSampler::new(7);
        let split = split_videos(&names(20), 10, &mut s);
        assert_eq!(split.test.len(), 2);
        assert_eq!(split.train.len(), 18);

        let split = split_videos(&names(9), 10, &mut s);
        assert_eq!(split.test.len(), 0);
        assert_eq!(split.train.len(), 9);

        assert_eq!(test_count(25, 10), 2);
        assert_eq!(test_count(100, 3), 3);
    }

    #[test]
    fn split_is_disjoint_and_complete() {
        let videos = names(37);
        let mut s = SeededSampler::new(99);
        let split = split_videos(&videos, 30, &mut s);

        let test: HashSet<_> = split.test.iter().collect();
        let train: HashSet<_> = split.train.iter().collect();
        assert!(test.is_disjoint(&train));
        assert_eq!(test.len() + train.len(), videos.len());

        // Train keeps listing order.
        let mut sorted = split.train.clone();
        sorted.sort();
        assert_eq!(split.train, sorted);
    }

    #[test]
    fn same_seed_same_split() {
        let videos = names(50);
        let a = split_videos(&videos, 20, &mut SeededSampler::new(1234));
        let b = split_videos(&videos, 20, &mut SeededSampler::new(1234));
        assert_eq!(a, b);
    }

    #[test]
    fn validation_size_rules() {
        assert_eq!(ValidationSize::Fraction { cap: 100 }.count(30), 6);
        assert_eq!(ValidationSize::Fraction { cap: 100 }.count(4), 0);
        assert_eq!(ValidationSize::Fraction { cap: 100 }.count(10_000), 100);
        assert_eq!(ValidationSize::Fixed(100).count(250), 100);
        assert_eq!(ValidationSize::Fixed(100).count(40), 40);
    }

    #[test]
    fn validation_picks_distinct_existing_names() {
        let clips = (0..30).map(|i| i.to_string()).collect::<Vec<_>>();
        let mut s = SeededSampler::new(5);
        let picked = pick_validation(&clips, ValidationSize::Fraction { cap: 100 }, &mut s);

        assert_eq!(picked.len(), 6);
        let unique: HashSet<_> = picked.iter().collect();
        assert_eq!(unique.len(), 6);
        assert!(picked.iter().all(|p| clips.contains(p)));
    }

    struct FirstK;

    impl IndexSampler for FirstK {
        fn sample(&mut self, n: usize, k: usize) -> Vec<usize> {
            (0..k.min(n)).collect()
        }
    }

    #[test]
    fn positions_map_to_listed_names() {
        // Names need not equal positions.
        let clips = vec!["3".to_string(), "8".to_string(), "42".to_string()];
        let picked = pick_validation(&clips, ValidationSize::Fixed(2), &mut FirstK);
        assert_eq!(picked, vec!["3", "8"]);
    }
}
