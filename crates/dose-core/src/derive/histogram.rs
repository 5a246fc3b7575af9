//! Aggregate adherence histogram and headline statistics.

use crate::models::{AggregateStats, Histogram, HistogramBucket, Subject};

/// Inclusive (min, max) bounds of the five fixed buckets.
pub const BUCKET_BOUNDS: [(u8, u8); 5] = [(0, 20), (21, 40), (41, 60), (61, 80), (81, 100)];

/// Percentage at or above which adherence counts as high.
pub const HIGH_ADHERENCE: u8 = 80;

/// Percentage below which adherence counts as low.
pub const LOW_ADHERENCE: u8 = 60;

/// Bucket index for a display percentage; boundary values go to the lower bucket.
pub fn bucket_index(percent: u8) -> usize {
    let percent = percent.min(100) as usize;
    if percent <= 20 {
        0
    } else {
        (percent - 1) / 20
    }
}

/// Round-half-up share of `part` in `total`, as a percentage; 0 when empty.
pub fn share_of(part: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let rounded = (part * 200 + total) / (2 * total);
    rounded.min(100) as u8
}

/// Bucket subjects by adherence percentage.
pub fn build_histogram(subjects: &[Subject]) -> Histogram {
    let total = subjects.len();
    let mut buckets: Vec<HistogramBucket> = BUCKET_BOUNDS
        .iter()
        .map(|&(min, max)| HistogramBucket {
            range: format!("{}-{}%", min, max),
            min,
            max,
            count: 0,
            percentage: 0,
            subjects: Vec::new(),
        })
        .collect();

    for subject in subjects {
        let bucket = &mut buckets[bucket_index(subject.adherence_percent)];
        bucket.count += 1;
        bucket.subjects.push(subject.summary());
    }

    for bucket in &mut buckets {
        bucket.percentage = share_of(bucket.count, total);
    }

    Histogram {
        total_subjects: total,
        buckets,
    }
}

/// Headline figures for the aggregate view.
pub fn aggregate_stats(subjects: &[Subject]) -> AggregateStats {
    let total = subjects.len();
    if total == 0 {
        return AggregateStats::default();
    }

    let sum: usize = subjects.iter().map(|s| s.adherence_percent as usize).sum();
    let high = subjects
        .iter()
        .filter(|s| s.adherence_percent >= HIGH_ADHERENCE)
        .count();
    let low = subjects
        .iter()
        .filter(|s| s.adherence_percent < LOW_ADHERENCE)
        .count();
    let excellent = subjects
        .iter()
        .filter(|s| bucket_index(s.adherence_percent) == BUCKET_BOUNDS.len() - 1)
        .count();

    AggregateStats {
        total_subjects: total,
        average_adherence: ((sum * 2 + total) / (2 * total)).min(100) as u8,
        high_adherence: high,
        low_adherence: low,
        high_share: share_of(high, total),
        low_share: share_of(low, total),
        excellent,
    }
}
