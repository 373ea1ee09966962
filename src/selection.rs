//! Selection policies that turn a directory snapshot into a display payload.
//!
//! Every policy is a pure function of the scanned records plus whatever the
//! caller supplies (offset, random source). `total` always counts every
//! scanned record, independent of how many URLs are returned.

use std::cmp::Ordering;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::config::Configuration;
use crate::scan::PhotoRecord;

/// Payload of the shuffle and rotation endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhotoSelection {
    pub photos: Vec<String>,
    pub total: usize,
}

impl PhotoSelection {
    /// Not enough photos yet; the client shows its collecting state.
    pub fn waiting(total: usize) -> Self {
        Self {
            photos: Vec::new(),
            total,
        }
    }
}

/// Payload of the sequential batch endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSelection {
    /// Zero-based index of the latest complete batch, `None` below one batch.
    pub batch_index: Option<usize>,
    pub photos: Vec<String>,
    pub total: usize,
}

impl BatchSelection {
    pub fn waiting(total: usize) -> Self {
        Self {
            batch_index: None,
            photos: Vec::new(),
            total,
        }
    }
}

/// Which endpoint payload [`preview`] renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Policy {
    Shuffle,
    Rotation,
    Batch,
}

/// Run `policy` once over `records` with the configured sizes.
///
/// Produces the same JSON the matching endpoint would serve. `offset` only
/// matters for [`Policy::Rotation`].
pub fn preview(
    records: &[PhotoRecord],
    cfg: &Configuration,
    policy: Policy,
    offset: i64,
) -> serde_json::Result<serde_json::Value> {
    match policy {
        Policy::Shuffle => {
            let mut rng = shuffle_rng(cfg.shuffle_seed);
            serde_json::to_value(shuffle(records, cfg.shuffle_count, &mut rng))
        }
        Policy::Rotation => serde_json::to_value(rotation(records, offset, cfg.rotation_window)),
        Policy::Batch => serde_json::to_value(sequential_batch(records, cfg.batch_size)),
    }
}

/// Random source for [`shuffle`]: seeded when `seed` is set, otherwise from the OS.
pub fn shuffle_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Return `count` photos drawn uniformly at random, or none while fewer than
/// `count` exist.
///
/// The whole list is shuffled (Fisher-Yates) before the first `count` URLs are
/// taken, so every subset and order is equally likely.
pub fn shuffle<R: Rng + ?Sized>(
    records: &[PhotoRecord],
    count: usize,
    rng: &mut R,
) -> PhotoSelection {
    let total = records.len();
    if total < count {
        return PhotoSelection::waiting(total);
    }
    let mut urls: Vec<&str> = records.iter().map(|r| r.url.as_str()).collect();
    urls.shuffle(rng);
    PhotoSelection {
        photos: urls.into_iter().take(count).map(str::to_owned).collect(),
        total,
    }
}

/// Return `window` photos, newest first, starting at `offset` and wrapping
/// around the end of the list.
///
/// Ties on modification time are ordered by file name so the result does not
/// depend on directory enumeration order.
pub fn rotation(records: &[PhotoRecord], offset: i64, window: usize) -> PhotoSelection {
    let total = records.len();
    if total == 0 || total < window {
        return PhotoSelection::waiting(total);
    }
    let mut newest_first: Vec<&PhotoRecord> = records.iter().collect();
    newest_first.sort_by(|a, b| newest_first_order(a, b));
    let photos = (0..window)
        .map(|step| newest_first[wrap_index(offset, step, total)].url.clone())
        .collect();
    PhotoSelection { photos, total }
}

/// Return the latest complete batch of `batch_size` photos on the
/// creation-time timeline.
///
/// The visible batch only moves when `total` crosses a multiple of
/// `batch_size`; batches skipped by a burst of uploads are never shown.
pub fn sequential_batch(records: &[PhotoRecord], batch_size: usize) -> BatchSelection {
    let total = records.len();
    if batch_size == 0 || total < batch_size {
        return BatchSelection::waiting(total);
    }
    let mut timeline: Vec<&PhotoRecord> = records.iter().collect();
    timeline.sort_by(|a, b| oldest_created_first_order(a, b));

    let batch_index = total / batch_size - 1;
    let start = batch_index * batch_size;
    let photos = timeline[start..start + batch_size]
        .iter()
        .map(|r| r.url.clone())
        .collect();
    BatchSelection {
        batch_index: Some(batch_index),
        photos,
        total,
    }
}

/// Map `offset + step` onto `[0, total)`.
///
/// Euclidean remainder keeps negative offsets in range: `-1` maps to
/// `total - 1`. The sum is taken in `i128` so extreme offsets cannot overflow.
///
/// # Panics
/// Panics if `total` is zero.
pub fn wrap_index(offset: i64, step: usize, total: usize) -> usize {
    assert!(total > 0, "wrap_index over an empty list");
    let sum = i128::from(offset) + step as i128;
    sum.rem_euclid(total as i128) as usize
}

fn newest_first_order(a: &PhotoRecord, b: &PhotoRecord) -> Ordering {
    b.modified_at
        .cmp(&a.modified_at)
        .then_with(|| a.name.cmp(&b.name))
}

fn oldest_created_first_order(a: &PhotoRecord, b: &PhotoRecord) -> Ordering {
    a.created_at
        .cmp(&b.created_at)
        .then_with(|| a.name.cmp(&b.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::{Duration, SystemTime};

    fn record(name: &str, modified_secs: u64, created_secs: u64) -> PhotoRecord {
        PhotoRecord {
            name: name.to_string(),
            url: format!("/photos/{name}"),
            modified_at: SystemTime::UNIX_EPOCH + Duration::from_secs(modified_secs),
            created_at: SystemTime::UNIX_EPOCH + Duration::from_secs(created_secs),
        }
    }

    /// `count` photos where `p0` is the newest and the oldest created.
    fn timeline(count: usize) -> Vec<PhotoRecord> {
        (0..count)
            .map(|i| record(&format!("p{i}.jpg"), 10_000 - i as u64, 100 + i as u64))
            .collect()
    }

    fn urls(names: &[usize]) -> Vec<String> {
        names.iter().map(|i| format!("/photos/p{i}.jpg")).collect()
    }

    #[test]
    fn wrap_index_normalizes_negative_offsets() {
        assert_eq!(wrap_index(-1, 0, 10), 9);
        assert_eq!(wrap_index(-10, 0, 10), 0);
        assert_eq!(wrap_index(-11, 3, 10), 2);
        assert_eq!(wrap_index(23, 0, 10), 3);
    }

    #[test]
    fn wrap_index_handles_extreme_offsets() {
        assert!(wrap_index(i64::MIN, 0, 7) < 7);
        assert!(wrap_index(i64::MAX, 7, 7) < 7);
        assert_eq!(wrap_index(i64::MAX, 1, 2), 0);
    }

    #[test]
    fn rotation_from_zero_returns_newest_window() {
        let records = timeline(10);
        let sel = rotation(&records, 0, 8);
        assert_eq!(sel.total, 10);
        assert_eq!(sel.photos, urls(&[0, 1, 2, 3, 4, 5, 6, 7]));
    }

    #[test]
    fn rotation_wraps_past_the_end() {
        let records = timeline(10);
        let sel = rotation(&records, 9, 8);
        assert_eq!(sel.photos, urls(&[9, 0, 1, 2, 3, 4, 5, 6]));
        assert_eq!(rotation(&records, -1, 8), sel);
        assert_eq!(rotation(&records, 19, 8), sel);
    }

    #[test]
    fn rotation_ignores_input_order() {
        let mut records = timeline(10);
        records.reverse();
        assert_eq!(rotation(&records, 0, 8).photos, urls(&[0, 1, 2, 3, 4, 5, 6, 7]));
    }

    #[test]
    fn rotation_breaks_mtime_ties_by_name() {
        let mut records: Vec<PhotoRecord> = ["d.jpg", "b.jpg", "a.jpg", "c.jpg"]
            .iter()
            .map(|n| record(n, 50, 50))
            .collect();
        records.extend((0..4).map(|i| record(&format!("old{i}.jpg"), 10 - i, 10)));
        let sel = rotation(&records, 0, 8);
        assert_eq!(
            &sel.photos[..4],
            &["/photos/a.jpg", "/photos/b.jpg", "/photos/c.jpg", "/photos/d.jpg"]
        );
    }

    #[test]
    fn rotation_below_window_is_empty() {
        let sel = rotation(&timeline(7), 3, 8);
        assert_eq!(sel, PhotoSelection::waiting(7));
    }

    #[test]
    fn rotation_with_exactly_one_window_repeats_nothing() {
        let sel = rotation(&timeline(8), 5, 8);
        let unique: HashSet<_> = sel.photos.iter().collect();
        assert_eq!(unique.len(), 8);
    }

    #[test]
    fn batch_below_threshold_is_null() {
        let sel = sequential_batch(&timeline(15), 16);
        assert_eq!(sel, BatchSelection::waiting(15));
        let json = serde_json::to_value(&sel).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "batchIndex": null, "photos": [], "total": 15 })
        );
    }

    #[test]
    fn batch_boundaries_follow_total() {
        let sel = sequential_batch(&timeline(16), 16);
        assert_eq!(sel.batch_index, Some(0));
        assert_eq!(sel.photos, urls(&(0..16).collect::<Vec<_>>()));

        let sel = sequential_batch(&timeline(31), 16);
        assert_eq!(sel.batch_index, Some(0));
        assert_eq!(sel.total, 31);
        assert_eq!(sel.photos, urls(&(0..16).collect::<Vec<_>>()));

        let sel = sequential_batch(&timeline(32), 16);
        assert_eq!(sel.batch_index, Some(1));
        assert_eq!(sel.photos, urls(&(16..32).collect::<Vec<_>>()));
    }

    #[test]
    fn batch_jumps_over_skipped_batches() {
        let sel = sequential_batch(&timeline(50), 16);
        assert_eq!(sel.batch_index, Some(2));
        assert_eq!(sel.photos, urls(&(32..48).collect::<Vec<_>>()));
    }

    #[test]
    fn batch_orders_by_creation_not_modification() {
        // Created order is the reverse of modified order here.
        let records: Vec<PhotoRecord> = (0..16)
            .map(|i| record(&format!("p{i}.jpg"), 100 + i as u64, 1_000 - i as u64))
            .collect();
        let sel = sequential_batch(&records, 16);
        let expected: Vec<usize> = (0..16).rev().collect();
        assert_eq!(sel.photos, urls(&expected));
    }

    #[test]
    fn shuffle_below_count_is_empty() {
        let mut rng = shuffle_rng(Some(1));
        assert_eq!(shuffle(&timeline(15), 16, &mut rng), PhotoSelection::waiting(15));
    }

    #[test]
    fn shuffle_returns_exactly_count_distinct_photos() {
        let mut rng = shuffle_rng(Some(2));
        let records = timeline(16);
        let sel = shuffle(&records, 16, &mut rng);
        assert_eq!(sel.total, 16);
        assert_eq!(sel.photos.len(), 16);
        let unique: HashSet<_> = sel.photos.iter().collect();
        assert_eq!(unique.len(), 16);

        let sel = shuffle(&timeline(40), 16, &mut rng);
        assert_eq!(sel.total, 40);
        assert_eq!(sel.photos.len(), 16);
    }

    #[test]
    fn shuffle_is_reproducible_with_a_seed() {
        let records = timeline(30);
        let a = shuffle(&records, 16, &mut StdRng::seed_from_u64(99));
        let b = shuffle(&records, 16, &mut StdRng::seed_from_u64(99));
        assert_eq!(a, b);
    }
}
