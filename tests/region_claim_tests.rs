//! Concurrent claiming against one shared tracker.

use redaction_bot::models::{Region, RegionStatus};
use redaction_bot::test_helpers::MemoryTracker;
use redaction_bot::tracker::RegionScheduler;
use std::collections::HashSet;
use std::sync::Arc;

fn grid_tracker(size: i32) -> Arc<MemoryTracker> {
    let tracker = Arc::new(MemoryTracker::new());
    let mut id = 0;
    for lat in 0..size {
        for lon in 0..size {
            id += 1;
            tracker.add_region(Region::new(id, f64::from(lat), f64::from(lon)));
        }
    }
    tracker
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_never_conflict() {
    let tracker = grid_tracker(12);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let tracker = tracker.clone();
        handles.push(tokio::spawn(async move {
            let mut claimed = Vec::new();
            while let Some(region) = tracker.claim_next().await.unwrap() {
                claimed.push(region);
                tokio::task::yield_now().await;
            }
            claimed
        }));
    }

    let mut claimed = Vec::new();
    for handle in handles {
        claimed.extend(handle.await.unwrap());
    }

    let ids: HashSet<i64> = claimed.iter().map(|r| r.id).collect();
    assert_eq!(ids.len(), claimed.len(), "a region was claimed twice");
    assert!(!claimed.is_empty());

    // Nothing completes here, so every claimed region is still processing
    for (i, a) in claimed.iter().enumerate() {
        for b in &claimed[i + 1..] {
            assert!(!a.conflicts_with(b, 2.0), "{a} conflicts with {b}");
        }
    }
}

#[tokio::test]
async fn test_completed_neighbour_frees_region() {
    let tracker = Arc::new(MemoryTracker::new());
    tracker.add_region(Region::new(1, 0.0, 0.0));
    tracker.add_region(Region::new(2, 1.0, 1.0));

    let first = tracker.claim_next().await.unwrap().unwrap();
    assert!(tracker.claim_next().await.unwrap().is_none());

    tracker.mark_complete(&first).await.unwrap();
    let second = tracker.claim_next().await.unwrap().unwrap();
    assert_eq!(second.id, 2);
    assert_eq!(tracker.region_status(1), Some(RegionStatus::Complete));
}

#[tokio::test]
async fn test_failed_neighbour_frees_region() {
    let tracker = Arc::new(MemoryTracker::new());
    tracker.add_region(Region::new(1, 0.0, 0.0));
    tracker.add_region(Region::new(2, 0.0, 1.5));

    let first = tracker.claim_next().await.unwrap().unwrap();
    tracker.mark_failed(&first).await.unwrap();

    assert_eq!(tracker.claim_next().await.unwrap().map(|r| r.id), Some(2));
    // Failed regions are not reclaimed within a run
    assert!(tracker.claim_next().await.unwrap().is_none());
}
