use std::sync::Arc;
use std::time::{Duration, Instant};

use logweave::search::{GrepSource, REVERSE_SEARCH_OFFSET};
use logweave::{BookmarkKind, BookmarkStore, SearchDriver, SnapshotSource};

const TIMEOUT: Duration = Duration::from_secs(5);

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn rows(texts: &[&str]) -> Arc<SnapshotSource> {
    Arc::new(SnapshotSource::new(
        texts.iter().map(|t| t.to_string()).collect(),
    ))
}

/// Drain worker events until every worker reported completion.
fn drain_until_done(driver: &mut SearchDriver, bookmarks: &mut BookmarkStore) -> usize {
    let deadline = Instant::now() + TIMEOUT;
    let mut added = 0;
    loop {
        added += driver.drain_into(bookmarks);
        if !driver.is_searching() {
            return added;
        }
        assert!(Instant::now() < deadline, "search did not complete in time");
        std::thread::sleep(Duration::from_millis(2));
    }
}

fn search_rows(bookmarks: &BookmarkStore) -> Vec<usize> {
    bookmarks.get(BookmarkKind::Search).iter().collect()
}

#[test]
fn matches_stream_into_bookmarks() {
    init_logging();
    let source = rows(&["quiet", "an error here", "still quiet", "error again"]);
    let mut driver = SearchDriver::new();
    let mut bookmarks = BookmarkStore::new();

    driver.execute_search("error", source, 0).unwrap();
    let added = drain_until_done(&mut driver, &mut bookmarks);

    assert_eq!(added, 2);
    assert_eq!(search_rows(&bookmarks), vec![1, 3]);
    assert!(driver.compiled().is_some());
}

#[test]
fn search_is_case_insensitive() {
    init_logging();
    let source = rows(&["ERROR: disk full", "nothing"]);
    let mut driver = SearchDriver::new();
    let mut bookmarks = BookmarkStore::new();

    driver.execute_search("error", source, 0).unwrap();
    drain_until_done(&mut driver, &mut bookmarks);

    assert_eq!(search_rows(&bookmarks), vec![0]);
}

#[test]
fn invalid_regex_degrades_to_quoted_literal() {
    init_logging();
    let source = rows(&["token a(b appears", "ab without parens"]);
    let mut driver = SearchDriver::new();
    let mut bookmarks = BookmarkStore::new();

    driver.execute_search("a(b", source, 0).unwrap();
    drain_until_done(&mut driver, &mut bookmarks);

    assert_eq!(search_rows(&bookmarks), vec![0]);
}

#[test]
fn reverse_offset_covers_rows_before_the_top() {
    init_logging();
    let count = REVERSE_SEARCH_OFFSET + 200;
    let texts: Vec<String> = (0..count).map(|i| format!("tick {i}")).collect();
    let source = Arc::new(SnapshotSource::new(texts));
    let mut driver = SearchDriver::new();
    let mut bookmarks = BookmarkStore::new();

    // Top is past the reverse offset, so the head range [0, top-offset)
    // is queued after the forward range.
    let top = REVERSE_SEARCH_OFFSET + 100;
    driver.execute_search("tick", source, top).unwrap();
    let added = drain_until_done(&mut driver, &mut bookmarks);

    assert_eq!(added, count);
    assert_eq!(bookmarks.get(BookmarkKind::Search).len(), count);
}

#[test]
fn search_new_data_scans_only_the_tail() {
    init_logging();
    let source = Arc::new(SnapshotSource::new(vec![
        "hit one".to_string(),
        "miss".to_string(),
        "hit two".to_string(),
    ]));
    let mut driver = SearchDriver::new();
    let mut bookmarks = BookmarkStore::new();

    driver
        .execute_search("hit", Arc::clone(&source) as Arc<dyn GrepSource>, 0)
        .unwrap();
    drain_until_done(&mut driver, &mut bookmarks);
    assert_eq!(search_rows(&bookmarks), vec![0, 2]);

    // Forget a hit in the already-scanned region, then grow the source.
    bookmarks.get_mut(BookmarkKind::Search).remove(0);
    {
        let grown = vec![
            "hit one".to_string(),
            "miss".to_string(),
            "hit two".to_string(),
            "hit three".to_string(),
            "miss again".to_string(),
            "hit four".to_string(),
        ];
        let fresh = SnapshotSource::new(grown);
        // Re-capture through the driver-visible handle.
        assert!(driver.search_new_data(Arc::new(fresh), 3));
    }
    drain_until_done(&mut driver, &mut bookmarks);

    // Rows 3 and 5 arrive; row 0 is not re-scanned.
    assert_eq!(search_rows(&bookmarks), vec![2, 3, 5]);
}

#[test]
fn repeating_the_same_pattern_is_a_no_op() {
    init_logging();
    let source = rows(&["one hit"]);
    let mut driver = SearchDriver::new();
    let mut bookmarks = BookmarkStore::new();

    driver
        .execute_search("hit", Arc::clone(&source) as Arc<dyn GrepSource>, 0)
        .unwrap();
    drain_until_done(&mut driver, &mut bookmarks);
    assert_eq!(search_rows(&bookmarks), vec![0]);

    driver.execute_search("hit", source, 0).unwrap();
    assert!(!driver.is_searching());
    assert_eq!(driver.drain_into(&mut bookmarks), 0);
}

#[test]
fn cancel_discards_workers_and_pattern() {
    init_logging();
    let texts: Vec<String> = (0..50_000).map(|i| format!("line {i}")).collect();
    let source = Arc::new(SnapshotSource::new(texts));
    let mut driver = SearchDriver::new();
    let mut bookmarks = BookmarkStore::new();

    driver.execute_search("line", source, 0).unwrap();
    driver.cancel();

    assert!(!driver.is_searching());
    assert!(driver.compiled().is_none());
    // Whatever streamed in before the cancel is simply dropped with the
    // channel; draining afterwards adds nothing.
    assert_eq!(driver.drain_into(&mut bookmarks), 0);
}

#[test]
fn new_pattern_replaces_previous_hits_in_rescanned_range() {
    init_logging();
    let source = rows(&["alpha", "beta", "alpha beta"]);
    let mut driver = SearchDriver::new();
    let mut bookmarks = BookmarkStore::new();

    driver
        .execute_search("alpha", Arc::clone(&source) as Arc<dyn GrepSource>, 0)
        .unwrap();
    drain_until_done(&mut driver, &mut bookmarks);
    assert_eq!(search_rows(&bookmarks), vec![0, 2]);

    driver.execute_search("beta", source, 0).unwrap();
    drain_until_done(&mut driver, &mut bookmarks);

    // The Begin event for the rescanned range clears the stale hits.
    assert_eq!(search_rows(&bookmarks), vec![1, 2]);
}
