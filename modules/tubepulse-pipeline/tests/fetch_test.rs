//! Comment fetcher behaviour against an in-memory source: deduplication,
//! sample-size caps, retry exhaustion, permanent failures, per-video
//! cancellation and the shared request ceiling.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;

use tubepulse_common::{FetchError, Video};
use tubepulse_pipeline::fetcher::{CommentFetcher, FetchOptions};
use tubepulse_pipeline::testing::{raw_comment, video, MockSource};
use tubepulse_pipeline::traits::{CommentPage, PageCursor, SourceError};

fn sampled(id: &str, sample_size: usize) -> Video {
    Video {
        sample_size,
        ..video(id)
    }
}

fn page(video_id: &str, ids: &[&str], next: Option<&str>) -> CommentPage {
    CommentPage {
        comments: ids
            .iter()
            .map(|id| raw_comment(video_id, id, "nice one"))
            .collect(),
        next: next.map(|t| PageCursor::Threads {
            token: Some(t.to_string()),
        }),
        branches: Vec::new(),
    }
}

fn fast_retries(max_retries: u32) -> FetchOptions {
    FetchOptions::builder()
        .max_retries(max_retries)
        .backoff_base(Duration::from_millis(10))
        .build()
}

#[tokio::test]
async fn overlapping_pages_are_deduplicated() {
    let source = MockSource::new()
        .on_page("v1", PageCursor::start(), page("v1", &["a", "b", "c"], Some("p1")))
        .on_page(
            "v1",
            PageCursor::Threads {
                token: Some("p1".into()),
            },
            page("v1", &["c", "d"], None),
        );
    let fetcher = CommentFetcher::new(Arc::new(source), 4);

    let fetched = fetcher
        .fetch(&sampled("v1", 100), &FetchOptions::default())
        .collect_all()
        .await
        .unwrap();

    let ids: Vec<&str> = fetched.comments.iter().map(|c| c.comment_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c", "d"]);
    assert_eq!(fetched.report.collected, 4);
    assert_eq!(fetched.report.duplicates, 1);
    assert_eq!(fetched.report.pages, 2);
    assert!(fetched.report.warnings.is_empty());
}

#[tokio::test]
async fn stops_at_sample_size() {
    let source = Arc::new(MockSource::new().paged("v1", 500, 100));
    let fetcher = CommentFetcher::new(source.clone(), 4);

    let fetched = fetcher
        .fetch(&sampled("v1", 50), &FetchOptions::default())
        .collect_all()
        .await
        .unwrap();

    assert_eq!(fetched.comments.len(), 50);
    assert_eq!(fetched.report.collected, 50);
    assert_eq!(source.calls("v1", "threads"), 1);
    assert_eq!(source.calls("v1", "threads@p1"), 0);
}

#[tokio::test]
async fn fewer_comments_than_sample_returns_all() {
    let source = Arc::new(MockSource::new().paged("v1", 30, 10));
    let fetcher = CommentFetcher::new(source, 2);

    let fetched = fetcher
        .fetch(&sampled("v1", 100), &FetchOptions::default())
        .collect_all()
        .await
        .unwrap();

    assert_eq!(fetched.comments.len(), 30);
    assert_eq!(fetched.report.pages, 3);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_exhaust_retries_into_a_warning() {
    let source = Arc::new(
        MockSource::new().failing("v1", SourceError::Transient("quota burst".into())),
    );
    let fetcher = CommentFetcher::new(source.clone(), 2);

    let fetched = fetcher
        .fetch(&sampled("v1", 100), &fast_retries(2))
        .collect_all()
        .await
        .unwrap();

    assert!(fetched.comments.is_empty());
    assert_eq!(source.calls("v1", "threads"), 3);
    assert_eq!(fetched.report.warnings.len(), 1);
    let warning = &fetched.report.warnings[0];
    assert_eq!(warning.attempts, 3);
    assert_eq!(warning.cursor, "threads");
    assert_eq!(warning.message, "quota burst");
}

#[tokio::test(start_paused = true)]
async fn one_failing_page_keeps_the_pages_before_it() {
    let source = Arc::new(MockSource::new().paged("v1", 30, 10).failing_at(
        "v1",
        PageCursor::Threads {
            token: Some("p2".into()),
        },
        SourceError::Transient("backend error".into()),
    ));
    let fetcher = CommentFetcher::new(source.clone(), 2);

    let fetched = fetcher
        .fetch(&sampled("v1", 100), &fast_retries(2))
        .collect_all()
        .await
        .unwrap();

    assert_eq!(fetched.comments.len(), 20);
    assert_eq!(fetched.report.collected, 20);
    assert_eq!(fetched.report.pages, 2);
    assert_eq!(source.calls("v1", "threads@p2"), 3);
    assert_eq!(fetched.report.warnings.len(), 1);
    let warning = &fetched.report.warnings[0];
    assert_eq!(warning.video_id, "v1");
    assert_eq!(warning.cursor, "threads@p2");
    assert_eq!(warning.attempts, 3);
    assert_eq!(warning.message, "backend error");
}

#[tokio::test(start_paused = true)]
async fn page_recovering_within_retry_budget_loses_nothing() {
    let source = Arc::new(MockSource::new().paged("v1", 30, 10).flaky(
        "v1",
        PageCursor::start(),
        2,
        SourceError::Transient("rate limited".into()),
    ));
    let fetcher = CommentFetcher::new(source.clone(), 2);

    let fetched = fetcher
        .fetch(&sampled("v1", 100), &fast_retries(2))
        .collect_all()
        .await
        .unwrap();

    assert_eq!(fetched.comments.len(), 30);
    assert!(fetched.report.warnings.is_empty());
    assert_eq!(source.calls("v1", "threads"), 3);
    assert_eq!(source.calls("v1", "threads@p1"), 1);
}

#[tokio::test]
async fn panicking_page_task_fails_the_video() {
    let source = Arc::new(MockSource::new().paged("v1", 30, 10).panicking("v1"));
    let fetcher = CommentFetcher::new(source, 2);

    let err = fetcher
        .fetch(&sampled("v1", 100), &FetchOptions::default())
        .collect_all()
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::TaskFailed { ref video_id, .. } if video_id == "v1"));
    assert_eq!(fetcher.available_permits(), 2);
}

#[tokio::test(start_paused = true)]
async fn permanent_failure_is_not_retried() {
    let source = Arc::new(
        MockSource::new().failing("v1", SourceError::Permanent("commentsDisabled".into())),
    );
    let fetcher = CommentFetcher::new(source.clone(), 2);

    let err = fetcher
        .fetch(&sampled("v1", 100), &fast_retries(5))
        .collect_all()
        .await
        .unwrap_err();

    assert_eq!(
        err,
        FetchError::Permanent {
            video_id: "v1".into(),
            reason: "commentsDisabled".into(),
        }
    );
    assert_eq!(source.calls("v1", "threads"), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_one_stream_leaves_others_running() {
    let source = Arc::new(
        MockSource::new()
            .paged("a", 200, 20)
            .paged("b", 200, 20)
            .with_latency(Duration::from_millis(50)),
    );
    let fetcher = CommentFetcher::new(source.clone(), 4);
    let options = FetchOptions::default();

    let mut stream_a = fetcher.fetch(&sampled("a", 500), &options);
    let stream_b = fetcher.fetch(&sampled("b", 500), &options);

    assert!(stream_a.next().await.is_some());
    drop(stream_a);

    let fetched_b = stream_b.collect_all().await.unwrap();
    assert_eq!(fetched_b.comments.len(), 200);
    assert!(fetched_b.report.warnings.is_empty());
    assert!(source.total_calls("a") < 10);
}

#[tokio::test(start_paused = true)]
async fn finish_reports_partial_progress() {
    let source = Arc::new(
        MockSource::new()
            .paged("v1", 100, 10)
            .with_latency(Duration::from_millis(20)),
    );
    let fetcher = CommentFetcher::new(source, 2);

    let mut stream = fetcher.fetch(&sampled("v1", 100), &FetchOptions::default());
    let first = stream.next().await.unwrap();
    assert_eq!(first.comment_id, "v1-c0");

    let report = stream.finish().await.unwrap();
    assert!(report.collected >= 1);
    assert!(report.collected < 100);
}

#[tokio::test(start_paused = true)]
async fn global_ceiling_holds_across_videos() {
    let mut source = MockSource::new().with_latency(Duration::from_millis(30));
    for video_id in ["a", "b"] {
        let mut threads = page(video_id, &[], None);
        for n in 0..6 {
            let parent = format!("{video_id}-t{n}");
            threads.comments.push(raw_comment(video_id, &parent, "top level"));
            threads.branches.push(PageCursor::replies(parent.clone()));
            source = source.on_page(
                video_id,
                PageCursor::replies(parent.clone()),
                CommentPage {
                    comments: vec![raw_comment(video_id, &format!("{parent}-r"), "a reply")],
                    next: None,
                    branches: Vec::new(),
                },
            );
        }
        source = source.on_page(video_id, PageCursor::start(), threads);
    }
    let source = Arc::new(source);
    let fetcher = CommentFetcher::new(source.clone(), 2);
    let options = FetchOptions::builder().concurrency(3).build();

    let (a, b) = tokio::join!(
        fetcher.fetch(&sampled("a", 100), &options).collect_all(),
        fetcher.fetch(&sampled("b", 100), &options).collect_all(),
    );

    assert_eq!(a.unwrap().comments.len(), 12);
    assert_eq!(b.unwrap().comments.len(), 12);
    assert!(source.peak_in_flight() <= 2, "peak {}", source.peak_in_flight());
    assert_eq!(fetcher.available_permits(), 2);
}
