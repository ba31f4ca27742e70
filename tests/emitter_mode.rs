mod common;

use std::path::PathBuf;
use std::time::Duration;

use globwatch::engine::{Channel, SessionMode, WatchEvent, WatchSession};
use globwatch::errors::GlobWatchError;

use common::*;

#[tokio::test]
async fn events_are_reported_per_channel() {
    init_tracing();

    let backend = FakeBackend::new();
    let handle = emitter(&["src/*.js"], fast_options(), mock_project(&["src/a.js"]), &backend);
    assert_eq!(handle.mode(), SessionMode::Emitter);

    let mut added = handle.subscribe(Channel::Added);
    let mut changed = handle.subscribe(Channel::Changed);
    let mut removed = handle.subscribe(Channel::Removed);
    handle.ready().await;

    backend.added(proj("src/b.js"));
    backend.changed(proj("src/a.js"));
    backend.removed(proj("src/a.js"));

    assert_eq!(next_path(&mut added).await, proj("src/b.js"));
    assert_eq!(next_path(&mut changed).await, proj("src/a.js"));
    assert_eq!(next_path(&mut removed).await, proj("src/a.js"));
}

#[tokio::test]
async fn watch_roots_follow_static_bases() {
    init_tracing();

    let fs = mock_project(&["src/a.js", "lib/x.js"]);
    let backend = FakeBackend::new();
    let handle = emitter(&["src/**/*.js", "lib/*.js", "!lib/x.js"], fast_options(), fs, &backend);
    handle.ready().await;

    assert_eq!(backend.watched(), vec![proj("lib"), proj("src")]);
}

#[tokio::test]
async fn ready_is_latched_for_late_waiters() {
    init_tracing();

    let backend = FakeBackend::new();
    let handle = emitter(&["*.js"], fast_options(), mock_project(&[]), &backend);
    handle.ready().await;

    let mut late = handle.subscribe(Channel::Ready);
    assert!(matches!(late.try_recv(), Some(WatchEvent::Ready)));
    with_timeout(handle.ready()).await;
}

#[tokio::test]
async fn added_pattern_extends_the_watch() {
    init_tracing();

    let fs = mock_project(&["src/a.js", "lib/x.js"]);
    let backend = FakeBackend::new();
    let handle = emitter(&["src/*.js"], fast_options(), fs, &backend);
    let mut changed = handle.subscribe(Channel::Changed);
    handle.ready().await;

    backend.changed(proj("lib/x.js"));
    settle().await;
    assert!(drain(&mut changed).is_empty());

    handle.add("lib/*.js").await.unwrap();
    assert!(backend.watched().contains(&proj("lib")));

    backend.changed(proj("lib/x.js"));
    assert_eq!(next_path(&mut changed).await, proj("lib/x.js"));
}

#[tokio::test]
async fn added_negation_excludes_and_later_readd_wins() {
    init_tracing();

    let backend = FakeBackend::new();
    let handle = emitter(
        &["src/*.js"],
        fast_options(),
        mock_project(&["src/a.js", "src/b.js"]),
        &backend,
    );
    let mut changed = handle.subscribe(Channel::Changed);
    handle.ready().await;

    handle.add("!src/b.js").await.unwrap();
    backend.changed(proj("src/b.js"));
    backend.changed(proj("src/a.js"));
    assert_eq!(next_path(&mut changed).await, proj("src/a.js"));

    handle.add("src/b.js").await.unwrap();
    backend.changed(proj("src/b.js"));
    assert_eq!(next_path(&mut changed).await, proj("src/b.js"));
}

#[tokio::test]
async fn per_pattern_callback_fires_only_for_its_paths() {
    init_tracing();

    let fs = mock_project(&["src/a.js", "styles/site.css"]);
    let backend = FakeBackend::new();
    let handle = emitter(&["src/*.js"], fast_options(), fs, &backend);
    handle.ready().await;

    let css = RunRecorder::new();
    handle.add_with("styles/*.css", css.immediate()).await.unwrap();

    backend.changed(proj("src/a.js"));
    settle().await;
    assert_eq!(css.count(), 0);

    backend.changed(proj("styles/site.css"));
    with_timeout(css.wait_for_runs(1)).await;
}

#[tokio::test]
async fn callback_on_negated_pattern_is_rejected() {
    init_tracing();

    let backend = FakeBackend::new();
    let handle = emitter(&["src/*.js"], fast_options(), mock_project(&[]), &backend);
    handle.ready().await;

    let rec = RunRecorder::new();
    let err = handle.add_with("!src/a.js", rec.immediate()).await.unwrap_err();
    assert!(matches!(err, GlobWatchError::Config(_)));
}

#[tokio::test]
async fn invalid_added_pattern_reports_its_index() {
    init_tracing();

    let backend = FakeBackend::new();
    let handle = emitter(&["src/*.js", "!src/x.js"], fast_options(), mock_project(&[]), &backend);
    handle.ready().await;

    let err = handle.add("src/[").await.unwrap_err();
    assert!(matches!(err, GlobWatchError::InvalidPattern { index: 2, .. }));
}

#[tokio::test]
async fn removing_a_pattern_drops_its_root_and_callbacks() {
    init_tracing();

    let fs = mock_project(&["src/a.js", "lib/x.js"]);
    let backend = FakeBackend::new();
    let handle = emitter(&["src/*.js"], fast_options(), fs, &backend);
    let mut changed = handle.subscribe(Channel::Changed);
    handle.ready().await;

    let lib = RunRecorder::new();
    handle.add_with("lib/*.js", lib.immediate()).await.unwrap();
    handle.remove("lib/*.js").await.unwrap();

    assert_eq!(backend.watched(), vec![proj("src")]);
    assert!(backend.history().contains(&format!("unwatch {}", proj("lib").display())));

    backend.changed(proj("lib/x.js"));
    settle().await;
    assert!(drain(&mut changed).is_empty());
    assert_eq!(lib.count(), 0);
}

#[tokio::test]
async fn removing_a_path_stops_reporting_it() {
    init_tracing();

    let backend = FakeBackend::new();
    let handle = emitter(
        &["src/*.js"],
        fast_options(),
        mock_project(&["src/a.js", "src/b.js"]),
        &backend,
    );
    let mut changed = handle.subscribe(Channel::Changed);
    handle.ready().await;

    handle.remove("src/a.js").await.unwrap();
    backend.changed(proj("src/a.js"));
    backend.changed(proj("src/b.js"));

    assert_eq!(next_path(&mut changed).await, proj("src/b.js"));
    settle().await;
    assert!(drain(&mut changed).is_empty());
}

#[tokio::test]
async fn callback_mode_rejects_add_and_remove() {
    init_tracing();

    let backend = FakeBackend::new();
    let rec = RunRecorder::new();
    let handle = WatchSession::builder(["src/*.js"])
        .options(fast_options())
        .filesystem(mock_project(&[]))
        .backend(backend.factory())
        .callback(rec.immediate())
        .spawn()
        .unwrap();
    assert_eq!(handle.mode(), SessionMode::Callback);
    handle.ready().await;

    assert!(matches!(handle.add("lib/*.js").await, Err(GlobWatchError::Config(_))));
    assert!(matches!(handle.remove("src/*.js").await, Err(GlobWatchError::Config(_))));
}

#[tokio::test]
async fn end_emits_end_and_releases_the_backend() {
    init_tracing();

    let backend = FakeBackend::new();
    let handle = emitter(&["src/*.js"], fast_options(), mock_project(&[]), &backend);
    let mut end = handle.subscribe(Channel::End);
    handle.ready().await;

    handle.end();
    assert!(matches!(next_event(&mut end).await, WatchEvent::End));
    with_timeout(handle.closed()).await;

    assert!(backend.is_dropped());
    assert!(handle.is_closed());
    assert!(matches!(handle.add("lib/*.js").await, Err(GlobWatchError::Config(_))));
}

#[tokio::test]
async fn close_stops_without_end() {
    init_tracing();

    let backend = FakeBackend::new();
    let handle = emitter(&["src/*.js"], fast_options(), mock_project(&[]), &backend);
    let mut end = handle.subscribe(Channel::End);
    handle.ready().await;

    handle.close();
    with_timeout(handle.closed()).await;

    assert!(with_timeout(end.recv()).await.is_none());
    assert!(backend.is_dropped());
}

#[tokio::test]
async fn dropping_the_handle_closes_the_session() {
    init_tracing();

    let backend = FakeBackend::new();
    let handle = emitter(&["src/*.js"], fast_options(), mock_project(&[]), &backend);
    handle.ready().await;
    drop(handle);

    with_timeout(async {
        while !backend.is_dropped() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(!backend.changed(PathBuf::from("/proj/src/a.js")));
}

#[tokio::test]
async fn closing_abandons_in_flight_runs() {
    init_tracing();

    let backend = FakeBackend::new();
    let handle = emitter(&["src/*.js"], fast_options(), mock_project(&["src/a.js"]), &backend);
    handle.ready().await;

    let rec = RunRecorder::new();
    handle.add_with("src/a.js", rec.holding()).await.unwrap();
    backend.changed(proj("src/a.js"));
    with_timeout(rec.wait_for_runs(1)).await;

    handle.close();
    with_timeout(handle.closed()).await;

    // Signalling the abandoned run goes nowhere and starts nothing.
    assert!(rec.release());
    settle().await;
    assert_eq!(rec.count(), 1);
}
