mod common;

use common::*;
use futures::future::join_all;
use pmostream::{JobHandle, JobState, JobStatus, MediaKind, StreamError};
use std::time::Duration;
use tokio::io::AsyncReadExt;

#[tokio::test]
async fn test_concurrent_identical_requests_share_one_fetch() {
    let t = build_service(MockFetcher::gated());

    let (a, b) = tokio::join!(
        t.service.submit_fetch("abc123", MediaKind::Audio),
        t.service.submit_fetch("abc123", MediaKind::Audio),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a, b);

    // Une troisième requête pendant le fetch retourne encore le même handle
    wait_for_status(&t.service, &a, |s| *s == JobStatus::InProgress).await;
    let c = t.service.submit_fetch("abc123", MediaKind::Audio).await.unwrap();
    assert_eq!(a, c);

    t.fetcher.release(1);
    wait_until_ready(&t.service, &a).await;
    assert_eq!(t.fetcher.calls(), 1);
    assert_eq!(t.service.list().await.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_request_burst_from_many_tasks() {
    let t = build_service(MockFetcher::gated());

    let requests = (0..16).map(|_| {
        let service = t.service.clone();
        tokio::spawn(async move { service.submit_fetch("abc123", MediaKind::Video).await })
    });
    let handles: Vec<JobHandle> = join_all(requests)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert!(handles.windows(2).all(|w| w[0] == w[1]));
    t.fetcher.release(1);
    wait_until_ready(&t.service, &handles[0]).await;
    assert_eq!(t.fetcher.calls(), 1);
}

#[tokio::test]
async fn test_different_kinds_are_distinct_jobs() {
    let t = build_service(MockFetcher::instant());

    let audio = t.service.submit_fetch("abc123", MediaKind::Audio).await.unwrap();
    let video = t.service.submit_fetch("abc123", MediaKind::Video).await.unwrap();
    assert_ne!(audio, video);

    wait_until_ready(&t.service, &audio).await;
    wait_until_ready(&t.service, &video).await;

    let stream = t.service.read_stream(&video).await.unwrap();
    assert_eq!(stream.content_type, "video/mp4");
    assert_eq!(t.fetcher.calls(), 2);
}

#[tokio::test]
async fn test_status_sequence_is_monotonic() {
    let t = build_service(MockFetcher::gated());
    let handle = t.service.submit_fetch("abc123", MediaKind::Audio).await.unwrap();

    let mut seen = vec![t.service.query_status(&handle).await];
    t.fetcher.release(1);
    loop {
        let status = t.service.query_status(&handle).await;
        if seen.last() != Some(&status) {
            seen.push(status.clone());
        }
        if matches!(status, JobStatus::Ready | JobStatus::Failed(_)) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let order = |s: &JobStatus| match s {
        JobStatus::Pending => 0,
        JobStatus::InProgress => 1,
        JobStatus::Ready | JobStatus::Failed(_) => 2,
        JobStatus::NotFound => panic!("job vanished"),
    };
    assert!(seen.windows(2).all(|w| order(&w[0]) < order(&w[1])));
    assert_eq!(seen.last(), Some(&JobStatus::Ready));
}

#[tokio::test]
async fn test_fetch_failure_is_recorded() {
    let t = build_service(MockFetcher::failing("video unavailable"));
    let handle = t.service.submit_fetch("gone", MediaKind::Audio).await.unwrap();

    let status = wait_for_status(&t.service, &handle, |s| matches!(s, JobStatus::Failed(_))).await;
    match status {
        JobStatus::Failed(error) => assert!(error.contains("video unavailable")),
        other => panic!("unexpected status {:?}", other),
    }

    // Rien à servir pour un job en échec
    assert!(t.service.read_stream(&handle).await.unwrap_err().is_not_found());

    // Le job en échec n'absorbe plus les nouvelles requêtes
    let retry = t.service.submit_fetch("gone", MediaKind::Audio).await.unwrap();
    assert_ne!(retry, handle);
}

#[tokio::test]
async fn test_fetch_timeout_marks_job_failed() {
    let t = build_service_with(MockFetcher::hanging(), |settings| {
        settings.fetch_timeout = Some(Duration::from_millis(50));
    });
    let handle = t.service.submit_fetch("slow", MediaKind::Audio).await.unwrap();

    match wait_for_status(&t.service, &handle, |s| matches!(s, JobStatus::Failed(_))).await {
        JobStatus::Failed(error) => assert!(error.contains("timed out")),
        other => panic!("unexpected status {:?}", other),
    }
    let job = t.service.job(&handle).await.unwrap();
    assert!(job.file_path.is_none());
}

#[tokio::test]
async fn test_concurrency_limit_keeps_jobs_pending() {
    let t = build_service_with(MockFetcher::gated(), |settings| {
        settings.max_concurrent_fetches = 1;
    });

    let first = t.service.submit_fetch("one", MediaKind::Audio).await.unwrap();
    let second = t.service.submit_fetch("two", MediaKind::Audio).await.unwrap();

    wait_for_status(&t.service, &first, |s| *s == JobStatus::InProgress).await;
    assert_eq!(t.service.query_status(&second).await, JobStatus::Pending);

    t.fetcher.release(2);
    wait_until_ready(&t.service, &first).await;
    wait_until_ready(&t.service, &second).await;
    assert_eq!(t.fetcher.calls(), 2);
}

#[tokio::test]
async fn test_read_stream_states() {
    let t = build_service(MockFetcher::gated());
    let handle = t.service.submit_fetch("abc123", MediaKind::Audio).await.unwrap();

    assert!(t.service.read_stream(&handle).await.unwrap_err().is_not_ready());

    t.fetcher.release(1);
    wait_until_ready(&t.service, &handle).await;

    let mut stream = t.service.read_stream(&handle).await.unwrap();
    assert_eq!(stream.len, PAYLOAD.len() as u64);
    assert_eq!(stream.content_type, "audio/mpeg");
    assert_eq!(
        stream.metadata.as_ref().map(|m| m.title.as_str()),
        Some("Title of abc123")
    );

    let mut content = Vec::new();
    stream.file.read_to_end(&mut content).await.unwrap();
    assert_eq!(content, PAYLOAD);

    let unknown = JobHandle::from("nope");
    assert_eq!(t.service.query_status(&unknown).await, JobStatus::NotFound);
    assert!(matches!(
        t.service.read_stream(&unknown).await,
        Err(StreamError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_externally_deleted_file_is_not_found() {
    let t = build_service(MockFetcher::instant());
    let handle = t.service.submit_fetch("abc123", MediaKind::Audio).await.unwrap();
    wait_until_ready(&t.service, &handle).await;

    let path = t.service.job(&handle).await.unwrap().file_path.unwrap();
    std::fs::remove_file(&path).unwrap();

    assert!(t.service.read_stream(&handle).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_evict_during_fetch_does_not_resurrect() {
    let t = build_service(MockFetcher::gated());
    let handle = t.service.submit_fetch("abc123", MediaKind::Audio).await.unwrap();
    wait_for_status(&t.service, &handle, |s| *s == JobStatus::InProgress).await;
    let path = t.service.job(&handle).await.unwrap().file_path.unwrap();

    let evicted = t.service.evict(&handle).await.unwrap();
    assert_eq!(evicted.state, JobState::InProgress);

    t.fetcher.release(1);
    let fetcher = t.fetcher.clone();
    wait_until(|| fetcher.completed() == 1 && !path.exists()).await;

    assert_eq!(t.service.query_status(&handle).await, JobStatus::NotFound);
    assert!(t.service.list().await.is_empty());
    assert!(t.service.evict(&handle).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_abc123_scenario() {
    let t = build_service(MockFetcher::gated());

    // 1. Première requête : nouveau job
    let h1 = t.service.submit_fetch("abc123", MediaKind::Audio).await.unwrap();
    assert!(matches!(
        t.service.query_status(&h1).await,
        JobStatus::Pending | JobStatus::InProgress
    ));

    // 2. Requête identique pendant le fetch : même handle
    let h2 = t.service.submit_fetch("abc123", MediaKind::Audio).await.unwrap();
    assert_eq!(h1, h2);

    // 3. Fin du fetch
    t.fetcher.release(1);
    wait_until_ready(&t.service, &h1).await;
    assert!(t.service.read_stream(&h1).await.is_ok());

    // 4. Politique par défaut : une nouvelle requête relance un fetch
    let h3 = t.service.submit_fetch("abc123", MediaKind::Audio).await.unwrap();
    assert_ne!(h1, h3);
    t.fetcher.release(1);
    wait_until_ready(&t.service, &h3).await;
    assert_eq!(t.fetcher.calls(), 2);

    // Les deux fichiers coexistent, chacun à son job
    let p1 = t.service.job(&h1).await.unwrap().file_path.unwrap();
    let p3 = t.service.job(&h3).await.unwrap().file_path.unwrap();
    assert_ne!(p1, p3);
    assert!(p1.exists() && p3.exists());
}

#[tokio::test]
async fn test_abc123_scenario_with_reuse_ready() {
    let t = build_service_with(MockFetcher::instant(), |settings| {
        settings.reuse_ready = true;
    });

    let h1 = t.service.submit_fetch("abc123", MediaKind::Audio).await.unwrap();
    wait_until_ready(&t.service, &h1).await;

    let h2 = t.service.submit_fetch("abc123", MediaKind::Audio).await.unwrap();
    assert_eq!(h1, h2);
    assert_eq!(t.fetcher.calls(), 1);
}

#[tokio::test]
async fn test_reused_ready_job_without_file_is_fetched_again() {
    let t = build_service_with(MockFetcher::instant(), |settings| {
        settings.reuse_ready = true;
    });

    let h1 = t.service.submit_fetch("abc123", MediaKind::Audio).await.unwrap();
    wait_until_ready(&t.service, &h1).await;
    let path = t.service.job(&h1).await.unwrap().file_path.unwrap();
    std::fs::remove_file(&path).unwrap();

    t.clock.advance(chrono::Duration::minutes(50));
    let h2 = t.service.submit_fetch("abc123", MediaKind::Audio).await.unwrap();
    assert_ne!(h1, h2);
    assert_eq!(t.service.query_status(&h1).await, JobStatus::NotFound);

    wait_until_ready(&t.service, &h2).await;
    let mut stream = t.service.read_stream(&h2).await.unwrap();
    let mut body = Vec::new();
    stream.file.read_to_end(&mut body).await.unwrap();
    assert_eq!(body, PAYLOAD);
    assert_eq!(t.fetcher.calls(), 2);

    // Le nouveau job est de nouveau réutilisé tant que son fichier existe
    let h3 = t.service.submit_fetch("abc123", MediaKind::Audio).await.unwrap();
    assert_eq!(h2, h3);
    assert_eq!(t.fetcher.calls(), 2);
}

#[tokio::test]
async fn test_failed_fetch_removes_intermediate_files() {
    let t = build_service_with(MockFetcher::hanging().with_partial(), |settings| {
        settings.fetch_timeout = Some(Duration::from_millis(50));
    });
    let handle = t.service.submit_fetch("slow", MediaKind::Audio).await.unwrap();

    wait_for_status(&t.service, &handle, |s| matches!(s, JobStatus::Failed(_))).await;
    wait_until(|| stream_files(&t).is_empty()).await;
    assert!(t.service.job(&handle).await.unwrap().file_path.is_none());
}

#[tokio::test]
async fn test_evict_removes_every_file_of_the_job() {
    let t = build_service(MockFetcher::instant().with_partial());
    let handle = t.service.submit_fetch("abc123", MediaKind::Audio).await.unwrap();
    wait_until_ready(&t.service, &handle).await;
    assert_eq!(stream_files(&t).len(), 2);

    t.service.evict(&handle).await.unwrap();
    assert!(stream_files(&t).is_empty());
}

#[tokio::test]
async fn test_content_type_follows_produced_file() {
    let t = build_service(MockFetcher::instant().producing("webm"));
    let handle = t.service.submit_fetch("abc123", MediaKind::Audio).await.unwrap();
    wait_until_ready(&t.service, &handle).await;

    let stream = t.service.read_stream(&handle).await.unwrap();
    assert_eq!(stream.content_type, "audio/webm");
    assert_eq!(stream.path.extension().unwrap(), "webm");

    // L'emplacement initialement réservé n'existe plus
    assert_eq!(stream_files(&t), vec![format!("{}.webm", handle)]);
}

#[tokio::test]
async fn test_submit_query_uses_resolver() {
    let t = build_service(MockFetcher::instant());

    let handle = t.service.submit_query("  abc123  ", MediaKind::Audio).await.unwrap();
    assert_eq!(t.service.job(&handle).await.unwrap().source_key, "abc123");

    assert!(matches!(
        t.service.submit_query("   ", MediaKind::Audio).await,
        Err(StreamError::Resolve(_))
    ));
}

#[tokio::test]
async fn test_reset_store_and_shutdown() {
    let t = build_service(MockFetcher::gated());
    let orphan = t.service.store().root().join("orphan.mp3");
    std::fs::write(&orphan, b"old").unwrap();

    assert_eq!(t.service.reset_store().await.unwrap(), 1);
    assert!(!orphan.exists());

    // Après fermeture de la file, un job en attente échoue
    t.service.shutdown();
    let handle = t.service.submit_fetch("late", MediaKind::Audio).await.unwrap();
    let status = wait_for_status(&t.service, &handle, |s| matches!(s, JobStatus::Failed(_))).await;
    assert_eq!(status, JobStatus::Failed("fetch queue closed".to_string()));
    assert_eq!(t.fetcher.calls(), 0);
}
