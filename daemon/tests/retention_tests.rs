//! Retention engine tests: preview, batched deletion, the safety cap and the
//! cleanup job wiring.

mod common;

use common::fixtures::*;
use webmond::jobs::DataCleanupJob;
use webmond::MonitorStatus;

/// Seed `old_healthy` healthy results 10 days old, `old_unhealthy` unhealthy
/// results 40 days old and `recent` healthy results from today.
async fn seeded_env(old_healthy: usize, old_unhealthy: usize, recent: usize) -> TestEnv {
    let env = test_env().await;
    let space = sample_space("prod", &[]);
    env.store.save_space(&space).await.unwrap();
    let monitor = url_monitor(&space.id, "web", "http://example.com/");
    env.store.save_monitor(&monitor).await.unwrap();

    for _ in 0..old_healthy {
        env.store
            .save_result(&aged_result(&monitor, MonitorStatus::Healthy, 10))
            .await
            .unwrap();
    }
    for i in 0..old_unhealthy {
        // Unknown results age on the unhealthy TTL as well
        let status = if i % 2 == 0 {
            MonitorStatus::Unhealthy
        } else {
            MonitorStatus::Unknown
        };
        env.store
            .save_result(&aged_result(&monitor, status, 40))
            .await
            .unwrap();
    }
    for _ in 0..recent {
        env.store
            .save_result(&aged_result(&monitor, MonitorStatus::Healthy, 0))
            .await
            .unwrap();
    }

    env
}

#[tokio::test]
async fn preview_partitions_by_status_and_cutoff() {
    let env = seeded_env(40, 30, 10).await;

    let preview = env.store.cleanup_preview(7, 30).await.unwrap();
    assert_eq!(preview.healthy_to_delete, 40);
    assert_eq!(preview.unhealthy_to_delete, 30);
    assert_eq!(preview.total_to_delete, 70);
    assert_eq!(preview.total_results, 80);
    assert_eq!(preview.retention_after_cleanup, 10);
    assert!(preview.healthy_cutoff_date > preview.unhealthy_cutoff_date);
}

#[tokio::test]
async fn cleanup_deletes_in_batches_and_is_idempotent() {
    let env = seeded_env(45, 25, 10).await;

    let stats = env.store.cleanup_old_results(7, 30, 10).await.unwrap();
    assert_eq!(stats.healthy_deleted, 45);
    assert_eq!(stats.unhealthy_deleted, 25);
    assert_eq!(stats.total_deleted, 70);
    // 45 healthy in batches of 10 plus unhealthy+unknown batches
    assert!(stats.batches_processed >= 7);
    assert!(stats.duration_seconds >= 0.0);

    // Nothing eligible remains
    let preview = env.store.cleanup_preview(7, 30).await.unwrap();
    assert_eq!(preview.total_to_delete, 0);
    assert_eq!(preview.total_results, 10);

    // A second run is a no-op
    let stats = env.store.cleanup_old_results(7, 30, 10).await.unwrap();
    assert_eq!(stats.total_deleted, 0);
    assert_eq!(env.store.cleanup_preview(7, 30).await.unwrap().total_results, 10);
}

#[tokio::test]
async fn no_expired_results_survive_cleanup() {
    let env = seeded_env(20, 20, 5).await;
    env.store.cleanup_old_results(7, 30, 6).await.unwrap();

    let preview = env.store.cleanup_preview(7, 30).await.unwrap();
    assert_eq!(preview.healthy_to_delete, 0);
    assert_eq!(preview.unhealthy_to_delete, 0);
    assert_eq!(preview.total_results, 5);
}

#[tokio::test]
async fn cleanup_job_runs_against_config_ttls() {
    let env = seeded_env(20, 10, 10).await;
    let job = DataCleanupJob::new(env.store.clone(), env.config.clone());

    assert!(job.run().await);

    let preview = env.store.cleanup_preview(7, 30).await.unwrap();
    assert_eq!(preview.total_results, 10);

    let status = job.tracker().status().await;
    assert_eq!(status["run_count"], 1);
    assert_eq!(status["error_count"], 0);
}

#[tokio::test]
async fn safety_cap_aborts_when_everything_would_go() {
    // Only expired rows: the run would delete 100% of the data
    let env = seeded_env(20, 20, 0).await;
    let job = DataCleanupJob::new(env.store.clone(), env.config.clone());

    assert!(!job.run().await);

    // Nothing was removed
    let preview = env.store.cleanup_preview(7, 30).await.unwrap();
    assert_eq!(preview.total_results, 40);
    assert_eq!(preview.total_to_delete, 40);

    let status = job.tracker().status().await;
    assert_eq!(status["error_count"], 1);
}

#[tokio::test]
async fn empty_store_cleanup_is_a_successful_noop() {
    let env = test_env().await;
    let job = DataCleanupJob::new(env.store.clone(), env.config.clone());
    assert!(job.run().await);
}

#[tokio::test]
async fn ttls_below_one_day_fall_back_to_defaults() {
    let env = seeded_env(5, 5, 5).await;

    let mut config = (*env.config.current().await).clone();
    config.data_cleanup.keep_healthy_results_days = 0;
    config.data_cleanup.keep_unhealthy_results_days = -3;
    env.config.save(config, &env.crypto).await.unwrap();

    let job = DataCleanupJob::new(env.store.clone(), env.config.clone());
    assert!(job.run().await);

    // Defaults of 7/30 applied: the 10-day healthy and 40-day unhealthy rows
    // are gone, recent rows stay
    let preview = env.store.cleanup_preview(7, 30).await.unwrap();
    assert_eq!(preview.total_results, 5);
}
