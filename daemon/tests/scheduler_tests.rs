//! Scheduler contract tests: registration lifecycle, the immediate first
//! run, status transitions and the bulk space operations.

mod common;

use common::fixtures::*;
use std::time::Duration;
use webmond::{MonitorStatus, MonitorType};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn schedule_runs_first_check_immediately() {
    let env = test_env().await;
    let space = sample_space("prod", &[]);
    env.store.save_space(&space).await.unwrap();

    let url = format!("http://127.0.0.1:{}/notlisten", dead_port());
    let monitor = url_monitor(&space.id, "web", &url);
    env.store.save_monitor(&monitor).await.unwrap();

    assert!(env.scheduler.schedule_monitor(monitor.clone()).await.unwrap());

    // The first check ran before schedule_monitor returned
    let results = env.store.get_results_for_monitor(&monitor.id, 1).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, MonitorStatus::Unhealthy);
    assert_eq!(results[0].failed_checks, 1);
    assert_eq!(results[0].check_list, vec!["connection", "status_code"]);
    assert_eq!(results[0].details["connection"]["connected"], false);

    let stored = env.store.get_monitor(&monitor.id).await.unwrap().unwrap();
    assert_eq!(stored.status, MonitorStatus::Unhealthy);
    assert!(stored.last_checked_at.is_some());
    assert!(stored.last_healthy_at.is_none());
    assert!(stored.last_checked_at.unwrap() >= stored.created_at);

    // Running snapshot reflects the probed status
    let running = env.scheduler.list_running(None, None).await;
    assert_eq!(running.len(), 1);
    assert_eq!(running[0].status, MonitorStatus::Unhealthy);

    env.scheduler.stop_all_monitors().await;
}

#[tokio::test]
async fn healthy_check_sets_last_healthy_at() {
    let env = test_env().await;
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .mount(&server)
        .await;

    let space = sample_space("prod", &[]);
    env.store.save_space(&space).await.unwrap();
    let monitor = url_monitor(&space.id, "web", &server.uri());
    env.store.save_monitor(&monitor).await.unwrap();

    assert!(env.scheduler.schedule_monitor(monitor.clone()).await.unwrap());

    let stored = env.store.get_monitor(&monitor.id).await.unwrap().unwrap();
    assert_eq!(stored.status, MonitorStatus::Healthy);
    let checked = stored.last_checked_at.unwrap();
    let healthy = stored.last_healthy_at.unwrap();
    assert!(healthy <= checked);
    assert!(healthy >= stored.created_at);

    env.scheduler.stop_all_monitors().await;
}

#[tokio::test]
async fn duplicate_schedule_is_rejected() {
    let env = test_env().await;
    let space = sample_space("prod", &[]);
    env.store.save_space(&space).await.unwrap();
    let url = format!("http://127.0.0.1:{}/", dead_port());
    let monitor = url_monitor(&space.id, "web", &url);
    env.store.save_monitor(&monitor).await.unwrap();

    assert!(env.scheduler.schedule_monitor(monitor.clone()).await.unwrap());
    assert!(!env.scheduler.schedule_monitor(monitor.clone()).await.unwrap());
    assert!(env.scheduler.is_monitor_running(&monitor.id).await);

    env.scheduler.stop_all_monitors().await;
}

#[tokio::test]
async fn stop_marks_monitor_offline() {
    let env = test_env().await;
    let space = sample_space("prod", &[]);
    env.store.save_space(&space).await.unwrap();
    let url = format!("http://127.0.0.1:{}/", dead_port());
    let monitor = url_monitor(&space.id, "web", &url);
    env.store.save_monitor(&monitor).await.unwrap();

    env.scheduler.schedule_monitor(monitor.clone()).await.unwrap();
    assert!(env.scheduler.stop_monitor(&monitor.id).await.unwrap());

    let stored = env.store.get_monitor(&monitor.id).await.unwrap().unwrap();
    assert_eq!(stored.status, MonitorStatus::Offline);
    assert!(!env.scheduler.is_monitor_running(&monitor.id).await);
    assert!(env.scheduler.list_running(None, None).await.is_empty());

    // Stopping again reports not scheduled
    assert!(!env.scheduler.stop_monitor(&monitor.id).await.unwrap());
}

#[tokio::test]
async fn reschedule_keeps_monitor_registered_without_probing() {
    let env = test_env().await;
    let space = sample_space("prod", &[]);
    env.store.save_space(&space).await.unwrap();
    let url = format!("http://127.0.0.1:{}/", dead_port());
    let mut monitor = url_monitor(&space.id, "web", &url);
    monitor.check_interval_seconds = 300;
    env.store.save_monitor(&monitor).await.unwrap();

    env.scheduler.schedule_monitor(monitor.clone()).await.unwrap();
    let results_before = env
        .store
        .get_results_for_monitor(&monitor.id, 100)
        .await
        .unwrap()
        .len();

    monitor.check_interval_seconds = 600;
    assert!(env.scheduler.reschedule_monitor(monitor.clone()).await.unwrap());
    assert!(env.scheduler.is_monitor_running(&monitor.id).await);

    // No immediate probe on reschedule; status reset to UNKNOWN
    let results_after = env
        .store
        .get_results_for_monitor(&monitor.id, 100)
        .await
        .unwrap()
        .len();
    assert_eq!(results_before, results_after);
    let stored = env.store.get_monitor(&monitor.id).await.unwrap().unwrap();
    assert_eq!(stored.status, MonitorStatus::Unknown);
    assert_eq!(stored.check_interval_seconds, 600);

    // Rescheduling an unregistered monitor fails
    env.scheduler.stop_monitor(&monitor.id).await.unwrap();
    assert!(!env.scheduler.reschedule_monitor(monitor).await.unwrap());
}

#[tokio::test]
async fn space_bulk_operations() {
    let env = test_env().await;
    let space_a = sample_space("a", &[]);
    let space_b = sample_space("b", &[]);
    env.store.save_space(&space_a).await.unwrap();
    env.store.save_space(&space_b).await.unwrap();

    let url = format!("http://127.0.0.1:{}/", dead_port());
    for (space, name) in [(&space_a, "a-1"), (&space_a, "a-2"), (&space_b, "b-1")] {
        env.store
            .save_monitor(&url_monitor(&space.id, name, &url))
            .await
            .unwrap();
    }

    let started = env
        .scheduler
        .start_all_monitors_in_space(&space_a.id)
        .await
        .unwrap();
    assert_eq!(started, 2);

    // Already-running monitors are skipped on a second start
    let started_again = env
        .scheduler
        .start_all_monitors_in_space(&space_a.id)
        .await
        .unwrap();
    assert_eq!(started_again, 0);

    assert_eq!(env.scheduler.list_running(Some(&space_a.id), None).await.len(), 2);
    assert_eq!(env.scheduler.list_running(Some(&space_b.id), None).await.len(), 0);
    assert_eq!(
        env.scheduler
            .list_running(Some(&space_a.id), Some(MonitorType::Url))
            .await
            .len(),
        2
    );
    assert_eq!(
        env.scheduler
            .list_running(Some(&space_a.id), Some(MonitorType::Database))
            .await
            .len(),
        0
    );

    env.scheduler.stop_all_monitors_in_space(&space_a.id).await;
    assert!(env.scheduler.list_running(None, None).await.is_empty());

    for name in ["a-1", "a-2"] {
        let monitor = env
            .store
            .get_monitor_by_name(name, Some(&space_a.id), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(monitor.status, MonitorStatus::Offline);
    }
}

#[tokio::test]
async fn periodic_refire_records_transition() {
    let env = test_env().await;
    let server = MockServer::start().await;

    // First request succeeds, everything afterwards fails
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let space = sample_space("prod", &[]);
    env.store.save_space(&space).await.unwrap();
    let monitor = url_monitor(&space.id, "web", &server.uri());
    env.store.save_monitor(&monitor).await.unwrap();

    env.scheduler.schedule_monitor(monitor.clone()).await.unwrap();

    // Interval is 1s; wait for at least one re-fire
    tokio::time::sleep(Duration::from_millis(3500)).await;
    env.scheduler.stop_all_monitors().await;

    let results = env
        .store
        .get_results_for_monitor(&monitor.id, 100)
        .await
        .unwrap();
    assert!(results.len() >= 2, "expected a re-fire, got {}", results.len());

    // Newest first: latest unhealthy, oldest healthy
    assert_eq!(results.last().unwrap().status, MonitorStatus::Healthy);
    assert_eq!(results.first().unwrap().status, MonitorStatus::Unhealthy);

    let stored = env.store.get_monitor(&monitor.id).await.unwrap().unwrap();
    assert!(stored.last_healthy_at.is_some());
    assert!(stored.last_healthy_at.unwrap() <= stored.last_checked_at.unwrap());
}

#[tokio::test]
async fn system_jobs_report_status_and_run_manually() {
    let env = test_env().await;

    let statuses = env.scheduler.get_system_job_status().await;
    let names: Vec<&str> = statuses
        .iter()
        .filter_map(|s| s["name"].as_str())
        .collect();
    assert_eq!(names, vec!["data_cleanup", "health_alert"]);
    for status in &statuses {
        assert_eq!(status["enabled"], true);
        assert_eq!(status["run_count"], 0);
    }

    // Empty store: both jobs no-op successfully
    assert!(env.scheduler.run_system_job_manually("data_cleanup").await);
    assert!(env.scheduler.run_system_job_manually("health_alert").await);
    assert!(!env.scheduler.run_system_job_manually("bogus_job").await);

    let statuses = env.scheduler.get_system_job_status().await;
    for status in &statuses {
        assert_eq!(status["run_count"], 1);
        assert_eq!(status["error_count"], 0);
    }
}
