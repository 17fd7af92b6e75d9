use hvw_cache::{
    caching::{InMemoryResultLog, Orchestrator, OrchestratorSettings, RunStatus},
    data_fetcher::api::{HvwSourceClient, RetryPolicy, create_http_client_with_timeout},
    data_fetcher::cache::{CacheStore, InMemoryCacheStore},
    data_fetcher::models::Class,
    jobs::{CachingType, Job},
    testing_utils::TestDataBuilder,
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(10),
        max_jitter: Duration::ZERO,
    }
}

async fn orchestrator_for(
    server: &MockServer,
    class_ids: &[&str],
) -> (Orchestrator, Arc<InMemoryCacheStore>) {
    let client = create_http_client_with_timeout(5).unwrap();
    let source = HvwSourceClient::new(client, server.uri(), "3").with_retry_policy(fast_retry());
    let store = Arc::new(InMemoryCacheStore::new());
    for id in class_ids {
        store
            .upsert_class(Class::new(*id, "M-LL", "Männer Landesliga"))
            .await
            .unwrap();
    }
    let orchestrator = Orchestrator::new(
        Arc::new(source),
        store.clone(),
        Arc::new(InMemoryResultLog::new()),
        OrchestratorSettings::default(),
    );
    (orchestrator, store)
}

fn tables_job() -> Job {
    Job::new("tables", "Standings", CachingType::Table, "0 * * * *")
}

/// Two 503 answers followed by a 200 still produce a successful unit
#[tokio::test]
async fn test_transient_errors_are_retried_until_success() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/service/if_g_json.php"))
        .and(query_param("cl", "12345"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/service/if_g_json.php"))
        .and(query_param("cl", "12345"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(TestDataBuilder::class_page_with_table(&["TV Alpha", "SG Beta"])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let (orchestrator, store) = orchestrator_for(&mock_server, &["12345"]).await;
    let result = orchestrator.run(&tables_job()).await;

    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(store.get_table("12345").await.unwrap().unwrap().scores.len(), 2);
}

/// A 404 is permanent: one request and a failed unit
#[tokio::test]
async fn test_not_found_is_not_retried() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/service/if_g_json.php"))
        .and(query_param("cl", "404"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (orchestrator, store) = orchestrator_for(&mock_server, &["404"]).await;
    let result = orchestrator.run(&tables_job()).await;

    assert_eq!(result.status, RunStatus::Failure);
    assert_eq!(result.units_attempted, 1);
    assert_eq!(result.units_failed, 1);
    assert!(result.error_summaries[0].starts_with("table 404:"));
    assert!(store.get_table("404").await.unwrap().is_none());
}

/// A unit that keeps failing with 5xx gives up after the attempt budget
#[tokio::test]
async fn test_persistent_server_errors_fail_the_unit() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/service/if_g_json.php"))
        .and(query_param("cl", "500"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let (orchestrator, _store) = orchestrator_for(&mock_server, &["500"]).await;
    let result = orchestrator.run(&tables_job()).await;

    assert_eq!(result.status, RunStatus::Failure);
    assert_eq!(result.units_failed, 1);
}
