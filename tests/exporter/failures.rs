use anyhow::Result;

use crate::support::helpers::{core_lines, init_tracing, sample, test_config, RunningExporter};
use crate::support::mock_rest::{Fault, MockNetwork, MockRestServer};

fn network() -> MockNetwork {
    MockNetwork::new(&[
        ("umeevaloper1a", "umee1oa", 10),
        ("umeevaloper1b", "umee1ob", 12),
        ("umeevaloper1c", "umee1oc", 9),
    ])
}

#[tokio::test]
async fn failing_nonce_lookup_suppresses_core_metrics() -> Result<()> {
    init_tracing();
    let network = network();
    network.fail_nonce("umee1oc", Fault::Status(500));
    let node = MockRestServer::start(network.clone()).await?;
    let exporter = RunningExporter::start(&test_config(node.url(), "umee1ob")?).await?;

    let text = exporter.scrape().await?;
    assert!(core_lines(&text).is_empty(), "unexpected core metrics: {text}");
    assert_eq!(sample(&text, "peggo_exporter_last_scrape_success"), Some(0.0));
    assert_eq!(sample(&text, "peggo_exporter_scrape_failures_total"), Some(1.0));
    // The 500 is retried once before giving up.
    assert_eq!(network.request_counts(), (1, 3, 4));

    exporter.stop().await?;
    node.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn malformed_nonce_is_not_retried() -> Result<()> {
    init_tracing();
    let network = network();
    network.fail_nonce("umee1oa", Fault::Malformed);
    let node = MockRestServer::start(network.clone()).await?;
    let exporter = RunningExporter::start(&test_config(node.url(), "umee1ob")?).await?;

    let text = exporter.scrape().await?;
    assert!(core_lines(&text).is_empty());
    assert_eq!(network.request_counts(), (1, 3, 3));

    exporter.stop().await?;
    node.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn unresolved_validator_skips_its_nonce_request() -> Result<()> {
    init_tracing();
    let network = network();
    network.fail_delegate_keys("umeevaloper1b", Fault::Status(404));
    let node = MockRestServer::start(network.clone()).await?;
    let exporter = RunningExporter::start(&test_config(node.url(), "umee1oa")?).await?;

    let text = exporter.scrape().await?;
    assert!(core_lines(&text).is_empty());
    assert_eq!(network.request_counts(), (1, 3, 2));

    exporter.stop().await?;
    node.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn empty_orchestrator_address_is_a_sample_failure() -> Result<()> {
    init_tracing();
    let network = network();
    network.fail_delegate_keys("umeevaloper1c", Fault::EmptyOrchestrator);
    let node = MockRestServer::start(network.clone()).await?;
    let exporter = RunningExporter::start(&test_config(node.url(), "umee1oa")?).await?;

    let text = exporter.scrape().await?;
    assert!(core_lines(&text).is_empty());
    assert_eq!(sample(&text, "peggo_exporter_last_scrape_success"), Some(0.0));
    assert_eq!(network.request_counts(), (1, 3, 2));

    exporter.stop().await?;
    node.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn non_numeric_nonce_is_not_retried() -> Result<()> {
    init_tracing();
    let network = network();
    network.fail_nonce("umee1ob", Fault::NonNumericNonce);
    let node = MockRestServer::start(network.clone()).await?;
    let exporter = RunningExporter::start(&test_config(node.url(), "umee1oa")?).await?;

    let text = exporter.scrape().await?;
    assert!(core_lines(&text).is_empty());
    assert_eq!(network.request_counts(), (1, 3, 3));
    assert_eq!(sample(&text, "peggo_exporter_rest_errors_total"), Some(0.0));

    exporter.stop().await?;
    node.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn repeated_page_key_aborts_the_listing() -> Result<()> {
    init_tracing();
    let network = network().with_page_size(2);
    network.repeat_next_key();
    let node = MockRestServer::start(network.clone()).await?;
    let exporter = RunningExporter::start(&test_config(node.url(), "umee1oa")?).await?;

    let text = exporter.scrape().await?;
    assert!(core_lines(&text).is_empty());
    assert_eq!(sample(&text, "peggo_exporter_scrape_failures_total"), Some(1.0));
    assert_eq!(network.request_counts(), (2, 0, 0));

    exporter.stop().await?;
    node.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn transient_listing_failure_is_retried() -> Result<()> {
    init_tracing();
    let network = network();
    network.fail_validator_listing(1);
    let node = MockRestServer::start(network.clone()).await?;
    let exporter = RunningExporter::start(&test_config(node.url(), "umee1ob")?).await?;

    let text = exporter.scrape().await?;
    assert_eq!(sample(&text, "peggo_peggo_sync"), Some(1.0));
    assert_eq!(sample(&text, "peggo_exporter_rest_errors_total"), Some(1.0));
    assert_eq!(network.request_counts(), (2, 3, 3));

    exporter.stop().await?;
    node.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn unreachable_node_still_serves_self_telemetry() -> Result<()> {
    init_tracing();
    let node = MockRestServer::start(network()).await?;
    let url = node.url().to_owned();
    node.shutdown().await;

    let exporter = RunningExporter::start(&test_config(&url, "umee1oa")?).await?;
    let text = exporter.scrape().await?;
    assert!(core_lines(&text).is_empty());
    assert_eq!(sample(&text, "peggo_exporter_scrapes_total"), Some(1.0));
    assert_eq!(sample(&text, "peggo_exporter_last_scrape_success"), Some(0.0));
    assert_eq!(sample(&text, "peggo_exporter_rest_errors_total"), Some(2.0));

    exporter.stop().await?;
    Ok(())
}

#[tokio::test]
async fn partial_samples_are_reported_when_allowed() -> Result<()> {
    init_tracing();
    let network = network();
    network.fail_nonce("umee1oa", Fault::Malformed);
    let node = MockRestServer::start(network.clone()).await?;

    let config = peggo_exporter::ExporterConfig::builder()
        .rest_url(node.url())
        .orchestrator_address("umee1ob")
        .max_attempts(1)
        .allow_partial_samples(true)
        .listen_address("127.0.0.1:0")
        .build()?;
    let exporter = RunningExporter::start(&config).await?;

    let text = exporter.scrape().await?;
    assert_eq!(sample(&text, "peggo_peggo_failed_samples"), Some(1.0));
    assert_eq!(sample(&text, "peggo_peggo_orchestrators"), Some(2.0));
    assert_eq!(sample(&text, "peggo_peggo_heighest_event_nonce"), Some(12.0));
    assert_eq!(sample(&text, "peggo_peggo_sync"), Some(1.0));

    exporter.stop().await?;
    node.shutdown().await;
    Ok(())
}
