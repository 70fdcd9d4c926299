//! Full plugin runs against the stub Mackerel API

use symbion_devkit::TestHarness;
use symbion_plugin_standard_score::config::PluginConfig;
use symbion_plugin_standard_score::harness::{emit, OutputMode};
use symbion_plugin_standard_score::{FetchPolicy, MackerelClient, PluginError, StandardScorePlugin};

fn config(node: &str, metric: &str, mode: OutputMode, policy: FetchPolicy) -> PluginConfig {
    PluginConfig {
        prefix: "standard_score".into(),
        node_name: node.into(),
        service: "shop".into(),
        roles: vec!["web".into(), "db".into()],
        metric_name: metric.into(),
        api_base: String::new(),
        policy,
        mode,
    }
}

async fn run(harness: &TestHarness, config: PluginConfig, meta: bool) -> Result<String, PluginError> {
    let client = MackerelClient::with_base_url("test-key", &harness.uri()).unwrap();
    let plugin = StandardScorePlugin::new(&client, config);
    let mut out = Vec::new();
    emit(&plugin, meta, &mut out).await?;
    Ok(String::from_utf8(out).unwrap())
}

#[tokio::test]
async fn test_one_shot_prints_metric_map() {
    let harness = TestHarness::new("shop", "web")
        .await
        .with_peers("used", &[("A", 50.0), ("B", 60.0), ("C", 70.0)]);

    let out = run(&harness, config("B", "used", OutputMode::OneShot, FetchPolicy::BestEffort), false)
        .await
        .unwrap();
    assert_eq!(out, "{\"standard_score\": 50.0}\n");
}

#[tokio::test]
async fn test_agent_mode_prints_value_line() {
    let harness = TestHarness::new("shop", "web")
        .await
        .with_peers("memory.used", &[("A", 10.0), ("B", 20.0), ("C", 30.0)]);

    let out = run(&harness, config("A", "memory.used", OutputMode::Harness, FetchPolicy::BestEffort), false)
        .await
        .unwrap();

    let fields: Vec<&str> = out.trim_end().split('\t').collect();
    assert_eq!(fields.len(), 3);
    assert_eq!(fields[0], "standard_score.memory.used.standard_score");
    // (10 - 20) / sqrt(200/3) * 10 + 50
    assert_eq!(fields[1], "37.752551");
    assert!(fields[2].parse::<i64>().unwrap() > 0);
}

#[tokio::test]
async fn test_agent_meta_mode_skips_api() {
    let harness = TestHarness::new("shop", "web").await;

    let out = run(&harness, config("A", "cpu", OutputMode::Harness, FetchPolicy::BestEffort), true)
        .await
        .unwrap();

    let mut lines = out.lines();
    assert_eq!(lines.next(), Some("# mackerel-agent-plugin"));
    let meta: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
    assert_eq!(meta["graphs"]["standard_score.cpu"]["label"], "Standard_score.Cpu");

    let stats = harness.get_stats().await;
    assert_eq!(stats.host_searches, 0);
}

#[tokio::test]
async fn test_degenerate_peers_emit_nothing_in_agent_mode() {
    let harness = TestHarness::new("shop", "web")
        .await
        .with_peers("used", &[("only", 5.0)]);

    let out = run(&harness, config("only", "used", OutputMode::Harness, FetchPolicy::BestEffort), false)
        .await
        .unwrap();
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_large_peer_set_is_batched() {
    let peers: Vec<(String, f64)> = (0..130).map(|i| (format!("web-{i:03}"), i as f64)).collect();
    let peer_refs: Vec<(&str, f64)> = peers.iter().map(|(n, v)| (n.as_str(), *v)).collect();
    let harness = TestHarness::new("shop", "web").await.with_peers("cpu", &peer_refs);

    let out = run(&harness, config("web-129", "cpu", OutputMode::OneShot, FetchPolicy::BestEffort), false)
        .await
        .unwrap();
    assert!(out.starts_with("{\"standard_score\": "));

    let stats = harness.get_stats().await;
    stats.print();
    assert_eq!(stats.host_searches, 1);
    assert_eq!(stats.latest_batches, vec![50, 50, 30]);
}

#[tokio::test]
async fn test_failed_chunk_with_target_is_missing_value() {
    let peers: Vec<(String, f64)> = (0..60).map(|i| (format!("web-{i:03}"), i as f64)).collect();
    let peer_refs: Vec<(&str, f64)> = peers.iter().map(|(n, v)| (n.as_str(), *v)).collect();
    let harness = TestHarness::new("shop", "web").await.with_peers("cpu", &peer_refs);
    harness.api.fail_host(&harness.peer_id("web-055"));

    // best-effort: the other chunk still scores fine
    let out = run(&harness, config("web-010", "cpu", OutputMode::OneShot, FetchPolicy::BestEffort), false).await;
    assert!(out.is_ok());

    // but the target inside the failed chunk has no value
    let err = run(&harness, config("web-055", "cpu", OutputMode::OneShot, FetchPolicy::BestEffort), false)
        .await
        .unwrap_err();
    assert!(matches!(err, PluginError::MissingValue { .. }));

    let err = run(&harness, config("web-010", "cpu", OutputMode::OneShot, FetchPolicy::FailFast), false)
        .await
        .unwrap_err();
    assert!(matches!(err, PluginError::Fetch { chunk: 1, .. }));
}

#[tokio::test]
async fn test_total_discovery_failure() {
    let harness = TestHarness::new("shop", "web")
        .await
        .with_peers("used", &[("A", 1.0), ("B", 2.0)]);
    harness.api.fail_discovery();

    let err = run(&harness, config("A", "used", OutputMode::OneShot, FetchPolicy::BestEffort), false)
        .await
        .unwrap_err();
    assert!(matches!(err, PluginError::MissingValue { .. }));

    let err = run(&harness, config("A", "used", OutputMode::OneShot, FetchPolicy::FailFast), false)
        .await
        .unwrap_err();
    assert!(matches!(err, PluginError::Discovery(_)));
}

#[tokio::test]
async fn test_null_peer_is_ignored() {
    let mut harness = TestHarness::new("shop", "web")
        .await
        .with_peers("used", &[("A", 50.0), ("B", 60.0), ("C", 70.0)]);
    let silent = harness.add_peer("D");
    harness.api.set_no_data(&silent, "used");

    let out = run(&harness, config("B", "used", OutputMode::OneShot, FetchPolicy::BestEffort), false)
        .await
        .unwrap();
    assert_eq!(out, "{\"standard_score\": 50.0}\n");
}
