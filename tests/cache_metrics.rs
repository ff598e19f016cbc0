mod support;

use std::collections::HashSet;

use axum::http::StatusCode;
use metrics_util::debugging::DebuggingRecorder;
use shieldforge::infra::telemetry;

use support::{TestApp, layer_uri};

#[tokio::test]
async fn layer_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    telemetry::describe_metrics();

    let app = TestApp::new();
    let id = app.create_design("Metrics").await;
    assert_eq!(app.save(&id, &[(0, b"one")]).await.status(), StatusCode::OK);

    // miss, then hit
    assert_eq!(app.get(&layer_uri(&id, 0), None).await.status(), StatusCode::OK);
    assert_eq!(app.get(&layer_uri(&id, 0), None).await.status(), StatusCode::OK);
    // fetch error
    assert_eq!(
        app.get(&layer_uri(&id, 9), None).await.status(),
        StatusCode::NOT_FOUND
    );
    // invalidation
    assert_eq!(app.save(&id, &[(0, b"two")]).await.status(), StatusCode::OK);

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "shieldforge_layer_cache_hit_total",
        "shieldforge_layer_cache_miss_total",
        "shieldforge_layer_cache_invalidate_total",
        "shieldforge_layer_cache_entries",
        "shieldforge_layer_fetch_error_total",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
