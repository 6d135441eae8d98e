// crates/melnodes/tests/pipeline_test.rs

use melcore::{meta_keys, AnyEnvelope, NodeConfig, Trace, Value};
use melnodes::register_all;
use melruntime::MelRuntime;

fn create_runtime() -> MelRuntime {
    let runtime = MelRuntime::default();
    register_all(runtime.registry(), runtime.mel()).unwrap();
    runtime
}

fn orders() -> AnyEnvelope {
    let items = (1..=5)
        .map(|i| Value::from(format!(r#"{{"sku":"item-{}","qty":{}}}"#, i, i)))
        .collect();
    AnyEnvelope::new(Value::Array(items), Trace::new("orders", "run-1", "input"))
}

#[tokio::test]
async fn test_split_transform_aggregate() {
    let runtime = create_runtime();
    let ctx = runtime.context("orders", "run-1");
    let pipeline = vec![
        NodeConfig::new("flow.split").with_id("split"),
        NodeConfig::new("transform.json_parse").with_id("parse"),
        NodeConfig::new("debug.log").with_id("log"),
        NodeConfig::new("flow.aggregate").with_id("collect"),
    ];

    let result = runtime.run(&ctx, &pipeline, orders()).await;

    assert!(result.is_success(), "Pipeline failed: {:?}", result.failures);
    assert_eq!(result.pending, 4, "All but the last item wait in the aggregator");
    assert_eq!(result.outputs.len(), 1);

    let merged = &result.outputs[0];
    assert_eq!(merged.get_meta(meta_keys::AGGREGATE_COUNT), Some("5"));
    let mut quantities: Vec<u64> = merged
        .data
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|item| item.get_path("qty").and_then(Value::as_u64))
        .collect();
    quantities.sort_unstable();
    assert_eq!(quantities, vec![1, 2, 3, 4, 5]);
    assert_eq!(merged.trace.run_id, "run-1");
}

#[tokio::test]
async fn test_failed_item_leaves_group_incomplete() {
    let runtime = create_runtime();
    let ctx = runtime.context("orders", "run-2");
    let pipeline = vec![
        NodeConfig::new("flow.split").with_id("split"),
        NodeConfig::new("transform.json_parse").with_id("parse"),
        NodeConfig::new("flow.aggregate").with_id("collect"),
    ];
    let input = AnyEnvelope::new(
        Value::Array(vec![Value::from("{}"), Value::from("{broken"), Value::from("[]")]),
        Trace::new("orders", "run-2", "input"),
    );

    let result = runtime.run(&ctx, &pipeline, input).await;

    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].envelope.get_meta(meta_keys::SPLIT_INDEX), Some("1"));
    assert!(result.outputs.is_empty());
    assert_eq!(result.pending, 2);
}

#[tokio::test]
async fn test_batches_flow_through_pipeline() {
    let runtime = create_runtime();
    let ctx = runtime.context("orders", "run-3");
    let pipeline = vec![
        NodeConfig::new("flow.batch")
            .with_id("batch")
            .with_config("batch_size", 2u64)
            .with_config("emit_all", true),
        NodeConfig::new("transform.json_stringify").with_id("stringify"),
    ];

    let result = runtime.run(&ctx, &pipeline, orders()).await;

    assert!(result.is_success());
    assert_eq!(result.outputs.len(), 3);
    for output in &result.outputs {
        assert!(output.data.as_str().unwrap().starts_with('['));
        assert_eq!(output.get_meta(meta_keys::TOTAL_BATCHES), Some("3"));
    }
}
