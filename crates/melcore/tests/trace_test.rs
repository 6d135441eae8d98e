// crates/melcore/tests/trace_test.rs

use melcore::Trace;

#[test]
fn test_next_keeps_parent_and_resets_attempt() {
    let trace = Trace::new("agent", "run", "a").retry().retry();
    let mut with_parent = trace.child("split", 0);
    with_parent.attempt = 4;

    let next = with_parent.next("b");
    assert_eq!(next.node_id, "b");
    assert_eq!(next.step, "b");
    assert_eq!(next.attempt, 1);
    assert_eq!(next.parent_id, with_parent.parent_id);
    assert_eq!(next.agent_id, "agent");
    assert_eq!(next.run_id, "run");
}

#[test]
fn test_child_makes_current_node_the_parent() {
    let trace = Trace::new("agent", "run", "loader");

    let first = trace.child("split", 0);
    let second = trace.child("split", 1);

    assert_eq!(first.parent_id.as_deref(), Some("loader"));
    assert_eq!(first.node_id, "split");
    assert_eq!(first.step, "split[0]");
    assert_eq!(second.step, "split[1]");
    assert_eq!(first.parent_id, second.parent_id);
}

#[test]
fn test_retry_only_bumps_attempt() {
    let trace = Trace::new("agent", "run", "a").with_step("Fetch orders");
    let retried = trace.retry();

    assert_eq!(retried.attempt, 2);
    assert_eq!(retried.step, "Fetch orders");
    assert_eq!(retried.node_id, trace.node_id);
    assert_eq!(trace.attempt, 1);
}
