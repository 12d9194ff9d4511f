// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Plan lifecycle, plan caching, profiling and cross-thread cancellation

#[path = "testutils/mod.rs"]
mod testutils;

use loomdb::exec::step::{
    ExpandStep, FetchFromIndexStep, FetchFromVariableStep, GetValueFromIndexEntryStep, ValuesStep,
};
use loomdb::exec::{
    stream, CancellationToken, ExecutionError, ExecutionPlan, ExecutionStream, ResultRow,
};
use loomdb::plan::{
    AndBlock, BinaryCondition, CompareOperator, IndexSearchDescriptor, KeyCondition,
};
use loomdb::storage::Value;
use loomdb::{ExecutionConfig, ExecutionPlanCache, PlanCacheConfig};
use std::thread;
use testutils::{column, ints, run_in, TestFixture};

const STATEMENT: &str = "SELECT FROM Item WHERE n >= 2 AND n < 5";

fn range_plan(fixture: &TestFixture) -> ExecutionPlan {
    let desc = IndexSearchDescriptor::new(
        fixture.index("Item.n"),
        Some(AndBlock::new(vec![KeyCondition::binary(
            "n",
            CompareOperator::Ge,
            Value::Integer(2),
        )])),
        Some(BinaryCondition::new("n", CompareOperator::Lt, Value::Integer(5))),
        true,
    );
    ExecutionPlan::new()
        .with_step(FetchFromIndexStep::new(desc))
        .with_step(GetValueFromIndexEntryStep::new(None))
}

#[test]
fn test_explain_lists_steps_source_first() {
    let fixture = TestFixture::with_sample_data();
    assert_eq!(
        range_plan(&fixture).to_string(),
        "+ FETCH FROM INDEX Item.n\n  n >= 2 and n < 5\n+ EXTRACT VALUE FROM INDEX ENTRY"
    );
}

#[test]
fn test_profiled_explain_shows_cost() {
    let fixture = TestFixture::with_config(ExecutionConfig::development());
    let mut plan = ExecutionPlan::new()
        .with_step(ValuesStep::column("x", vec![Value::from(vec![1, 2, 3])]))
        .with_step(ExpandStep::new(None));
    assert_eq!(fixture.run(&mut plan).unwrap().len(), 3);

    let explain = plan.to_string();
    assert!(explain.starts_with("+ VALUES (1 rows) ("));
    assert!(explain.lines().all(|line| !line.starts_with('+') || line.ends_with("μs)")));
}

#[test]
fn test_restarting_requires_reset() {
    let fixture = TestFixture::with_sample_data();
    let mut plan = range_plan(&fixture);
    assert_eq!(column(&fixture.run(&mut plan).unwrap(), "n"), ints(&[2, 3, 4]));

    let err = fixture.run(&mut plan).err().unwrap();
    assert!(matches!(err, ExecutionError::IllegalState(_)));

    plan.reset().unwrap();
    assert_eq!(column(&fixture.run(&mut plan).unwrap(), "n"), ints(&[2, 3, 4]));
    plan.close();
}

#[test]
fn test_cached_plans_run_independently() {
    let fixture = TestFixture::with_sample_data();
    let cache = ExecutionPlanCache::new(fixture.session.config().plan_cache.clone());
    assert!(cache.get(STATEMENT, &fixture.db).is_none());
    assert!(cache.put(STATEMENT, &range_plan(&fixture)));

    let mut first = cache.get(STATEMENT, &fixture.db).unwrap();
    let mut second = cache.get(STATEMENT, &fixture.db).unwrap();
    let mut ctx = fixture.context();
    let mut stream = first.start(&mut ctx).unwrap();
    stream.next(&ctx).unwrap();
    // The second copy does not share cursors or state with the first
    let rows = run_in(&mut second, &mut ctx).unwrap();
    assert_eq!(column(&rows, "n"), ints(&[2, 3, 4]));
    let rest = stream.drain(&ctx).unwrap();
    assert_eq!(column(&rest, "n"), ints(&[3, 4]));

    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses), (2, 1));
    assert!(stats.hit_rate() > 0.6);
}

#[test]
fn test_disabled_cache_stores_nothing() {
    let fixture = TestFixture::with_sample_data();
    let cache = ExecutionPlanCache::new(PlanCacheConfig {
        enabled: false,
        max_entries: 4,
    });
    assert!(!cache.is_enabled());
    assert!(!cache.put(STATEMENT, &range_plan(&fixture)));
    assert!(cache.get(STATEMENT, &fixture.db).is_none());
}

#[test]
fn test_cancellation_from_another_thread() {
    let fixture = TestFixture::with_sample_data();
    let token = CancellationToken::new();
    let mut ctx = fixture.context().with_cancellation(token.clone());
    let mut plan = ExecutionPlan::new()
        .with_step(FetchFromIndexStep::new(IndexSearchDescriptor::full_scan(
            fixture.index("Item.n"),
            true,
        )))
        .with_step(GetValueFromIndexEntryStep::new(None));

    let mut stream = plan.start(&mut ctx).unwrap();
    assert!(stream.has_next(&ctx).unwrap());
    stream.next(&ctx).unwrap();

    let canceller = thread::spawn(move || token.cancel());
    canceller.join().unwrap();

    let err = stream.drain(&ctx).unwrap_err();
    assert!(err.is_interrupted());
    plan.close();
}

#[test]
fn test_stream_variables_are_consumed_once() {
    let fixture = TestFixture::with_sample_data();
    let mut ctx = fixture.context();
    let rows = fixture
        .items
        .iter()
        .take(2)
        .map(|rid| ResultRow::from_entity(&fixture.session, *rid))
        .collect();
    ctx.set_variable("picked", stream::from_rows(rows));

    let mut plan = ExecutionPlan::new().with_step(FetchFromVariableStep::new("picked"));
    assert_eq!(column(&run_in(&mut plan, &mut ctx).unwrap(), "n"), ints(&[1, 2]));

    let mut again = ExecutionPlan::new().with_step(FetchFromVariableStep::new("picked"));
    let err = run_in(&mut again, &mut ctx).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Command execution error: Cannot use variable as query target: picked"
    );
}
