// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Graph maintenance steps chained into plans: edge creation, expansion,
//! reference search and entity copies

#[path = "testutils/mod.rs"]
mod testutils;

use indexmap::IndexMap;
use loomdb::exec::step::{
    CopyEntityStep, CreateEdgesStep, ExpandStep, FetchFromCollectionStep, FetchFromVariableStep,
    FindReferencesStep, ValuesStep,
};
use loomdb::exec::{ExecutionPlan, ExecutionStream};
use loomdb::storage::Value;
use testutils::{column, run_in, TestFixture};

fn knows_plan(fixture: &TestFixture, unique: bool) -> ExecutionPlan {
    let index = unique.then(|| fixture.index("Knows.out_in"));
    ExecutionPlan::new().with_step(CreateEdgesStep::new("Knows", "a", "b", index))
}

#[test]
fn test_edges_cover_every_pair_from_major() {
    let fixture = TestFixture::with_sample_data();
    let p = &fixture.people;
    let mut ctx = fixture.context();
    ctx.set_variable("a", Value::LinkList(vec![p[0], p[1]]));
    ctx.set_variable("b", Value::LinkList(vec![p[2], p[3]]));

    let rows = run_in(&mut knows_plan(&fixture, false), &mut ctx).unwrap();
    let pairs: Vec<(Value, Value)> = column(&rows, "out")
        .into_iter()
        .zip(column(&rows, "in"))
        .collect();
    assert_eq!(
        pairs,
        vec![
            (Value::Link(p[0]), Value::Link(p[2])),
            (Value::Link(p[0]), Value::Link(p[3])),
            (Value::Link(p[1]), Value::Link(p[2])),
            (Value::Link(p[1]), Value::Link(p[3])),
        ]
    );
    assert_eq!(fixture.count("knows"), 4);
}

#[test]
fn test_edges_are_created_as_rows_are_pulled() {
    let fixture = TestFixture::with_sample_data();
    let p = &fixture.people;
    let mut ctx = fixture.context();
    ctx.set_variable("a", Value::LinkList(vec![p[0], p[1]]));
    ctx.set_variable("b", Value::LinkList(vec![p[2], p[3]]));

    let mut plan = knows_plan(&fixture, false);
    let mut stream = plan.start(&mut ctx).unwrap();
    assert_eq!(fixture.count("knows"), 0);
    assert!(stream.has_next(&ctx).unwrap());
    stream.next(&ctx).unwrap();
    stream.close(&ctx);
    plan.close();
    assert_eq!(fixture.count("knows"), 1);
}

#[test]
fn test_unique_index_prevents_duplicate_edges() {
    let fixture = TestFixture::with_sample_data();
    let p = &fixture.people;
    let mut ctx = fixture.context();
    ctx.set_variable("a", Value::Link(p[0]));
    ctx.set_variable("b", Value::LinkList(vec![p[1], p[2]]));
    let first = run_in(&mut knows_plan(&fixture, true), &mut ctx).unwrap();

    ctx.set_variable("a", Value::Link(p[0]));
    ctx.set_variable("b", Value::LinkList(vec![p[2], p[1]]));
    let second = run_in(&mut knows_plan(&fixture, true), &mut ctx).unwrap();

    assert_eq!(fixture.count("knows"), 2);
    assert_eq!(second[0].rid(), first[1].rid());
    assert_eq!(second[1].rid(), first[0].rid());
}

#[test]
fn test_lightweight_edges_have_no_record() {
    let fixture = TestFixture::with_sample_data();
    let p = &fixture.people;
    let mut ctx = fixture.context();
    ctx.set_variable("a", Value::Link(p[3]));
    ctx.set_variable("b", Value::Link(p[0]));
    let mut plan = ExecutionPlan::new().with_step(CreateEdgesStep::new("Likes", "a", "b", None));

    let rows = run_in(&mut plan, &mut ctx).unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].is_edge());
    assert_eq!(rows[0].rid(), None);
    let liked = fixture.db.load(p[0]).unwrap();
    assert_eq!(liked.property("in_Likes"), Some(&Value::LinkList(vec![p[3]])));
}

#[test]
fn test_expand_links_into_records() {
    let fixture = TestFixture::with_sample_data();
    let p = &fixture.people;
    let mut plan = ExecutionPlan::new()
        .with_step(ValuesStep::column(
            "friends",
            vec![Value::LinkList(vec![p[1], p[2]]), Value::Link(p[3]), Value::Null],
        ))
        .with_step(ExpandStep::new(None));

    let rows = fixture.run(&mut plan).unwrap();
    assert_eq!(
        column(&rows, "name"),
        vec![Value::from("bob"), Value::from("carol"), Value::from("dave")]
    );
    assert!(rows.iter().all(|row| row.is_entity()));
}

#[test]
fn test_expand_needs_a_single_property() {
    let fixture = TestFixture::with_sample_data();
    let mut row = IndexMap::new();
    row.insert("a".to_string(), Value::Integer(1));
    row.insert("b".to_string(), Value::Integer(2));
    let mut plan = ExecutionPlan::new()
        .with_step(ValuesStep::new(vec![row]))
        .with_step(ExpandStep::new(None));
    let err = fixture.run(&mut plan).unwrap_err();
    assert!(err.to_string().contains("Invalid EXPAND on record"));

    // Entity rows stand for themselves
    let mut plan = ExecutionPlan::new()
        .with_step(FetchFromCollectionStep::new("item", true))
        .with_step(ExpandStep::new(None));
    let rows = fixture.run(&mut plan).unwrap();
    let rids: Vec<_> = rows.iter().filter_map(|row| row.rid()).collect();
    assert_eq!(rids, fixture.items);
}

#[test]
fn test_find_references_to_new_edges() {
    let fixture = TestFixture::with_sample_data();
    let p = &fixture.people;
    let mut ctx = fixture.context();
    ctx.set_variable("a", Value::Link(p[0]));
    ctx.set_variable("b", Value::LinkList(vec![p[1], p[2]]));
    let edges: Vec<_> = run_in(&mut knows_plan(&fixture, false), &mut ctx)
        .unwrap()
        .iter()
        .filter_map(|row| row.rid())
        .collect();

    ctx.set_variable("created", Value::LinkList(edges.clone()));
    let mut plan = ExecutionPlan::new()
        .with_step(FetchFromVariableStep::new("created"))
        .with_step(FindReferencesStep::new(Some(vec!["person".to_string()])));
    let rows = run_in(&mut plan, &mut ctx).unwrap();

    let found: Vec<(Value, Value, Value)> = rows
        .iter()
        .map(|row| {
            (
                row.get("rid").unwrap().unwrap(),
                row.get("referredBy").unwrap().unwrap(),
                row.get("fields").unwrap().unwrap(),
            )
        })
        .collect();
    let field = |name: &str| Value::List(vec![Value::from(name)]);
    assert_eq!(
        found,
        vec![
            (Value::Link(edges[0]), Value::Link(p[0]), field("out_Knows")),
            (Value::Link(edges[1]), Value::Link(p[0]), field("out_Knows")),
            (Value::Link(edges[0]), Value::Link(p[1]), field("in_Knows")),
            (Value::Link(edges[1]), Value::Link(p[2]), field("in_Knows")),
        ]
    );
}

#[test]
fn test_copy_entities_from_variable() {
    let fixture = TestFixture::with_sample_data();
    let mut ctx = fixture.context();
    ctx.set_variable(
        "picked",
        Value::LinkList(vec![fixture.items[0], fixture.items[1]]),
    );
    let mut plan = ExecutionPlan::new()
        .with_step(FetchFromVariableStep::new("picked"))
        .with_step(CopyEntityStep::new(Some("Item".to_string())));

    let copies = run_in(&mut plan, &mut ctx).unwrap();
    assert_eq!(copies.len(), 2);
    assert_eq!(fixture.count("item"), 9);
    for (copy, original) in copies.iter().zip(&fixture.items) {
        assert!(copy.is_updatable());
        assert_ne!(copy.rid(), Some(*original));
        let original = fixture.db.load(*original).unwrap();
        assert_eq!(copy.get("n").unwrap().as_ref(), original.property("n"));
        assert_eq!(copy.get("tag").unwrap().as_ref(), original.property("tag"));
    }
}
