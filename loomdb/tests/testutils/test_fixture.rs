// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Test fixture for LoomDB integration tests
//!
//! Every fixture owns its own database, so tests stay independent when run
//! in parallel.

use loomdb::exec::{CommandContext, ExecResult, ExecutionPlan, ExecutionStream, ResultRow};
use loomdb::storage::indexes::{Index, IndexAlgorithm, IndexDefinition, IndexType};
use loomdb::storage::{ClassKind, Database, PropertyType, Rid, Value};
use loomdb::{ExecutionConfig, Session};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Route `log` output through the test harness; safe to call repeatedly
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Isolated database with a session and, optionally, sample data
pub struct TestFixture {
    pub db: Arc<Database>,
    pub session: Session,
    /// Person vertices, in insertion order
    pub people: Vec<Rid>,
    /// Item documents, in insertion order
    pub items: Vec<Rid>,
}

impl TestFixture {
    /// Empty schema: `Person` vertices, `Knows` edges, lightweight `Likes`
    /// edges and `Item` documents
    pub fn new() -> Self {
        Self::with_config(ExecutionConfig::default())
    }

    pub fn with_config(config: ExecutionConfig) -> Self {
        init_logging();
        let db = Arc::new(Database::new(format!("test_db_{}", fastrand::u64(..))));
        db.create_class("Person", ClassKind::Vertex)
            .expect("Failed to create Person");
        db.create_class("Knows", ClassKind::Edge)
            .expect("Failed to create Knows");
        db.create_class("Likes", ClassKind::LightweightEdge)
            .expect("Failed to create Likes");
        db.create_class("Item", ClassKind::Document)
            .expect("Failed to create Item");
        let session = Session::open_with_config(Arc::clone(&db), config);
        Self {
            db,
            session,
            people: Vec::new(),
            items: Vec::new(),
        }
    }

    /// Fixture with four people and items `n = 1..=6` tagged `x`/`y`, plus
    /// one item without `n`.
    ///
    /// Indexes: `Item.n` (B-tree), `Item.n_nonnull` (B-tree ignoring nulls),
    /// `Item.n_tag` (hash over `n, tag`) and `Knows.out_in` (unique hash).
    pub fn with_sample_data() -> Self {
        let mut fixture = Self::new();
        for name in ["alice", "bob", "carol", "dave"] {
            let rid = fixture.insert("Person", vec![("name", Value::from(name))]);
            fixture.people.push(rid);
        }
        for n in 1..=6i64 {
            let tag = if n % 2 == 0 { "y" } else { "x" };
            let rid = fixture.insert(
                "Item",
                vec![("n", Value::Integer(n)), ("tag", Value::from(tag))],
            );
            fixture.items.push(rid);
        }
        let rid = fixture.insert("Item", vec![("tag", Value::from("x"))]);
        fixture.items.push(rid);

        fixture.create_index(
            "Item.n",
            IndexDefinition::new("Item", vec![("n", PropertyType::Integer)])
                .expect("Failed to define Item.n"),
            IndexType::NotUnique,
            IndexAlgorithm::BTree,
        );
        fixture.create_index(
            "Item.n_nonnull",
            IndexDefinition::new("Item", vec![("n", PropertyType::Integer)])
                .expect("Failed to define Item.n_nonnull")
                .ignore_nulls(),
            IndexType::NotUnique,
            IndexAlgorithm::BTree,
        );
        fixture.create_index(
            "Item.n_tag",
            IndexDefinition::new(
                "Item",
                vec![("n", PropertyType::Integer), ("tag", PropertyType::String)],
            )
            .expect("Failed to define Item.n_tag"),
            IndexType::NotUnique,
            IndexAlgorithm::Hash,
        );
        fixture.create_index(
            "Knows.out_in",
            IndexDefinition::new(
                "Knows",
                vec![("out", PropertyType::Link), ("in", PropertyType::Link)],
            )
            .expect("Failed to define Knows.out_in"),
            IndexType::Unique,
            IndexAlgorithm::Hash,
        );
        fixture
    }

    pub fn insert(&self, class: &str, properties: Vec<(&str, Value)>) -> Rid {
        let properties: BTreeMap<String, Value> = properties
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        self.db
            .insert(Some(class), properties)
            .expect("Failed to insert record")
            .rid
    }

    pub fn create_index(
        &self,
        name: &str,
        definition: IndexDefinition,
        index_type: IndexType,
        algorithm: IndexAlgorithm,
    ) -> Arc<dyn Index> {
        self.db
            .create_index(name, definition, index_type, algorithm)
            .expect("Failed to create index")
    }

    pub fn index(&self, name: &str) -> Arc<dyn Index> {
        self.db.index(name).expect("Unknown index")
    }

    pub fn context(&self) -> CommandContext {
        CommandContext::new(self.session.clone())
    }

    /// Start the plan and pull every row
    pub fn run(&self, plan: &mut ExecutionPlan) -> ExecResult<Vec<ResultRow>> {
        let mut ctx = self.context();
        run_in(plan, &mut ctx)
    }

    pub fn count(&self, collection: &str) -> usize {
        let id = self
            .db
            .collection_id(collection)
            .expect("Unknown collection");
        self.db.count(id)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Start the plan in `ctx` and pull every row
pub fn run_in(plan: &mut ExecutionPlan, ctx: &mut CommandContext) -> ExecResult<Vec<ResultRow>> {
    let mut stream = plan.start(ctx)?;
    stream.drain(ctx)
}

/// Values of one column, absent values as `Value::Null`
pub fn column(rows: &[ResultRow], name: &str) -> Vec<Value> {
    rows.iter()
        .map(|row| {
            row.get(name)
                .expect("Failed to read column")
                .unwrap_or(Value::Null)
        })
        .collect()
}

pub fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().copied().map(Value::Integer).collect()
}
