// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Values a context variable can be bound to

use super::context::CommandContext;
use super::error::ExecResult;
use super::result::ResultRow;
use super::stream::{self, BoxedStream, ExecutionStream};
use crate::session::Session;
use crate::storage::Value;
use std::fmt;

/// What a variable in the [`CommandContext`] holds.
///
/// A `Stream` can be consumed only once; the other shapes are copied out
/// every time they are read.
pub enum BindableSource {
    /// Output of another plan, pulled lazily
    Stream(BoxedStream),
    /// Materialized rows
    ResultSet(Vec<ResultRow>),
    /// One scalar, link, row or map
    Single(Value),
    /// The elements of a list
    Iterable(Vec<Value>),
}

impl BindableSource {
    /// Wrap a value, unpacking lists into their elements
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::List(_) | Value::LinkList(_) => {
                BindableSource::Iterable(value.into_items().unwrap_or_default())
            }
            Value::Row(row) => BindableSource::ResultSet(vec![*row]),
            other => BindableSource::Single(other),
        }
    }

    pub fn from_rows(rows: Vec<ResultRow>) -> Self {
        BindableSource::ResultSet(rows)
    }

    pub fn from_stream(stream: BoxedStream) -> Self {
        BindableSource::Stream(stream)
    }

    /// Copy of a non-stream source; streams cannot be shared
    pub(crate) fn try_clone(&self) -> Option<Self> {
        match self {
            BindableSource::Stream(_) => None,
            BindableSource::ResultSet(rows) => Some(BindableSource::ResultSet(rows.clone())),
            BindableSource::Single(value) => Some(BindableSource::Single(value.clone())),
            BindableSource::Iterable(items) => Some(BindableSource::Iterable(items.clone())),
        }
    }

    /// Present the source as rows; plain values are wrapped with `to_result`
    pub fn into_stream(self, session: &Session) -> ExecResult<BoxedStream> {
        Ok(match self {
            BindableSource::Stream(stream) => stream,
            BindableSource::ResultSet(rows) => stream::from_rows(rows),
            BindableSource::Single(value) => {
                stream::singleton(ResultRow::to_result(value, None, session)?)
            }
            BindableSource::Iterable(items) => stream::from_rows(
                items
                    .into_iter()
                    .map(|item| ResultRow::to_result(item, None, session))
                    .collect::<ExecResult<_>>()?,
            ),
        })
    }

    /// Every element of the source as a value; rows become `Value::Row`
    pub fn into_values(self, ctx: &CommandContext) -> ExecResult<Vec<Value>> {
        Ok(match self {
            BindableSource::Stream(mut stream) => {
                stream.drain(ctx)?.into_iter().map(Value::from).collect()
            }
            BindableSource::ResultSet(rows) => rows.into_iter().map(Value::from).collect(),
            BindableSource::Single(value) => vec![value],
            BindableSource::Iterable(items) => items,
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BindableSource::Stream(_) => "stream",
            BindableSource::ResultSet(_) => "result set",
            BindableSource::Single(_) => "value",
            BindableSource::Iterable(_) => "list",
        }
    }
}

impl fmt::Debug for BindableSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindableSource::Stream(_) => write!(f, "Stream(..)"),
            BindableSource::ResultSet(rows) => f.debug_tuple("ResultSet").field(rows).finish(),
            BindableSource::Single(value) => f.debug_tuple("Single").field(value).finish(),
            BindableSource::Iterable(items) => f.debug_tuple("Iterable").field(items).finish(),
        }
    }
}

impl From<Value> for BindableSource {
    fn from(value: Value) -> Self {
        BindableSource::from_value(value)
    }
}

impl From<Vec<ResultRow>> for BindableSource {
    fn from(rows: Vec<ResultRow>) -> Self {
        BindableSource::from_rows(rows)
    }
}

impl From<BoxedStream> for BindableSource {
    fn from(stream: BoxedStream) -> Self {
        BindableSource::from_stream(stream)
    }
}
