// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Concatenation of lazily produced sub-streams

use super::{BoxedStream, ExecutionStream};
use crate::exec::context::CommandContext;
use crate::exec::error::{ExecResult, ExecutionError};
use crate::exec::result::ResultRow;

/// Source of sub-streams for [`MultipleExecutionStream`]
pub trait StreamProducer {
    /// Open the next sub-stream, or `None` when there are no more
    fn next_stream(&mut self, ctx: &CommandContext) -> ExecResult<Option<BoxedStream>>;

    /// Release whatever the producer still holds
    fn close(&mut self, ctx: &CommandContext);
}

/// Producer opening one sub-stream per item of an iterator
pub struct IterProducer<I, F> {
    items: I,
    open: F,
}

impl<I, F> IterProducer<I, F>
where
    I: Iterator,
    F: FnMut(I::Item, &CommandContext) -> ExecResult<BoxedStream>,
{
    pub fn new(items: I, open: F) -> Self {
        Self { items, open }
    }
}

impl<I, F> StreamProducer for IterProducer<I, F>
where
    I: Iterator,
    F: FnMut(I::Item, &CommandContext) -> ExecResult<BoxedStream>,
{
    fn next_stream(&mut self, ctx: &CommandContext) -> ExecResult<Option<BoxedStream>> {
        match self.items.next() {
            Some(item) => (self.open)(item, ctx).map(Some),
            None => Ok(None),
        }
    }

    fn close(&mut self, _ctx: &CommandContext) {
        for _ in self.items.by_ref() {}
    }
}

/// One continuous stream over the sub-streams of a producer.
///
/// A sub-stream is closed as soon as it is exhausted and the next one is
/// requested only when a row is needed.
pub struct MultipleExecutionStream<P> {
    producer: P,
    current: Option<BoxedStream>,
    finished: bool,
}

impl<P: StreamProducer> MultipleExecutionStream<P> {
    pub fn new(producer: P) -> Self {
        Self {
            producer,
            current: None,
            finished: false,
        }
    }
}

impl<P: StreamProducer> ExecutionStream for MultipleExecutionStream<P> {
    fn has_next(&mut self, ctx: &CommandContext) -> ExecResult<bool> {
        loop {
            if let Some(current) = self.current.as_mut() {
                if current.has_next(ctx)? {
                    return Ok(true);
                }
                current.close(ctx);
                self.current = None;
            }
            if self.finished {
                return Ok(false);
            }
            match self.producer.next_stream(ctx)? {
                Some(stream) => self.current = Some(stream),
                None => self.finished = true,
            }
        }
    }

    fn next(&mut self, ctx: &CommandContext) -> ExecResult<ResultRow> {
        if !self.has_next(ctx)? {
            return Err(ExecutionError::NoSuchElement);
        }
        match self.current.as_mut() {
            Some(current) => current.next(ctx),
            None => Err(ExecutionError::NoSuchElement),
        }
    }

    fn close(&mut self, ctx: &CommandContext) {
        if let Some(mut current) = self.current.take() {
            current.close(ctx);
        }
        if !self.finished {
            self.finished = true;
            self.producer.close(ctx);
        }
    }
}
