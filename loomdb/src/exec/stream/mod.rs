// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Pull-based execution streams
//!
//! Every step hands its successor an [`ExecutionStream`]. Consumers call
//! `has_next`/`next` to pull rows one at a time and must call `close` once
//! they are done, drained or not, so that index cursors and sub-streams are
//! released.

pub mod multiple;

pub use multiple::{IterProducer, MultipleExecutionStream, StreamProducer};

use super::context::CommandContext;
use super::error::{ExecResult, ExecutionError};
use super::result::ResultRow;
use std::iter::Peekable;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Type-erased stream handed between steps
pub type BoxedStream = Box<dyn ExecutionStream>;

/// Lazy, closeable sequence of result rows
pub trait ExecutionStream {
    /// Whether another row is available. May pull from upstream.
    fn has_next(&mut self, ctx: &CommandContext) -> ExecResult<bool>;

    /// The next row; `NoSuchElement` once exhausted
    fn next(&mut self, ctx: &CommandContext) -> ExecResult<ResultRow>;

    /// Release underlying resources. Calling it more than once is a no-op.
    fn close(&mut self, ctx: &CommandContext);

    /// Pull every remaining row, then close
    fn drain(&mut self, ctx: &CommandContext) -> ExecResult<Vec<ResultRow>> {
        let mut rows = Vec::new();
        let result = (|| -> ExecResult<()> {
            while self.has_next(ctx)? {
                rows.push(self.next(ctx)?);
            }
            Ok(())
        })();
        self.close(ctx);
        result.map(|_| rows)
    }

    fn boxed(self) -> BoxedStream
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }

    /// Transform every row
    fn map<F>(self, f: F) -> MapStream<Self, F>
    where
        Self: Sized,
        F: FnMut(ResultRow, &CommandContext) -> ExecResult<ResultRow>,
    {
        MapStream { inner: self, f }
    }

    /// Keep the rows for which `f` returns `Some`, possibly transformed
    fn filter<F>(self, f: F) -> FilterStream<Self, F>
    where
        Self: Sized,
        F: FnMut(ResultRow, &CommandContext) -> ExecResult<Option<ResultRow>>,
    {
        FilterStream {
            inner: self,
            f,
            peeked: None,
        }
    }

    /// Replace every row by the stream `f` produces for it
    fn flat_map<F>(self, f: F) -> FlatMapStream<Self, F>
    where
        Self: Sized,
        F: FnMut(ResultRow, &CommandContext) -> ExecResult<BoxedStream>,
    {
        FlatMapStream {
            inner: self,
            f,
            current: None,
        }
    }

    /// Run `f` once, after the stream itself has been closed
    fn on_close<F>(self, f: F) -> OnCloseStream<Self>
    where
        Self: Sized,
        F: FnOnce(&CommandContext) + 'static,
    {
        OnCloseStream {
            inner: self,
            callback: Some(Box::new(f)),
        }
    }

    /// Check for cancellation before every pull
    fn interruptible(self) -> InterruptibleStream<Self>
    where
        Self: Sized,
    {
        InterruptibleStream { inner: self }
    }
}

impl ExecutionStream for BoxedStream {
    fn has_next(&mut self, ctx: &CommandContext) -> ExecResult<bool> {
        (**self).has_next(ctx)
    }

    fn next(&mut self, ctx: &CommandContext) -> ExecResult<ResultRow> {
        (**self).next(ctx)
    }

    fn close(&mut self, ctx: &CommandContext) {
        (**self).close(ctx)
    }

    fn boxed(self) -> BoxedStream {
        self
    }
}

/// Stream with no rows
pub fn empty() -> BoxedStream {
    Box::new(EmptyStream)
}

/// Stream with exactly one row
pub fn singleton(row: ResultRow) -> BoxedStream {
    from_rows(vec![row])
}

/// Stream over already materialized rows
pub fn from_rows(rows: Vec<ResultRow>) -> BoxedStream {
    from_iter(rows.into_iter())
}

/// Stream over a lazy row iterator
pub fn from_iter<I>(iter: I) -> BoxedStream
where
    I: Iterator<Item = ResultRow> + 'static,
{
    Box::new(IterStream {
        iter: Some(iter.peekable()),
    })
}

/// Stream over a lazy iterator whose items may fail
pub fn from_results<I>(iter: I) -> BoxedStream
where
    I: Iterator<Item = ExecResult<ResultRow>> + 'static,
{
    Box::new(ResultIterStream {
        iter: Some(iter.peekable()),
    })
}

struct EmptyStream;

impl ExecutionStream for EmptyStream {
    fn has_next(&mut self, _ctx: &CommandContext) -> ExecResult<bool> {
        Ok(false)
    }

    fn next(&mut self, _ctx: &CommandContext) -> ExecResult<ResultRow> {
        Err(ExecutionError::NoSuchElement)
    }

    fn close(&mut self, _ctx: &CommandContext) {}
}

struct IterStream<I: Iterator<Item = ResultRow>> {
    iter: Option<Peekable<I>>,
}

impl<I: Iterator<Item = ResultRow>> ExecutionStream for IterStream<I> {
    fn has_next(&mut self, _ctx: &CommandContext) -> ExecResult<bool> {
        Ok(self.iter.as_mut().map_or(false, |it| it.peek().is_some()))
    }

    fn next(&mut self, _ctx: &CommandContext) -> ExecResult<ResultRow> {
        self.iter
            .as_mut()
            .and_then(Iterator::next)
            .ok_or(ExecutionError::NoSuchElement)
    }

    fn close(&mut self, _ctx: &CommandContext) {
        self.iter = None;
    }
}

struct ResultIterStream<I: Iterator<Item = ExecResult<ResultRow>>> {
    iter: Option<Peekable<I>>,
}

impl<I: Iterator<Item = ExecResult<ResultRow>>> ExecutionStream for ResultIterStream<I> {
    fn has_next(&mut self, _ctx: &CommandContext) -> ExecResult<bool> {
        match self.iter.as_mut().and_then(Peekable::peek) {
            None => Ok(false),
            Some(Ok(_)) => Ok(true),
            // Surface the failure on has_next, leaving it for next to consume
            Some(Err(e)) => Err(e.clone()),
        }
    }

    fn next(&mut self, _ctx: &CommandContext) -> ExecResult<ResultRow> {
        self.iter
            .as_mut()
            .and_then(Iterator::next)
            .unwrap_or(Err(ExecutionError::NoSuchElement))
    }

    fn close(&mut self, _ctx: &CommandContext) {
        self.iter = None;
    }
}

pub struct MapStream<S, F> {
    inner: S,
    f: F,
}

impl<S, F> ExecutionStream for MapStream<S, F>
where
    S: ExecutionStream,
    F: FnMut(ResultRow, &CommandContext) -> ExecResult<ResultRow>,
{
    fn has_next(&mut self, ctx: &CommandContext) -> ExecResult<bool> {
        self.inner.has_next(ctx)
    }

    fn next(&mut self, ctx: &CommandContext) -> ExecResult<ResultRow> {
        let row = self.inner.next(ctx)?;
        (self.f)(row, ctx)
    }

    fn close(&mut self, ctx: &CommandContext) {
        self.inner.close(ctx)
    }
}

/// Filter with a one-row lookahead so `has_next` is exact
pub struct FilterStream<S, F> {
    inner: S,
    f: F,
    peeked: Option<ResultRow>,
}

impl<S, F> ExecutionStream for FilterStream<S, F>
where
    S: ExecutionStream,
    F: FnMut(ResultRow, &CommandContext) -> ExecResult<Option<ResultRow>>,
{
    fn has_next(&mut self, ctx: &CommandContext) -> ExecResult<bool> {
        while self.peeked.is_none() {
            if !self.inner.has_next(ctx)? {
                return Ok(false);
            }
            let row = self.inner.next(ctx)?;
            self.peeked = (self.f)(row, ctx)?;
        }
        Ok(true)
    }

    fn next(&mut self, ctx: &CommandContext) -> ExecResult<ResultRow> {
        if !self.has_next(ctx)? {
            return Err(ExecutionError::NoSuchElement);
        }
        self.peeked.take().ok_or(ExecutionError::NoSuchElement)
    }

    fn close(&mut self, ctx: &CommandContext) {
        self.peeked = None;
        self.inner.close(ctx)
    }
}

pub struct FlatMapStream<S, F> {
    inner: S,
    f: F,
    current: Option<BoxedStream>,
}

impl<S, F> ExecutionStream for FlatMapStream<S, F>
where
    S: ExecutionStream,
    F: FnMut(ResultRow, &CommandContext) -> ExecResult<BoxedStream>,
{
    fn has_next(&mut self, ctx: &CommandContext) -> ExecResult<bool> {
        loop {
            if let Some(current) = self.current.as_mut() {
                if current.has_next(ctx)? {
                    return Ok(true);
                }
                current.close(ctx);
                self.current = None;
            }
            if !self.inner.has_next(ctx)? {
                return Ok(false);
            }
            let row = self.inner.next(ctx)?;
            self.current = Some((self.f)(row, ctx)?);
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
        self.inner.close(ctx)
    }
}

pub struct OnCloseStream<S> {
    inner: S,
    callback: Option<Box<dyn FnOnce(&CommandContext)>>,
}

impl<S: ExecutionStream> ExecutionStream for OnCloseStream<S> {
    fn has_next(&mut self, ctx: &CommandContext) -> ExecResult<bool> {
        self.inner.has_next(ctx)
    }

    fn next(&mut self, ctx: &CommandContext) -> ExecResult<ResultRow> {
        self.inner.next(ctx)
    }

    fn close(&mut self, ctx: &CommandContext) {
        self.inner.close(ctx);
        if let Some(callback) = self.callback.take() {
            callback(ctx);
        }
    }
}

pub struct InterruptibleStream<S> {
    inner: S,
}

impl<S: ExecutionStream> ExecutionStream for InterruptibleStream<S> {
    fn has_next(&mut self, ctx: &CommandContext) -> ExecResult<bool> {
        ctx.check_interrupted()?;
        self.inner.has_next(ctx)
    }

    fn next(&mut self, ctx: &CommandContext) -> ExecResult<ResultRow> {
        ctx.check_interrupted()?;
        self.inner.next(ctx)
    }

    fn close(&mut self, ctx: &CommandContext) {
        self.inner.close(ctx)
    }
}

/// Adds the wall time spent inside the wrapped stream to a step's cost
pub(crate) struct ProfilingStream {
    inner: BoxedStream,
    cost: Arc<AtomicU64>,
}

impl ProfilingStream {
    pub(crate) fn new(inner: BoxedStream, cost: Arc<AtomicU64>) -> Self {
        Self { inner, cost }
    }

    fn timed<T>(&mut self, f: impl FnOnce(&mut BoxedStream) -> T) -> T {
        let started = Instant::now();
        let result = f(&mut self.inner);
        let elapsed = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.cost.fetch_add(elapsed, Ordering::Relaxed);
        result
    }
}

impl ExecutionStream for ProfilingStream {
    fn has_next(&mut self, ctx: &CommandContext) -> ExecResult<bool> {
        self.timed(|inner| inner.has_next(ctx))
    }

    fn next(&mut self, ctx: &CommandContext) -> ExecResult<ResultRow> {
        self.timed(|inner| inner.next(ctx))
    }

    fn close(&mut self, ctx: &CommandContext) {
        self.timed(|inner| inner.close(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::CancellationToken;
    use crate::session::Session;
    use crate::storage::{Database, Value};
    use std::cell::Cell;
    use std::rc::Rc;

    fn context() -> CommandContext {
        CommandContext::new(Session::open(Arc::new(Database::new("streams"))))
    }

    fn numbers(n: i64) -> BoxedStream {
        from_iter((0..n).map(|i| ResultRow::from_pairs(None, [("n", Value::Integer(i))])))
    }

    fn values(rows: Vec<ResultRow>) -> Vec<i64> {
        rows.iter()
            .map(|r| r.get("n").unwrap().and_then(|v| v.as_integer()).unwrap())
            .collect()
    }

    #[test]
    fn test_empty_and_singleton() {
        let ctx = context();
        let mut stream = empty();
        assert!(!stream.has_next(&ctx).unwrap());
        assert_eq!(stream.next(&ctx), Err(ExecutionError::NoSuchElement));

        let mut stream = singleton(ResultRow::detached());
        assert!(stream.has_next(&ctx).unwrap());
        assert!(stream.has_next(&ctx).unwrap());
        stream.next(&ctx).unwrap();
        assert!(!stream.has_next(&ctx).unwrap());
    }

    #[test]
    fn test_map_and_filter() {
        let ctx = context();
        let mut stream = numbers(10)
            .filter(|row, _| {
                let even = row.get("n")?.and_then(|v| v.as_integer()).unwrap_or(1) % 2 == 0;
                Ok(even.then_some(row))
            })
            .map(|mut row, _| {
                let n = row.get("n")?.and_then(|v| v.as_integer()).unwrap_or(0);
                row.set("n", n * 10)?;
                Ok(row)
            });
        assert_eq!(values(stream.drain(&ctx).unwrap()), vec![0, 20, 40, 60, 80]);
    }

    #[test]
    fn test_flat_map_closes_each_inner_stream() {
        let ctx = context();
        let closed = Rc::new(Cell::new(0));
        let counter = Rc::clone(&closed);
        let mut stream = numbers(3).flat_map(move |row, _| {
            let n = row.get("n")?.and_then(|v| v.as_integer()).unwrap_or(0);
            let counter = Rc::clone(&counter);
            Ok(numbers(n)
                .on_close(move |_| counter.set(counter.get() + 1))
                .boxed())
        });
        assert_eq!(values(stream.drain(&ctx).unwrap()), vec![0, 0, 1]);
        assert_eq!(closed.get(), 3);
    }

    #[test]
    fn test_on_close_runs_once() {
        let ctx = context();
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let mut stream = numbers(5).on_close(move |_| counter.set(counter.get() + 1));
        stream.next(&ctx).unwrap();
        stream.close(&ctx);
        stream.close(&ctx);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_interruptible_stops_on_cancel() {
        let token = CancellationToken::new();
        let ctx = context().with_cancellation(token.clone());
        let mut stream = numbers(100).interruptible();
        assert!(stream.has_next(&ctx).unwrap());
        stream.next(&ctx).unwrap();
        token.cancel();
        let err = stream.has_next(&ctx).unwrap_err();
        assert!(err.is_interrupted());
    }

    #[test]
    fn test_results_stream_surfaces_errors() {
        let ctx = context();
        let items = vec![
            Ok(ResultRow::detached()),
            Err(ExecutionError::command("boom")),
        ];
        let mut stream = from_results(items.into_iter());
        assert!(stream.has_next(&ctx).unwrap());
        stream.next(&ctx).unwrap();
        assert!(stream.has_next(&ctx).is_err());
        assert!(stream.next(&ctx).is_err());
        assert!(!stream.has_next(&ctx).unwrap());
    }

    #[test]
    fn test_profiling_accumulates_cost() {
        let ctx = context();
        let cost = Arc::new(AtomicU64::new(0));
        let mut stream = ProfilingStream::new(numbers(1000), Arc::clone(&cost));
        assert_eq!(stream.drain(&ctx).unwrap().len(), 1000);
        assert!(cost.load(Ordering::Relaxed) > 0);
    }
}
