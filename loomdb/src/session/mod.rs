// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Database sessions
//!
//! A session is the handle query execution uses to read and write records.
//! Rows produced during execution stay bound to the session that produced
//! them and become unusable once it is closed.

pub mod models;

pub use models::{CreatedEdge, Session};
