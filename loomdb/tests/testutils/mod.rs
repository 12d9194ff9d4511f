// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Test utilities for LoomDB integration tests

#![allow(dead_code)]

pub mod test_fixture;

pub use test_fixture::*;
