// Copyright 2026 Shelfcrawl Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shelfcrawl runtime library. Renders storefront listings, drives their
//! pagination and feeds the deduplicating product store.
//!
//! This library crate exposes the runtime modules for the binary and for
//! integration testing.

pub mod cli;
pub mod config;
pub mod crawl;
pub mod extraction;
pub mod logging;
pub mod progress;
pub mod renderer;
