// SPDX-FileCopyrightText: 2026 Picrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for picrelay.
//!
//! Provides in-process stand-ins for every adapter so pipelines can be
//! exercised deterministically without a network or a database.
//!
//! # Components
//!
//! - [`MemoryStore`] - in-memory key-value store with injectable write failures
//! - [`MockTransport`] - records every delivery, scripted send failures
//! - [`MockFetcher`] - canned pages and images
//! - [`ManualClock`] - wall clock moved by hand

pub mod clock;
pub mod mock_fetcher;
pub mod mock_store;
pub mod mock_transport;

pub use clock::ManualClock;
pub use mock_fetcher::MockFetcher;
pub use mock_store::MemoryStore;
pub use mock_transport::{MockTransport, Sent};
