// SPDX-FileCopyrightText: 2026 Picrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! Every collaborator the relay talks to (store, transport, fetcher) extends
//! the [`PluginAdapter`] base trait and uses `#[async_trait]` so it can be
//! held as a trait object.

pub mod adapter;
pub mod clock;
pub mod fetcher;
pub mod store;
pub mod transport;

pub use adapter::PluginAdapter;
pub use clock::{Clock, SystemClock};
pub use fetcher::PageFetcher;
pub use store::KeyValueStore;
pub use transport::Transport;
