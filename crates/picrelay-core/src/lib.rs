// SPDX-FileCopyrightText: 2026 Picrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for picrelay.
//!
//! Provides the error type, the adapter traits the relay consumes (store,
//! transport, fetcher, clock) and the types passed across them.

pub mod error;
pub mod traits;
pub mod types;

pub use error::PicrelayError;
pub use types::{
    AdapterType, ChatTarget, DownloadedImage, HealthStatus, ParseMode, RunStats, Sighting,
};

pub use traits::{Clock, KeyValueStore, PageFetcher, PluginAdapter, SystemClock, Transport};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_adapter_traits_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_store<T: KeyValueStore>() {}
        fn _assert_transport<T: Transport>() {}
        fn _assert_fetcher<T: PageFetcher>() {}
        fn _assert_clock<T: Clock>() {}
        _assert_clock::<SystemClock>();
    }

    #[test]
    fn adapter_type_serialization() {
        let json = serde_json::to_string(&AdapterType::Transport).unwrap();
        let parsed: AdapterType = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, AdapterType::Transport);
    }
}
