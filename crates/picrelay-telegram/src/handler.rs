// SPDX-FileCopyrightText: 2026 Picrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns pending Telegram updates into username sightings.
//!
//! Any private message to the bot (typically `/start`) reveals the
//! sender's chat id, which is the only way to address a user by name.

use picrelay_core::Sighting;
use teloxide::types::{Message, Update, UpdateKind};
use tracing::debug;

/// Extracts a sighting from a message whose chat has a username.
pub fn sighting_from_message(msg: &Message) -> Option<Sighting> {
    let username = msg.chat.username()?.trim();
    if username.is_empty() {
        return None;
    }
    Some(Sighting {
        username: username.to_lowercase(),
        id: msg.chat.id.0,
    })
}

/// Collects sightings from a batch of updates, ignoring non-message updates.
pub fn sightings_from_updates(updates: &[Update]) -> Vec<Sighting> {
    updates
        .iter()
        .filter_map(|update| match &update.kind {
            UpdateKind::Message(msg) => sighting_from_message(msg),
            _ => {
                debug!(update_id = update.id.0, "ignoring non-message update");
                None
            }
        })
        .collect()
}
