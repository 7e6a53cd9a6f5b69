// SPDX-License-Identifier: GPL-3.0-or-later

//! Tracker capabilities used by the upload decision pipeline.
//!
//! Every tracker exposes the same contract ([`TrackerCapability`]): credential validation,
//! banned-group and claim checks, duplicate search, and best-effort name negotiation.
//! [`Unit3dTracker`] implements it over the UNIT3D JSON API, and [`TrackerRegistry`] builds the
//! set of configured trackers.

pub mod capability;
pub mod client;
#[cfg(test)]
mod client_tests;
pub mod error;
pub mod models;
pub mod registry;

pub use capability::{is_banned_group, TrackerCapability};
pub use client::Unit3dTracker;
pub use error::{Result, TrackerError};
pub use models::{CredentialCheck, DuplicateSearch, NameNegotiation};
pub use registry::{TrackerHandle, TrackerRegistry};
