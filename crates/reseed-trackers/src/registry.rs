// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use reqwest::Client;
use reseed_config::{AppConfig, TrackerKind};
use tracing::{info, warn};

use crate::capability::TrackerCapability;
use crate::client::Unit3dTracker;
use crate::error::Result;

/// How a requested tracker is handled.
#[derive(Clone)]
pub enum TrackerHandle {
    Capability(Arc<dyn TrackerCapability>),
    /// Submitted by hand; always approved.
    Manual,
    Unknown,
}

impl std::fmt::Debug for TrackerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Capability(capability) => f
                .debug_tuple("Capability")
                .field(&capability.name())
                .finish(),
            Self::Manual => write!(f, "Manual"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Tracker name to capability lookup. Names are matched case-insensitively.
#[derive(Clone, Default)]
pub struct TrackerRegistry {
    capabilities: BTreeMap<String, Arc<dyn TrackerCapability>>,
    manual: BTreeSet<String>,
}

impl TrackerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &AppConfig, client: Client) -> Result<Self> {
        let mut registry = Self::new();
        for (name, settings) in &config.trackers {
            let name = name.to_uppercase();
            match settings.kind {
                TrackerKind::Manual => registry.register_manual(&name),
                TrackerKind::Unit3d => {
                    let tracker = Unit3dTracker::new(name.clone(), settings, client.clone())?;
                    registry.register(Arc::new(tracker));
                }
            }
        }
        info!(
            target: "trackers",
            capabilities = registry.capabilities.len(),
            manual = registry.manual.len(),
            "tracker registry built"
        );
        Ok(registry)
    }

    pub fn register(&mut self, capability: Arc<dyn TrackerCapability>) {
        let key = capability.name().to_uppercase();
        if self.capabilities.insert(key.clone(), capability).is_some() {
            warn!(target: "trackers", tracker = %key, "replacing registered tracker");
        }
    }

    pub fn register_manual(&mut self, name: &str) {
        self.manual.insert(name.to_uppercase());
    }

    pub fn lookup(&self, name: &str) -> TrackerHandle {
        let key = name.to_uppercase();
        if let Some(capability) = self.capabilities.get(&key) {
            TrackerHandle::Capability(Arc::clone(capability))
        } else if self.manual.contains(&key) {
            TrackerHandle::Manual
        } else {
            TrackerHandle::Unknown
        }
    }

    pub fn is_known(&self, name: &str) -> bool {
        !matches!(self.lookup(name), TrackerHandle::Unknown)
    }
}
