//! Connected-switch registry

use super::{FlowRule, SwitchConnection, SwitchId};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Lock-guarded cache of switch connections keyed by datapath id.
#[derive(Default)]
pub struct SwitchRegistry {
    connections: RwLock<BTreeMap<SwitchId, Arc<dyn SwitchConnection>>>,
}

impl SwitchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a switch and provision its table-miss flow.
    ///
    /// A reconnecting switch replaces its previous connection.
    pub fn connect(&self, switch: SwitchId, connection: Arc<dyn SwitchConnection>) -> Result<()> {
        let replaced = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(switch, Arc::clone(&connection))
            .is_some();

        if replaced {
            debug!("Switch {} reconnected", switch);
        } else {
            info!("Switch {} connected", switch);
        }

        connection.program(&FlowRule::table_miss())
    }

    /// Forget a switch. Returns whether it was connected.
    pub fn disconnect(&self, switch: SwitchId) -> bool {
        let removed = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&switch)
            .is_some();
        if removed {
            info!("Switch {} disconnected", switch);
        }
        removed
    }

    pub fn get(&self, switch: SwitchId) -> Result<Arc<dyn SwitchConnection>> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&switch)
            .cloned()
            .ok_or(Error::SwitchUnavailable(switch))
    }

    pub fn is_connected(&self, switch: SwitchId) -> bool {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&switch)
    }

    pub fn connected(&self) -> Vec<SwitchId> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
