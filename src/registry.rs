//! Activity → instance identifier index.
//!
//! Built once at startup and shared by `Arc` with every handler. The
//! mapping is not persisted: any activity missing from it resolves to the
//! deterministic [`derive_instance_id`] value, so losing it is harmless.

use crate::core::{derive_instance_id, Result};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
pub struct InstanceRegistry {
    ids: Mutex<HashMap<String, String>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_instance_id(&self, activity_id: &str) -> Result<Option<String>> {
        let ids = self.ids.lock()?;
        Ok(ids.get(activity_id).cloned())
    }

    pub fn set_instance_id(&self, activity_id: &str, instance_id: &str) -> Result<()> {
        let mut ids = self.ids.lock()?;
        ids.insert(activity_id.to_string(), instance_id.to_string());
        Ok(())
    }

    /// Known id for `activity_id`, or the derived one, registered on the spot.
    pub fn resolve(&self, activity_id: &str) -> Result<String> {
        let mut ids = self.ids.lock()?;
        if let Some(instance_id) = ids.get(activity_id) {
            return Ok(instance_id.clone());
        }
        let instance_id = derive_instance_id(activity_id);
        ids.insert(activity_id.to_string(), instance_id.clone());
        debug!(activity_id, instance_id = %instance_id, "instance id registered");
        Ok(instance_id)
    }

    /// Like [`resolve`](Self::resolve) but without registering anything.
    pub fn lookup_or_derive(&self, activity_id: &str) -> Result<String> {
        Ok(self
            .get_instance_id(activity_id)?
            .unwrap_or_else(|| derive_instance_id(activity_id)))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.ids.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
