//! Zone directory: the immutable list of zones fetched once per controller.

use std::sync::Arc;

use sprinklr_protocol::{Zone, ZoneId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneDirectory {
    zones: Arc<[Zone]>,
}

impl ZoneDirectory {
    pub fn new(mut zones: Vec<Zone>) -> Self {
        zones.sort_by_key(|z| z.id);
        zones.dedup_by_key(|z| z.id);
        Self {
            zones: zones.into(),
        }
    }

    pub fn get(&self, id: ZoneId) -> Option<&Zone> {
        self.zones
            .binary_search_by_key(&id, |z| z.id)
            .ok()
            .map(|idx| &self.zones[idx])
    }

    pub fn name_of(&self, id: ZoneId) -> Option<&str> {
        self.get(id).map(|z| z.name.as_str())
    }

    /// Display label, falling back to the bare id for unknown zones.
    pub fn label(&self, id: ZoneId) -> String {
        match self.name_of(id) {
            Some(name) => name.to_string(),
            None => format!("Zone {id}"),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}
