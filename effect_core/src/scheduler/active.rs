//! Active-instance records for DamageOverTime and Aura templates

use crate::pool::{Handle, SlotPool};
use crate::types::{Millis, TemplateId};
use std::collections::HashMap;

/// Most recent running instance of one template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveRecord {
    pub template: TemplateId,
    pub end_time: Millis,
    pub last_apply_time: Millis,
    /// Start of the pulse grid that `Extend` appends onto
    pub pulse_anchor: Millis,
    pub group_mask: u32,
    /// Strongest resolved magnitude seen by this instance
    pub magnitude: i32,
}

impl ActiveRecord {
    pub fn is_running(&self, now: Millis) -> bool {
        self.end_time > now
    }
}

/// One record per template id, stored in a generational pool
#[derive(Debug, Clone)]
pub struct ActiveTracker {
    pool: SlotPool<ActiveRecord>,
    by_template: HashMap<TemplateId, Handle<ActiveRecord>>,
}

impl ActiveTracker {
    pub fn new(capacity: usize) -> Self {
        ActiveTracker {
            pool: SlotPool::with_capacity(capacity),
            by_template: HashMap::new(),
        }
    }

    pub fn get(&self, template: TemplateId) -> Option<&ActiveRecord> {
        let handle = self.by_template.get(&template)?;
        self.pool.get(*handle)
    }

    /// Record for `template` if its instance has not ended by `now`
    pub fn running(&self, template: TemplateId, now: Millis) -> Option<&ActiveRecord> {
        self.get(template).filter(|r| r.is_running(now))
    }

    pub fn get_mut(&mut self, template: TemplateId) -> Option<&mut ActiveRecord> {
        let handle = self.by_template.get(&template)?;
        self.pool.get_mut(*handle)
    }

    /// Insert or overwrite the record for its template; false when full
    pub fn upsert(&mut self, record: ActiveRecord) -> bool {
        if let Some(existing) = self.get_mut(record.template) {
            *existing = record;
            return true;
        }
        match self.pool.insert(record) {
            Ok(handle) => {
                self.by_template.insert(record.template, handle);
                true
            }
            Err(_) => false,
        }
    }

    pub fn remove(&mut self, template: TemplateId) -> Option<ActiveRecord> {
        let handle = self.by_template.remove(&template)?;
        self.pool.remove(handle)
    }

    /// Running records sharing a bit of `mask`
    pub fn conflicts(&self, mask: u32, now: Millis) -> Vec<ActiveRecord> {
        self.pool
            .iter()
            .map(|(_, r)| *r)
            .filter(|r| r.group_mask & mask != 0 && r.is_running(now))
            .collect()
    }

    /// Drop records whose instance ended at or before `now`
    pub fn prune(&mut self, now: Millis) -> usize {
        let ended: Vec<TemplateId> = self
            .pool
            .iter()
            .filter(|(_, r)| !r.is_running(now))
            .map(|(_, r)| r.template)
            .collect();
        for template in &ended {
            self.remove(*template);
        }
        ended.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveRecord> {
        self.pool.iter().map(|(_, r)| r)
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn clear(&mut self) {
        self.pool.clear();
        self.by_template.clear();
    }
}
