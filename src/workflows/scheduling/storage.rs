//! In-memory store adapters.
//!
//! The service only talks to the store traits, so these adapters double as
//! the development backend and the test harness. Updates enforce the
//! compare-and-update contract: a write whose revision does not match the
//! persisted record fails with [`StoreError::StaleRevision`] instead of
//! clobbering a concurrent writer.

use std::collections::HashMap;
use std::sync::Mutex;

use super::domain::{Application, ApplicationId, PharmacistId, PharmacyId, Shift, ShiftId};
use super::repository::{
    ApplicationStore, ContactDirectory, PharmacistContact, PharmacyContact, ShiftQuery,
    ShiftStore, StoreError,
};

#[derive(Default)]
pub struct MemoryShiftStore {
    records: Mutex<HashMap<ShiftId, Shift>>,
}

impl ShiftStore for MemoryShiftStore {
    fn insert(&self, mut shift: Shift) -> Result<Shift, StoreError> {
        let mut guard = self.records.lock().expect("shift store mutex poisoned");
        if guard.contains_key(&shift.id) {
            return Err(StoreError::Duplicate);
        }
        shift.revision = 1;
        guard.insert(shift.id.clone(), shift.clone());
        Ok(shift)
    }

    fn fetch(&self, id: &ShiftId) -> Result<Option<Shift>, StoreError> {
        let guard = self.records.lock().expect("shift store mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn update(&self, mut shift: Shift) -> Result<Shift, StoreError> {
        let mut guard = self.records.lock().expect("shift store mutex poisoned");
        let current = guard.get(&shift.id).ok_or(StoreError::NotFound)?;
        if current.revision != shift.revision {
            return Err(StoreError::StaleRevision);
        }
        shift.revision += 1;
        guard.insert(shift.id.clone(), shift.clone());
        Ok(shift)
    }

    fn delete(&self, id: &ShiftId) -> Result<Option<Shift>, StoreError> {
        let mut guard = self.records.lock().expect("shift store mutex poisoned");
        Ok(guard.remove(id))
    }

    fn search(&self, query: &ShiftQuery) -> Result<Vec<Shift>, StoreError> {
        let guard = self.records.lock().expect("shift store mutex poisoned");
        let mut found: Vec<Shift> = guard
            .values()
            .filter(|shift| query.matches(shift))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.window.start.cmp(&b.window.start).then_with(|| a.id.0.cmp(&b.id.0)));
        Ok(found)
    }
}

#[derive(Default)]
pub struct MemoryApplicationStore {
    records: Mutex<HashMap<ApplicationId, Application>>,
}

impl ApplicationStore for MemoryApplicationStore {
    fn insert(&self, mut application: Application) -> Result<Application, StoreError> {
        let mut guard = self
            .records
            .lock()
            .expect("application store mutex poisoned");
        if guard.contains_key(&application.id) {
            return Err(StoreError::Duplicate);
        }
        // Uniqueness constraint on the active (shift, pharmacist) pair.
        let duplicate_active = guard.values().any(|existing| {
            existing.shift_id == application.shift_id
                && existing.pharmacist_id == application.pharmacist_id
                && existing.is_active()
        });
        if application.is_active() && duplicate_active {
            return Err(StoreError::Duplicate);
        }
        application.revision = 1;
        guard.insert(application.id.clone(), application.clone());
        Ok(application)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<Application>, StoreError> {
        let guard = self
            .records
            .lock()
            .expect("application store mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn update(&self, mut application: Application) -> Result<Application, StoreError> {
        let mut guard = self
            .records
            .lock()
            .expect("application store mutex poisoned");
        let current = guard.get(&application.id).ok_or(StoreError::NotFound)?;
        if current.revision != application.revision {
            return Err(StoreError::StaleRevision);
        }
        application.revision += 1;
        guard.insert(application.id.clone(), application.clone());
        Ok(application)
    }

    fn find_for_pair(
        &self,
        shift_id: &ShiftId,
        pharmacist_id: &PharmacistId,
    ) -> Result<Vec<Application>, StoreError> {
        let guard = self
            .records
            .lock()
            .expect("application store mutex poisoned");
        Ok(guard
            .values()
            .filter(|app| &app.shift_id == shift_id && &app.pharmacist_id == pharmacist_id)
            .cloned()
            .collect())
    }

    fn find_for_shift(&self, shift_id: &ShiftId) -> Result<Vec<Application>, StoreError> {
        let guard = self
            .records
            .lock()
            .expect("application store mutex poisoned");
        Ok(guard
            .values()
            .filter(|app| &app.shift_id == shift_id)
            .cloned()
            .collect())
    }

    fn find_active_for_pharmacist(
        &self,
        pharmacist_id: &PharmacistId,
    ) -> Result<Vec<Application>, StoreError> {
        let guard = self
            .records
            .lock()
            .expect("application store mutex poisoned");
        let mut found: Vec<Application> = guard
            .values()
            .filter(|app| &app.pharmacist_id == pharmacist_id && app.is_active())
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        Ok(found)
    }
}

/// Static contact directory for the development backend and tests.
#[derive(Default)]
pub struct MemoryDirectory {
    pharmacies: Mutex<HashMap<PharmacyId, PharmacyContact>>,
    pharmacists: Mutex<HashMap<PharmacistId, PharmacistContact>>,
}

impl MemoryDirectory {
    pub fn add_pharmacy(&self, id: PharmacyId, contact: PharmacyContact) {
        self.pharmacies
            .lock()
            .expect("directory mutex poisoned")
            .insert(id, contact);
    }

    pub fn add_pharmacist(&self, id: PharmacistId, contact: PharmacistContact) {
        self.pharmacists
            .lock()
            .expect("directory mutex poisoned")
            .insert(id, contact);
    }
}

impl ContactDirectory for MemoryDirectory {
    fn pharmacy(&self, id: &PharmacyId) -> Result<Option<PharmacyContact>, StoreError> {
        let guard = self.pharmacies.lock().expect("directory mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn pharmacist(&self, id: &PharmacistId) -> Result<Option<PharmacistContact>, StoreError> {
        let guard = self.pharmacists.lock().expect("directory mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}
