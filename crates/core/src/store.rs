//! Record store boundary.
//!
//! The core talks to persistence only through [`PatientStore`]. Two implementations ship
//! with the crate:
//!
//! - [`MemoryStore`] keeps records in a mutex-guarded map (tests, demo servers).
//! - [`JsonFileStore`] keeps one JSON document per patient on disk.
//!
//! ## On-disk layout
//!
//! Patient ids are opaque, so the file name is derived from the lowercase hex SHA-256 of
//! the id and sharded two levels deep:
//!
//! ```text
//! patient_data/patients/<h[0..2]>/<h[2..4]>/<h>.json
//! ```
//!
//! Writes go to a `.tmp` sibling first and are renamed into place. Bulk deletes move every
//! target into a hidden staging directory before anything is removed, so a failed delete
//! restores the files it already moved.

use crate::config::CoreConfig;
use crate::constants::DOCUMENT_EXTENSION;
use crate::model::{Patient, PatientId};
use crate::record::PatientDocument;
use crate::{CorridorError, CorridorResult};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Persistence collaborator for patient records.
///
/// Last write wins; there is no locking or versioning.
pub trait PatientStore: Send + Sync {
    fn load_all_patients(&self) -> CorridorResult<Vec<Patient>>;

    /// Loads one record. `Ok(None)` for an unknown id.
    fn load_patient(&self, id: &PatientId) -> CorridorResult<Option<Patient>> {
        Ok(self
            .load_all_patients()?
            .into_iter()
            .find(|p| &p.id == id))
    }

    /// Upsert by id. Saving the same record twice is harmless.
    fn save_patient(&self, patient: &Patient) -> CorridorResult<()>;

    /// Upsert a batch. Nothing is written if the batch fails validation or serialisation.
    fn save_patients(&self, patients: &[Patient]) -> CorridorResult<()>;

    /// Remove every matching id, all or nothing. Unknown ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CorridorError::Validation`] if `ids` is empty.
    fn delete_patients(&self, ids: &[PatientId]) -> CorridorResult<()>;
}

fn ensure_ids_present(ids: &[PatientId]) -> CorridorResult<()> {
    if ids.is_empty() {
        return Err(CorridorError::Validation(
            "at least one patient id is required".into(),
        ));
    }
    Ok(())
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<PatientId, Patient>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_patients(patients: impl IntoIterator<Item = Patient>) -> Self {
        let records = patients.into_iter().map(|p| (p.id.clone(), p)).collect();
        Self {
            records: Mutex::new(records),
        }
    }

    fn lock(&self) -> CorridorResult<std::sync::MutexGuard<'_, BTreeMap<PatientId, Patient>>> {
        self.records.lock().map_err(|_| CorridorError::LockPoisoned)
    }
}

impl PatientStore for MemoryStore {
    fn load_all_patients(&self) -> CorridorResult<Vec<Patient>> {
        Ok(self.lock()?.values().cloned().collect())
    }

    fn load_patient(&self, id: &PatientId) -> CorridorResult<Option<Patient>> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn save_patient(&self, patient: &Patient) -> CorridorResult<()> {
        self.lock()?.insert(patient.id.clone(), patient.clone());
        Ok(())
    }

    fn save_patients(&self, patients: &[Patient]) -> CorridorResult<()> {
        let mut records = self.lock()?;
        for patient in patients {
            records.insert(patient.id.clone(), patient.clone());
        }
        Ok(())
    }

    fn delete_patients(&self, ids: &[PatientId]) -> CorridorResult<()> {
        ensure_ids_present(ids)?;
        let mut records = self.lock()?;
        for id in ids {
            records.remove(id);
        }
        Ok(())
    }
}

// ============================================================================
// JSON FILE STORE
// ============================================================================

#[derive(Clone, Debug)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    /// Opens (creating if needed) the store under `cfg.patients_dir()`.
    pub fn open(cfg: &CoreConfig) -> CorridorResult<Self> {
        Self::open_at(cfg.patients_dir())
    }

    pub fn open_at(root: impl Into<PathBuf>) -> CorridorResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(CorridorError::StorageDirCreation)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, id: &PatientId) -> PathBuf {
        let digest = hex::encode(Sha256::digest(id.as_str().as_bytes()));
        self.root
            .join(&digest[0..2])
            .join(&digest[2..4])
            .join(format!("{digest}.{DOCUMENT_EXTENSION}"))
    }

    fn write_staged(&self, patient: &Patient) -> CorridorResult<(PathBuf, PathBuf)> {
        let content = PatientDocument::render(patient)?;
        let target = self.document_path(&patient.id);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(CorridorError::StorageDirCreation)?;
        }
        let staged = target.with_extension(format!("{DOCUMENT_EXTENSION}.tmp"));
        fs::write(&staged, content).map_err(CorridorError::FileWrite)?;
        Ok((staged, target))
    }

    fn read_document(path: &Path) -> CorridorResult<Patient> {
        let contents = fs::read_to_string(path).map_err(CorridorError::FileRead)?;
        PatientDocument::parse(&contents)
    }
}

fn discard_staged(staged_files: &[(PathBuf, PathBuf)]) {
    for (staged, _) in staged_files {
        if let Err(e) = fs::remove_file(staged) {
            tracing::warn!("failed to remove staged file {}: {}", staged.display(), e);
        }
    }
}

fn visible_dirs(path: &Path) -> impl Iterator<Item = PathBuf> {
    fs::read_dir(path)
        .into_iter()
        .flatten()
        .flatten()
        .map(|entry| entry.path())
        .filter(|p| {
            p.is_dir()
                && !p
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with('.'))
        })
}

impl PatientStore for JsonFileStore {
    fn load_all_patients(&self) -> CorridorResult<Vec<Patient>> {
        let mut patients = Vec::new();

        for s1 in visible_dirs(&self.root) {
            for s2 in visible_dirs(&s1) {
                let entries = match fs::read_dir(&s2) {
                    Ok(it) => it,
                    Err(_) => continue,
                };
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.extension().and_then(|e| e.to_str()) != Some(DOCUMENT_EXTENSION) {
                        continue;
                    }
                    match Self::read_document(&path) {
                        Ok(patient) => patients.push(patient),
                        Err(e) => {
                            tracing::warn!("skipping patient document {}: {}", path.display(), e)
                        }
                    }
                }
            }
        }

        patients.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(patients)
    }

    fn load_patient(&self, id: &PatientId) -> CorridorResult<Option<Patient>> {
        let path = self.document_path(id);
        if !path.is_file() {
            return Ok(None);
        }
        let patient = Self::read_document(&path)?;
        if &patient.id != id {
            return Err(CorridorError::InvalidRecord(format!(
                "document at {} belongs to patient {}",
                path.display(),
                patient.id
            )));
        }
        Ok(Some(patient))
    }

    fn save_patient(&self, patient: &Patient) -> CorridorResult<()> {
        let (staged, target) = self.write_staged(patient)?;
        fs::rename(&staged, &target).map_err(CorridorError::FileWrite)
    }

    fn save_patients(&self, patients: &[Patient]) -> CorridorResult<()> {
        let mut staged_files = Vec::with_capacity(patients.len());

        for patient in patients {
            match self.write_staged(patient) {
                Ok(pair) => staged_files.push(pair),
                Err(e) => {
                    discard_staged(&staged_files);
                    return Err(e);
                }
            }
        }

        for (i, (staged, target)) in staged_files.iter().enumerate() {
            if let Err(e) = fs::rename(staged, target) {
                discard_staged(&staged_files[i..]);
                return Err(CorridorError::FileWrite(e));
            }
        }

        Ok(())
    }

    fn delete_patients(&self, ids: &[PatientId]) -> CorridorResult<()> {
        ensure_ids_present(ids)?;

        let staging = self
            .root
            .join(format!(".delete-{}", uuid::Uuid::new_v4().simple()));
        fs::create_dir_all(&staging).map_err(CorridorError::FileDelete)?;

        let mut moved: Vec<(PathBuf, PathBuf)> = Vec::new();
        for id in ids {
            let original = self.document_path(id);
            if !original.is_file() {
                continue;
            }
            let Some(file_name) = original.file_name() else {
                continue;
            };
            let parked = staging.join(file_name);
            if parked.exists() {
                // Same id listed twice.
                continue;
            }
            if let Err(e) = fs::rename(&original, &parked) {
                for (original, parked) in moved.iter().rev() {
                    if let Err(restore) = fs::rename(parked, original) {
                        tracing::error!(
                            "failed to restore {} after aborted delete: {}",
                            original.display(),
                            restore
                        );
                    }
                }
                let _ = fs::remove_dir_all(&staging);
                return Err(CorridorError::FileDelete(e));
            }
            moved.push((original, parked));
        }

        if let Err(e) = fs::remove_dir_all(&staging) {
            tracing::warn!(
                "deleted records remain in staging dir {}: {}",
                staging.display(),
                e
            );
        }

        Ok(())
    }
}
