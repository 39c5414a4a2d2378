//! In-memory student table guarded by a single mutex.
//!
//! Every operation, reads included, runs inside the same critical section, so creates observe a
//! total order and concurrent updates/deletes against one id are serialized. Identifiers come from
//! a monotonic counter that is never rewound, so an id released by a delete is never handed out
//! again.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Errors returned by [`StudentStore`] operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Candidate failed field validation.
    #[error("Invalid student data: {0}")]
    Validation(&'static str),
    /// No student is stored under the requested id.
    #[error("Student {0} not found")]
    NotFound(u64),
}

/// A stored student record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    /// Store-assigned identifier, immutable once assigned.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Age in years.
    pub age: i64,
    /// Contact email.
    pub email: String,
}

/// Candidate payload for create and update.
///
/// Missing fields decode to empty/zero values and are rejected by [`StudentInput::validate`].
/// An `id` supplied by the caller is accepted but never trusted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StudentInput {
    /// Ignored; the store assigns or preserves ids itself.
    pub id: Option<i64>,
    /// Display name, must be non-empty.
    pub name: String,
    /// Age in years, must be strictly positive.
    pub age: i64,
    /// Contact email, must be non-empty.
    pub email: String,
}

impl StudentInput {
    /// Check field presence and range constraints.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.name.is_empty() {
            return Err(StoreError::Validation("name must not be empty"));
        }
        if self.email.is_empty() {
            return Err(StoreError::Validation("email must not be empty"));
        }
        if self.age <= 0 {
            return Err(StoreError::Validation("age must be greater than zero"));
        }
        Ok(())
    }

    fn into_student(self, id: u64) -> Student {
        Student {
            id,
            name: self.name,
            age: self.age,
            email: self.email,
        }
    }
}

#[derive(Default)]
struct StoreInner {
    last_id: u64,
    students: HashMap<u64, Student>,
}

/// Authoritative student table, constructed once and shared through an `Arc`.
#[derive(Default)]
pub struct StudentStore {
    inner: Mutex<StoreInner>,
}

impl StudentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // The table only holds plain values, so a panic in another holder cannot leave it torn.
    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validate and insert a new student, returning it with its assigned id.
    pub fn create(&self, candidate: StudentInput) -> Result<Student, StoreError> {
        candidate.validate()?;

        let mut inner = self.lock();
        inner.last_id += 1;
        let student = candidate.into_student(inner.last_id);
        inner.students.insert(student.id, student.clone());
        tracing::debug!(id = student.id, population = inner.students.len(), "Created student");
        Ok(student)
    }

    /// Snapshot every stored student. Order is unspecified.
    pub fn list(&self) -> Vec<Student> {
        self.lock().students.values().cloned().collect()
    }

    /// Fetch one student by id.
    pub fn get(&self, id: u64) -> Result<Student, StoreError> {
        self.lock()
            .students
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    /// Replace the stored value for `id`, keeping `id` regardless of the candidate payload.
    pub fn update(&self, id: u64, candidate: StudentInput) -> Result<Student, StoreError> {
        candidate.validate()?;

        let mut inner = self.lock();
        let slot = inner
            .students
            .get_mut(&id)
            .ok_or(StoreError::NotFound(id))?;
        *slot = candidate.into_student(id);
        tracing::debug!(id, "Updated student");
        Ok(slot.clone())
    }

    /// Remove the student stored under `id`.
    pub fn delete(&self, id: u64) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.students.remove(&id).is_none() {
            return Err(StoreError::NotFound(id));
        }
        tracing::debug!(id, population = inner.students.len(), "Deleted student");
        Ok(())
    }

    /// Number of students currently stored.
    pub fn len(&self) -> usize {
        self.lock().students.len()
    }

    /// Whether the store holds no students.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
