//! Thread-safe atomic configuration store.
//!
//! `ConfigStore` owns the live document.  Readers take a snapshot (deep
//! copy) under a read lock and never block each other.  Writers are
//! serialized on a non-reentrant mutex; a thread-local marker detects a
//! nested `atomic_update` from inside an already-open write section and
//! fails it fast instead of deadlocking.
//!
//! A commit is validate-then-swap: the transform runs on a private copy,
//! the validator must approve the result, and only then does the copy
//! become the live document, get snapshotted into history, produce an
//! audit diff, and reach the observers.  A rejected update leaves the
//! live document untouched and reports `Ok(false)`.

use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::audit::{AuditEvent, AuditEventType, AuditTrail, RiskLevel};
use crate::document::Document;
use crate::errors::{Result, TradeVaultError};
use crate::history::VersionHistory;
use crate::validator::Validator;

/// Callback invoked after every successful commit with the new document
/// and its version number.
pub type Observer = Box<dyn Fn(&Document, u64) + Send + Sync>;

thread_local! {
    static IN_WRITE_SECTION: Cell<bool> = const { Cell::new(false) };
}

/// RAII marker for the current thread's write section.
///
/// The writer mutex alone cannot detect re-entry from the same thread —
/// it would simply deadlock — so the marker is checked first and a
/// nested attempt fails with `ConcurrentWrite` before touching the lock.
struct WriteSectionMarker;

impl WriteSectionMarker {
    fn enter() -> Result<Self> {
        IN_WRITE_SECTION.with(|flag| {
            if flag.get() {
                Err(TradeVaultError::ConcurrentWrite)
            } else {
                flag.set(true);
                Ok(Self)
            }
        })
    }
}

impl Drop for WriteSectionMarker {
    fn drop(&mut self) {
        IN_WRITE_SECTION.with(|flag| flag.set(false));
    }
}

/// The coordinator: live document, writer discipline, history, audit,
/// and observer fan-out.
pub struct ConfigStore {
    live: RwLock<Document>,
    version: AtomicU64,
    write_gate: Mutex<()>,
    validator: Validator,
    history: Mutex<VersionHistory>,
    audit: Arc<AuditTrail>,
    observers: RwLock<Vec<Observer>>,
}

impl ConfigStore {
    /// Create a store around the collaborator-supplied initial document.
    ///
    /// The initial document is version 1: it is snapshotted into history
    /// and announced with a `Loaded` audit event.  It is not validated —
    /// collaborators can pre-check it with the standalone validator.
    pub fn new(
        initial: Document,
        validator: Validator,
        max_versions: usize,
        audit: Arc<AuditTrail>,
    ) -> Result<Self> {
        let mut history = VersionHistory::new(max_versions);
        history.save_version(&initial, 1)?;

        let mut details = Map::new();
        details.insert("version".into(), Value::from(1));
        audit.log_event(AuditEvent::new(
            AuditEventType::Loaded,
            RiskLevel::Low,
            details,
        ));

        Ok(Self {
            live: RwLock::new(initial),
            version: AtomicU64::new(1),
            write_gate: Mutex::new(()),
            validator,
            history: Mutex::new(history),
            audit,
            observers: RwLock::new(Vec::new()),
        })
    }

    /// Deep copy of the current live document.
    ///
    /// Never blocks on writers for longer than it takes to copy.
    pub fn read(&self) -> Document {
        self.live.read().clone()
    }

    /// Current commit counter.
    pub fn get_version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Apply `transform` to a private copy and commit the result if it
    /// validates.  See `atomic_update_as` for the full contract.
    pub fn atomic_update<F>(&self, transform: F) -> Result<bool>
    where
        F: FnOnce(Document) -> Document,
    {
        self.atomic_update_as(None, transform)
    }

    /// The atomic-update entry point with an attributed user.
    ///
    /// Returns `Ok(true)` when the transformed document validated and
    /// was committed, `Ok(false)` when validation rejected it (the live
    /// document is unchanged), and `Err(ConcurrentWrite)` when called
    /// from inside an already-open write section on the same thread.
    pub fn atomic_update_as<F>(&self, user_id: Option<&str>, transform: F) -> Result<bool>
    where
        F: FnOnce(Document) -> Document,
    {
        let _marker = WriteSectionMarker::enter()?;
        let _gate = self.write_gate.lock();

        let previous = self.live.read().clone();
        let candidate = transform(previous.clone());

        let outcome = self.validator.validate(&candidate);
        let Some(validated) = outcome.validated_document else {
            debug!(
                errors = outcome.errors.len(),
                "atomic update rejected by validation"
            );
            let mut details = Map::new();
            details.insert("error_count".into(), Value::from(outcome.errors.len()));
            details.insert("errors".into(), Value::from(outcome.errors));
            self.audit.log_event(
                AuditEvent::new(AuditEventType::ValidationFailed, RiskLevel::Medium, details)
                    .with_user(user_id),
            );
            return Ok(false);
        };

        // History snapshotting is the only fallible step of the commit;
        // run it before anything becomes visible so a failure leaves the
        // store exactly as it was.
        let version = self.version.load(Ordering::SeqCst) + 1;
        self.history.lock().save_version(&validated, version)?;

        *self.live.write() = validated.clone();
        self.version.store(version, Ordering::SeqCst);

        self.audit.log_config_change(&previous, &validated, user_id);
        self.notify_observers(&validated, version);

        Ok(true)
    }

    /// Register a callback invoked on every future successful commit.
    ///
    /// Observers run synchronously inside the writer's exclusive section,
    /// after the swap: they see the committed state immediately, and a
    /// slow observer delays the next writer, never the commit itself.
    /// Registering another observer from inside a callback is not
    /// supported.
    pub fn register_observer<F>(&self, observer: F)
    where
        F: Fn(&Document, u64) + Send + Sync + 'static,
    {
        self.observers.write().push(Box::new(observer));
    }

    /// Verify a retained snapshot and, on success, commit it as the new
    /// live document.
    ///
    /// Verification failure (unknown version or checksum mismatch)
    /// returns `Ok(false)` with the live document untouched.  A restored
    /// snapshot passes through the ordinary validate-and-commit path and
    /// is additionally announced with a `Rollback` audit event.
    pub fn restore_version(&self, version_number: u64) -> Result<bool> {
        self.restore_version_as(None, version_number)
    }

    pub fn restore_version_as(&self, user_id: Option<&str>, version_number: u64) -> Result<bool> {
        let snapshot = {
            let history = self.history.lock();
            if !history.rollback_to_version(version_number) {
                return Ok(false);
            }
            match history.get_version(version_number) {
                Some(snapshot) => snapshot,
                None => return Ok(false),
            }
        };

        let committed = self.atomic_update_as(user_id, move |_| snapshot)?;
        if committed {
            let mut details = Map::new();
            details.insert("restored_version".into(), Value::from(version_number));
            details.insert("new_version".into(), Value::from(self.get_version()));
            self.audit.log_event(
                AuditEvent::new(AuditEventType::Rollback, RiskLevel::Medium, details)
                    .with_user(user_id),
            );
        }
        Ok(committed)
    }

    /// Verify a retained snapshot without committing anything.
    pub fn verify_version(&self, version_number: u64) -> bool {
        self.history.lock().rollback_to_version(version_number)
    }

    /// Deep copy of a retained snapshot, if still in the ring.
    pub fn version_snapshot(&self, version_number: u64) -> Option<Document> {
        self.history.lock().get_version(version_number)
    }

    fn notify_observers(&self, document: &Document, version: u64) {
        let observers = self.observers.read();
        for (index, observer) in observers.iter().enumerate() {
            if catch_unwind(AssertUnwindSafe(|| observer(document, version))).is_err() {
                error!(
                    observer = index,
                    version, "config observer panicked; continuing with remaining observers"
                );
            }
        }
    }
}
