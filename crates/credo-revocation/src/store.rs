//! # Revocation Database
//!
//! The per-credential-type store combining the durable log with in-memory
//! state: the full accumulator record chain, the issuance records, and the
//! current accumulator. A single writer is enforced per database; readers
//! share a lock-free snapshot view under the read lock.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use rand::rngs::OsRng;

use credo_core::CredentialTypeId;
use credo_crypto::{
    Accumulator, EventKind, RevocationPrivateKey, RevocationPublicKey, RevocationRecord, Witness,
};

use crate::error::RevocationError;
use crate::log::RevocationLog;
use crate::record::{IssuanceRecord, LogEntry};

struct DbInner {
    log: RevocationLog,
    records: Vec<RevocationRecord>,
    issuance: Vec<IssuanceRecord>,
}

impl DbInner {
    fn current(&self) -> Result<&Accumulator, RevocationError> {
        self.records
            .last()
            .map(|r| &r.accumulator)
            .ok_or(RevocationError::NotEnabled)
    }
}

/// One credential type's revocation database.
pub struct RevocationDb {
    pk: RevocationPublicKey,
    inner: RwLock<DbInner>,
}

impl RevocationDb {
    /// Open the database at `path`, replaying and verifying the log.
    pub fn open(path: impl AsRef<Path>, pk: RevocationPublicKey) -> Result<Self, RevocationError> {
        let (log, entries) = RevocationLog::open(path)?;

        let mut records: Vec<RevocationRecord> = Vec::new();
        let mut issuance: Vec<IssuanceRecord> = Vec::new();
        for entry in entries {
            match entry {
                LogEntry::Accumulator(record) => {
                    if let Some(prev) = records.last() {
                        if !record.verify_against(&pk, prev) {
                            return Err(RevocationError::ChainVerification {
                                index: record.index(),
                            });
                        }
                    } else if record.index() != 1 {
                        return Err(RevocationError::ChainVerification {
                            index: record.index(),
                        });
                    }
                    if record.event == EventKind::Revoke {
                        if let Some(rec) = issuance
                            .iter_mut()
                            .find(|r| r.e == record.e && r.revoked_at.is_none())
                        {
                            rec.revoked_at = Some(Utc::now());
                        }
                    }
                    records.push(record);
                }
                LogEntry::Issuance(record) => issuance.push(record),
            }
        }

        Ok(Self {
            pk,
            inner: RwLock::new(DbInner {
                log,
                records,
                issuance,
            }),
        })
    }

    /// Whether the log has a genesis record.
    pub fn enabled(&self) -> bool {
        !self.inner.read().records.is_empty()
    }

    /// Create the initial accumulator record. Refuses when already enabled.
    pub fn enable(&self, sk: &RevocationPrivateKey) -> Result<(), RevocationError> {
        let mut inner = self.inner.write();
        if !inner.records.is_empty() {
            return Err(RevocationError::AlreadyEnabled);
        }
        let genesis = RevocationRecord::genesis(Accumulator::initial(&mut OsRng, sk));
        inner.log.append(&LogEntry::Accumulator(genesis.clone()))?;
        inner.records.push(genesis);
        tracing::info!("revocation enabled");
        Ok(())
    }

    /// The latest accumulator.
    pub fn current(&self) -> Result<Accumulator, RevocationError> {
        Ok(self.inner.read().current()?.clone())
    }

    /// All records with index greater than `from_index`, in order.
    pub fn records_since(&self, from_index: u64) -> Vec<RevocationRecord> {
        self.inner
            .read()
            .records
            .iter()
            .filter(|r| r.index() > from_index)
            .cloned()
            .collect()
    }

    /// Append records received from the upstream revocation authority.
    ///
    /// The batch must start at `current_index + 1`, be consecutive, and
    /// every record must verify against its predecessor.
    pub fn add_records(&self, records: &[RevocationRecord]) -> Result<(), RevocationError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut inner = self.inner.write();

        let expected = match inner.records.last() {
            Some(last) => last.index() + 1,
            None => 1,
        };
        if records[0].index() != expected {
            return Err(RevocationError::NonContiguous {
                expected,
                got: records[0].index(),
            });
        }

        for record in records {
            match inner.records.last() {
                Some(prev) => {
                    if !record.verify_against(&self.pk, prev) {
                        return Err(RevocationError::ChainVerification {
                            index: record.index(),
                        });
                    }
                }
                None => {
                    if record.index() != 1 {
                        return Err(RevocationError::ChainVerification {
                            index: record.index(),
                        });
                    }
                }
            }
            inner.log.append(&LogEntry::Accumulator(record.clone()))?;
            if record.event == EventKind::Revoke {
                if let Some(rec) = inner
                    .issuance
                    .iter_mut()
                    .find(|r| r.e == record.e && r.revoked_at.is_none())
                {
                    rec.revoked_at = Some(Utc::now());
                }
            }
            inner.records.push(record.clone());
        }
        Ok(())
    }

    /// Record an issuance: the issuer-private record plus an `Issue`
    /// accumulator record so downstream readers advance in step.
    pub fn add_issuance_record(&self, record: IssuanceRecord) -> Result<(), RevocationError> {
        let mut inner = self.inner.write();
        let current = inner.current()?.clone();
        let accumulator_record = RevocationRecord {
            accumulator: current.advance(),
            event: EventKind::Issue,
            e: record.e.clone(),
        };
        inner.log.append(&LogEntry::Issuance(record.clone()))?;
        inner
            .log
            .append(&LogEntry::Accumulator(accumulator_record.clone()))?;
        inner.issuance.push(record);
        inner.records.push(accumulator_record);
        Ok(())
    }

    /// Revoke by issuer-chosen key: locate the unrevoked issuance record,
    /// remove its prime from the accumulator, append the record.
    pub fn revoke(
        &self,
        sk: &RevocationPrivateKey,
        key: &str,
    ) -> Result<RevocationRecord, RevocationError> {
        let mut inner = self.inner.write();
        let e = inner
            .issuance
            .iter()
            .find(|r| r.key == key && r.revoked_at.is_none())
            .map(|r| r.e.clone())
            .ok_or_else(|| RevocationError::UnknownRevocationKey(key.to_string()))?;

        let current = inner.current()?.clone();
        let record = RevocationRecord {
            accumulator: current.remove(sk, &e)?,
            event: EventKind::Revoke,
            e: e.clone(),
        };
        inner.log.append(&LogEntry::Accumulator(record.clone()))?;
        if let Some(rec) = inner
            .issuance
            .iter_mut()
            .find(|r| r.key == key && r.revoked_at.is_none())
        {
            rec.revoked_at = Some(Utc::now());
        }
        inner.records.push(record.clone());
        tracing::info!(key, index = record.index(), "credential revoked");
        Ok(record)
    }

    /// Produce a fresh non-revocation witness against the current
    /// accumulator.
    pub fn generate_witness(
        &self,
        sk: &RevocationPrivateKey,
    ) -> Result<Witness, RevocationError> {
        let current = self.current()?;
        Ok(Witness::generate(&mut OsRng, sk, &current)?)
    }

    /// Look up an issuance record by revocation key.
    pub fn issuance_record(&self, key: &str) -> Option<IssuanceRecord> {
        self.inner
            .read()
            .issuance
            .iter()
            .find(|r| r.key == key)
            .cloned()
    }

    /// The revocation public key this database verifies chains against.
    pub fn public_key(&self) -> &RevocationPublicKey {
        &self.pk
    }
}

/// Databases per credential type, opened on demand.
pub struct RevocationRegistry {
    root: PathBuf,
    dbs: DashMap<CredentialTypeId, Arc<RevocationDb>>,
}

impl RevocationRegistry {
    /// A registry rooted at `root`; each credential type's log lives at
    /// `root/{scheme}.{issuer}.{credtype}`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dbs: DashMap::new(),
        }
    }

    /// Get or open the database for `credtype`.
    pub fn db(
        &self,
        credtype: &CredentialTypeId,
        pk: RevocationPublicKey,
    ) -> Result<Arc<RevocationDb>, RevocationError> {
        if let Some(db) = self.dbs.get(credtype) {
            return Ok(db.clone());
        }
        let path = self.root.join(credtype.as_str());
        let db = Arc::new(RevocationDb::open(path, pk)?);
        Ok(self
            .dbs
            .entry(credtype.clone())
            .or_insert(db)
            .value()
            .clone())
    }
}
