//! Record sources backing authoritative zones.
//!
//! A [`RecordSource`] wraps a live, eventually consistent backend such as a
//! service discovery cache. The zone authority and the transfer engine
//! only ever talk to the backend through this trait, so every backend that
//! can list owner names, hand out the records of one owner name and report
//! a version number can back a transferable zone.
//!
//! The [`services`] module provides the service discovery model and the
//! record synthesis rules, the [`store`] module the versioned snapshot the
//! backend watch publishes into.

pub mod services;
pub mod store;

use core::fmt;

use crate::base::{Name, Record, Serial};

pub use self::services::ServiceSource;
pub use self::store::SnapshotStore;

//------------ RecordSource --------------------------------------------------

/// A backend that supplies the records of one or more zones.
///
/// Implementations must be safe to call concurrently. Each call must
/// return a point-in-time consistent view, but two calls may observe
/// different backend versions.
pub trait RecordSource: fmt::Debug + Send + Sync {
    /// Returns the owner names of all record groups in the zone at `apex`.
    ///
    /// The names are returned in the stable order in which their record
    /// groups must be transferred.
    fn list_names(&self, apex: &Name) -> Result<Vec<Name>, SourceError>;

    /// Returns the record group owned by `name` in the zone at `apex`.
    ///
    /// Returns `Ok(None)` if the name disappeared since it was listed.
    fn records_for(
        &self,
        apex: &Name,
        name: &Name,
    ) -> Result<Option<RecordGroup>, SourceError>;

    /// Returns the current version of the zone at `apex`.
    fn current_version(&self, apex: &Name) -> Result<Serial, SourceError>;

    /// Returns the changes to the zone at `apex` since version `from`.
    ///
    /// Sources that cannot compute a bounded diff return `Ok(None)`, which
    /// makes incremental transfers fall back to full transfers.
    fn diff_since(
        &self,
        apex: &Name,
        from: Serial,
    ) -> Result<Option<ZoneDiff>, SourceError> {
        let _ = (apex, from);
        Ok(None)
    }

    /// Returns whether the source has received its initial data.
    fn is_synced(&self) -> bool {
        true
    }
}

//------------ RecordGroup ---------------------------------------------------

/// The records produced from a single backend entity.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecordGroup {
    owner: Name,
    records: Vec<Record>,
    cluster_local: bool,
}

impl RecordGroup {
    /// Creates an exported record group.
    pub fn new(owner: Name, records: Vec<Record>) -> Self {
        RecordGroup {
            owner,
            records,
            cluster_local: false,
        }
    }

    /// Marks the group as meaningful only within its own origin.
    ///
    /// Cluster local groups are left out of merge origins.
    pub fn into_cluster_local(mut self) -> Self {
        self.cluster_local = true;
        self
    }

    /// Returns the name of the entity that produced the group.
    pub fn owner(&self) -> &Name {
        &self.owner
    }

    /// Returns the records in transfer order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn is_cluster_local(&self) -> bool {
        self.cluster_local
    }
}

//------------ ZoneDiff ------------------------------------------------------

/// The changes between two versions of a zone.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ZoneDiff {
    pub from: Serial,
    pub to: Serial,
    pub removed: Vec<Record>,
    pub added: Vec<Record>,
}

//============ Error Types ===================================================

//------------ SourceError ---------------------------------------------------

/// A backend call failed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SourceError {
    /// The backend hasn't received its initial data yet.
    NotSynced,

    /// The zone isn't backed by this source.
    UnknownZone(Name),

    /// The backend could not be reached or returned an error.
    Unavailable(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SourceError::NotSynced => f.write_str("backend not synced"),
            SourceError::UnknownZone(apex) => {
                write!(f, "zone {apex} not served by backend")
            }
            SourceError::Unavailable(reason) => {
                write!(f, "backend unavailable: {reason}")
            }
        }
    }
}

impl std::error::Error for SourceError {}
