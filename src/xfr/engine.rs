use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, trace};

use crate::base::{Name, Record, RecordData, Soa};
use crate::source::{RecordSource, SourceError, ZoneDiff};
use crate::zonetree::{AuthorityError, XfrClass, XfrPlan, ZoneAuthority};

use super::batcher::{BatcherClosed, RecordBatcher};
use super::policy::TransferPolicy;
use super::stream::{Framing, XfrStream};
use super::{TransferRequest, XfrConfig, XfrError};

//------------ TransferEngine ------------------------------------------------

/// Produces transfer streams for the origins of a set of authorities.
#[derive(Clone, Debug)]
pub struct TransferEngine {
    authorities: Vec<Arc<ZoneAuthority>>,
    policy: Arc<TransferPolicy>,
    config: XfrConfig,

    /// Limits the number of transfers producing records at the same time.
    producers: Arc<Semaphore>,
}

impl TransferEngine {
    pub fn new(
        authorities: Vec<Arc<ZoneAuthority>>,
        policy: TransferPolicy,
        config: XfrConfig,
    ) -> Self {
        TransferEngine {
            authorities,
            policy: Arc::new(policy),
            producers: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            config,
        }
    }

    /// Returns the authority serving `origin`.
    pub fn authority_for(&self, origin: &Name) -> Option<&Arc<ZoneAuthority>> {
        self.authorities
            .iter()
            .find(|auth| auth.is_authoritative(origin))
    }

    pub fn is_authoritative(&self, origin: &Name) -> bool {
        self.authority_for(origin).is_some()
    }

    pub fn policy(&self) -> &TransferPolicy {
        &self.policy
    }

    /// Starts a transfer.
    ///
    /// Errors are returned before any record is produced. Once the stream
    /// has been returned, a failure only shows as a missing closing SOA.
    pub async fn transfer(
        &self,
        req: TransferRequest,
    ) -> Result<XfrStream, XfrError> {
        let origin = req.origin().clone();
        let authority = self
            .authority_for(&origin)
            .ok_or_else(|| XfrError::NotAuthoritative(origin.clone()))?
            .clone();
        if !self.policy.permits(&origin, req.client()) {
            debug!("Refusing transfer of {origin} to {}", req.client());
            return Err(XfrError::Refused {
                origin,
                client: req.client(),
            });
        }

        let plan = authority.classify(&origin, req.serial())?;
        let framing = match plan.class {
            XfrClass::UpToDate => {
                debug!(
                    "Client {} is up to date with {origin} at serial {}",
                    req.client(),
                    plan.serial()
                );
                return Ok(XfrStream::soa_only(plan.soa));
            }
            XfrClass::Full => Framing::Axfr,
            XfrClass::Incremental(_) => Framing::Ixfr,
        };

        let permit = self
            .producers
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| {
                error!("Internal error: Failed to acquire transfer semaphore");
                XfrError::BackendUnavailable(SourceError::Unavailable(
                    "transfer engine shut down".into(),
                ))
            })?;

        info!(
            "Starting {framing:?} of {origin} at serial {} for {}",
            plan.serial(),
            req.client()
        );
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let batcher = RecordBatcher::new(tx, self.config.batch_size);
        let producer = Producer {
            authority,
            origin,
            plan,
        };
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            producer.run(batcher)
        });
        Ok(XfrStream::new(rx, framing))
    }
}

//------------ Producer ------------------------------------------------------

/// Walks the record source for a single transfer.
struct Producer {
    authority: Arc<ZoneAuthority>,
    origin: Name,
    plan: XfrPlan,
}

impl Producer {
    fn run(self, mut batcher: RecordBatcher) {
        let res = match &self.plan.class {
            XfrClass::Incremental(diff) => self.diff(diff, &mut batcher),
            _ => self.full(&mut batcher),
        };
        match res {
            Ok(()) => match batcher.finish() {
                Ok(()) => info!("Finished transfer of {}", self.origin),
                Err(BatcherClosed) => debug!(
                    "Consumer of {} went away before the final batch",
                    self.origin
                ),
            },
            Err(ProduceError::Closed) => {
                debug!("Transfer of {} cancelled by consumer", self.origin)
            }
            Err(ProduceError::Source(err)) => {
                error!("Transfer of {} aborted: {err}", self.origin);
                if batcher.abort(XfrError::BackendUnavailable(err)).is_err() {
                    debug!(
                        "Consumer of {} went away before the error",
                        self.origin
                    );
                }
            }
        }
    }

    fn source(&self) -> &dyn RecordSource {
        self.authority.source().as_ref()
    }

    fn full(&self, batcher: &mut RecordBatcher) -> Result<(), ProduceError> {
        batcher.push(self.plan.soa.clone())?;
        batcher.extend(self.authority.nameserver_records(&self.origin)?)?;

        let is_merge = self
            .authority
            .origin(&self.origin)
            .map(|origin| origin.is_merge())
            .unwrap_or(false);
        if is_merge {
            self.merged(batcher)?;
        } else {
            for name in self.source().list_names(&self.origin)? {
                if batcher.is_closed() {
                    return Err(ProduceError::Closed);
                }
                if let Some(group) =
                    self.source().records_for(&self.origin, &name)?
                {
                    batcher.extend(group.into_records())?;
                }
            }
        }

        batcher.push(self.plan.soa.clone())?;
        Ok(())
    }

    /// Produces the union of all members re-rooted under the origin.
    ///
    /// The groups all members have for an owner are produced together, so
    /// duplicates only need to be tracked for one owner at a time.
    fn merged(&self, batcher: &mut RecordBatcher) -> Result<(), ProduceError> {
        let members = self.authority.members(&self.origin);
        let mut owners = Vec::new();
        let mut known = HashSet::new();
        for member in &members {
            for name in self.source().list_names(member)? {
                if let Some(owner) = name.reroot(member, &self.origin) {
                    if known.insert(owner.clone()) {
                        owners.push(owner);
                    }
                }
            }
        }
        drop(known);

        let mut dedup = OwnerDedup::default();
        for owner in owners {
            for member in &members {
                if batcher.is_closed() {
                    return Err(ProduceError::Closed);
                }
                let Some(name) = owner.reroot(&self.origin, member) else {
                    continue;
                };
                let Some(group) = self.source().records_for(member, &name)?
                else {
                    continue;
                };
                if group.is_cluster_local() {
                    trace!("Skipping cluster local {} in {}", name, self.origin);
                    continue;
                }
                for record in group.records() {
                    let Some(record) = record.reroot(member, &self.origin)
                    else {
                        trace!("Dropping {record} from {}", self.origin);
                        continue;
                    };
                    if dedup.admit(&owner, &record) {
                        batcher.push(record)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn diff(
        &self,
        diff: &ZoneDiff,
        batcher: &mut RecordBatcher,
    ) -> Result<(), ProduceError> {
        let current = self.plan.soa.clone();
        batcher.push(current.clone())?;
        batcher.push(soa_with_serial(&current, diff))?;
        batcher.extend(diff.removed.iter().cloned())?;
        batcher.push(current.clone())?;
        batcher.extend(diff.added.iter().cloned())?;
        batcher.push(current)?;
        Ok(())
    }
}

/// Returns a copy of the SOA record with the serial the diff starts from.
fn soa_with_serial(soa: &Record, diff: &ZoneDiff) -> Record {
    match soa.as_soa() {
        Some(data) => Record::new(
            soa.owner().clone(),
            soa.ttl(),
            RecordData::Soa(Soa {
                serial: diff.from,
                ..data.clone()
            }),
        ),
        None => soa.clone(),
    }
}

//------------ OwnerDedup ----------------------------------------------------

/// Filters repeated records of the owner currently being produced.
#[derive(Default)]
struct OwnerDedup {
    owner: Option<Name>,
    seen: HashSet<Record>,
}

impl OwnerDedup {
    /// Returns whether `record` is new for `owner`.
    ///
    /// Moving on to another owner forgets the records of the previous one.
    fn admit(&mut self, owner: &Name, record: &Record) -> bool {
        if self.owner.as_ref() != Some(owner) {
            self.seen.clear();
            self.owner = Some(owner.clone());
        }
        self.seen.insert(record.clone())
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.seen.len()
    }
}

//------------ ProduceError --------------------------------------------------

enum ProduceError {
    Closed,
    Source(SourceError),
}

impl From<BatcherClosed> for ProduceError {
    fn from(_: BatcherClosed) -> Self {
        ProduceError::Closed
    }
}

impl From<SourceError> for ProduceError {
    fn from(err: SourceError) -> Self {
        ProduceError::Source(err)
    }
}

impl From<AuthorityError> for ProduceError {
    fn from(err: AuthorityError) -> Self {
        match err {
            AuthorityError::Source(err) => ProduceError::Source(err),
            other => {
                ProduceError::Source(SourceError::Unavailable(other.to_string()))
            }
        }
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::Ttl;

    fn a(owner: &Name, i: u8) -> Record {
        Record::new(
            owner.clone(),
            Ttl::from_secs(5),
            RecordData::A([10, 0, 0, i].into()),
        )
    }

    #[test]
    fn dedup_is_per_owner() {
        let mut dedup = OwnerDedup::default();
        for idx in 0..100u8 {
            let owner = Name::new(&format!("svc{idx}.ns.svc.test")).unwrap();
            assert!(dedup.admit(&owner, &a(&owner, 1)));
            assert!(dedup.admit(&owner, &a(&owner, 2)));
            assert!(!dedup.admit(&owner, &a(&owner, 1)));
            assert!(dedup.len() <= 2);
        }
    }
}
