//! SOA metadata and transfer classification for a set of origins.

use core::cmp::Ordering;
use core::fmt;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::base::{Name, Record, RecordData, Serial, Soa, Ttl};
use crate::source::{RecordSource, SourceError, ZoneDiff};

use super::tree::{OriginTree, OriginTreeError};

//------------ SoaParams -----------------------------------------------------

/// The timing values of an origin's SOA record, in seconds.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct SoaParams {
    pub ttl: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minimum: u32,
}

impl Default for SoaParams {
    fn default() -> Self {
        SoaParams {
            ttl: 5,
            refresh: 7200,
            retry: 1800,
            expire: 86400,
            minimum: 5,
        }
    }
}

//------------ Origin --------------------------------------------------------

/// A zone this server is authoritative for.
#[derive(Clone, Debug)]
pub struct Origin {
    apex: Name,
    soa: SoaParams,

    /// The addresses the `ns.dns` name of the origin resolves to.
    nameservers: Vec<IpAddr>,

    /// The member origins if this is a merge origin.
    members: Option<Vec<Name>>,
}

impl Origin {
    pub fn new(apex: Name) -> Self {
        Origin {
            apex,
            soa: SoaParams::default(),
            nameservers: Vec::new(),
            members: None,
        }
    }

    pub fn with_soa(mut self, soa: SoaParams) -> Self {
        self.soa = soa;
        self
    }

    pub fn with_nameservers(mut self, addrs: Vec<IpAddr>) -> Self {
        self.nameservers = addrs;
        self
    }

    /// Turns the origin into a merge origin over `members`.
    ///
    /// An empty list means all regular origins of the same authority.
    pub fn into_merge(mut self, members: Vec<Name>) -> Self {
        self.members = Some(members);
        self
    }

    pub fn apex(&self) -> &Name {
        &self.apex
    }

    pub fn soa_params(&self) -> &SoaParams {
        &self.soa
    }

    pub fn is_merge(&self) -> bool {
        self.members.is_some()
    }

    /// Returns the name of the origin's name server.
    pub fn nameserver_name(&self) -> Result<Name, SourceError> {
        self.apex
            .prepend_all(["ns", "dns"].into_iter())
            .map_err(|err| SourceError::Unavailable(err.to_string()))
    }
}

//------------ XfrClass ------------------------------------------------------

/// How a transfer request is to be answered.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum XfrClass {
    /// Send the whole zone.
    Full,

    /// Send the changes since the given serial.
    Incremental(ZoneDiff),

    /// The client is current, only send the SOA.
    UpToDate,
}

impl XfrClass {
    /// Returns the serial an incremental transfer starts from.
    pub fn from_serial(&self) -> Option<Serial> {
        match self {
            XfrClass::Incremental(diff) => Some(diff.from),
            _ => None,
        }
    }
}

//------------ XfrPlan -------------------------------------------------------

/// The outcome of classifying a transfer request.
///
/// The SOA carries the serial sampled at classification time. It is used
/// for the whole transfer even if the backend moves on in the meantime.
#[derive(Clone, Debug)]
pub struct XfrPlan {
    pub soa: Record,
    pub class: XfrClass,
}

impl XfrPlan {
    pub fn serial(&self) -> Serial {
        self.soa.as_soa().map(|soa| soa.serial).unwrap_or_default()
    }
}

//------------ ZoneAuthority -------------------------------------------------

/// The SOA owner for a set of origins sharing one record source.
#[derive(Debug)]
pub struct ZoneAuthority {
    origins: OriginTree<Origin>,
    source: Arc<dyn RecordSource>,

    /// The highest serial handed out per origin.
    last_serial: Mutex<HashMap<Name, Serial>>,
}

impl ZoneAuthority {
    pub fn new(source: Arc<dyn RecordSource>) -> Self {
        ZoneAuthority {
            origins: OriginTree::new(),
            source,
            last_serial: Mutex::new(HashMap::new()),
        }
    }

    pub fn add_origin(&mut self, origin: Origin) -> Result<(), OriginTreeError> {
        self.origins.insert(origin.apex.clone(), origin)
    }

    pub fn source(&self) -> &Arc<dyn RecordSource> {
        &self.source
    }

    /// Returns the origin with exactly this apex.
    pub fn origin(&self, apex: &Name) -> Option<&Origin> {
        self.origins.get(apex)
    }

    /// Returns the origin a name belongs to.
    pub fn find_origin(&self, qname: &Name) -> Option<&Origin> {
        self.origins.find(qname).map(|(_, origin)| origin)
    }

    pub fn origins(&self) -> impl Iterator<Item = &Origin> + '_ {
        self.origins.iter().map(|(_, origin)| origin)
    }

    pub fn is_authoritative(&self, apex: &Name) -> bool {
        self.origins.contains(apex)
    }

    /// Returns the member origins of a merge origin.
    pub fn members(&self, apex: &Name) -> Vec<Name> {
        let Some(members) = self.origin(apex).and_then(|o| o.members.as_ref())
        else {
            return Vec::new();
        };
        if !members.is_empty() {
            return members.clone();
        }
        self.origins()
            .filter(|origin| !origin.is_merge())
            .map(|origin| origin.apex.clone())
            .collect()
    }

    /// Returns the current SOA record of an origin.
    pub fn current_soa(&self, apex: &Name) -> Result<Record, AuthorityError> {
        let origin = self.require(apex)?;
        let serial = self.source.current_version(apex)?;
        Self::soa_record(origin, serial)
    }

    /// Returns the NS record and the name server address records.
    pub fn nameserver_records(
        &self,
        apex: &Name,
    ) -> Result<Vec<Record>, AuthorityError> {
        let origin = self.require(apex)?;
        let ttl = Ttl::from_secs(origin.soa.ttl);
        let ns = origin.nameserver_name()?;
        let mut res = Vec::with_capacity(origin.nameservers.len() + 1);
        res.push(Record::new(
            origin.apex.clone(),
            ttl,
            RecordData::Ns(ns.clone()),
        ));
        for addr in &origin.nameservers {
            res.push(Record::new(ns.clone(), ttl, RecordData::from_ip(*addr)));
        }
        Ok(res)
    }

    /// Decides how to answer a transfer request for `apex`.
    ///
    /// A `requested` serial of `None` asks for a full transfer.
    pub fn classify(
        &self,
        apex: &Name,
        requested: Option<Serial>,
    ) -> Result<XfrPlan, AuthorityError> {
        let origin = self.require(apex)?;
        let current = self.source.current_version(apex)?;
        let soa = Self::soa_record(origin, current)?;
        let regressed = self.observe(apex, current);

        let Some(requested) = requested else {
            return Ok(XfrPlan {
                soa,
                class: XfrClass::Full,
            });
        };
        if regressed {
            return Ok(XfrPlan {
                soa,
                class: XfrClass::Full,
            });
        }

        let class = match requested.partial_cmp(&current) {
            Some(Ordering::Equal) => XfrClass::UpToDate,
            Some(Ordering::Less) => {
                match self.source.diff_since(apex, requested)? {
                    Some(diff) if diff.from == requested && diff.to == current => {
                        XfrClass::Incremental(diff)
                    }
                    Some(diff) => {
                        debug!(
                            "Discarding diff {} -> {} for {apex}, wanted {requested} -> {current}",
                            diff.from, diff.to
                        );
                        XfrClass::Full
                    }
                    None => XfrClass::Full,
                }
            }
            _ => XfrClass::Full,
        };
        Ok(XfrPlan { soa, class })
    }

    /// Remembers `serial` as handed out for `apex`.
    ///
    /// Returns whether the serial went backwards.
    fn observe(&self, apex: &Name, serial: Serial) -> bool {
        let mut last = self.last_serial.lock();
        match last.get(apex) {
            Some(prev) if serial.partial_cmp(prev) == Some(Ordering::Less) => {
                warn!(
                    "Serial of {apex} went backwards from {prev} to {serial}, forcing full transfers"
                );
                last.insert(apex.clone(), serial);
                true
            }
            _ => {
                last.insert(apex.clone(), serial);
                false
            }
        }
    }

    fn require(&self, apex: &Name) -> Result<&Origin, AuthorityError> {
        self.origin(apex)
            .ok_or_else(|| AuthorityError::NotAuthoritative(apex.clone()))
    }

    fn soa_record(origin: &Origin, serial: Serial) -> Result<Record, AuthorityError> {
        let params = &origin.soa;
        let rname = origin
            .apex
            .prepend("hostmaster")
            .map_err(|err| SourceError::Unavailable(err.to_string()))?;
        Ok(Record::new(
            origin.apex.clone(),
            Ttl::from_secs(params.ttl),
            RecordData::Soa(Soa {
                mname: origin.nameserver_name()?,
                rname,
                serial,
                refresh: Ttl::from_secs(params.refresh),
                retry: Ttl::from_secs(params.retry),
                expire: Ttl::from_secs(params.expire),
                minimum: Ttl::from_secs(params.minimum),
            }),
        ))
    }
}

//============ Error Types ===================================================

//------------ AuthorityError ------------------------------------------------

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AuthorityError {
    /// The origin isn't served by this authority.
    NotAuthoritative(Name),

    /// The record source failed.
    Source(SourceError),
}

impl From<SourceError> for AuthorityError {
    fn from(err: SourceError) -> Self {
        AuthorityError::Source(err)
    }
}

impl fmt::Display for AuthorityError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AuthorityError::NotAuthoritative(apex) => {
                write!(f, "not authoritative for {apex}")
            }
            AuthorityError::Source(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for AuthorityError {}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::source::RecordGroup;
    use parking_lot::Mutex as PlMutex;
    use rstest::rstest;

    #[derive(Debug, Default)]
    struct FixedSource {
        version: PlMutex<u32>,
        diff: Option<ZoneDiff>,
    }

    impl RecordSource for FixedSource {
        fn list_names(&self, _apex: &Name) -> Result<Vec<Name>, SourceError> {
            Ok(Vec::new())
        }

        fn records_for(
            &self,
            _apex: &Name,
            _name: &Name,
        ) -> Result<Option<RecordGroup>, SourceError> {
            Ok(None)
        }

        fn current_version(&self, _apex: &Name) -> Result<Serial, SourceError> {
            Ok(Serial(*self.version.lock()))
        }

        fn diff_since(
            &self,
            _apex: &Name,
            _from: Serial,
        ) -> Result<Option<ZoneDiff>, SourceError> {
            Ok(self.diff.clone())
        }
    }

    fn n(s: &str) -> Name {
        Name::new(s).unwrap()
    }

    fn authority(source: Arc<FixedSource>) -> ZoneAuthority {
        let mut auth = ZoneAuthority::new(source);
        auth.add_origin(
            Origin::new(n("cluster.local"))
                .with_nameservers(vec!["10.0.0.10".parse().unwrap()]),
        )
        .unwrap();
        auth
    }

    fn source(version: u32) -> Arc<FixedSource> {
        Arc::new(FixedSource {
            version: PlMutex::new(version),
            diff: None,
        })
    }

    #[rstest]
    #[case(None, XfrClass::Full)]
    #[case(Some(3), XfrClass::UpToDate)]
    #[case(Some(1), XfrClass::Full)]
    #[case(Some(7), XfrClass::Full)]
    fn classification(
        #[case] requested: Option<u32>,
        #[case] expected: XfrClass,
    ) {
        let auth = authority(source(3));
        let plan = auth
            .classify(&n("cluster.local"), requested.map(Serial))
            .unwrap();
        assert_eq!(plan.class, expected);
        assert_eq!(plan.serial(), Serial(3));
    }

    #[test]
    fn incremental_when_diff_available() {
        let diff = ZoneDiff {
            from: Serial(1),
            to: Serial(3),
            ..Default::default()
        };
        let auth = authority(Arc::new(FixedSource {
            version: PlMutex::new(3),
            diff: Some(diff.clone()),
        }));
        let plan = auth.classify(&n("cluster.local"), Some(Serial(1))).unwrap();
        assert_eq!(plan.class, XfrClass::Incremental(diff));
        assert_eq!(plan.class.from_serial(), Some(Serial(1)));
    }

    #[test]
    fn regression_forces_full() {
        let src = source(5);
        let auth = authority(src.clone());
        let apex = n("cluster.local");
        auth.classify(&apex, None).unwrap();
        *src.version.lock() = 4;
        let plan = auth.classify(&apex, Some(Serial(4))).unwrap();
        assert_eq!(plan.class, XfrClass::Full);
        let plan = auth.classify(&apex, Some(Serial(4))).unwrap();
        assert_eq!(plan.class, XfrClass::UpToDate);
    }

    #[test]
    fn not_authoritative() {
        let auth = authority(source(1));
        assert_eq!(
            auth.classify(&n("example.test"), None).unwrap_err(),
            AuthorityError::NotAuthoritative(n("example.test"))
        );
    }

    #[test]
    fn soa_and_nameserver_records() {
        let auth = authority(source(3));
        let apex = n("cluster.local");
        assert_eq!(
            auth.current_soa(&apex).unwrap().to_string(),
            "cluster.local.\t5\tIN\tSOA\tns.dns.cluster.local. hostmaster.cluster.local. 3 7200 1800 86400 5"
        );
        let ns: Vec<_> = auth
            .nameserver_records(&apex)
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            ns,
            vec![
                "cluster.local.\t5\tIN\tNS\tns.dns.cluster.local.",
                "ns.dns.cluster.local.\t5\tIN\tA\t10.0.0.10",
            ]
        );
    }

    #[test]
    fn merge_members_default_to_regular_origins() {
        let mut auth = authority(source(1));
        auth.add_origin(Origin::new(n("clusterset.local")).into_merge(vec![]))
            .unwrap();
        assert_eq!(auth.members(&n("clusterset.local")), vec![n("cluster.local")]);
        assert!(auth.members(&n("cluster.local")).is_empty());
    }
}
