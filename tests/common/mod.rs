//! Fixtures shared by the integration tests.
#![allow(dead_code)]

use std::net::IpAddr;
use std::sync::Arc;

use zonechain::base::{Name, Record, Serial};
use zonechain::source::services::{
    Endpoints, Protocol, Service, ServicePort, Snapshot,
};
use zonechain::source::{
    RecordGroup, RecordSource, ServiceSource, SnapshotStore, SourceError,
};

pub fn n(s: &str) -> Name {
    Name::new(s).unwrap()
}

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

pub fn rendered(records: &[Record]) -> Vec<String> {
    records.iter().map(ToString::to_string).collect()
}

//------------ Backend Data --------------------------------------------------

/// A small cluster covering every kind of service.
///
/// * `hdls1` has endpoints sharing a hostname and IPv6 endpoints,
/// * `hdls2` has two endpoints on the same address,
/// * `hdlsprtls` exposes no ports,
/// * `external-to-service` aliases a name inside the cluster.
pub fn cluster_snapshot(version: u32) -> Snapshot {
    let http = || ServicePort::named("http", Protocol::Tcp, 80);
    Snapshot::new(Serial(version))
        .with_service(Service::cluster_ip(
            "kubedns",
            "kube-system",
            vec![ip("10.0.0.10")],
            vec![ServicePort::named("dns", Protocol::Udp, 53)],
        ))
        .with_service(Service::cluster_ip(
            "svc1",
            "testns",
            vec![ip("10.0.0.1")],
            vec![http()],
        ))
        .with_service(Service::cluster_ip(
            "svcempty",
            "testns",
            vec![ip("10.0.0.1")],
            vec![http()],
        ))
        .with_service(Service::cluster_ip(
            "svc6",
            "testns",
            vec![ip("1234:abcd::1")],
            vec![http()],
        ))
        .with_service(Service::cluster_ip(
            "svc-dual-stack",
            "testns",
            vec![ip("10.0.0.3"), ip("10::3")],
            vec![http()],
        ))
        .with_service(Service::headless("hdls1", "testns", vec![http()]))
        .with_endpoints(
            Endpoints::new("hdls1", "testns")
                .with_address(ip("172.0.0.2"))
                .with_address(ip("172.0.0.3"))
                .with_host(ip("172.0.0.4"), "dup-name")
                .with_host(ip("172.0.0.5"), "dup-name")
                .with_port(http()),
        )
        .with_endpoints(
            Endpoints::new("hdls1", "testns")
                .with_address(ip("5678:abcd::1"))
                .with_address(ip("5678:abcd::2"))
                .with_port(http()),
        )
        .with_service(Service::headless("hdls2", "testns", vec![http()]))
        .with_endpoints(
            Endpoints::new("hdls2", "testns")
                .with_address(ip("172.0.0.30"))
                .with_address(ip("172.0.0.30"))
                .with_port(http()),
        )
        .with_service(Service::headless("hdlsprtls", "testns", Vec::new()))
        .with_endpoints(
            Endpoints::new("hdlsprtls", "testns")
                .with_address(ip("172.0.0.20")),
        )
        .with_service(Service::external_name(
            "external",
            "testns",
            n("ext.interwebs.test"),
        ))
        .with_service(Service::external_name(
            "external-to-service",
            "testns",
            n("svc1.testns.svc.cluster.local"),
        ))
}

/// A snapshot with `count` ClusterIP services, for long transfers.
pub fn large_snapshot(version: u32, count: u8) -> Snapshot {
    let mut snapshot = Snapshot::new(Serial(version));
    for idx in 0..count {
        snapshot.insert_service(Service::cluster_ip(
            &format!("svc{idx}"),
            "bulk",
            vec![IpAddr::from([10, 1, 0, idx])],
            vec![ServicePort::unnamed(Protocol::Tcp, 80)],
        ));
    }
    snapshot
}

pub fn backend(snapshot: Snapshot) -> Arc<SnapshotStore> {
    Arc::new(SnapshotStore::with_snapshot(snapshot))
}

/// The body of a full transfer of `cluster.local` from [`cluster_snapshot`].
///
/// Services are ordered by namespace, then by name.
pub fn cluster_local_body() -> Vec<&'static str> {
    vec![
        "cluster.local.\t5\tIN\tNS\tns.dns.cluster.local.",
        "ns.dns.cluster.local.\t5\tIN\tA\t10.0.0.10",
        "kubedns.kube-system.svc.cluster.local.\t5\tIN\tA\t10.0.0.10",
        "kubedns.kube-system.svc.cluster.local.\t5\tIN\tSRV\t0 100 53 kubedns.kube-system.svc.cluster.local.",
        "_dns._udp.kubedns.kube-system.svc.cluster.local.\t5\tIN\tSRV\t0 100 53 kubedns.kube-system.svc.cluster.local.",
        "external.testns.svc.cluster.local.\t5\tIN\tCNAME\text.interwebs.test.",
        "external-to-service.testns.svc.cluster.local.\t5\tIN\tCNAME\tsvc1.testns.svc.cluster.local.",
        "hdls1.testns.svc.cluster.local.\t5\tIN\tA\t172.0.0.2",
        "172-0-0-2.hdls1.testns.svc.cluster.local.\t5\tIN\tA\t172.0.0.2",
        "_http._tcp.hdls1.testns.svc.cluster.local.\t5\tIN\tSRV\t0 16 80 172-0-0-2.hdls1.testns.svc.cluster.local.",
        "hdls1.testns.svc.cluster.local.\t5\tIN\tA\t172.0.0.3",
        "172-0-0-3.hdls1.testns.svc.cluster.local.\t5\tIN\tA\t172.0.0.3",
        "_http._tcp.hdls1.testns.svc.cluster.local.\t5\tIN\tSRV\t0 16 80 172-0-0-3.hdls1.testns.svc.cluster.local.",
        "hdls1.testns.svc.cluster.local.\t5\tIN\tA\t172.0.0.4",
        "dup-name.hdls1.testns.svc.cluster.local.\t5\tIN\tA\t172.0.0.4",
        "_http._tcp.hdls1.testns.svc.cluster.local.\t5\tIN\tSRV\t0 16 80 dup-name.hdls1.testns.svc.cluster.local.",
        "hdls1.testns.svc.cluster.local.\t5\tIN\tA\t172.0.0.5",
        "dup-name.hdls1.testns.svc.cluster.local.\t5\tIN\tA\t172.0.0.5",
        "_http._tcp.hdls1.testns.svc.cluster.local.\t5\tIN\tSRV\t0 16 80 dup-name.hdls1.testns.svc.cluster.local.",
        "hdls1.testns.svc.cluster.local.\t5\tIN\tAAAA\t5678:abcd::1",
        "5678-abcd--1.hdls1.testns.svc.cluster.local.\t5\tIN\tAAAA\t5678:abcd::1",
        "_http._tcp.hdls1.testns.svc.cluster.local.\t5\tIN\tSRV\t0 16 80 5678-abcd--1.hdls1.testns.svc.cluster.local.",
        "hdls1.testns.svc.cluster.local.\t5\tIN\tAAAA\t5678:abcd::2",
        "5678-abcd--2.hdls1.testns.svc.cluster.local.\t5\tIN\tAAAA\t5678:abcd::2",
        "_http._tcp.hdls1.testns.svc.cluster.local.\t5\tIN\tSRV\t0 16 80 5678-abcd--2.hdls1.testns.svc.cluster.local.",
        "hdls2.testns.svc.cluster.local.\t5\tIN\tA\t172.0.0.30",
        "172-0-0-30.hdls2.testns.svc.cluster.local.\t5\tIN\tA\t172.0.0.30",
        "_http._tcp.hdls2.testns.svc.cluster.local.\t5\tIN\tSRV\t0 33 80 172-0-0-30.hdls2.testns.svc.cluster.local.",
        "172-0-0-30-1.hdls2.testns.svc.cluster.local.\t5\tIN\tA\t172.0.0.30",
        "_http._tcp.hdls2.testns.svc.cluster.local.\t5\tIN\tSRV\t0 33 80 172-0-0-30-1.hdls2.testns.svc.cluster.local.",
        "172-0-0-30-2.hdls2.testns.svc.cluster.local.\t5\tIN\tA\t172.0.0.30",
        "_http._tcp.hdls2.testns.svc.cluster.local.\t5\tIN\tSRV\t0 33 80 172-0-0-30-2.hdls2.testns.svc.cluster.local.",
        "hdlsprtls.testns.svc.cluster.local.\t5\tIN\tA\t172.0.0.20",
        "172-0-0-20.hdlsprtls.testns.svc.cluster.local.\t5\tIN\tA\t172.0.0.20",
        "svc-dual-stack.testns.svc.cluster.local.\t5\tIN\tA\t10.0.0.3",
        "svc-dual-stack.testns.svc.cluster.local.\t5\tIN\tAAAA\t10::3",
        "svc-dual-stack.testns.svc.cluster.local.\t5\tIN\tSRV\t0 100 80 svc-dual-stack.testns.svc.cluster.local.",
        "_http._tcp.svc-dual-stack.testns.svc.cluster.local.\t5\tIN\tSRV\t0 100 80 svc-dual-stack.testns.svc.cluster.local.",
        "svc1.testns.svc.cluster.local.\t5\tIN\tA\t10.0.0.1",
        "svc1.testns.svc.cluster.local.\t5\tIN\tSRV\t0 100 80 svc1.testns.svc.cluster.local.",
        "_http._tcp.svc1.testns.svc.cluster.local.\t5\tIN\tSRV\t0 100 80 svc1.testns.svc.cluster.local.",
        "svc6.testns.svc.cluster.local.\t5\tIN\tAAAA\t1234:abcd::1",
        "svc6.testns.svc.cluster.local.\t5\tIN\tSRV\t0 100 80 svc6.testns.svc.cluster.local.",
        "_http._tcp.svc6.testns.svc.cluster.local.\t5\tIN\tSRV\t0 100 80 svc6.testns.svc.cluster.local.",
        "svcempty.testns.svc.cluster.local.\t5\tIN\tA\t10.0.0.1",
        "svcempty.testns.svc.cluster.local.\t5\tIN\tSRV\t0 100 80 svcempty.testns.svc.cluster.local.",
        "_http._tcp.svcempty.testns.svc.cluster.local.\t5\tIN\tSRV\t0 100 80 svcempty.testns.svc.cluster.local.",
    ]
}

pub fn soa(apex: &str, serial: u32) -> String {
    format!(
        "{apex}.\t5\tIN\tSOA\tns.dns.{apex}. hostmaster.{apex}. {serial} 7200 1800 86400 5"
    )
}

//------------ FailingSource -------------------------------------------------

/// A service source whose backend breaks down on one name.
#[derive(Debug)]
pub struct FailingSource {
    inner: ServiceSource,
    fail_on: Name,
}

impl FailingSource {
    pub fn new(store: Arc<SnapshotStore>, fail_on: Name) -> Self {
        FailingSource {
            inner: ServiceSource::new(store),
            fail_on,
        }
    }
}

impl RecordSource for FailingSource {
    fn list_names(&self, apex: &Name) -> Result<Vec<Name>, SourceError> {
        self.inner.list_names(apex)
    }

    fn records_for(
        &self,
        apex: &Name,
        name: &Name,
    ) -> Result<Option<RecordGroup>, SourceError> {
        if *name == self.fail_on {
            return Err(SourceError::Unavailable("connection reset".into()));
        }
        self.inner.records_for(apex, name)
    }

    fn current_version(&self, apex: &Name) -> Result<Serial, SourceError> {
        self.inner.current_version(apex)
    }
}
