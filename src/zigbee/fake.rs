//! In-memory devices for tests.  Every cluster command is appended to the
//! owning device's call log as `ep<id>/0x<cluster> <command> <args…>`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{Cluster, CommandResult, Device, DeviceRegistry, Endpoint, Ieee, Status};

type CallLog = Arc<Mutex<Vec<String>>>;

pub(crate) fn fake_ieee(n: u8) -> Ieee {
    Ieee([0x00, 0x0d, 0x6f, 0xff, 0xfe, 0x00, 0x00, n])
}

pub(crate) struct FakeCluster {
    id:        u16,
    endpoint:  u8,
    log:       CallLog,
    responses: HashMap<&'static str, CommandResult>,
}

impl FakeCluster {
    fn record(&self, command: &'static str, call: String) -> CommandResult {
        self.log
            .lock()
            .unwrap()
            .push(format!("ep{}/0x{:04x} {call}", self.endpoint, self.id));
        self.responses
            .get(command)
            .cloned()
            .unwrap_or(Ok(Status::SUCCESS))
    }
}

#[async_trait]
impl Cluster for FakeCluster {
    fn cluster_id(&self) -> u16 {
        self.id
    }

    async fn bind(&self) -> CommandResult {
        self.record("bind", "bind".into())
    }

    async fn configure_reporting(
        &self,
        attribute:         &str,
        min_interval:      u16,
        max_interval:      u16,
        reportable_change: u32,
    ) -> CommandResult {
        self.record(
            "configure_reporting",
            format!("configure_reporting {attribute} {min_interval} {max_interval} {reportable_change}"),
        )
    }

    async fn image_notify(&self, payload_type: u8, query_jitter: u8) -> CommandResult {
        self.record("image_notify", format!("image_notify {payload_type} {query_jitter}"))
    }
}

pub(crate) struct FakeEndpoint {
    id:           u8,
    in_clusters:  BTreeMap<u16, FakeCluster>,
    out_clusters: BTreeMap<u16, FakeCluster>,
}

impl Endpoint for FakeEndpoint {
    fn endpoint_id(&self) -> u8 {
        self.id
    }

    fn out_cluster(&self, cluster_id: u16) -> Option<&dyn Cluster> {
        self.out_clusters.get(&cluster_id).map(|c| c as &dyn Cluster)
    }

    fn in_cluster(&self, cluster_id: u16) -> Option<&dyn Cluster> {
        self.in_clusters.get(&cluster_id).map(|c| c as &dyn Cluster)
    }
}

pub(crate) struct FakeDevice {
    ieee:         Ieee,
    manufacturer: Option<u16>,
    endpoints:    BTreeMap<u8, FakeEndpoint>,
    log:          CallLog,
}

impl FakeDevice {
    pub(crate) fn new(n: u8) -> Self {
        Self {
            ieee:         fake_ieee(n),
            manufacturer: None,
            endpoints:    BTreeMap::new(),
            log:          CallLog::default(),
        }
    }

    pub(crate) fn with_manufacturer(mut self, code: u16) -> Self {
        self.manufacturer = Some(code);
        self
    }

    pub(crate) fn with_endpoint(mut self, id: u8, in_clusters: &[u16], out_clusters: &[u16]) -> Self {
        let make = |cluster: u16| FakeCluster {
            id:        cluster,
            endpoint:  id,
            log:       Arc::clone(&self.log),
            responses: HashMap::new(),
        };
        let endpoint = FakeEndpoint {
            id,
            in_clusters:  in_clusters.iter().map(|&c| (c, make(c))).collect(),
            out_clusters: out_clusters.iter().map(|&c| (c, make(c))).collect(),
        };
        self.endpoints.insert(id, endpoint);
        self
    }

    /// Make `command` on every `cluster` instance of `endpoint` return `result`.
    pub(crate) fn respond(
        mut self,
        endpoint: u8,
        cluster:  u16,
        command:  &'static str,
        result:   CommandResult,
    ) -> Self {
        if let Some(ep) = self.endpoints.get_mut(&endpoint) {
            for c in ep.in_clusters.get_mut(&cluster).into_iter().chain(ep.out_clusters.get_mut(&cluster)) {
                c.responses.insert(command, result.clone());
            }
        }
        self
    }
}

impl Device for FakeDevice {
    fn ieee(&self) -> Ieee {
        self.ieee
    }

    fn nwk(&self) -> u16 {
        0x1000 | u16::from(self.ieee.0[7])
    }

    fn manufacturer_code(&self) -> Option<u16> {
        self.manufacturer
    }

    fn endpoints(&self) -> Vec<&dyn Endpoint> {
        self.endpoints.values().map(|e| e as &dyn Endpoint).collect()
    }
}

pub(crate) struct FakeRegistry {
    devices: Vec<FakeDevice>,
}

impl FakeRegistry {
    pub(crate) fn new(devices: Vec<FakeDevice>) -> Self {
        Self { devices }
    }

    /// Cluster calls made on the device `ieee`, in order.
    pub(crate) fn calls(&self, ieee: &Ieee) -> Vec<String> {
        self.devices
            .iter()
            .find(|d| d.ieee == *ieee)
            .map(|d| d.log.lock().unwrap().clone())
            .unwrap_or_default()
    }
}

impl DeviceRegistry for FakeRegistry {
    fn devices(&self) -> Vec<&dyn Device> {
        self.devices.iter().map(|d| d as &dyn Device).collect()
    }

    fn device(&self, ieee: &Ieee) -> Option<&dyn Device> {
        self.devices
            .iter()
            .find(|d| d.ieee == *ieee)
            .map(|d| d as &dyn Device)
    }
}
