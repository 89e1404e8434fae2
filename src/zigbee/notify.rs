//! Image-notify handshake for a single device.
//!
//! Sequence (strictly in order, no retries):
//!   1. Resolve the device by IEEE address
//!   2. Find the first non-ZDO endpoint with an OTA client cluster
//!   3. Bind the Basic cluster of that endpoint
//!   4. Configure reporting of `sw_build_id` so the new version is pushed
//!      once the device has upgraded
//!   5. Send `image_notify` on the OTA cluster
//!
//! Once an OTA cluster is found steps 3–5 always run; each step's result is
//! recorded in the returned [`NotificationOutcome`] instead of aborting.

use std::fmt;

use log::{debug, warn};

use super::{
    Cluster, CommandResult, Device, DeviceRegistry, Endpoint, Ieee, Status, BASIC_CLUSTER,
    OTA_CLUSTER, ZDO_ENDPOINT,
};
use crate::error::{OtaError, Result};

/// Attribute reporting subscription applied by the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingConfig {
    pub attribute:         &'static str,
    pub min_interval:      u16,
    pub max_interval:      u16,
    pub reportable_change: u32,
}

/// Report the Basic cluster firmware build id at least every 30 minutes and
/// on every change.
pub const SW_BUILD_ID_REPORTING: ReportingConfig = ReportingConfig {
    attribute:         "sw_build_id",
    min_interval:      0,
    max_interval:      1800,
    reportable_change: 1,
};

/// `image_notify` payload type: query jitter only.
pub const NOTIFY_PAYLOAD_TYPE: u8 = 0;
/// `image_notify` query jitter; 100 makes every device respond.
pub const NOTIFY_QUERY_JITTER: u8 = 100;

/// Result of one handshake step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    NotAttempted,
    Succeeded,
    /// The device answered with a non-success status.
    Rejected(Status),
    /// No answer: the request could not be delivered.
    Failed(String),
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Succeeded)
    }

    pub fn was_attempted(&self) -> bool {
        !matches!(self, StepOutcome::NotAttempted)
    }
}

impl From<CommandResult> for StepOutcome {
    fn from(result: CommandResult) -> Self {
        match result {
            Ok(status) if status.is_success() => StepOutcome::Succeeded,
            Ok(status) => StepOutcome::Rejected(status),
            Err(e) => StepOutcome::Failed(e.to_string()),
        }
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::NotAttempted => f.write_str("not attempted"),
            StepOutcome::Succeeded    => f.write_str("success"),
            StepOutcome::Rejected(s)  => write!(f, "rejected ({s})"),
            StepOutcome::Failed(e)    => write!(f, "failed ({e})"),
        }
    }
}

/// Per-step record of one handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationOutcome {
    pub ieee: Ieee,
    /// Endpoint owning the OTA cluster; `None` means the device has no OTA
    /// cluster and nothing was sent.
    pub ota_endpoint: Option<u8>,
    pub bind:         StepOutcome,
    pub reporting:    StepOutcome,
    pub notify:       StepOutcome,
}

impl NotificationOutcome {
    fn no_ota_cluster(ieee: Ieee) -> Self {
        Self {
            ieee,
            ota_endpoint: None,
            bind:         StepOutcome::NotAttempted,
            reporting:    StepOutcome::NotAttempted,
            notify:       StepOutcome::NotAttempted,
        }
    }

    pub fn cluster_found(&self) -> bool {
        self.ota_endpoint.is_some()
    }
}

/// First non-ZDO endpoint exposing an OTA client cluster.
pub fn find_ota_cluster(device: &dyn Device) -> Option<(&dyn Endpoint, &dyn Cluster)> {
    device
        .endpoints()
        .into_iter()
        .filter(|ep| ep.endpoint_id() != ZDO_ENDPOINT)
        .find_map(|ep| ep.out_cluster(OTA_CLUSTER).map(|cluster| (ep, cluster)))
}

/// Tell the device `ieee` that a new image may be available.
///
/// Fails only with [`OtaError::DeviceNotFound`]; everything after that is
/// reported through the returned outcome.
pub async fn notify_device(registry: &dyn DeviceRegistry, ieee: &Ieee) -> Result<NotificationOutcome> {
    let device = registry
        .device(ieee)
        .ok_or(OtaError::DeviceNotFound(*ieee))?;

    let Some((endpoint, ota)) = find_ota_cluster(device) else {
        debug!("{ieee}: no OTA cluster found");
        return Ok(NotificationOutcome::no_ota_cluster(*ieee));
    };
    let ep_id = endpoint.endpoint_id();
    debug!("{ieee}: OTA cluster on endpoint {ep_id}");

    let (bind, reporting) = match endpoint.in_cluster(BASIC_CLUSTER) {
        Some(basic) => {
            let bind = StepOutcome::from(basic.bind().await);
            log_step(ieee, "bind basic cluster", &bind);

            let r = SW_BUILD_ID_REPORTING;
            let reporting = StepOutcome::from(
                basic
                    .configure_reporting(r.attribute, r.min_interval, r.max_interval, r.reportable_change)
                    .await,
            );
            log_step(ieee, "configure reporting", &reporting);
            (bind, reporting)
        }
        None => {
            warn!("{ieee}: endpoint {ep_id} has no basic cluster; skipping bind and reporting");
            (StepOutcome::NotAttempted, StepOutcome::NotAttempted)
        }
    };

    let notify = StepOutcome::from(ota.image_notify(NOTIFY_PAYLOAD_TYPE, NOTIFY_QUERY_JITTER).await);
    log_step(ieee, &format!("image notify to 0x{:04x}", device.nwk()), &notify);

    Ok(NotificationOutcome {
        ieee: *ieee,
        ota_endpoint: Some(ep_id),
        bind,
        reporting,
        notify,
    })
}

fn log_step(ieee: &Ieee, step: &str, outcome: &StepOutcome) {
    if outcome.is_success() {
        debug!("{ieee}: {step}: {outcome}");
    } else {
        warn!("{ieee}: {step}: {outcome}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zigbee::fake::{fake_ieee, FakeDevice, FakeRegistry};
    use crate::zigbee::ClusterError;

    const OTA: u16 = OTA_CLUSTER;
    const BASIC: u16 = BASIC_CLUSTER;

    const HANDSHAKE_EP2: [&str; 3] = [
        "ep2/0x0000 bind",
        "ep2/0x0000 configure_reporting sw_build_id 0 1800 1",
        "ep2/0x0019 image_notify 0 100",
    ];

    #[tokio::test]
    async fn unknown_device_is_an_error() {
        let registry = FakeRegistry::new(vec![FakeDevice::new(1)]);
        let err = notify_device(&registry, &fake_ieee(9)).await.unwrap_err();
        assert!(matches!(err, OtaError::DeviceNotFound(i) if i == fake_ieee(9)), "got {err}");
        assert!(registry.calls(&fake_ieee(1)).is_empty());
    }

    #[tokio::test]
    async fn device_without_ota_cluster_gets_no_commands() {
        let registry = FakeRegistry::new(vec![FakeDevice::new(1)
            .with_endpoint(1, &[BASIC, 0x0006], &[0x000a])
            // OTA on an input list does not count.
            .with_endpoint(2, &[BASIC, OTA], &[])]);

        let outcome = notify_device(&registry, &fake_ieee(1)).await.unwrap();
        assert!(!outcome.cluster_found());
        assert_eq!(outcome.bind, StepOutcome::NotAttempted);
        assert_eq!(outcome.reporting, StepOutcome::NotAttempted);
        assert_eq!(outcome.notify, StepOutcome::NotAttempted);
        assert!(registry.calls(&fake_ieee(1)).is_empty());
    }

    #[tokio::test]
    async fn zdo_endpoint_is_skipped() {
        let registry = FakeRegistry::new(vec![FakeDevice::new(1)
            .with_endpoint(0, &[BASIC], &[OTA])]);

        let outcome = notify_device(&registry, &fake_ieee(1)).await.unwrap();
        assert!(!outcome.cluster_found());
        assert!(registry.calls(&fake_ieee(1)).is_empty());
    }

    #[tokio::test]
    async fn handshake_runs_on_endpoint_owning_ota_cluster() {
        let registry = FakeRegistry::new(vec![FakeDevice::new(1)
            .with_endpoint(1, &[BASIC], &[])
            .with_endpoint(2, &[BASIC], &[OTA])
            .with_endpoint(3, &[BASIC], &[OTA])]);

        let outcome = notify_device(&registry, &fake_ieee(1)).await.unwrap();
        assert_eq!(outcome.ota_endpoint, Some(2));
        assert!(outcome.bind.is_success());
        assert!(outcome.reporting.is_success());
        assert!(outcome.notify.is_success());
        assert_eq!(registry.calls(&fake_ieee(1)), HANDSHAKE_EP2);
    }

    #[tokio::test]
    async fn step_failures_do_not_stop_the_sequence() {
        let registry = FakeRegistry::new(vec![FakeDevice::new(1)
            .with_endpoint(2, &[BASIC], &[OTA])
            .respond(2, BASIC, "bind", Err(ClusterError::Timeout))
            .respond(2, BASIC, "configure_reporting", Ok(Status::UNSUPPORTED_ATTRIBUTE))]);

        let outcome = notify_device(&registry, &fake_ieee(1)).await.unwrap();
        assert_eq!(outcome.bind, StepOutcome::Failed("no response from device".into()));
        assert_eq!(outcome.reporting, StepOutcome::Rejected(Status::UNSUPPORTED_ATTRIBUTE));
        assert!(outcome.notify.is_success());
        assert_eq!(registry.calls(&fake_ieee(1)), HANDSHAKE_EP2);
    }

    #[tokio::test]
    async fn notify_rejection_is_recorded() {
        let registry = FakeRegistry::new(vec![FakeDevice::new(1)
            .with_endpoint(1, &[BASIC], &[OTA])
            .respond(1, OTA, "image_notify", Err(ClusterError::Delivery("MAC no ack".into())))]);

        let outcome = notify_device(&registry, &fake_ieee(1)).await.unwrap();
        assert!(outcome.bind.is_success());
        assert_eq!(outcome.notify, StepOutcome::Failed("delivery failed: MAC no ack".into()));
    }

    #[tokio::test]
    async fn missing_basic_cluster_still_notifies() {
        let registry = FakeRegistry::new(vec![FakeDevice::new(1)
            .with_endpoint(1, &[0x0006], &[OTA])]);

        let outcome = notify_device(&registry, &fake_ieee(1)).await.unwrap();
        assert_eq!(outcome.ota_endpoint, Some(1));
        assert!(!outcome.bind.was_attempted());
        assert!(!outcome.reporting.was_attempted());
        assert!(outcome.notify.is_success());
        assert_eq!(registry.calls(&fake_ieee(1)), vec!["ep1/0x0019 image_notify 0 100"]);
    }

    #[test]
    fn step_outcome_from_result() {
        assert_eq!(StepOutcome::from(Ok(Status::SUCCESS)), StepOutcome::Succeeded);
        assert_eq!(StepOutcome::from(Ok(Status::FAILURE)), StepOutcome::Rejected(Status::FAILURE));
        assert_eq!(StepOutcome::Rejected(Status::FAILURE).to_string(), "rejected (FAILURE)");
    }
}
