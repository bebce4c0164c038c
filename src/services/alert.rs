//! Alert processing
//!
//! Decides, per switch port alert, whether the boat SSID is enabled or
//! disabled and keeps the device registry in step with that decision.
//!
//! - `port_connected`: discover the remote system on the port, resolve its
//!   SSID/VLAN, enable the SSID and then record the device as connected.
//! - `port_disconnected`: use the last recorded system name, disable its
//!   SSID and reset the device regardless of the remote outcome.
//! - anything else is reported as unsupported.
//!
//! The registry is only rewritten when a field actually changed.

use crate::{
    config::WirelessConfig,
    error::{RemoteCallError, StorageError},
    meraki_client::DashboardClient,
    services::{
        device_registry::{DeviceRegistry, NOT_AVAILABLE, RegistrySession},
        profile_table::{ProfileTable, SsidAssignment},
        ssid::SsidService,
    },
};
use log::{debug, info, warn};
use serde::{Deserialize, Deserializer};
use std::fmt;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AlertKind {
    PortConnected,
    PortDisconnected,
    Unsupported(String),
}

impl AlertKind {
    pub fn parse(alert_type_id: &str) -> Self {
        match alert_type_id.trim() {
            "port_connected" => AlertKind::PortConnected,
            "port_disconnected" => AlertKind::PortDisconnected,
            other => AlertKind::Unsupported(other.to_string()),
        }
    }
}

/// Inbound webhook body, unknown fields are ignored
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    #[serde(default)]
    pub device_serial: Option<String>,
    #[serde(default)]
    pub alert_type_id: Option<String>,
    #[serde(default)]
    pub network_id: Option<String>,
    #[serde(default)]
    pub alert_data: AlertData,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertData {
    #[serde(default, deserialize_with = "deserialize_port")]
    pub port_num: Option<String>,
}

fn deserialize_port<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u64),
        Text(String),
    }

    Ok(match Option::<Port>::deserialize(deserializer)? {
        Some(Port::Number(n)) => Some(n.to_string()),
        Some(Port::Text(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}

/// One port alert, ready for processing
#[derive(Clone, Debug, PartialEq)]
pub struct AlertEvent {
    pub device_serial: String,
    pub kind: AlertKind,
    pub network_id: Option<String>,
    pub port: Option<String>,
}

impl From<WebhookPayload> for AlertEvent {
    fn from(payload: WebhookPayload) -> Self {
        AlertEvent {
            device_serial: payload.device_serial.unwrap_or_default().trim().to_string(),
            kind: AlertKind::parse(payload.alert_type_id.as_deref().unwrap_or_default()),
            network_id: payload.network_id,
            port: payload.alert_data.port_num,
        }
    }
}

/// Result of a processed alert; lookup misses are outcomes, not errors
#[derive(Clone, Debug, PartialEq)]
pub enum AlertOutcome {
    SsidEnabled {
        system_name: String,
        ssid_number: u8,
        vlan: u16,
    },
    SsidDisabled {
        system_name: String,
        ssid_number: u8,
    },
    DeviceReset {
        system_name: Option<String>,
    },
    UnknownDevice {
        serial: String,
    },
    NoSystemName {
        port: Option<String>,
    },
    NoProfile {
        system_name: String,
    },
    Unsupported {
        alert_type_id: String,
    },
}

impl AlertOutcome {
    pub fn code(&self) -> &'static str {
        match self {
            AlertOutcome::SsidEnabled { .. } => "ssid_enabled",
            AlertOutcome::SsidDisabled { .. } => "ssid_disabled",
            AlertOutcome::DeviceReset { .. } => "device_reset",
            AlertOutcome::UnknownDevice { .. } => "unknown_device",
            AlertOutcome::NoSystemName { .. } => "no_system_name",
            AlertOutcome::NoProfile { .. } => "no_profile",
            AlertOutcome::Unsupported { .. } => "unsupported_alert",
        }
    }
}

impl fmt::Display for AlertOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertOutcome::SsidEnabled {
                system_name,
                ssid_number,
                vlan,
            } => write!(f, "enabled SSID {ssid_number} on VLAN {vlan} for {system_name}"),
            AlertOutcome::SsidDisabled {
                system_name,
                ssid_number,
            } => write!(f, "disabled SSID {ssid_number} for {system_name}"),
            AlertOutcome::DeviceReset { .. } => f.write_str("device reset, no SSID to disable"),
            AlertOutcome::UnknownDevice { serial } => write!(f, "unknown serial {serial:?}"),
            AlertOutcome::NoSystemName { port: Some(port) } => {
                write!(f, "no system name on port {port}")
            }
            AlertOutcome::NoSystemName { port: None } => f.write_str("alert carries no port"),
            AlertOutcome::NoProfile { system_name } => write!(f, "no profile for {system_name}"),
            AlertOutcome::Unsupported { alert_type_id } => {
                write!(f, "unsupported alert type {alert_type_id:?}")
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("device or profile store unavailable")]
    Storage(#[from] StorageError),

    #[error("network controller call failed (registry updated: {registry_updated})")]
    Remote {
        #[source]
        source: RemoteCallError,
        registry_updated: bool,
    },

    #[error("SSID {ssid_number} enabled, registry not updated")]
    Unrecorded {
        #[source]
        source: StorageError,
        ssid_number: u8,
    },
}

impl AlertError {
    fn remote(source: RemoteCallError) -> Self {
        AlertError::Remote {
            source,
            registry_updated: false,
        }
    }
}

pub struct AlertProcessor<T>
where
    T: DashboardClient,
{
    client: T,
    registry: DeviceRegistry,
    profiles: ProfileTable,
    wireless: WirelessConfig,
}

impl<T> AlertProcessor<T>
where
    T: DashboardClient,
{
    pub fn new(
        client: T,
        registry: DeviceRegistry,
        profiles: ProfileTable,
        wireless: WirelessConfig,
    ) -> Self {
        Self {
            client,
            registry,
            profiles,
            wireless,
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Process one alert end to end
    pub async fn process(&self, event: &AlertEvent) -> Result<AlertOutcome, AlertError> {
        info!(
            "processing {:?} for {} (port {:?})",
            event.kind, event.device_serial, event.port
        );

        if let Some(network_id) = &event.network_id
            && *network_id != self.wireless.network_id
        {
            debug!(
                "alert from network {network_id}, updating configured network {}",
                self.wireless.network_id
            );
        }

        let outcome = match &event.kind {
            AlertKind::PortConnected => self.port_connected(event).await?,
            AlertKind::PortDisconnected => self.port_disconnected(event).await?,
            AlertKind::Unsupported(alert_type_id) => {
                warn!("ignoring unsupported alert type {alert_type_id:?}");
                AlertOutcome::Unsupported {
                    alert_type_id: alert_type_id.clone(),
                }
            }
        };

        info!("alert for {}: {outcome}", event.device_serial);
        Ok(outcome)
    }

    /// Open the registry if `serial` is registered
    async fn open_for(&self, serial: &str) -> Result<Option<RegistrySession>, AlertError> {
        let session = self.registry.open().await?;

        if session.find_by_serial(serial).is_none() {
            warn!("serial does not exist in device registry: {serial:?}");
            return Ok(None);
        }

        Ok(Some(session))
    }

    async fn port_connected(&self, event: &AlertEvent) -> Result<AlertOutcome, AlertError> {
        let serial = event.device_serial.as_str();

        let Some(mut session) = self.open_for(serial).await? else {
            return Ok(AlertOutcome::UnknownDevice {
                serial: serial.to_string(),
            });
        };

        let Some(port) = event.port.as_deref() else {
            warn!("port_connected alert for {serial} without port number");
            return Ok(AlertOutcome::NoSystemName { port: None });
        };

        let neighbors = self
            .client
            .lldp_cdp(serial.to_string())
            .await
            .map_err(AlertError::remote)?;
        debug!("lldp/cdp of {serial}: {neighbors:?}");

        let Some(system_name) = neighbors.system_name(port) else {
            warn!("no system name on port {port} of {serial}, using {NOT_AVAILABLE}");
            return Ok(AlertOutcome::NoSystemName {
                port: Some(port.to_string()),
            });
        };

        let Some(SsidAssignment { ssid_number, vlan }) =
            self.profiles.find_by_system_name(system_name)?
        else {
            warn!("no SSID profile for system {system_name}");
            return Ok(AlertOutcome::NoProfile {
                system_name: system_name.to_string(),
            });
        };

        info!("using system name {system_name}, ssid {ssid_number}, vlan {vlan}");

        SsidService::enable(&self.client, &self.wireless, ssid_number, vlan)
            .await
            .map_err(AlertError::remote)?;

        if session.upsert(serial, true, system_name) {
            session
                .persist_all()
                .map_err(|source| AlertError::Unrecorded {
                    source,
                    ssid_number,
                })?;
        }

        Ok(AlertOutcome::SsidEnabled {
            system_name: system_name.to_string(),
            ssid_number,
            vlan,
        })
    }

    async fn port_disconnected(&self, event: &AlertEvent) -> Result<AlertOutcome, AlertError> {
        let serial = event.device_serial.as_str();

        let Some(mut session) = self.open_for(serial).await? else {
            return Ok(AlertOutcome::UnknownDevice {
                serial: serial.to_string(),
            });
        };

        let last_system_name = session
            .find_by_serial(serial)
            .and_then(|device| device.known_system_name())
            .map(str::to_string);

        let disabled = match &last_system_name {
            Some(system_name) => self.disable_for(system_name).await,
            None => Ok(None),
        };

        let changed = session.upsert(serial, false, NOT_AVAILABLE);
        if changed {
            session.persist_all()?;
        }

        match (disabled, last_system_name) {
            (Ok(Some(ssid_number)), Some(system_name)) => Ok(AlertOutcome::SsidDisabled {
                system_name,
                ssid_number,
            }),
            (Ok(_), system_name) => Ok(AlertOutcome::DeviceReset { system_name }),
            (Err(AlertError::Remote { source, .. }), _) => Err(AlertError::Remote {
                source,
                registry_updated: changed,
            }),
            (Err(e), _) => Err(e),
        }
    }

    /// Disable the SSID assigned to `system_name`, returning its index
    async fn disable_for(&self, system_name: &str) -> Result<Option<u8>, AlertError> {
        let Some(SsidAssignment { ssid_number, .. }) =
            self.profiles.find_by_system_name(system_name)?
        else {
            warn!("no SSID profile for system {system_name}, nothing to disable");
            return Ok(None);
        };

        SsidService::disable(&self.client, &self.wireless, ssid_number)
            .await
            .map_err(AlertError::remote)?;

        Ok(Some(ssid_number))
    }
}
