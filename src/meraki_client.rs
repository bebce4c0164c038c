use crate::{
    config::DashboardConfig,
    error::RemoteCallError,
    http_client::{dashboard_client, handle_http_response},
};
use anyhow::{Context, Result};
use log::{debug, info};
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{collections::HashMap, fmt::Debug};
use trait_variant::make;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Organization {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Network {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Device {
    pub serial: String,
    #[serde(default)]
    pub model: String,
}

/// Link-layer discovery data of one switch, keyed by port number
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct LldpCdp {
    #[serde(default)]
    pub ports: HashMap<String, PortNeighbors>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct PortNeighbors {
    #[serde(default)]
    pub lldp: Option<LldpNeighbor>,
    #[serde(default)]
    pub cdp: Option<CdpNeighbor>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LldpNeighbor {
    #[serde(default)]
    pub system_name: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CdpNeighbor {
    #[serde(default)]
    pub device_id: Option<String>,
}

impl LldpCdp {
    /// Remote system name advertised on `port`
    ///
    /// LLDP `systemName` wins, CDP `deviceId` is the fallback. Blank names
    /// count as absent.
    pub fn system_name(&self, port: &str) -> Option<&str> {
        let neighbors = self.ports.get(port.trim())?;

        let lldp = neighbors
            .lldp
            .as_ref()
            .and_then(|lldp| lldp.system_name.as_deref());
        let cdp = neighbors
            .cdp
            .as_ref()
            .and_then(|cdp| cdp.device_id.as_deref());

        [lldp, cdp]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|name| !name.is_empty())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    Psk,
    Open,
}

/// Body of an SSID configuration update
#[derive(Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SsidUpdate {
    pub name: String,
    pub enabled: bool,
    pub auth_mode: AuthMode,
    pub encryption_mode: String,
    /// `None` serializes as `null` and clears the VLAN
    pub vlan_id: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub psk: Option<String>,
}

impl Debug for SsidUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SsidUpdate")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("auth_mode", &self.auth_mode)
            .field("encryption_mode", &self.encryption_mode)
            .field("vlan_id", &self.vlan_id)
            .field("psk", &self.psk.as_ref().map(|_| "****"))
            .finish()
    }
}

#[make(Send)]
#[cfg_attr(any(test, feature = "mock"), automock)]
pub trait DashboardClient {
    async fn organizations(&self) -> Result<Vec<Organization>, RemoteCallError>;
    async fn networks(&self, organization_id: String) -> Result<Vec<Network>, RemoteCallError>;
    async fn devices(&self, network_id: String) -> Result<Vec<Device>, RemoteCallError>;
    async fn lldp_cdp(&self, serial: String) -> Result<LldpCdp, RemoteCallError>;
    async fn update_ssid(
        &self,
        network_id: String,
        number: u8,
        update: SsidUpdate,
    ) -> Result<(), RemoteCallError>;
}

#[derive(Clone)]
pub struct MerakiDashboardClient {
    client: Client,
    base_url: Url,
}

impl MerakiDashboardClient {
    // API endpoint constants
    const ORGANIZATIONS_ENDPOINT: &str = "/organizations";
    const NETWORKS_ENDPOINT: &str = "/networks";
    const DEVICES_ENDPOINT: &str = "/devices";

    pub fn new(config: &DashboardConfig) -> Result<Self> {
        let client = dashboard_client(config).context("failed to create dashboard client")?;

        Ok(MerakiDashboardClient {
            client,
            base_url: config.base_url.clone(),
        })
    }

    fn build_url(&self, path: &str) -> String {
        // join without dropping a base path such as "/api/v1"
        let base = self.base_url.as_str().trim_end_matches('/');
        let normalized_path = path.trim_start_matches('/');
        format!("{base}/{normalized_path}")
    }

    /// GET request to the dashboard API, decoding a JSON body
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, RemoteCallError> {
        let url = self.build_url(path);
        let operation = format!("GET {path}");
        info!("GET {url}");

        let res = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RemoteCallError::from_reqwest(&operation, e))?;

        let body = handle_http_response(res, &operation).await?;
        debug!("{operation} returned: {body}");

        serde_json::from_str(&body).map_err(|source| RemoteCallError::Decode { operation, source })
    }

    /// PUT request to the dashboard API with JSON body
    async fn put_json(
        &self,
        path: &str,
        body: impl Debug + Serialize,
    ) -> Result<String, RemoteCallError> {
        let url = self.build_url(path);
        let operation = format!("PUT {path}");
        info!("PUT {url} with body: {body:?}");

        let res = self
            .client
            .put(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RemoteCallError::from_reqwest(&operation, e))?;

        handle_http_response(res, &operation).await
    }
}

impl DashboardClient for MerakiDashboardClient {
    async fn organizations(&self) -> Result<Vec<Organization>, RemoteCallError> {
        self.get(Self::ORGANIZATIONS_ENDPOINT).await
    }

    async fn networks(&self, organization_id: String) -> Result<Vec<Network>, RemoteCallError> {
        self.get(&format!(
            "{}/{organization_id}/networks",
            Self::ORGANIZATIONS_ENDPOINT
        ))
        .await
    }

    async fn devices(&self, network_id: String) -> Result<Vec<Device>, RemoteCallError> {
        self.get(&format!("{}/{network_id}/devices", Self::NETWORKS_ENDPOINT))
            .await
    }

    async fn lldp_cdp(&self, serial: String) -> Result<LldpCdp, RemoteCallError> {
        self.get(&format!("{}/{serial}/lldpCdp", Self::DEVICES_ENDPOINT))
            .await
    }

    async fn update_ssid(
        &self,
        network_id: String,
        number: u8,
        update: SsidUpdate,
    ) -> Result<(), RemoteCallError> {
        self.put_json(
            &format!(
                "{}/{network_id}/wireless/ssids/{number}",
                Self::NETWORKS_ENDPOINT
            ),
            update,
        )
        .await?;
        Ok(())
    }
}
