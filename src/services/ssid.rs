//! SSID state service
//!
//! Turns an enable/disable decision into a dashboard SSID update.

use crate::{
    config::WirelessConfig,
    error::RemoteCallError,
    meraki_client::{AuthMode, DashboardClient, SsidUpdate},
};
use log::{error, info};

const ENCRYPTION_MODE: &str = "wpa";

/// Service for SSID enablement operations
pub struct SsidService;

impl SsidService {
    /// Build the SSID profile payload
    ///
    /// # Arguments
    /// * `ssid_name` - Name written to the SSID, fixed per deployment
    /// * `enabled` - Target state
    /// * `psk` - Pre-shared key, only sent when enabling
    /// * `vlan` - VLAN id, cleared when disabling
    pub fn payload(
        ssid_name: &str,
        enabled: bool,
        psk: Option<&str>,
        vlan: Option<u16>,
    ) -> SsidUpdate {
        SsidUpdate {
            name: ssid_name.to_string(),
            enabled,
            auth_mode: if enabled { AuthMode::Psk } else { AuthMode::Open },
            encryption_mode: ENCRYPTION_MODE.to_string(),
            vlan_id: vlan.filter(|_| enabled),
            psk: psk.filter(|_| enabled).map(str::to_string),
        }
    }

    /// Send an SSID state change to the dashboard
    ///
    /// Failures are logged and returned; the caller decides what to commit.
    pub async fn set_ssid_state<T>(
        client: &T,
        ssid_name: &str,
        ssid_number: u8,
        network_id: &str,
        enabled: bool,
        psk: Option<&str>,
        vlan: Option<u16>,
    ) -> Result<(), RemoteCallError>
    where
        T: DashboardClient,
    {
        let update = Self::payload(ssid_name, enabled, psk, vlan);
        let action = if enabled { "enable" } else { "disable" };

        match client
            .update_ssid(network_id.to_string(), ssid_number, update)
            .await
        {
            Ok(()) => {
                info!("{action}d SSID {ssid_number} on network {network_id}");
                Ok(())
            }
            Err(e) => {
                error!("failed to {action} SSID {ssid_number} on network {network_id}: {e}");
                Err(e)
            }
        }
    }

    /// Enable the SSID with the deployment's PSK on `vlan`
    pub async fn enable<T>(
        client: &T,
        wireless: &WirelessConfig,
        ssid_number: u8,
        vlan: u16,
    ) -> Result<(), RemoteCallError>
    where
        T: DashboardClient,
    {
        Self::set_ssid_state(
            client,
            &wireless.ssid_name,
            ssid_number,
            &wireless.network_id,
            true,
            Some(&wireless.psk),
            Some(vlan),
        )
        .await
    }

    /// Disable the SSID, dropping its VLAN
    pub async fn disable<T>(
        client: &T,
        wireless: &WirelessConfig,
        ssid_number: u8,
    ) -> Result<(), RemoteCallError>
    where
        T: DashboardClient,
    {
        Self::set_ssid_state(
            client,
            &wireless.ssid_name,
            ssid_number,
            &wireless.network_id,
            false,
            None,
            None,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meraki_client::MockDashboardClient;

    fn wireless() -> WirelessConfig {
        WirelessConfig {
            network_id: "N_1234".to_string(),
            ssid_name: "Boat-WiFi".to_string(),
            psk: "very-secret-psk".to_string(),
        }
    }

    mod payload {
        use super::*;

        #[test]
        fn enabling_uses_psk_and_vlan() {
            let update = SsidService::payload("Boat-WiFi", true, Some("psk"), Some(20));

            assert!(update.enabled);
            assert_eq!(update.auth_mode, AuthMode::Psk);
            assert_eq!(update.encryption_mode, "wpa");
            assert_eq!(update.vlan_id, Some(20));
            assert_eq!(update.psk.as_deref(), Some("psk"));
        }

        #[test]
        fn disabling_drops_psk_and_vlan() {
            let update = SsidService::payload("Boat-WiFi", false, Some("psk"), Some(20));

            assert!(!update.enabled);
            assert_eq!(update.auth_mode, AuthMode::Open);
            assert_eq!(update.vlan_id, None);
            assert_eq!(update.psk, None);
        }
    }

    #[tokio::test]
    async fn enable_sends_update_to_configured_network() {
        let mut client = MockDashboardClient::default();
        client
            .expect_update_ssid()
            .withf(|network_id, number, update| {
                network_id == "N_1234"
                    && *number == 2
                    && update.enabled
                    && update.vlan_id == Some(20)
                    && update.psk.as_deref() == Some("very-secret-psk")
                    && update.name == "Boat-WiFi"
            })
            .times(1)
            .returning(|_, _, _| Box::pin(async { Ok(()) }));

        SsidService::enable(&client, &wireless(), 2, 20)
            .await
            .expect("should enable");
    }

    #[tokio::test]
    async fn disable_failure_is_returned() {
        let mut client = MockDashboardClient::default();
        client
            .expect_update_ssid()
            .withf(|_, number, update| *number == 2 && !update.enabled && update.psk.is_none())
            .times(1)
            .returning(|_, _, _| {
                Box::pin(async {
                    Err(RemoteCallError::Status {
                        operation: "PUT /networks/N_1234/wireless/ssids/2".to_string(),
                        status: 500,
                        body: "oops".to_string(),
                    })
                })
            });

        let result = SsidService::disable(&client, &wireless(), 2).await;
        assert!(matches!(
            result,
            Err(RemoteCallError::Status { status: 500, .. })
        ));
    }
}
