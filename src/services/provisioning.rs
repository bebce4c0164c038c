//! Provisioning operations used by the `setup-devices` tool

use crate::{meraki_client::Device, services::device_registry::DeviceRecord};
use anyhow::{Context, Result};
use log::info;
use std::{fs, io::ErrorKind, path::Path};

const NETWORK_ID_KEY: &str = "MERAKI_NETWORK_ID";

/// Service for registry provisioning and env file maintenance
pub struct ProvisioningService;

impl ProvisioningService {
    /// Devices whose model contains `model_filter` (case-insensitive)
    pub fn switches(devices: Vec<Device>, model_filter: &str) -> Vec<Device> {
        let filter = model_filter.to_ascii_uppercase();

        devices
            .into_iter()
            .filter(|d| d.model.to_ascii_uppercase().contains(&filter))
            .collect()
    }

    /// Default registry records for the selected devices, first serial wins
    pub fn records_for(devices: &[Device]) -> Vec<DeviceRecord> {
        let mut records: Vec<DeviceRecord> = Vec::with_capacity(devices.len());

        for device in devices {
            if records.iter().any(|r| r.serial_number == device.serial) {
                continue;
            }
            records.push(DeviceRecord::new(&device.serial, &device.model));
        }

        records
    }

    /// Write `MERAKI_NETWORK_ID=<network_id>` into `env_file`
    ///
    /// An existing assignment is replaced in place, all other lines are kept.
    /// The file is created when missing.
    ///
    /// # Arguments
    /// * `env_file` - Path of the dotenv file
    /// * `network_id` - Selected network
    pub fn save_network_id(env_file: &Path, network_id: &str) -> Result<()> {
        let content = match fs::read_to_string(env_file) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e).with_context(|| format!("failed to read {env_file:?}")),
        };

        let prefix = format!("{NETWORK_ID_KEY}=");
        let assignment = format!("{prefix}{network_id}");
        let mut replaced = false;

        let mut lines: Vec<String> = content
            .lines()
            .map(|line| {
                if !replaced && line.trim_start().starts_with(&prefix) {
                    replaced = true;
                    assignment.clone()
                } else {
                    line.to_string()
                }
            })
            .collect();

        if !replaced {
            lines.push(assignment);
        }

        let temp_file_path = env_file.with_extension("tmp");
        fs::write(&temp_file_path, lines.join("\n") + "\n")
            .with_context(|| format!("failed to write {temp_file_path:?}"))?;
        fs::rename(&temp_file_path, env_file)
            .with_context(|| format!("failed to replace {env_file:?}"))?;

        info!("network id saved to {env_file:?}: {network_id}");
        Ok(())
    }
}
