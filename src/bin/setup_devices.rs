//! CLI tool to provision the device registry
//!
//! Picks the dashboard network, stores its id in the env file and writes
//! the selected switches into the device registry in their reset state.
//!
//! Usage: cargo run --bin setup-devices

use anyhow::{Context, Result, bail};
use dialoguer::{MultiSelect, Select};
use env_logger::{Builder, Env};
use log::info;
use seamless_ssid::{
    config::SetupConfig,
    meraki_client::{DashboardClient, MerakiDashboardClient, Organization},
    services::{device_registry::DeviceRegistry, provisioning::ProvisioningService},
};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    Builder::from_env(Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        eprintln!("Failed to set up devices: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = SetupConfig::load().context("failed to load configuration")?;
    let client = MerakiDashboardClient::new(&config.dashboard)?;

    let organization = select_organization(client.organizations().await?)?;
    info!("using organization {} ({})", organization.name, organization.id);

    let networks = client.networks(organization.id.clone()).await?;
    if networks.is_empty() {
        bail!("no networks found in organization {}", organization.name);
    }

    let labels: Vec<String> = networks
        .iter()
        .map(|n| format!("{} (ID: {})", n.name, n.id))
        .collect();
    let choice = Select::new()
        .with_prompt("Network to use")
        .items(&labels)
        .default(0)
        .interact()
        .context("network selection aborted")?;
    let network = &networks[choice];

    ProvisioningService::save_network_id(&config.env_file, &network.id)?;
    println!("Network ID saved to {:?}: {}", config.env_file, network.id);

    let switches = ProvisioningService::switches(
        client.devices(network.id.clone()).await?,
        &config.switch_model_filter,
    );
    if switches.is_empty() {
        bail!(
            "no {} devices found in network {}",
            config.switch_model_filter,
            network.name
        );
    }

    let labels: Vec<String> = switches
        .iter()
        .map(|d| format!("{} (Serial Number: {})", d.model, d.serial))
        .collect();
    let chosen = loop {
        let chosen = MultiSelect::new()
            .with_prompt("Devices to register (space to toggle, enter to confirm)")
            .items(&labels)
            .interact()
            .context("device selection aborted")?;

        if !chosen.is_empty() {
            break chosen;
        }
        println!("Select at least one device.");
    };

    let selected: Vec<_> = chosen.into_iter().map(|i| switches[i].clone()).collect();
    let records = ProvisioningService::records_for(&selected);

    let registry = DeviceRegistry::new(&config.device_registry);
    let count = registry.provision(records).await?;

    println!("Saved {count} device(s) to {:?}", registry.path());

    Ok(())
}

fn select_organization(mut organizations: Vec<Organization>) -> Result<Organization> {
    match organizations.len() {
        0 => bail!("no organizations accessible with this API key"),
        1 => Ok(organizations.remove(0)),
        _ => {
            let labels: Vec<String> = organizations
                .iter()
                .map(|o| format!("{} (ID: {})", o.name, o.id))
                .collect();
            let choice = Select::new()
                .with_prompt("Organization to use")
                .items(&labels)
                .default(0)
                .interact()
                .context("organization selection aborted")?;

            Ok(organizations.swap_remove(choice))
        }
    }
}
