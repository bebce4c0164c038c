//! Business logic services
//!
//! This module contains business logic separated from HTTP concerns.
//! The stores are plain files, the dashboard is reached through the
//! `DashboardClient` trait so every service can be tested with a mock.

pub mod alert;
pub mod device_registry;
pub mod profile_table;
pub mod provisioning;
pub mod ssid;
