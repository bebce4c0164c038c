pub mod api;
pub mod config;
pub mod error;
pub mod http_client;
pub mod meraki_client;
pub mod services;
