use crate::{config::DashboardConfig, error::RemoteCallError};
use actix_web::{HttpResponse, http::StatusCode};
use anyhow::{Context, Result};
use log::error;
use reqwest::{
    Client, Response,
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde::Serialize;

/// Create the HTTP client used for every dashboard API call
///
/// The API key is sent as bearer token and every request is bounded by the
/// configured timeout.
///
/// # Arguments
/// * `config` - Dashboard access settings
pub fn dashboard_client(config: &DashboardConfig) -> Result<Client> {
    let mut headers = HeaderMap::new();

    let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
        .context("failed to build authorization header from MERAKI_API_KEY")?;
    auth.set_sensitive(true);

    headers.insert(AUTHORIZATION, auth);
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    Client::builder()
        .default_headers(headers)
        .timeout(config.timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to create dashboard HTTP client")
}

/// Handle HTTP response by checking status and extracting body
///
/// # Arguments
/// * `res` - The HTTP response to handle
/// * `operation` - Request description used in errors (e.g. "GET /organizations")
///
/// # Returns
/// * `Ok(String)` - The response body if the status is successful
/// * `Err` - If the status is not successful or reading the body fails
pub async fn handle_http_response(
    res: Response,
    operation: &str,
) -> Result<String, RemoteCallError> {
    let status = res.status();
    let body = res
        .text()
        .await
        .map_err(|e| RemoteCallError::from_reqwest(operation, e))?;

    if !status.is_success() {
        return Err(RemoteCallError::Status {
            operation: operation.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    Ok(body)
}

/// Uniform body of every webhook service response
#[derive(Debug, Serialize)]
pub struct StatusMessage {
    pub status: &'static str,
    pub message: String,
}

/// Trait for converting service results into HTTP responses
pub trait ServiceResultResponse {
    fn status_code(&self) -> StatusCode;
    fn body(&self) -> StatusMessage;

    fn into_response(self) -> HttpResponse
    where
        Self: Sized,
    {
        HttpResponse::build(self.status_code()).json(self.body())
    }
}

/// Convert a service result into an HTTP response, logging failures
///
/// # Arguments
/// * `result` - The Result to handle
/// * `operation` - Context message describing the operation
pub fn handle_service_result<T, E>(result: Result<T, E>, operation: &str) -> HttpResponse
where
    T: ServiceResultResponse,
    E: ServiceResultResponse + std::error::Error,
{
    match result {
        Ok(data) => data.into_response(),
        Err(e) => {
            error!("{operation} failed: {}", error_chain(&e));
            e.into_response()
        }
    }
}

fn error_chain(e: &dyn std::error::Error) -> String {
    let mut chain = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}
