use crate::{
    http_client::{ServiceResultResponse, StatusMessage, handle_service_result},
    meraki_client::DashboardClient,
    services::alert::{AlertError, AlertEvent, AlertOutcome, AlertProcessor, WebhookPayload},
};
use actix_web::{
    HttpRequest, HttpResponse, Responder,
    error::{InternalError, JsonPayloadError},
    http::StatusCode,
    web,
};
use log::{debug, error, warn};

impl ServiceResultResponse for AlertOutcome {
    fn status_code(&self) -> StatusCode {
        StatusCode::OK
    }

    fn body(&self) -> StatusMessage {
        StatusMessage {
            status: self.code(),
            message: self.to_string(),
        }
    }
}

impl ServiceResultResponse for AlertError {
    fn status_code(&self) -> StatusCode {
        match self {
            AlertError::Storage(_) | AlertError::Unrecorded { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AlertError::Remote { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    fn body(&self) -> StatusMessage {
        match self {
            AlertError::Storage(e) => StatusMessage {
                status: "storage_error",
                message: e.to_string(),
            },
            AlertError::Remote {
                source,
                registry_updated,
            } => StatusMessage {
                status: "remote_call_failed",
                message: if *registry_updated {
                    format!("{source}, device registry was reset")
                } else {
                    format!("{source}, device registry unchanged")
                },
            },
            AlertError::Unrecorded { source, .. } => StatusMessage {
                status: "storage_error",
                message: format!("{self}: {source}"),
            },
        }
    }
}

/// Rejects bodies that are not a JSON object with `400 invalid_payload`
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err: JsonPayloadError, _req: &HttpRequest| {
        warn!("rejected webhook payload: {err}");

        let response = HttpResponse::BadRequest().json(StatusMessage {
            status: "invalid_payload",
            message: err.to_string(),
        });

        InternalError::from_response(err, response).into()
    })
}

pub struct Api<Client>
where
    Client: DashboardClient,
{
    pub processor: AlertProcessor<Client>,
}

impl<Client> Api<Client>
where
    Client: DashboardClient,
{
    pub fn new(processor: AlertProcessor<Client>) -> Self {
        Api { processor }
    }

    pub async fn webhook(body: web::Json<WebhookPayload>, api: web::Data<Self>) -> impl Responder {
        debug!("webhook() called: {body:?}");

        let event = AlertEvent::from(body.into_inner());

        handle_service_result(api.processor.process(&event).await, "webhook")
    }

    pub async fn healthcheck(api: web::Data<Self>) -> impl Responder {
        debug!("healthcheck() called");

        match api.processor.registry().snapshot() {
            Ok(devices) => HttpResponse::Ok().json(StatusMessage {
                status: "ok",
                message: format!("{} devices registered", devices.len()),
            }),
            Err(e) => {
                error!("healthcheck failed: {e:#}");
                HttpResponse::InternalServerError().json(StatusMessage {
                    status: "storage_error",
                    message: e.to_string(),
                })
            }
        }
    }

    pub async fn version() -> impl Responder {
        HttpResponse::Ok().body(env!("CARGO_PKG_VERSION"))
    }
}
