//! HTTP route handlers: the Twilio webhook, the internal dispatch tick,
//! enrollment, and health.

use axum::{
    extract::{Extension, Form, Json},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::domains::engagement::{self, DispatchSummary};
use crate::domains::messaging::{self, InboundSms};
use crate::domains::patients::actions;

use super::app::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    database: String,
}

/// Health check endpoint. 200 when the database answers, 503 otherwise.
pub async fn health_handler(
    Extension(state): Extension<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let db_ok = match tokio::time::timeout(
        std::time::Duration::from_secs(5),
        sqlx::query("SELECT 1").execute(&state.kernel.db_pool),
    )
    .await
    {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            error!(error = %e, "health check query failed");
            false
        }
        Err(_) => {
            error!("health check query timed out");
            false
        }
    };

    let (status_code, status) = if db_ok {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        status_code,
        Json(HealthResponse {
            status: status.to_string(),
            database: if db_ok { "ok" } else { "error" }.to_string(),
        }),
    )
}

/// Twilio's inbound message webhook form.
#[derive(Deserialize)]
pub struct TwilioInboundForm {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "Body")]
    pub body: String,
    #[serde(rename = "MessageSid")]
    pub message_sid: String,
}

/// Inbound SMS webhook. Always answers 200 to the gateway; failures are
/// logged and retried via the gateway's redelivery, which the inbound
/// pipeline deduplicates.
pub async fn sms_webhook_handler(
    Extension(state): Extension<AppState>,
    Form(form): Form<TwilioInboundForm>,
) -> StatusCode {
    let msg = InboundSms {
        from_address: form.from,
        text: form.body,
        provider_message_id: form.message_sid,
    };

    if let Err(e) = messaging::handle_inbound(&state.kernel, msg).await {
        error!(error = %e, "inbound message handling failed");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    StatusCode::OK
}

fn bearer_ok(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == expected)
}

/// Dispatch tick entrypoint, invoked by an external cron-like trigger.
pub async fn dispatch_handler(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
) -> Result<Json<DispatchSummary>, StatusCode> {
    if !bearer_ok(&headers, &state.dispatch_auth_token) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    match engagement::run_tick(&state.kernel).await {
        Ok(summary) => Ok(Json(summary)),
        Err(e) => {
            error!(error = %e, "dispatch tick failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[derive(Deserialize)]
pub struct EnrollRequest {
    pub phone_number: String,
    /// Preferred daily check-in time, "HH:MM" on the patient's wall clock.
    pub preferred_time: String,
    /// IANA timezone name, e.g. "America/Chicago".
    pub timezone: String,
}

#[derive(Serialize)]
pub struct EnrollResponse {
    pub patient_id: uuid::Uuid,
}

pub async fn enroll_handler(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    Json(req): Json<EnrollRequest>,
) -> Result<Json<EnrollResponse>, StatusCode> {
    if !bearer_ok(&headers, &state.dispatch_auth_token) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let preferred_time = NaiveTime::parse_from_str(&req.preferred_time, "%H:%M")
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    match actions::enroll(&state.kernel, &req.phone_number, preferred_time, &req.timezone).await {
        Ok(patient) => {
            info!(patient_id = %patient.id, "enrollment accepted");
            Ok(Json(EnrollResponse {
                patient_id: patient.id,
            }))
        }
        Err(e) => {
            error!(error = %e, "enrollment failed");
            Err(StatusCode::UNPROCESSABLE_ENTITY)
        }
    }
}
