use crate::api::responses::{
    ErrorCode, ErrorResponse, HealthResponseBody, HealthStatus, MemberResponse,
    StatusSuccessResponse,
};
use crate::audit::format_timestamp;
use crate::state::{AppState, HouseholdSnapshot, MemberSnapshot};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::error;

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

pub enum StatusResponse {
    Success(Box<StatusSuccessResponse>),
    Error {
        status: StatusCode,
        body: ErrorResponse,
    },
}

impl IntoResponse for StatusResponse {
    fn into_response(self) -> Response {
        match self {
            StatusResponse::Success(body) => (StatusCode::OK, Json(*body)).into_response(),
            StatusResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn get_status(State(state): State<Arc<RwLock<AppState>>>) -> impl IntoResponse {
    build_status_response(state)
}

pub enum HealthResponse {
    Success {
        status: StatusCode,
        body: HealthResponseBody,
    },
    Error {
        status: StatusCode,
        body: ErrorResponse,
    },
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        match self {
            HealthResponse::Success { status, body } => (status, Json(body)).into_response(),
            HealthResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn get_health(State(state): State<Arc<RwLock<AppState>>>) -> impl IntoResponse {
    build_health_response(state, SystemTime::now())
}

fn build_status_response(state: Arc<RwLock<AppState>>) -> StatusResponse {
    let guard = match state.read() {
        Ok(guard) => guard,
        Err(_) => {
            return status_internal_error("state lock poisoned while reading snapshot");
        }
    };
    let snapshot = guard.snapshot().cloned();
    drop(guard);

    let Some(snapshot) = snapshot else {
        return no_data_response(SystemTime::now());
    };
    match map_snapshot(&snapshot) {
        Ok(body) => StatusResponse::Success(Box::new(body)),
        Err(_) => status_internal_error("timestamp formatting failure"),
    }
}

fn map_snapshot(snapshot: &HouseholdSnapshot) -> Result<StatusSuccessResponse, time::error::Format> {
    let members = snapshot
        .members
        .iter()
        .map(map_member)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(StatusSuccessResponse {
        dark: snapshot.status.dark,
        lights_on: snapshot.status.lights_on,
        someone_home: snapshot.status.someone_home,
        everyone_home: snapshot.status.everyone_home,
        last_action: snapshot.last_action,
        iteration: snapshot.iteration,
        members,
        timestamp: format_timestamp(snapshot.timestamp)?,
    })
}

fn map_member(member: &MemberSnapshot) -> Result<MemberResponse, time::error::Format> {
    Ok(MemberResponse {
        name: member.name.clone(),
        ip: member.ip.clone(),
        mac: member.mac.clone(),
        home: member.home,
        home_count: member.home_count,
        leave_count: member.leave_count,
        home_time: format_timestamp(member.home_time)?,
        leave_time: format_timestamp(member.leave_time)?,
        last_seen: format_timestamp(member.last_seen)?,
        longest_idle_secs: member.longest_idle.as_secs_f64(),
    })
}

fn no_data_response(timestamp: SystemTime) -> StatusResponse {
    match format_timestamp(timestamp) {
        Ok(formatted) => StatusResponse::Error {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: ErrorResponse {
                error_code: ErrorCode::NoData,
                error_message: "No household status available yet".to_string(),
                timestamp: formatted,
            },
        },
        Err(_err) => status_internal_error("timestamp formatting failure"),
    }
}

fn status_internal_error(message: &str) -> StatusResponse {
    error!(message = message, "Internal error while handling /api/status");
    StatusResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: internal_error_body(),
    }
}

fn build_health_response(state: Arc<RwLock<AppState>>, now: SystemTime) -> HealthResponse {
    let guard = match state.read() {
        Ok(guard) => guard,
        Err(_) => {
            return health_internal_error("state lock poisoned while reading snapshot");
        }
    };
    let last_update = guard.snapshot().map(|snapshot| snapshot.timestamp);
    let last_failure = guard.last_failure().cloned();
    let stale_after = guard.stale_after();
    drop(guard);

    let status = derive_health_status(last_update, last_failure.is_some(), stale_after, now);
    let formatted = format_timestamp(now).and_then(|timestamp| {
        let failed_at = last_failure
            .as_ref()
            .map(|failure| format_timestamp(failure.timestamp))
            .transpose()?;
        Ok((timestamp, failed_at))
    });
    let (timestamp, last_error_at) = match formatted {
        Ok(formatted) => formatted,
        Err(_) => {
            return health_internal_error("timestamp formatting failure");
        }
    };
    let last_error = last_failure.map(|failure| failure.reason);

    let status_code = match status {
        HealthStatus::Ko => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Ok | HealthStatus::Degraded => StatusCode::OK,
    };

    HealthResponse::Success {
        status: status_code,
        body: HealthResponseBody {
            status,
            last_error,
            last_error_at,
            timestamp,
        },
    }
}

fn derive_health_status(
    last_update: Option<SystemTime>,
    failing: bool,
    stale_after: Duration,
    now: SystemTime,
) -> HealthStatus {
    let Some(last_update) = last_update else {
        return HealthStatus::Ko;
    };
    let age = now.duration_since(last_update).unwrap_or(Duration::ZERO);
    if age > stale_after {
        return HealthStatus::Ko;
    }
    if failing {
        HealthStatus::Degraded
    } else {
        HealthStatus::Ok
    }
}

fn health_internal_error(message: &str) -> HealthResponse {
    error!(message = message, "Internal error while handling /api/health");
    HealthResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: internal_error_body(),
    }
}

fn internal_error_body() -> ErrorResponse {
    let formatted = format_timestamp(SystemTime::now()).unwrap_or_else(|err| {
        error!(error = %err, "Failed to format internal error timestamp");
        OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
    });
    ErrorResponse {
        error_code: ErrorCode::InternalError,
        error_message: INTERNAL_ERROR_MESSAGE.to_string(),
        timestamp: formatted,
    }
}
