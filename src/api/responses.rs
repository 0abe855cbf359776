use crate::policy::LightAction;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct StatusSuccessResponse {
    pub dark: bool,
    pub lights_on: bool,
    pub someone_home: bool,
    pub everyone_home: bool,
    pub last_action: LightAction,
    pub iteration: u64,
    pub members: Vec<MemberResponse>,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct MemberResponse {
    pub name: String,
    pub ip: String,
    pub mac: String,
    pub home: bool,
    pub home_count: u32,
    pub leave_count: u32,
    pub home_time: String,
    pub leave_time: String,
    pub last_seen: String,
    pub longest_idle_secs: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ErrorResponse {
    pub error_code: ErrorCode,
    pub error_message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NoData,
    InternalError,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
    Ko,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthResponseBody {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error_at: Option<String>,
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_uses_screaming_codes() -> Result<(), serde_json::Error> {
        let body = ErrorResponse {
            error_code: ErrorCode::NoData,
            error_message: "no iteration has completed yet".to_string(),
            timestamp: "2024-06-21T17:00:00Z".to_string(),
        };

        let json = serde_json::to_value(&body)?;

        assert_eq!(json["error_code"], "NO_DATA");
        Ok(())
    }

    #[test]
    fn health_omits_missing_error() -> Result<(), serde_json::Error> {
        let body = HealthResponseBody {
            status: HealthStatus::Ok,
            last_error: None,
            last_error_at: None,
            timestamp: "2024-06-21T17:00:00Z".to_string(),
        };

        let json = serde_json::to_value(&body)?;

        assert_eq!(json["status"], "ok");
        assert!(json.get("last_error").is_none());
        assert!(json.get("last_error_at").is_none());
        Ok(())
    }
}
