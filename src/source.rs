//! Collaborator interfaces consumed by the poller

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alert::DashboardAlertConfig;
use crate::types::ObjectType;

/// State of a monitored object as reported by the monitoring backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectState {
    #[serde(rename = "MaxState")]
    pub result_code: i64,
    #[serde(rename = "Acknowledged", default)]
    pub acknowledged: bool,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("server answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unreadable response: {0}")]
    Decode(String),

    #[error("no {object_type} matches filter '{filter}'")]
    NotFound { object_type: ObjectType, filter: String },

    #[error("no answer within {0} seconds")]
    Timeout(u64),
}

/// Everything one poll tick needs from the outside world
#[async_trait]
pub trait MonitoringSource: Send + Sync {
    async fn object_state(&self, object_type: ObjectType, filter: &str) -> Result<ObjectState, FetchError>;

    async fn alert_config(&self, dashboard: &str) -> Result<DashboardAlertConfig, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_state_wire_names() {
        let state: ObjectState = serde_json::from_str(r#"{"MaxState": 2, "Acknowledged": true}"#).unwrap();
        assert_eq!(state, ObjectState { result_code: 2, acknowledged: true });

        let state: ObjectState = serde_json::from_str(r#"{"MaxState": 0}"#).unwrap();
        assert!(!state.acknowledged);
    }

    #[test]
    fn test_fetch_error_messages() {
        let err = FetchError::NotFound {
            object_type: ObjectType::Host,
            filter: "host.name==\"gone\"".to_string(),
        };
        assert_eq!(err.to_string(), "no host matches filter 'host.name==\"gone\"'");
        assert_eq!(FetchError::Timeout(10).to_string(), "no answer within 10 seconds");
    }
}
