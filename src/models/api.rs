//! Response bodies for the gateway's own endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service health status
    pub status: String,
    /// Gateway version
    pub version: String,
    /// Number of configured routes
    pub routes: usize,
    /// Routed service names, sorted
    pub services: Vec<String>,
    /// Seconds since the gateway started
    pub uptime_seconds: u64,
    /// Current timestamp
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "healthy".to_string(),
            version: "0.1.0".to_string(),
            routes: 2,
            services: vec!["catalog".to_string(), "orders".to_string()],
            uptime_seconds: 12,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&response).expect("Serialization should succeed");
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["routes"], 2);
        assert_eq!(json["services"][1], "orders");
    }
}
