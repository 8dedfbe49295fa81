use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::script::Question;

/// Configuration for one live interview session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier (e.g., "interview-<uuid>")
    pub session_id: String,

    /// Campaign this interview belongs to
    pub campaign_id: String,

    /// Ordered question list for the campaign
    pub questions: Vec<Question>,

    /// Candidate resume text fed to the turn driver as context
    pub resume_text: String,

    /// Job / role description fed to the turn driver as context
    pub job_context: String,

    /// How often the liveness monitor checks for idleness
    /// Default: 15 seconds
    pub liveness_check_interval: Duration,

    /// Idle gap after which the candidate is re-engaged
    /// Default: 45 seconds
    pub idle_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("interview-{}", uuid::Uuid::new_v4()),
            campaign_id: String::new(),
            questions: Vec::new(),
            resume_text: String::new(),
            job_context: String::new(),
            liveness_check_interval: Duration::from_secs(15),
            idle_timeout: Duration::from_secs(45),
        }
    }
}
