use serde::{Deserialize, Serialize};

use crate::gifts::Gift;
use crate::models::Lead;

/// Visitor sign-in submitted through the open-house form
#[derive(Debug, Clone, Deserialize, validator::Validate)]
pub struct CaptureLeadRequest {
    #[validate(length(min = 1, max = 200, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "email is invalid"))]
    pub email: Option<String>,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    /// Answers to the property feedback form
    #[serde(default)]
    pub feedback: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeadCaptureResult {
    pub lead: Lead,
    /// Thank-you gift queued for the visitor, if automation is on
    pub pending_gift: Option<Gift>,
}
