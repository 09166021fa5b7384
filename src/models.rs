//! Data models and DTOs (Data Transfer Objects)
//!
//! Request/response structures of the installer API.

use crate::install::admin::AdminRequest;
use crate::install::orchestrator::{AdvanceOutcome, StageDetail};
use crate::install::StageAction;
use serde::{Deserialize, Serialize};

/// `?stage=N` on the stage view
#[derive(Debug, Deserialize)]
pub struct StageQuery {
    pub stage: Option<u8>,
}

/// Action identifiers accepted by `POST /install/advance`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    VerifyRequirements,
    ConfigureDatabase,
    CreateAdmin,
    ImportSteps,
}

/// Stage-advance request. Only `create_admin` reads the admin fields.
#[derive(Debug, Deserialize)]
pub struct AdvanceRequest {
    pub stage: u8,
    pub action: ActionKind,
    #[serde(flatten)]
    pub admin: AdminRequest,
}

impl AdvanceRequest {
    pub fn into_action(self) -> StageAction {
        match self.action {
            ActionKind::VerifyRequirements => StageAction::VerifyRequirements,
            ActionKind::ConfigureDatabase => StageAction::ConfigureDatabase,
            ActionKind::CreateAdmin => StageAction::CreateAdmin(self.admin),
            ActionKind::ImportSteps => StageAction::ImportSteps,
        }
    }
}

/// Response to a stage-advance request
#[derive(Debug, Serialize)]
pub struct AdvanceResponse {
    pub success: bool,
    pub stage: u8,
    /// Where the client continues after a successful advance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<StageDetail>,
}

impl From<AdvanceOutcome> for AdvanceResponse {
    fn from(outcome: AdvanceOutcome) -> Self {
        let stage = outcome.state.stage.number();
        Self {
            success: outcome.advanced,
            stage,
            next: outcome
                .advanced
                .then(|| format!("/install?stage={}", stage)),
            errors: outcome.errors,
            detail: outcome.detail,
        }
    }
}
