//! Core types for the installation pipeline

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single stage of the installation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum PipelineStage {
    RequirementsCheck = 1,
    SchemaSetup = 2,
    AdminProvisioning = 3,
    ReferenceSeeding = 4,
    Complete = 5,
}

impl PipelineStage {
    pub fn number(self) -> u8 {
        self as u8
    }

    /// The stage reached after this one succeeds. `Complete` is terminal.
    pub fn next(self) -> Self {
        match self {
            PipelineStage::RequirementsCheck => PipelineStage::SchemaSetup,
            PipelineStage::SchemaSetup => PipelineStage::AdminProvisioning,
            PipelineStage::AdminProvisioning => PipelineStage::ReferenceSeeding,
            PipelineStage::ReferenceSeeding | PipelineStage::Complete => PipelineStage::Complete,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == PipelineStage::Complete
    }

    pub fn title(self) -> &'static str {
        match self {
            PipelineStage::RequirementsCheck => "System requirements",
            PipelineStage::SchemaSetup => "Database setup",
            PipelineStage::AdminProvisioning => "Administrator account",
            PipelineStage::ReferenceSeeding => "Import audit steps",
            PipelineStage::Complete => "Installation complete",
        }
    }
}

impl From<PipelineStage> for u8 {
    fn from(stage: PipelineStage) -> Self {
        stage.number()
    }
}

impl TryFrom<u8> for PipelineStage {
    type Error = InvalidStage;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(PipelineStage::RequirementsCheck),
            2 => Ok(PipelineStage::SchemaSetup),
            3 => Ok(PipelineStage::AdminProvisioning),
            4 => Ok(PipelineStage::ReferenceSeeding),
            5 => Ok(PipelineStage::Complete),
            other => Err(InvalidStage(other)),
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.number(), self.title())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid installation stage {0} (expected 1-5)")]
pub struct InvalidStage(pub u8);

/// Pipeline position, owned by the caller and handed back after every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineState {
    pub stage: PipelineStage,
}

impl PipelineState {
    pub fn fresh() -> Self {
        Self::at(PipelineStage::RequirementsCheck)
    }

    pub fn at(stage: PipelineStage) -> Self {
        Self { stage }
    }

    pub fn advanced(self) -> Self {
        Self::at(self.stage.next())
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::fresh()
    }
}

/// Administrator account as written to the `users` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminAccount {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub active: bool,
}

/// Audit step template seeded into `step_templates`.
#[derive(Debug, Clone, PartialEq)]
pub struct StepTemplate {
    pub phase_id: i32,
    pub code: String,
    pub name: String,
    pub is_critical: bool,
    pub estimated_hours: f64,
    pub order_in_phase: i32,
}

impl StepTemplate {
    pub fn new(
        phase_id: i32,
        code: &str,
        name: &str,
        is_critical: bool,
        estimated_hours: f64,
        order_in_phase: i32,
    ) -> Self {
        Self {
            phase_id,
            code: code.to_string(),
            name: name.to_string(),
            is_critical,
            estimated_hours,
            order_in_phase,
        }
    }
}
