//! Bootstrap orchestrator
//!
//! Drives the five-stage installation. The caller owns the pipeline position:
//! every call takes a [`PipelineState`] and hands one back, advanced by exactly
//! one stage on success and unchanged on failure.

use crate::config::InstallConfig;
use crate::db::{ConnectionFactory, InstallConnection};
use crate::install::admin::{provision_admin, AdminPolicy, AdminRequest};
use crate::install::error::InstallError;
use crate::install::requirements::{RequirementChecker, RequirementReport};
use crate::install::schema::{apply_schema, SchemaSource};
use crate::install::seed::{default_catalog, seed_step_templates};
use crate::install::types::{PipelineStage, PipelineState, StepTemplate};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// An explicit request to run the side effect of a stage
#[derive(Debug, Clone)]
pub enum StageAction {
    VerifyRequirements,
    ConfigureDatabase,
    CreateAdmin(AdminRequest),
    ImportSteps,
}

impl StageAction {
    /// The only stage this action may run at.
    pub fn stage(&self) -> PipelineStage {
        match self {
            StageAction::VerifyRequirements => PipelineStage::RequirementsCheck,
            StageAction::ConfigureDatabase => PipelineStage::SchemaSetup,
            StageAction::CreateAdmin(_) => PipelineStage::AdminProvisioning,
            StageAction::ImportSteps => PipelineStage::ReferenceSeeding,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StageAction::VerifyRequirements => "verify_requirements",
            StageAction::ConfigureDatabase => "configure_database",
            StageAction::CreateAdmin(_) => "create_admin",
            StageAction::ImportSteps => "import_steps",
        }
    }
}

/// Stage-specific result attached to an outcome
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageDetail {
    Requirements(RequirementReport),
    #[serde(rename_all = "camelCase")]
    Schema { statements_applied: usize, schema_digest: String },
    Admin { email: String },
    #[serde(rename_all = "camelCase")]
    Seed { seeded: bool, templates: usize },
}

/// Result of an advance request
#[derive(Debug, Clone)]
pub struct AdvanceOutcome {
    pub state: PipelineState,
    pub advanced: bool,
    pub errors: Vec<String>,
    pub detail: Option<StageDetail>,
}

impl AdvanceOutcome {
    fn advanced(from: PipelineState, detail: StageDetail) -> Self {
        Self {
            state: from.advanced(),
            advanced: true,
            errors: Vec::new(),
            detail: Some(detail),
        }
    }

    fn stayed(state: PipelineState, error: InstallError, detail: Option<StageDetail>) -> Self {
        Self {
            state,
            advanced: false,
            errors: vec![error.to_string()],
            detail,
        }
    }
}

/// What a stage looks like when (re)visited. Building it has no side effects.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageView {
    pub stage: PipelineStage,
    pub title: &'static str,
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirements: Option<RequirementReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<&'static str>,
}

/// Snapshot of how far the database has been installed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallStatus {
    pub reachable: bool,
    pub installed: bool,
    pub table_count: i64,
    pub admin_accounts: i64,
}

/// Everything the installer needs besides a connection factory
#[derive(Debug, Clone)]
pub struct InstallOptions {
    pub checker: RequirementChecker,
    pub schema: SchemaSource,
    pub catalog: Vec<StepTemplate>,
    pub admin: AdminPolicy,
}

impl InstallOptions {
    pub fn from_config(config: &InstallConfig) -> Self {
        Self {
            checker: RequirementChecker::new(&config.base_dir, config.min_server_version),
            schema: config
                .schema_path
                .clone()
                .map(SchemaSource::File)
                .unwrap_or(SchemaSource::Bundled),
            catalog: default_catalog(),
            admin: AdminPolicy {
                allow_defaults: config.allow_default_admin,
                bcrypt_cost: config.bcrypt_cost,
            },
        }
    }
}

pub struct Installer<F: ConnectionFactory> {
    factory: F,
    options: InstallOptions,
    /// Held for the duration of one advance; a second concurrent advance is refused.
    advance_lock: Mutex<()>,
}

impl<F: ConnectionFactory> Installer<F> {
    pub fn new(factory: F, options: InstallOptions) -> Self {
        Self {
            factory,
            options,
            advance_lock: Mutex::new(()),
        }
    }

    /// Describe `state` without running any stage action.
    pub async fn view(&self, state: PipelineState) -> StageView {
        let requirements = match state.stage {
            PipelineStage::RequirementsCheck => Some(self.options.checker.inspect(&self.factory).await),
            _ => None,
        };

        StageView {
            stage: state.stage,
            title: state.stage.title(),
            complete: state.stage.is_terminal(),
            requirements,
            action: action_for(state.stage),
        }
    }

    /// Run `action` at `state` and return the resulting state.
    pub async fn advance(&self, state: PipelineState, action: StageAction) -> AdvanceOutcome {
        let Ok(_guard) = self.advance_lock.try_lock() else {
            warn!("Rejected '{}': another installation step is running", action.name());
            return AdvanceOutcome::stayed(state, InstallError::InProgress, None);
        };

        if state.stage.is_terminal() {
            return AdvanceOutcome::stayed(state, InstallError::AlreadyComplete, None);
        }
        if action.stage() != state.stage {
            let error = InstallError::WrongStage {
                action: action.name(),
                stage: state.stage.number(),
            };
            warn!("{}", error);
            return AdvanceOutcome::stayed(state, error, None);
        }

        info!("▶️  Installation stage {}: running '{}'", state.stage, action.name());
        let result = match action {
            StageAction::VerifyRequirements => self.verify_requirements().await,
            StageAction::ConfigureDatabase => self.configure_database().await,
            StageAction::CreateAdmin(request) => self.create_admin(&request).await,
            StageAction::ImportSteps => self.import_steps().await,
        };

        match result {
            Ok(detail) => {
                let outcome = AdvanceOutcome::advanced(state, detail);
                info!("✅ Installation advanced to stage {}", outcome.state.stage);
                outcome
            }
            Err((error, detail)) => {
                warn!("❌ Installation stage {} failed: {}", state.stage, error);
                AdvanceOutcome::stayed(state, error, detail)
            }
        }
    }

    /// Report whether the database looks installed.
    pub async fn status(&self) -> InstallStatus {
        let mut conn = match self.factory.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Status check could not reach the database: {}", e);
                return InstallStatus {
                    reachable: false,
                    installed: false,
                    table_count: 0,
                    admin_accounts: 0,
                };
            }
        };

        let table_count = conn.table_count().await.unwrap_or_else(|e| {
            warn!("Could not count tables: {}", e);
            0
        });
        let admin_accounts = conn.account_count().await.unwrap_or_else(|e| {
            warn!("Could not count accounts: {}", e);
            None
        });

        InstallStatus {
            reachable: true,
            installed: admin_accounts.is_some_and(|n| n > 0),
            table_count,
            admin_accounts: admin_accounts.unwrap_or(0),
        }
    }

    async fn verify_requirements(&self) -> StageResult {
        let report = self.options.checker.check(&self.factory).await;
        if report.all_satisfied {
            Ok(StageDetail::Requirements(report))
        } else {
            for item in report.unmet() {
                warn!("Requirement not met: {}", item.name);
            }
            Err((InstallError::RequirementsNotMet, Some(StageDetail::Requirements(report))))
        }
    }

    async fn configure_database(&self) -> StageResult {
        let source = self.options.schema.load().await.map_err(fail)?;
        let mut conn = self.factory.acquire().await.map_err(fail)?;
        let applied = apply_schema(&mut conn, &source).await.map_err(fail)?;

        Ok(StageDetail::Schema {
            statements_applied: applied.statements,
            schema_digest: applied.digest,
        })
    }

    async fn create_admin(&self, request: &AdminRequest) -> StageResult {
        let policy = self.options.admin;
        let credentials = request.resolve(&policy).map_err(fail)?;
        let mut conn = self.factory.acquire().await.map_err(fail)?;
        provision_admin(&mut conn, &credentials, policy.bcrypt_cost)
            .await
            .map_err(fail)?;

        Ok(StageDetail::Admin {
            email: credentials.email,
        })
    }

    async fn import_steps(&self) -> StageResult {
        let mut conn = self.factory.acquire().await.map_err(fail)?;
        let seeded = seed_step_templates(&mut conn, &self.options.catalog)
            .await
            .map_err(fail)?;

        Ok(StageDetail::Seed {
            seeded,
            templates: self.options.catalog.len(),
        })
    }
}

type StageResult = Result<StageDetail, (InstallError, Option<StageDetail>)>;

fn fail<E: Into<InstallError>>(error: E) -> (InstallError, Option<StageDetail>) {
    (error.into(), None)
}

fn action_for(stage: PipelineStage) -> Option<&'static str> {
    match stage {
        PipelineStage::RequirementsCheck => Some("verify_requirements"),
        PipelineStage::SchemaSetup => Some("configure_database"),
        PipelineStage::AdminProvisioning => Some("create_admin"),
        PipelineStage::ReferenceSeeding => Some("import_steps"),
        PipelineStage::Complete => None,
    }
}
