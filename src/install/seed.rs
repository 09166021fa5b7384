//! Reference-data seeder
//!
//! Seeds the step-template catalog only while the table is empty. The guard is
//! a count check; `step_templates.code` is unique, so a racing second seed
//! fails instead of duplicating rows.

use crate::db::InstallConnection;
use crate::install::error::SeedError;
use crate::install::types::StepTemplate;
use tracing::info;

/// Step templates every new installation starts with.
pub fn default_catalog() -> Vec<StepTemplate> {
    vec![
        StepTemplate::new(1, "PREP_001", "Initial project setup", true, 2.0, 1),
        StepTemplate::new(1, "PREP_002", "Preliminary website analysis", true, 3.0, 2),
        StepTemplate::new(2, "TEC_001", "Page load speed analysis", true, 4.0, 1),
        StepTemplate::new(2, "TEC_002", "HTML structure review", false, 2.0, 2),
        StepTemplate::new(3, "CONT_001", "Duplicate content analysis", true, 3.0, 1),
        StepTemplate::new(3, "CONT_002", "Meta tag optimization", true, 2.0, 2),
        StepTemplate::new(4, "OFF_001", "Backlink analysis", false, 5.0, 1),
        StepTemplate::new(4, "OFF_002", "Domain authority assessment", false, 2.0, 2),
        StepTemplate::new(5, "INF_001", "Executive report", true, 4.0, 1),
        StepTemplate::new(5, "INF_002", "Recommendations presentation", true, 2.0, 2),
    ]
}

/// Insert `catalog` unless templates already exist.
///
/// Returns `true` when rows were inserted and `false` when the table already
/// held templates.
pub async fn seed_step_templates<C>(conn: &mut C, catalog: &[StepTemplate]) -> Result<bool, SeedError>
where
    C: InstallConnection + ?Sized,
{
    let existing = conn.count_step_templates().await.map_err(SeedError::Count)?;
    if existing > 0 {
        info!("Step templates already present ({}), skipping seed", existing);
        return Ok(false);
    }

    let inserted = conn
        .insert_step_templates(catalog)
        .await
        .map_err(SeedError::Insert)?;

    info!("Seeded {} step templates", inserted);
    Ok(true)
}
