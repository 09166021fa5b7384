//! Credential provisioner
//!
//! Creates or replaces the administrator account. Replacement is done by
//! deleting any account with the same email before inserting, so at most one
//! row per email survives.

use crate::auth::hash_password;
use crate::db::InstallConnection;
use crate::install::error::ProvisionError;
use crate::install::types::AdminAccount;
use serde::Deserialize;
use tracing::{debug, info, warn};
use validator::{Validate, ValidationError};

pub const ADMIN_ROLE: &str = "admin";

const DEFAULT_NAME: &str = "Administrator";
const DEFAULT_EMAIL: &str = "admin@auditoria-seo.local";
const DEFAULT_PASSWORD: &str = "admin123";

/// bcrypt only reads this many bytes of a password
const MAX_PASSWORD_BYTES: usize = 72;

/// Administrator details as submitted by the operator
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Validated administrator details
#[derive(Debug, Clone, Validate)]
pub struct AdminCredentials {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,
    #[validate(email(message = "Email address is not valid"))]
    pub email: String,
    #[validate(
        length(min = 8, message = "Password must be at least 8 characters"),
        custom(function = "validate_password_bytes")
    )]
    pub password: String,
}

fn validate_password_bytes(password: &str) -> Result<(), ValidationError> {
    if password.len() > MAX_PASSWORD_BYTES {
        let mut error = ValidationError::new("password_too_long");
        error.message = Some("Password must be at most 72 bytes".into());
        return Err(error);
    }
    Ok(())
}

/// How blank fields and hashing are handled
#[derive(Debug, Clone, Copy)]
pub struct AdminPolicy {
    /// Development only: fill blank fields with fixed defaults.
    pub allow_defaults: bool,
    pub bcrypt_cost: u32,
}

impl AdminRequest {
    /// Resolve blank fields and validate the result.
    pub fn resolve(&self, policy: &AdminPolicy) -> Result<AdminCredentials, ProvisionError> {
        let field = |value: &Option<String>, label: &str, default: &str| {
            match value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                Some(v) => Ok(v.to_string()),
                None if policy.allow_defaults => {
                    warn!("⚠️  Administrator {} left blank, using development default", label);
                    Ok(default.to_string())
                }
                None => Err(ProvisionError::Invalid(format!("{} is required", label))),
            }
        };

        let credentials = AdminCredentials {
            name: field(&self.name, "name", DEFAULT_NAME)?,
            email: field(&self.email, "email", DEFAULT_EMAIL)?.to_lowercase(),
            // Passwords are not trimmed once present
            password: match self.password.as_deref().filter(|p| !p.is_empty()) {
                Some(p) => p.to_string(),
                None => field(&None, "password", DEFAULT_PASSWORD)?,
            },
        };

        credentials
            .validate()
            .map_err(|e| ProvisionError::Invalid(validation_message(&e)))?;
        Ok(credentials)
    }
}

fn validation_message(errors: &validator::ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field))
            })
        })
        .collect();
    messages.sort();
    messages.join("; ")
}

/// Create or replace the administrator account for `credentials.email`.
pub async fn provision_admin<C>(
    conn: &mut C,
    credentials: &AdminCredentials,
    bcrypt_cost: u32,
) -> Result<(), ProvisionError>
where
    C: InstallConnection + ?Sized,
{
    let account = AdminAccount {
        name: credentials.name.clone(),
        email: credentials.email.clone(),
        password_hash: hash_password(&credentials.password, bcrypt_cost)?,
        role: ADMIN_ROLE.to_string(),
        active: true,
    };

    // Best effort: a failure here shows up as a conflict on insert
    match conn.delete_account(&account.email).await {
        Ok(0) => {}
        Ok(n) => debug!("Replaced {} existing account(s) for the administrator email", n),
        Err(e) => warn!("Could not remove previous administrator account: {}", e),
    }

    conn.insert_account(&account)
        .await
        .map_err(ProvisionError::Insert)?;

    info!("Administrator account provisioned");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_password;
    use crate::install::testing::MemoryFactory;
    use tokio_test::assert_ok;

    const STRICT: AdminPolicy = AdminPolicy {
        allow_defaults: false,
        bcrypt_cost: 4 /* bcrypt minimum cost; bcrypt::MIN_COST is private */,
    };

    fn request(name: &str, email: &str, password: &str) -> AdminRequest {
        AdminRequest {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        }
    }

    #[tokio::test]
    async fn test_second_provision_replaces_first() {
        let factory = MemoryFactory::new();
        let mut conn = factory.connection();

        let first = request("Ana", "admin@x.com", "secret-one").resolve(&STRICT).unwrap();
        let second = request("Bea", "admin@x.com", "secret-two").resolve(&STRICT).unwrap();
        provision_admin(&mut conn, &first, STRICT.bcrypt_cost).await.unwrap();
        provision_admin(&mut conn, &second, STRICT.bcrypt_cost).await.unwrap();

        let state = factory.state();
        let rows: Vec<_> = state.accounts.iter().filter(|a| a.email == "admin@x.com").collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Bea");
        assert_eq!(rows[0].role, "admin");
        assert!(rows[0].active);
        assert!(verify_password("secret-two", &rows[0].password_hash).unwrap());
        assert!(!verify_password("secret-one", &rows[0].password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_other_accounts_are_left_alone() {
        let factory = MemoryFactory::new();
        let mut conn = factory.connection();

        let one = request("Ana", "ana@x.com", "password1").resolve(&STRICT).unwrap();
        let two = request("Bea", "bea@x.com", "password2").resolve(&STRICT).unwrap();
        provision_admin(&mut conn, &one, STRICT.bcrypt_cost).await.unwrap();
        provision_admin(&mut conn, &two, STRICT.bcrypt_cost).await.unwrap();

        assert_eq!(factory.state().accounts.len(), 2);
    }

    #[tokio::test]
    async fn test_insert_failure_is_reported() {
        let factory = MemoryFactory::new();
        factory.state().fail_account_insert = true;
        let mut conn = factory.connection();

        let creds = request("Ana", "ana@x.com", "password1").resolve(&STRICT).unwrap();
        let err = provision_admin(&mut conn, &creds, STRICT.bcrypt_cost).await.unwrap_err();

        assert!(matches!(err, ProvisionError::Insert(_)));
        assert!(factory.state().accounts.is_empty());
    }

    #[test]
    fn test_blank_fields_rejected_without_defaults() {
        let err = AdminRequest::default().resolve(&STRICT).unwrap_err();
        assert_eq!(err.to_string(), "Invalid administrator details: name is required");

        let err = request("Ana", "  ", "password1").resolve(&STRICT).unwrap_err();
        assert!(err.to_string().contains("email is required"));
    }

    #[test]
    fn test_blank_fields_use_defaults_in_development() {
        let policy = AdminPolicy {
            allow_defaults: true,
            ..STRICT
        };
        let creds = AdminRequest::default().resolve(&policy).unwrap();
        assert_eq!(creds.name, DEFAULT_NAME);
        assert_eq!(creds.email, DEFAULT_EMAIL);
        assert_eq!(creds.password, DEFAULT_PASSWORD);
    }

    #[test]
    fn test_invalid_details_are_rejected() {
        let err = request("Ana", "not-an-email", "short").resolve(&STRICT).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Email address is not valid"));
        assert!(message.contains("Password must be at least 8 characters"));
    }

    #[test]
    fn test_password_limit_counts_bytes() {
        // 36 two-byte characters fit exactly, one more does not
        let fits = "é".repeat(36);
        assert_ok!(request("Ana", "ana@x.com", &fits).resolve(&STRICT));

        let too_long = "é".repeat(37);
        let err = request("Ana", "ana@x.com", &too_long).resolve(&STRICT).unwrap_err();
        assert!(err.to_string().contains("Password must be at most 72 bytes"));

        let ascii = "a".repeat(73);
        assert!(request("Ana", "ana@x.com", &ascii).resolve(&STRICT).is_err());
    }

    #[test]
    fn test_email_is_normalized() {
        let creds = request(" Ana ", " Admin@X.com ", "password1").resolve(&STRICT).unwrap();
        assert_eq!(creds.name, "Ana");
        assert_eq!(creds.email, "admin@x.com");
    }
}
