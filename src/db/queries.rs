//! SQL query constants
//!
//! Contains all SQL issued by the installer outside of the schema source.

/// Server version as text, e.g. "150004" for 15.4
pub const SERVER_VERSION_NUM: &str = "SHOW server_version_num";

/// Remove any account registered under an email
pub const DELETE_ACCOUNT_BY_EMAIL: &str = "DELETE FROM users WHERE email = $1";

/// Insert an account
pub const INSERT_ACCOUNT: &str = r#"
    INSERT INTO users (name, email, password_hash, role, active)
    VALUES ($1, $2, $3, $4, $5)
"#;

/// Count seeded step templates
pub const COUNT_STEP_TEMPLATES: &str = "SELECT COUNT(*) FROM step_templates";

/// Insert one step template
pub const INSERT_STEP_TEMPLATE: &str = r#"
    INSERT INTO step_templates (phase_id, code, name, is_critical, estimated_hours, order_in_phase)
    VALUES ($1, $2, $3, $4, $5, $6)
"#;

/// Count tables in the public schema
pub const COUNT_PUBLIC_TABLES: &str = r#"
    SELECT COUNT(*)
    FROM information_schema.tables
    WHERE table_schema = 'public'
        AND table_type = 'BASE TABLE'
"#;

/// Whether the users table exists yet
pub const USERS_TABLE_EXISTS: &str = "SELECT to_regclass('public.users') IS NOT NULL";

/// Count accounts
pub const COUNT_ACCOUNTS: &str = "SELECT COUNT(*) FROM users";
