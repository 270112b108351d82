//! SQL schema for the Tessera SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS identities (
    identity_id   TEXT PRIMARY KEY,
    email         TEXT NOT NULL UNIQUE,   -- stored lowercase
    display_name  TEXT NOT NULL,
    password_hash TEXT NOT NULL,          -- argon2id PHC string
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tenants (
    tenant_id         TEXT PRIMARY KEY,
    name              TEXT NOT NULL,
    slug              TEXT NOT NULL UNIQUE,
    owner_identity_id TEXT NOT NULL REFERENCES identities(identity_id),
    created_at        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS profiles (
    profile_id   TEXT PRIMARY KEY,
    identity_id  TEXT NOT NULL REFERENCES identities(identity_id),
    tenant_id    TEXT NOT NULL REFERENCES tenants(tenant_id),
    kind         TEXT NOT NULL,            -- 'owner' | 'employee' | 'customer'
    is_primary   INTEGER NOT NULL DEFAULT 0,
    status       TEXT NOT NULL DEFAULT 'pending',
    created_at   TEXT NOT NULL,
    activated_at TEXT,
    UNIQUE (identity_id, tenant_id, kind)
);

-- Backstop for the selector invariant: whatever the application layer does,
-- SQLite will never hold two primary profiles for one identity.
CREATE UNIQUE INDEX IF NOT EXISTS profiles_one_primary
    ON profiles(identity_id) WHERE is_primary = 1;

CREATE TABLE IF NOT EXISTS roles (
    role_id    TEXT PRIMARY KEY,
    tenant_id  TEXT NOT NULL REFERENCES tenants(tenant_id),
    name       TEXT NOT NULL,
    slug       TEXT NOT NULL,
    is_system  INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    UNIQUE (tenant_id, slug)
);

-- The per-tenant catalog of grantable (resource, action) pairs.
-- Wildcards never enter this table; owner access is structural.
CREATE TABLE IF NOT EXISTS permissions (
    permission_id TEXT PRIMARY KEY,
    tenant_id     TEXT NOT NULL REFERENCES tenants(tenant_id),
    resource      TEXT NOT NULL,
    action        TEXT NOT NULL,
    UNIQUE (tenant_id, resource, action),
    CHECK  (resource != '*' AND action != '*')
);

CREATE TABLE IF NOT EXISTS role_permissions (
    role_id       TEXT NOT NULL REFERENCES roles(role_id) ON DELETE CASCADE,
    permission_id TEXT NOT NULL
                  REFERENCES permissions(permission_id) ON DELETE CASCADE,
    PRIMARY KEY (role_id, permission_id)
);

CREATE TABLE IF NOT EXISTS role_assignments (
    profile_id TEXT NOT NULL REFERENCES profiles(profile_id) ON DELETE CASCADE,
    role_id    TEXT NOT NULL REFERENCES roles(role_id) ON DELETE CASCADE,
    PRIMARY KEY (profile_id, role_id)
);

-- One row per chat conversation, keyed by the platform's id.
-- Rows are created lazily, reset on logout/lockout, never deleted.
CREATE TABLE IF NOT EXISTS chat_identities (
    external_chat_id  INTEGER PRIMARY KEY,
    external_username TEXT,
    identity_id       TEXT REFERENCES identities(identity_id),
    state             TEXT NOT NULL DEFAULT 'unauthenticated',
    pending_email     TEXT,
    one_time_code     TEXT,
    code_expires_at   TEXT,
    failed_attempts   INTEGER NOT NULL DEFAULT 0,
    locked_until      TEXT,
    is_authenticated  INTEGER NOT NULL DEFAULT 0,
    last_activity_at  TEXT NOT NULL,
    created_at        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS profiles_identity_idx    ON profiles(identity_id);
CREATE INDEX IF NOT EXISTS profiles_tenant_idx      ON profiles(tenant_id);
CREATE INDEX IF NOT EXISTS roles_tenant_idx         ON roles(tenant_id);
CREATE INDEX IF NOT EXISTS permissions_tenant_idx   ON permissions(tenant_id);
CREATE INDEX IF NOT EXISTS assignments_profile_idx  ON role_assignments(profile_id);

PRAGMA user_version = 1;
";
