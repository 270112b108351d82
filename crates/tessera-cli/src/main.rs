//! `tessera`: admin CLI for the tessera directory server.
//!
//! # Usage
//!
//! ```
//! tessera --url http://localhost:8080 --email alice@example.com --password secret whoami
//! tessera --config ~/.config/tessera/config.toml tenants
//! ```

mod client;

use std::collections::HashMap;

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "tessera", about = "Admin CLI for the tessera directory server")]
struct Args {
  /// Path to a TOML config file (url, email, password).
  #[arg(short, long, value_name = "FILE")]
  config: Option<std::path::PathBuf>,

  /// Base URL of the tessera server (default: http://localhost:8080).
  #[arg(long, env = "TESSERA_URL")]
  url: Option<String>,

  /// Email to authenticate as.
  #[arg(long, env = "TESSERA_EMAIL")]
  email: Option<String>,

  /// Password (plaintext).
  #[arg(long, env = "TESSERA_PASSWORD")]
  password: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Show the acting identity, its profiles, and the resolved context.
  Whoami,
  /// Move the primary flag to another profile.
  Switch {
    /// Target profile id. Must be yours and active.
    profile: Uuid,
  },
  /// List identities.
  Identities,
  /// Register a new identity.
  CreateIdentity {
    #[arg(long)]
    email:    String,
    #[arg(long)]
    name:     String,
    #[arg(long)]
    password: String,
  },
  /// List tenants.
  Tenants,
  /// Create a tenant (seeds its catalog, system roles, and owner profile).
  CreateTenant {
    #[arg(long)]
    name:  String,
    /// Derived from the name when omitted.
    #[arg(long)]
    slug:  Option<String>,
    /// Owner identity id; defaults to the authenticated identity.
    #[arg(long)]
    owner: Option<Uuid>,
  },
  /// List profiles, optionally filtered.
  Profiles {
    #[arg(long)]
    identity: Option<Uuid>,
    #[arg(long)]
    tenant:   Option<Uuid>,
  },
  /// Add an identity to a tenant.
  CreateProfile {
    #[arg(long)]
    identity: Uuid,
    #[arg(long)]
    tenant:   Uuid,
    /// owner, employee or customer.
    #[arg(long)]
    kind:     String,
    /// active, pending or suspended (server default: pending).
    #[arg(long)]
    status:   Option<String>,
  },
  /// Change a profile's status.
  SetProfileStatus {
    profile: Uuid,
    /// active, pending or suspended.
    status:  String,
  },
  /// List a tenant's roles.
  Roles { tenant: Uuid },
  /// Create a custom role.
  CreateRole {
    #[arg(long)]
    tenant: Uuid,
    #[arg(long)]
    name:   String,
    #[arg(long)]
    slug:   Option<String>,
  },
  /// List a tenant's permission catalog.
  Permissions { tenant: Uuid },
  /// Register a (resource, action) pair in a tenant's catalog.
  CreatePermission {
    #[arg(long)]
    tenant:   Uuid,
    resource: String,
    action:   String,
  },
  /// Attach a catalog permission to a role.
  Grant { role: Uuid, permission: Uuid },
  /// Detach a catalog permission from a role.
  Revoke { role: Uuid, permission: Uuid },
  /// Assign a role to a profile.
  Assign { profile: Uuid, role: Uuid },
  /// Remove a role from a profile.
  Unassign { profile: Uuid, role: Uuid },
  /// Show a profile's deduped grant union.
  Grants { profile: Uuid },
  /// Print a tenant's role-graph stamp.
  Stamp { tenant: Uuid },
  /// List chat links.
  Chats,
  /// Sever a chat's identity link.
  UnlinkChat { chat: i64 },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:      String,
  #[serde(default)]
  email:    String,
  #[serde(default)]
  password: String,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  // Diagnostics go to stderr so stdout stays pipeable.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  // Load config file if provided.
  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let api_config = ApiConfig {
    base_url: args
      .url
      .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
      .unwrap_or_else(|| "http://localhost:8080".to_string()),
    email:    args
      .email
      .or_else(|| (!file_cfg.email.is_empty()).then(|| file_cfg.email.clone()))
      .unwrap_or_default(),
    password: args
      .password
      .or_else(|| {
        (!file_cfg.password.is_empty()).then(|| file_cfg.password.clone())
      })
      .unwrap_or_default(),
  };

  let client = ApiClient::new(api_config)?;
  run(client, args.command).await
}

// ─── Dispatch ─────────────────────────────────────────────────────────────────

async fn run(client: ApiClient, command: Command) -> Result<()> {
  match command {
    Command::Whoami => {
      let me = client.me().await?;
      let tenants: HashMap<Uuid, String> = client
        .list_tenants()
        .await?
        .into_iter()
        .map(|t| (t.tenant_id, t.name))
        .collect();

      println!("{} <{}>", me.identity.display_name, me.identity.email);
      for p in &me.profiles {
        let tenant =
          tenants.get(&p.tenant_id).map(String::as_str).unwrap_or("?");
        let marker = if p.is_primary { "  (current)" } else { "" };
        println!(
          "  {:<28} {:<9} {:<9}{marker}",
          tenant,
          p.kind.as_str(),
          p.status.as_str()
        );
      }
      match &me.current {
        Some(current) => {
          println!();
          println!(
            "Acting in {} as {}.",
            current.tenant.name,
            current.profile.kind.as_str()
          );
          println!("{}", current.summary);
        }
        None => println!("  no profiles; ask an administrator to add you"),
      }
    }

    Command::Switch { profile } => {
      let switched = client.switch_profile(profile).await?;
      println!(
        "Primary profile is now {} ({} in tenant {}).",
        switched.profile_id,
        switched.kind.as_str(),
        switched.tenant_id
      );
    }

    Command::Identities => {
      for identity in client.list_identities().await? {
        println!(
          "{}  {:<32} {}",
          identity.identity_id, identity.email, identity.display_name
        );
      }
    }

    Command::CreateIdentity { email, name, password } => {
      let identity = client.create_identity(&email, &name, &password).await?;
      println!("{}  {}", identity.identity_id, identity.email);
    }

    Command::Tenants => {
      for tenant in client.list_tenants().await? {
        println!(
          "{}  {:<20} {:<28} owner {}",
          tenant.tenant_id, tenant.slug, tenant.name, tenant.owner_identity_id
        );
      }
    }

    Command::CreateTenant { name, slug, owner } => {
      let tenant =
        client.create_tenant(&name, slug.as_deref(), owner).await?;
      println!("{}  {}", tenant.tenant_id, tenant.slug);
    }

    Command::Profiles { identity, tenant } => {
      for p in client.list_profiles(identity, tenant).await? {
        let marker = if p.is_primary { "  primary" } else { "" };
        println!(
          "{}  tenant {}  {:<9} {:<9}{marker}",
          p.profile_id,
          p.tenant_id,
          p.kind.as_str(),
          p.status.as_str()
        );
      }
    }

    Command::CreateProfile { identity, tenant, kind, status } => {
      check_kind(&kind)?;
      if let Some(s) = &status {
        check_status(s)?;
      }
      let profile = client
        .create_profile(identity, tenant, &kind, status.as_deref())
        .await?;
      println!("{}  {}", profile.profile_id, profile.status.as_str());
    }

    Command::SetProfileStatus { profile, status } => {
      check_status(&status)?;
      let updated = client.set_profile_status(profile, &status).await?;
      println!("{}  {}", updated.profile_id, updated.status.as_str());
    }

    Command::Roles { tenant } => {
      for role in client.list_roles(tenant).await? {
        let marker = if role.is_system { "  (system)" } else { "" };
        println!("{}  {:<20} {}{marker}", role.role_id, role.slug, role.name);
      }
    }

    Command::CreateRole { tenant, name, slug } => {
      let role = client.create_role(tenant, &name, slug.as_deref()).await?;
      println!("{}  {}", role.role_id, role.slug);
    }

    Command::Permissions { tenant } => {
      for entry in client.list_permissions(tenant).await? {
        println!(
          "{}  {}:{}",
          entry.permission_id, entry.resource, entry.action
        );
      }
    }

    Command::CreatePermission { tenant, resource, action } => {
      let entry = client.create_permission(tenant, &resource, &action).await?;
      println!("{}  {}:{}", entry.permission_id, entry.resource, entry.action);
    }

    Command::Grant { role, permission } => {
      client.grant(role, permission).await?;
      println!("granted");
    }

    Command::Revoke { role, permission } => {
      client.revoke(role, permission).await?;
      println!("revoked");
    }

    Command::Assign { profile, role } => {
      client.assign(profile, role).await?;
      println!("assigned");
    }

    Command::Unassign { profile, role } => {
      client.unassign(profile, role).await?;
      println!("unassigned");
    }

    Command::Grants { profile } => {
      for grant in client.grants_for_profile(profile).await? {
        println!("{}:{}", grant.resource, grant.action);
      }
    }

    Command::Stamp { tenant } => {
      println!("{}", client.role_graph_stamp(tenant).await?);
    }

    Command::Chats => {
      for chat in client.list_chats().await? {
        let who = match chat.identity_id {
          Some(id) => id.to_string(),
          None => "-".to_string(),
        };
        println!(
          "{:<12} {:<16} {:<20} {}  last seen {}",
          chat.external_chat_id,
          chat.external_username.as_deref().unwrap_or("-"),
          chat.state.as_str(),
          who,
          chat
            .last_activity_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
        );
      }
    }

    Command::UnlinkChat { chat } => {
      let cleared = client.unlink_chat(chat).await?;
      println!(
        "chat {} unlinked ({})",
        cleared.external_chat_id,
        cleared.state.as_str()
      );
    }
  }

  Ok(())
}

fn check_kind(kind: &str) -> Result<()> {
  match kind {
    "owner" | "employee" | "customer" => Ok(()),
    other => bail!("unknown profile kind {other:?}; use owner, employee or customer"),
  }
}

fn check_status(status: &str) -> Result<()> {
  match status {
    "active" | "pending" | "suspended" => Ok(()),
    other => {
      bail!("unknown status {other:?}; use active, pending or suspended")
    }
  }
}
