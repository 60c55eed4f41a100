//!
//! xceliq bootstrap binary
//! -----------------------
//! Creates the first admin account (identity, `admins` profile and `users` entry)
//! in the project's store. Safe to re-run: an email that already belongs to an
//! admin is reported and left untouched.

use anyhow::{bail, Context, Result};
use std::env;

use xceliq::config::{has_flag, parse_string_arg, ServerConfig};
use xceliq::data::users::{self, BootstrapOutcome};
use xceliq::identity::LocalIdentityProvider;
use xceliq::store::SharedStore;

const USAGE: &str = "xceliq Bootstrap\n\nUSAGE:\n  xceliq_bootstrap --email EMAIL --password PASSWORD --name NAME [--data-dir PATH] [--project NAME]\n\nOPTIONS:\n  --email EMAIL        Admin sign-in email\n  --password PASSWORD  Admin password (at least 6 characters)\n  --name NAME          Display name\n  --data-dir PATH      Store root folder (env: XCELIQ_DATA_DIR, default data)\n  --project NAME       Backend project (env: XCELIQ_PROJECT, default xceliq-dev)\n";

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let args: Vec<String> = env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{}", USAGE);
        return Ok(());
    }
    let (Some(email), Some(password), Some(name)) = (
        parse_string_arg(&args, "--email"),
        parse_string_arg(&args, "--password"),
        parse_string_arg(&args, "--name"),
    ) else {
        eprintln!("{}", USAGE);
        bail!("--email, --password and --name are required");
    };

    let cfg = ServerConfig::from_env_and_args(&args);
    let store = SharedStore::open(&cfg.data_dir, &cfg.project)
        .with_context(|| format!("While opening store for project '{}' under {}", cfg.project, cfg.data_dir.display()))?;
    let idp = LocalIdentityProvider::new(store.clone());

    match users::bootstrap_admin(&store, &idp, &email, &password, &name).context("While creating admin account")? {
        BootstrapOutcome::Created(row) => {
            println!("Created admin {} <{}> (uid {}) in project '{}'", row.name, row.email, row.uid, cfg.project);
            tracing::info!(target: "startup", uid = %row.uid, project = %cfg.project, "admin bootstrapped");
        }
        BootstrapOutcome::AlreadyAdmin { uid } => {
            println!("{} is already an admin (uid {}); nothing to do", email.trim(), uid);
        }
    }

    let unlinked = users::unlinked_colleges(&store);
    if !unlinked.is_empty() {
        println!("{} college(s) have no linked account yet: {}", unlinked.len(), unlinked.join(", "));
    }

    store
        .persist()
        .with_context(|| format!("While saving store to {}", cfg.store_path().display()))?;
    Ok(())
}
