// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Drain administration CLI.
//!
//! Empties a pool, filesystem or disk server of its replicas, or moves
//! the replicas under a folder to another filesystem. Every command
//! defaults to dry-run; storage is only mutated with `--dryrun false`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};

use libdrain::admin::{AdminBackend, DomeAdmin, LegacyAdmin};
use libdrain::catalog::Catalog;
use libdrain::config::parse_lifetime;
use libdrain::copy::{CopyClient, HttpCopyClient};
use libdrain::headnode::{HeadNodeClient, HeadNodeConfig};
use libdrain::inventory::Inventory;
use libdrain::{DrainPlan, DrainScope, DrainSession, DrainSettings, MoveTarget};

#[derive(Parser)]
#[command(name = "drain-adm")]
#[command(about = "Replica drain utility", long_about = None)]
#[command(version)]
struct Cli {
    /// Base URL of the head node
    #[arg(
        long,
        default_value = "https://localhost:1094/domehead",
        env = "DRAIN_HEAD_URL"
    )]
    head_url: String,

    /// Host certificate (PEM) presented to the head node and gateways
    #[arg(long, default_value = "/etc/grid-security/dpmmgr/dpmcert.pem")]
    cert: PathBuf,

    /// Host key (PEM)
    #[arg(long, default_value = "/etc/grid-security/dpmmgr/dpmkey.pem")]
    key: PathBuf,

    /// Skip loading the host certificate (development setups only)
    #[arg(long, default_value_t = false)]
    no_client_cert: bool,

    /// Admin backend used by the readonly guard
    #[arg(long, value_enum, default_value_t = AdminBackendKind::Dome)]
    admin_backend: AdminBackendKind,

    /// Address of the legacy control-plane daemon, for `--admin-backend legacy`
    #[arg(long, default_value = "localhost:5015")]
    legacy_addr: String,

    /// Secure port of the disk-node endpoints the COPY is issued against
    #[arg(long, default_value_t = 443, env = "DPM_HTTPS_PORT")]
    https_port: u16,

    /// Plain port rewritten into the Destination header
    #[arg(long, default_value_t = 80, env = "DPM_HTTP_PORT")]
    http_port: u16,

    /// Timeout for one remote copy, seconds
    #[arg(long, default_value_t = 3600)]
    copy_timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum AdminBackendKind {
    /// REST head-node admin API
    Dome,
    /// Legacy control-plane daemon RPC
    Legacy,
}

/// Options shared by every drain command.
#[derive(Args)]
struct DrainArgs {
    /// Only drain replicas owned by this group
    #[arg(long)]
    group: Option<String>,

    /// Percentage of the scope's capacity to drain
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u8).range(1..=100))]
    size: u8,

    /// Number of drain workers
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u8).range(1..=10))]
    nthreads: u8,

    /// Plan and report only; pass `--dryrun false` to mutate storage
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    dryrun: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Drain a pool
    Pool {
        /// The pool to drain
        name: String,

        #[command(flatten)]
        drain: DrainArgs,
    },

    /// Drain a single filesystem
    Filesystem {
        /// FQDN of the disk server
        server: String,

        /// Filesystem on that server
        fs: String,

        #[command(flatten)]
        drain: DrainArgs,
    },

    /// Drain a whole disk server
    Server {
        /// FQDN of the disk server to drain
        server: String,

        #[command(flatten)]
        drain: DrainArgs,
    },

    /// Move the replicas under a folder to another filesystem
    Move {
        /// Source filesystem, `server:fs`
        source_fs: String,

        /// Source folder
        folder: String,

        /// Destination filesystem, `server:fs`
        dest_fs: String,

        /// File type of the new replicas: P, V or D
        #[arg(long)]
        filetype: Option<char>,

        /// Lifetime of the new replicas (`Inf` or a multiple of y/m/d/h)
        #[arg(long)]
        lifetime: Option<String>,

        #[command(flatten)]
        drain: DrainArgs,
    },
}

fn build_plan(command: &Commands) -> Result<DrainPlan> {
    let (scope, drain, move_target) = match command {
        Commands::Pool { name, drain } => (
            DrainScope::Pool { name: name.clone() },
            drain,
            None,
        ),
        Commands::Filesystem { server, fs, drain } => (
            DrainScope::Filesystem {
                server: server.clone(),
                fs: fs.clone(),
            },
            drain,
            None,
        ),
        Commands::Server { server, drain } => (
            DrainScope::Server {
                name: server.clone(),
            },
            drain,
            None,
        ),
        Commands::Move {
            source_fs,
            folder,
            dest_fs,
            filetype,
            lifetime,
            drain,
        } => {
            let (src_server, src_fs) = parse_fs_spec(source_fs)?;
            let (dest_server, dest_fs) = parse_fs_spec(dest_fs)?;
            let lifetime_secs = lifetime
                .as_deref()
                .map(parse_lifetime)
                .transpose()
                .context("Invalid lifetime")?;
            (
                DrainScope::Folder {
                    server: src_server,
                    fs: src_fs,
                    folder: folder.clone(),
                },
                drain,
                Some(MoveTarget {
                    server: dest_server,
                    fs: dest_fs,
                    file_type: *filetype,
                    lifetime_secs,
                }),
            )
        }
    };

    let mut plan = DrainPlan::new(scope);
    plan.group = drain.group.clone();
    plan.size_percent = drain.size;
    plan.workers = usize::from(drain.nthreads);
    plan.dry_run = drain.dryrun;
    plan.move_target = move_target;
    Ok(plan)
}

/// Parse `server:fs` (the fs part is an absolute path).
fn parse_fs_spec(spec: &str) -> Result<(String, String)> {
    match spec.split_once(':') {
        Some((server, fs)) if !server.is_empty() && !fs.is_empty() => {
            Ok((server.to_string(), fs.to_string()))
        }
        _ => bail!("Expected server:fs, got '{}'", spec),
    }
}

fn load_identity(cli: &Cli) -> Result<Option<reqwest::Identity>> {
    if cli.no_client_cert {
        return Ok(None);
    }
    let mut pem = std::fs::read(&cli.cert)
        .with_context(|| format!("Failed to read certificate {}", cli.cert.display()))?;
    pem.extend(
        std::fs::read(&cli.key)
            .with_context(|| format!("Failed to read key {}", cli.key.display()))?,
    );
    let identity =
        reqwest::Identity::from_pem(&pem).context("Failed to load host certificate")?;
    Ok(Some(identity))
}

fn print_dryrun_banner() {
    println!();
    println!("{}", "=".repeat(99));
    println!(
        "The process is running in dryrun mode; add the option '--dryrun false' to \
         effectively perform the drain process."
    );
    println!(
        "The process contacts the disk nodes via https (default port 443) and the \
         destinations via http (default port 80); use DPM_HTTPS_PORT and DPM_HTTP_PORT \
         to override. All disk nodes must share the same ports."
    );
    println!(
        "Monitor the draining logs; on timeouts or overloaded daemons, lower the number \
         of draining workers (default 5)."
    );
    println!("{}", "=".repeat(99));
    println!();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install the process-wide rustls provider before any client is
    // built; see the workspace Cargo.toml for the provider convention.
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        bail!("rustls crypto provider was already installed");
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "drain_adm=info,libdrain=info".to_string()),
        ))
        .init();

    let cli = Cli::parse();
    let plan = build_plan(&cli.command)?;

    let identity = load_identity(&cli)?;
    let head = HeadNodeClient::new(HeadNodeConfig {
        base_url: cli.head_url.clone(),
        identity: identity.clone(),
        client_dn: None,
        client_address: None,
        timeout_secs: 300,
    })
    .context("Failed to build the head-node client")?;

    let admin: Arc<dyn AdminBackend> = match cli.admin_backend {
        AdminBackendKind::Dome => {
            let admin_head = HeadNodeClient::new(HeadNodeConfig {
                base_url: cli.head_url.clone(),
                identity: identity.clone(),
                client_dn: None,
                client_address: None,
                timeout_secs: 300,
            })
            .context("Failed to build the admin client")?;
            Arc::new(DomeAdmin::new(admin_head))
        }
        AdminBackendKind::Legacy => Arc::new(LegacyAdmin::new(cli.legacy_addr.clone(), 60)),
    };

    let copy = HttpCopyClient::new(identity, cli.copy_timeout)
        .context("Failed to build the copy client")?;

    let settings = DrainSettings {
        https_port: cli.https_port,
        http_port: cli.http_port,
        ..Default::default()
    };

    let dry_run = plan.dry_run;
    let head = Arc::new(head);
    let session = DrainSession::new(
        plan,
        settings,
        Arc::clone(&head) as Arc<dyn Inventory>,
        head as Arc<dyn Catalog>,
        admin,
        Arc::new(copy) as Arc<dyn CopyClient>,
    )?;

    if dry_run {
        print_dryrun_banner();
    }

    println!("Calculating replicas to drain...");
    let prepared = session.prepare().await?;
    println!("{}", prepared.summary);
    println!();

    if dry_run {
        return Ok(());
    }

    let session = Arc::new(session);
    let cancel = session.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupt received, waiting for in-flight work to stop...");
            cancel.cancel();
        }
    });

    let report = session.execute(prepared).await?;
    println!("{}", report);

    Ok(())
}
