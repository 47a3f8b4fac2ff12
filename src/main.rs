use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use hbactl::config::{self, Overrides, RunConfig};
use hbactl::edit::{
    self, append_to_content, insert_after_user_in_content, remove_lines_from_content,
};
use hbactl::output::{write_diff, write_grouped, write_json, write_rules_table};
use hbactl::pg::{locate_rule_file, PgClient, ServerControl};
use hbactl::reader::{parse_str_with_line_numbers, read_bytes, read_text};
use hbactl::{ConnectionType, HbaError, RemovalCriteria, Rule, SortColumn};
use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hbactl")]
#[command(about = "Manage PostgreSQL pg_hba.conf safely", long_about = None)]
#[command(version)]
struct Cli {
    /// PostgreSQL connection string (default: DATABASE_URL, then config file)
    #[arg(short, long, global = true)]
    conn: Option<String>,

    /// Path to pg_hba.conf; skips asking the server where it is
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    /// Config file (default: $HBACTL_CONFIG, then ~/.config/hbactl/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Seconds to wait for each server call
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List rules in a table (file order unless sorted)
    List {
        /// Sort by column for display: type, database, user, address, method
        #[arg(long)]
        sort: Option<SortColumn>,

        /// Group rules under one heading per value of this column
        #[arg(long, conflicts_with = "json")]
        group_by: Option<SortColumn>,

        /// Print rules as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add a rule (appends at the end unless --after-user is given)
    Add {
        /// Rule type: local, host, hostssl, hostnossl, hostgssenc, hostnogssenc
        #[arg(long = "type")]
        kind: ConnectionType,

        /// Database (e.g. all, sameuser, or a name)
        #[arg(long, default_value = "all")]
        db: String,

        /// User: all, a user name, or a +group
        #[arg(long, default_value = "all")]
        user: String,

        /// Address: CIDR (e.g. 127.0.0.1/32), samehost, samenet; ignored for local
        #[arg(long)]
        addr: Option<String>,

        /// Legacy netmask (e.g. 255.255.255.0) for a bare IP address
        #[arg(long)]
        netmask: Option<String>,

        /// Auth method: trust, reject, scram-sha-256, md5, ident, ...
        #[arg(long)]
        method: String,

        /// For method ident: user name map (writes 'ident <map>')
        #[arg(long)]
        ident_map: Option<String>,

        /// Insert after the last rule for this user instead of appending
        #[arg(long)]
        after_user: Option<String>,

        /// Show what would change without writing or taking a backup
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Remove rules by index, by user (optionally per database), or by address
    Remove {
        /// 1-based rule index (first column of 'hbactl list')
        #[arg(long)]
        index: Option<usize>,

        /// Remove every rule for this user
        #[arg(long)]
        user: Option<String>,

        /// With --user, only rules for this database
        #[arg(long, requires = "user")]
        db: Option<String>,

        /// Remove every rule for this address (10.0.1.7 also matches 10.0.1.7/32)
        #[arg(long)]
        addr: Option<String>,

        /// Show what would be removed without writing or taking a backup
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Ask the server for syntax errors in the active pg_hba.conf
    Check,

    /// Reload the server configuration (pg_reload_conf)
    Reload,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("hbactl={default_level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let settings = config::discover(cli.config.as_deref())?;
    let overrides = Overrides {
        conn: cli.conn,
        file: cli.file,
        timeout_secs: cli.timeout,
        no_color: cli.no_color,
    };
    let run = settings.resolve(&overrides, env::var("DATABASE_URL").ok());
    if !run.color {
        colored::control::set_override(false);
    }

    match cli.command {
        Commands::List {
            sort,
            group_by,
            json,
        } => cmd_list(&run, sort, group_by, json).await,

        Commands::Add {
            kind,
            db,
            user,
            addr,
            netmask,
            method,
            ident_map,
            after_user,
            dry_run,
        } => {
            let rule = build_rule(kind, &db, &user, addr, netmask, &method, ident_map)?;
            let after_user = after_user
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty());
            cmd_add(&run, rule, after_user, dry_run).await
        }

        Commands::Remove {
            index,
            user,
            db,
            addr,
            dry_run,
        } => {
            let criteria = RemovalCriteria::from_options(
                index,
                user.as_deref(),
                db.as_deref(),
                addr.as_deref(),
            )?;
            cmd_remove(&run, criteria, dry_run).await
        }

        Commands::Check => cmd_check(&run).await,

        Commands::Reload => cmd_reload(&run).await,
    }
}

/// Helper: Connect using the resolved connection string.
async fn connect(run: &RunConfig) -> Result<PgClient> {
    let Some(conn) = run.conn.as_deref() else {
        bail!("no connection: set DATABASE_URL or use --conn (or pass the path with --file)");
    };
    Ok(PgClient::connect(conn, run.timeout).await?)
}

/// Helper: Explicit --file / config path, otherwise ask the server.
async fn resolve_rule_file(run: &RunConfig) -> Result<PathBuf> {
    if let Some(path) = &run.file {
        return Ok(path.clone());
    }

    let client = connect(run).await?;
    let path = locate_rule_file(&client)
        .await
        .context("could not locate pg_hba.conf. Is PostgreSQL running?");
    client.close().await;
    path
}

/// Helper: Turn a core error into the message shown to the operator.
fn explain(err: HbaError, action: &str) -> anyhow::Error {
    match err {
        HbaError::PermissionDenied { path } => anyhow!(
            "insufficient permissions to {action} {}. Try running with sudo",
            path.display()
        ),
        other => anyhow::Error::new(other),
    }
}

fn build_rule(
    kind: ConnectionType,
    db: &str,
    user: &str,
    addr: Option<String>,
    netmask: Option<String>,
    method: &str,
    ident_map: Option<String>,
) -> Result<Rule> {
    let mut method = method.trim().to_string();
    if method.is_empty() {
        bail!("method must not be empty");
    }
    if let Some(map) = ident_map.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
        if method.eq_ignore_ascii_case("ident") {
            method = format!("ident {map}");
        }
    }

    let or_all = |value: &str| {
        let value = value.trim();
        if value.is_empty() {
            "all".to_string()
        } else {
            value.to_string()
        }
    };

    let (address, netmask) = if kind.is_local() {
        ("-".to_string(), String::new())
    } else {
        let address = addr.as_deref().map(str::trim).unwrap_or_default();
        if address.is_empty() {
            bail!("--addr is required for type {kind} (e.g. 127.0.0.1/32, samehost)");
        }
        let netmask = netmask.as_deref().map(str::trim).unwrap_or_default();
        if !netmask.is_empty() && address.contains('/') {
            bail!("--netmask needs a bare IP address, not CIDR ({address})");
        }
        (address.to_string(), netmask.to_string())
    };

    Ok(Rule {
        kind: kind.as_str().to_string(),
        database: or_all(db),
        user: or_all(user),
        address,
        netmask,
        method,
    })
}

async fn cmd_list(
    run: &RunConfig,
    sort: Option<SortColumn>,
    group_by: Option<SortColumn>,
    json: bool,
) -> Result<()> {
    let path = resolve_rule_file(run).await?;
    let content = read_text(&path).map_err(|e| explain(e, "read"))?;
    let mut rules = parse_str_with_line_numbers(&content);

    if let Some(column) = sort {
        column.sort(&mut rules);
    }

    let mut stdout = io::stdout().lock();
    if json {
        write_json(&mut stdout, &rules)?;
        return Ok(());
    }

    println!("File: {} ({} rule(s))\n", path.display(), rules.len());
    match group_by {
        Some(column) => write_grouped(&mut stdout, &rules, column)?,
        None => write_rules_table(&mut stdout, &rules)?,
    }
    Ok(())
}

async fn cmd_add(
    run: &RunConfig,
    rule: Rule,
    after_user: Option<String>,
    dry_run: bool,
) -> Result<()> {
    let line = rule.line()?;

    if dry_run {
        // Only look the file up if we can do so without being asked to.
        let path = match (&run.file, &run.conn) {
            (None, None) => None,
            _ => Some(resolve_rule_file(run).await?),
        };
        let shown = path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(path from --file or connection)".to_string());

        match &after_user {
            Some(user) => println!(
                "dry-run: would insert after last rule for user {user:?} in {shown}:\n{line}"
            ),
            None => println!("dry-run: would append to {shown}:\n{line}"),
        }

        if let Some(path) = path {
            let before = read_bytes(&path).map_err(|e| explain(e, "read"))?;
            let after = match &after_user {
                Some(user) => insert_after_user_in_content(&before, &line, user),
                None => append_to_content(&before, &line),
            };
            write_diff(
                &mut io::stdout().lock(),
                &path,
                &String::from_utf8_lossy(&before),
                &String::from_utf8_lossy(&after),
            )?;
        }
        return Ok(());
    }

    let path = resolve_rule_file(run).await?;
    take_backup(&path)?;

    match &after_user {
        Some(user) => edit::insert_rule_after_user(&path, &rule, user)
            .map_err(|e| explain(e, "write to"))
            .with_context(|| format!("failed to insert rule after user {user:?}"))?,
        None => edit::append_rule(&path, &rule)
            .map_err(|e| explain(e, "write to"))
            .context("failed to append rule")?,
    }

    println!(
        "Success: New rule added to {}. Run 'hbactl reload' to apply changes.",
        path.display()
    );
    Ok(())
}

async fn cmd_remove(run: &RunConfig, criteria: RemovalCriteria, dry_run: bool) -> Result<()> {
    let path = resolve_rule_file(run).await?;
    let content = read_bytes(&path).map_err(|e| explain(e, "read"))?;
    let text = String::from_utf8_lossy(&content);
    let rules = parse_str_with_line_numbers(&text);

    let targets = criteria
        .select(&rules)
        .map_err(|e| anyhow!("{e}; run 'hbactl list' to inspect the rules"))?;
    let line_numbers: Vec<usize> = targets.iter().map(|r| r.line_no).collect();

    if dry_run {
        println!(
            "dry-run: would remove {} rule(s) from {}:",
            targets.len(),
            path.display()
        );
        for target in &targets {
            println!(
                "  #{} (line {}): {}",
                target.index,
                target.line_no,
                target.rule.line()?
            );
        }
        let after = remove_lines_from_content(&content, &line_numbers)?;
        write_diff(
            &mut io::stdout().lock(),
            &path,
            &text,
            &String::from_utf8_lossy(&after),
        )?;
        return Ok(());
    }

    take_backup(&path)?;
    edit::remove_lines(&path, &line_numbers)
        .map_err(|e| explain(e, "write to"))
        .context("remove failed")?;

    match targets.as_slice() {
        [single] => println!(
            "Success: Rule #{} removed from {}. Run 'hbactl reload' to apply changes.",
            single.index,
            path.display()
        ),
        _ => println!(
            "Success: {} rule(s) removed from {}. Run 'hbactl reload' to apply changes.",
            targets.len(),
            path.display()
        ),
    }
    Ok(())
}

fn take_backup(path: &Path) -> Result<()> {
    let backup_path = edit::backup(path)
        .map_err(|e| explain(e, "write to"))
        .context("backup failed")?;
    eprintln!("Backup created at: {}", backup_path.display());
    Ok(())
}

async fn cmd_check(run: &RunConfig) -> Result<()> {
    let client = connect(run).await?;
    let errors = client.fetch_parse_errors().await;
    client.close().await;
    let errors = errors.context("could not read pg_hba_file_rules")?;

    if errors.is_empty() {
        println!("{}", "OK: no syntax errors in pg_hba.conf".green());
        return Ok(());
    }

    eprintln!("{}", "Syntax errors in pg_hba.conf:".red());
    for error in &errors {
        match error.line_number {
            Some(n) => eprintln!("  line {}: {}", n, error.message),
            None => eprintln!("  line ?: {}", error.message),
        }
    }
    bail!("{} syntax error(s) found", errors.len())
}

async fn cmd_reload(run: &RunConfig) -> Result<()> {
    let client = connect(run).await?;
    let result = client.reload_configuration().await;
    client.close().await;
    result.context("reload failed")?;

    println!("{}", "Success: configuration reloaded.".green());
    Ok(())
}
