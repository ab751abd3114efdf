use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};
use portalsync_domain::{ObjectType, RollbackMode};
use uuid::Uuid;

/// Selective CRM portal migration with audit reports and rollback
///
/// Copies schemas, pipelines, records and associations from a source portal
/// into a destination portal, writes a report for every run and can undo
/// earlier runs from those reports.
#[derive(Parser, Debug)]
#[command(name = "portalsync")]
#[command(about, long_about = None, version)]
pub struct Cli {
    /// Configuration file (default: ./portalsync.toml)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Compute and report everything, write nothing to the destination
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Print the summary as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Migrate every record of the selected object types
    Migrate(MigrateArgs),

    /// Migrate the records matching a set of criteria plus their associated records
    Sync(SyncArgs),

    /// List or reverse earlier runs
    #[command(subcommand)]
    Rollback(RollbackCommand),

    /// Reverse every run recorded in the reports directory
    Reset(ResetArgs),
}

#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Object types to migrate, comma separated (contact,company,deal,ticket,custom:<name>)
    #[arg(short = 't', long, value_delimiter = ',', value_parser = parse_object_type)]
    pub types: Vec<ObjectType>,

    /// Maximum records per object type
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Do not copy custom properties and schemas
    #[arg(long)]
    pub skip_properties: bool,

    /// Do not copy associations
    #[arg(long)]
    pub skip_associations: bool,
}

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Primary object type
    #[arg(short, long, value_parser = parse_object_type)]
    pub object: ObjectType,

    /// Explicit record ids, comma separated
    #[arg(long, value_delimiter = ',')]
    pub ids: Vec<String>,

    /// Only records created within this many days
    #[arg(long, value_name = "DAYS")]
    pub days_since_created: Option<u32>,

    /// Only records modified within this many days
    #[arg(long, value_name = "DAYS")]
    pub days_since_modified: Option<u32>,

    /// Email or website domains, comma separated (any may match)
    #[arg(long, value_delimiter = ',')]
    pub domains: Vec<String>,

    /// Property the domain filter applies to
    #[arg(long, value_name = "PROPERTY")]
    pub domain_property: Option<String>,

    /// Property equality filter, repeatable
    #[arg(long = "where", value_name = "PROPERTY=VALUE", value_parser = parse_key_value)]
    pub filters: Vec<(String, String)>,

    /// Maximum primary records
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Related object types to include, comma separated (default: all other standard types)
    #[arg(long, value_delimiter = ',', value_parser = parse_object_type)]
    pub related: Vec<ObjectType>,

    /// Association hops followed from the primary records
    #[arg(long, default_value_t = 1)]
    pub depth: u8,
}

#[derive(Subcommand, Debug)]
pub enum RollbackCommand {
    /// List runs that can be rolled back, newest first
    List {
        /// Only runs started within this many days
        #[arg(long, value_name = "DAYS")]
        days_back: Option<u32>,

        /// Maximum runs to list
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Reverse one or more runs
    Run(RollbackRunArgs),
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("selection").required(true).args(["run_id", "last", "last_n"])))]
pub struct RollbackRunArgs {
    /// Run id of the report to reverse
    #[arg(long)]
    pub run_id: Option<Uuid>,

    /// Reverse the most recent run
    #[arg(long)]
    pub last: bool,

    /// Reverse the N most recent runs
    #[arg(long, value_name = "N")]
    pub last_n: Option<usize>,

    /// What to reverse (full, records-only, properties-only)
    #[arg(long, default_value = "full", value_parser = parse_mode)]
    pub mode: RollbackMode,

    /// Only consider runs started within this many days
    #[arg(long, value_name = "DAYS")]
    pub days_back: Option<u32>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct ResetArgs {
    /// What to reverse (full, records-only, properties-only)
    #[arg(long, default_value = "full", value_parser = parse_mode)]
    pub mode: RollbackMode,

    /// Only reverse runs started within this many days
    #[arg(long, value_name = "DAYS")]
    pub days_back: Option<u32>,

    /// Confirm the reset; required unless --dry-run is set
    #[arg(short, long)]
    pub yes: bool,
}

fn parse_object_type(raw: &str) -> Result<ObjectType, String> {
    raw.parse()
}

fn parse_mode(raw: &str) -> Result<RollbackMode, String> {
    raw.parse()
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected PROPERTY=VALUE, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing property name in `{raw}`"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}
