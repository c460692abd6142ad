//! promoctl - student promotion and academic-status CLI
//!
//! ## Commands
//!
//! - `groups`: list rosters with level order and eligible targets
//! - `targets`: list the groups a group's students may move to
//! - `promote`: move a group's students to a target group
//! - `promote-all`: move every group to its assigned target
//! - `status`: change promotion status without moving groups

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, Level};

use promotion_core::{
    ExecutorConfig, PromotionSession, SelectionScope, SessionContext, TransitionOutcome, METRICS,
};
use roster_state::{ApiConfig, GroupId, HttpRosterStore, PromotionStatus, StudentId};

#[derive(Parser)]
#[command(name = "promoctl")]
#[command(author = "Academy Platform Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Promote students between groups and manage academic status", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Print command results as JSON
    #[arg(long, global = true)]
    json_output: bool,

    /// Base URL of the academy API
    #[arg(long, global = true, env = "PROMOTION_API_URL")]
    api_url: Option<String>,

    /// Bearer token for the academy API
    #[arg(long, global = true, env = "PROMOTION_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true, env = "PROMOTION_API_TIMEOUT_SECS")]
    timeout: Option<u64>,

    /// Academic year recorded with each transition (default: current year)
    #[arg(long, global = true)]
    year: Option<i32>,

    /// Operator name recorded with each transition
    #[arg(long, global = true, env = "USER")]
    operator: Option<String>,

    /// Maximum concurrent requests for promote-all
    #[arg(long, global = true, default_value = "4")]
    max_concurrent: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List group rosters with level order and eligible targets
    Groups {
        /// Include students that are not promotable
        #[arg(long)]
        all: bool,
    },

    /// List eligible target groups for a group
    Targets {
        /// Source group id
        group: i64,
    },

    /// Move the selected students of one group to a target group
    Promote {
        /// Source group id
        #[arg(long)]
        group: i64,

        /// Target group id
        #[arg(long)]
        target: i64,

        /// Only move these students (default: every promotable student)
        #[arg(long = "student")]
        students: Vec<i64>,
    },

    /// Move every group to its assigned target group
    PromoteAll {
        /// Assignment as SOURCE=TARGET group ids; repeat for every group
        #[arg(long = "assign", value_parser = parse_assignment, required = true)]
        assignments: Vec<(i64, i64)>,
    },

    /// Change promotion status without moving groups
    #[command(group(ArgGroup::new("scope").required(true).args(["student", "group", "all"])))]
    Status {
        /// New status: active, repeating or pending
        #[arg(long)]
        to: PromotionStatus,

        /// A single student id
        #[arg(long)]
        student: Option<i64>,

        /// Every promotable student of a group
        #[arg(long)]
        group: Option<i64>,

        /// Every promotable student of every group
        #[arg(long)]
        all: bool,
    },
}

fn parse_assignment(raw: &str) -> std::result::Result<(i64, i64), String> {
    let (source, target) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SOURCE=TARGET, got '{raw}'"))?;
    let parse = |id: &str| {
        id.trim()
            .parse::<i64>()
            .map_err(|e| format!("invalid group id '{id}': {e}"))
    };
    Ok((parse(source)?, parse(target)?))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    promotion_core::init_tracing(cli.json, level);

    let mut api = match &cli.api_url {
        Some(url) => ApiConfig::new(url),
        None => ApiConfig::from_env(),
    };
    if let Some(token) = &cli.token {
        api = api.with_token(token);
    }
    if let Some(timeout) = cli.timeout {
        api = api.with_timeout(timeout);
    }
    debug!(base_url = %api.base_url, "using academy API");
    let store = HttpRosterStore::new(api).context("Failed to configure academy API client")?;

    let mut context = cli.year.map(SessionContext::new).unwrap_or_default();
    if let Some(operator) = &cli.operator {
        context = context.with_operator(operator.as_str());
    }
    let config = ExecutorConfig {
        max_concurrent: cli.max_concurrent,
    };

    let mut session = PromotionSession::load(Arc::new(store), context, config)
        .await
        .context("Failed to load rosters")?;

    let result = match cli.command {
        Commands::Groups { all } => cmd_groups(&mut session, all, cli.json_output),
        Commands::Targets { group } => cmd_targets(&session, GroupId(group), cli.json_output),
        Commands::Promote {
            group,
            target,
            students,
        } => cmd_promote(&mut session, group, target, &students, cli.json_output).await,
        Commands::PromoteAll { assignments } => {
            cmd_promote_all(&mut session, &assignments, cli.json_output).await
        }
        Commands::Status {
            to,
            student,
            group,
            all: _,
        } => {
            let scope = match (student, group) {
                (Some(id), _) => SelectionScope::Student(StudentId(id)),
                (None, Some(id)) => SelectionScope::Group(GroupId(id)),
                (None, None) => SelectionScope::All,
            };
            cmd_status(&mut session, scope, to, cli.json_output).await
        }
    };

    METRICS.flush();
    result
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_groups(session: &mut PromotionSession, all: bool, json_output: bool) -> Result<()> {
    session.set_only_promotable(!all);
    if json_output {
        return print_json(session.roster());
    }

    let roster = session.roster();
    if roster.is_empty() {
        println!("No active groups with students.");
        return Ok(());
    }
    for group in roster.groups() {
        println!(
            "[{}] {} ({} #{})",
            group.id(),
            group.group.name,
            group.group.level.name,
            group.level_order
        );
        let targets: Vec<String> = group
            .eligible_targets
            .iter()
            .map(|g| format!("{} [{}]", g.name, g.id))
            .collect();
        if targets.is_empty() {
            println!("  targets: none");
        } else {
            println!("  targets: {}", targets.join(", "));
        }
        for student in session.selection().visible_students(group) {
            println!(
                "  {:>8}  {:<32} {:?}",
                student.id.0,
                student.name,
                student.display_status()
            );
        }
        println!();
    }
    println!(
        "{} students in {} groups (loaded {})",
        roster.student_count(),
        roster.groups().len(),
        roster.loaded_at().format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(())
}

fn cmd_targets(session: &PromotionSession, group: GroupId, json_output: bool) -> Result<()> {
    let Some(roster) = session.roster().group(group) else {
        bail!("group {group} is not in the loaded roster");
    };
    if json_output {
        return print_json(&roster.eligible_targets);
    }
    if roster.eligible_targets.is_empty() {
        println!("No eligible targets for '{}'.", roster.group.name);
        return Ok(());
    }
    for target in &roster.eligible_targets {
        println!("[{}] {} ({})", target.id, target.name, target.level.name);
    }
    Ok(())
}

async fn cmd_promote(
    session: &mut PromotionSession,
    group: i64,
    target: i64,
    students: &[i64],
    json_output: bool,
) -> Result<()> {
    let group = GroupId(group);
    session.assign_target(group, GroupId(target))?;
    if !students.is_empty() {
        session.set_only_promotable(false);
        session.toggle_group(group, false)?;
        for id in students {
            session.set_student(group, StudentId(*id), true)?;
        }
    }
    let outcome = session.promote_group(group).await?;
    report(outcome, json_output)
}

async fn cmd_promote_all(
    session: &mut PromotionSession,
    assignments: &[(i64, i64)],
    json_output: bool,
) -> Result<()> {
    for (source, target) in assignments {
        session
            .assign_target(GroupId(*source), GroupId(*target))
            .with_context(|| format!("Cannot assign group {target} to group {source}"))?;
    }
    let outcome = session.promote_all().await?;
    report(outcome, json_output)
}

async fn cmd_status(
    session: &mut PromotionSession,
    scope: SelectionScope,
    status: PromotionStatus,
    json_output: bool,
) -> Result<()> {
    let outcome = session.change_status(scope, status).await?;
    report(outcome, json_output)
}

/// Print the outcome, then fail if any request was rejected.
fn report(outcome: TransitionOutcome, json_output: bool) -> Result<()> {
    if json_output {
        print_json(&outcome)?;
    } else {
        println!("{}", outcome.summary());
    }
    outcome.into_result()?;
    Ok(())
}
