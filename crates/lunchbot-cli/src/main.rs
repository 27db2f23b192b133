#![forbid(unsafe_code)]

mod bot;
mod cmd;
mod control;
mod output;
mod render;

use clap::{CommandFactory, Parser, Subcommand};
use lunchbot_core::config::{LunchConfig, resolve_config};
use output::{CliError, OutputMode};
use std::env;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "lunchbot: fair, reproducible lunch groups",
    long_about = None
)]
struct Cli {
    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Lunch",
        about = "Open sign-ups for a lunch",
        long_about = "Create an empty sign-up pool for a lunch day. Announcing twice is harmless.",
        after_help = "EXAMPLES:\n    # Announce the next lunch\n    lb announce\n\n    # Announce a specific day\n    lb announce --date 2024-04-17"
    )]
    Announce(cmd::announce::AnnounceArgs),

    #[command(
        next_help_heading = "Lunch",
        about = "Sign people up or off",
        long_about = "Sign people up for a lunch, or off with --remove. After the lunch is organized,\nnew sign-ups are placed into the group they fit best.",
        after_help = "EXAMPLES:\n    # Sign up two people\n    lb add ann@example.com bob@example.com\n\n    # Sign someone off\n    lb add ann@example.com --remove\n\n    # Emit machine-readable output\n    lb add ann@example.com --json"
    )]
    Add(cmd::add::AddArgs),

    #[command(
        next_help_heading = "Lunch",
        about = "Split the sign-ups into groups",
        long_about = "Run the greedy solver over everyone signed up and store the groups.\nThe RNG is seeded from the lunch date, so a retry gives the same groups.",
        after_help = "EXAMPLES:\n    # Organize the open lunch\n    lb organize\n\n    # Organize a specific day with more passes\n    lb organize --date 2024-04-17 --samples 500\n\n    # Emit machine-readable output\n    lb organize --json"
    )]
    Organize(cmd::organize::OrganizeArgs),

    #[command(
        next_help_heading = "Lunch",
        about = "Show sign-ups or groups for a lunch",
        after_help = "EXAMPLES:\n    # Show the open lunch\n    lb show\n\n    # Show a past lunch as JSON\n    lb show --date 2024-04-17 --json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Lunch",
        about = "Repair a lunch from the full sign-up list",
        long_about = "Bring a lunch in line with everyone currently signed up. Before organizing, the\npending pool is replaced by the list. Afterwards, listed people missing from the\ngroups are placed one by one; nobody is removed.",
        after_help = "EXAMPLES:\n    # Reactions were lost while the bot was down\n    lb fixup ann@example.com bob@example.com cat@example.com\n\n    # Emit machine-readable output\n    lb fixup ann bob --date 2024-04-17 --json"
    )]
    Fixup(cmd::fixup::FixupArgs),

    #[command(
        next_help_heading = "People",
        about = "Mark who can pay for a group",
        long_about = "Set or clear a person's payer flag. Every group gets at least one payer when enough sign up.",
        after_help = "EXAMPLES:\n    # Ann can pay\n    lb payer ann@example.com\n\n    # Ann can no longer pay\n    lb payer ann@example.com --off"
    )]
    Payer(cmd::payer::PayerArgs),

    #[command(
        next_help_heading = "Ledger",
        about = "Record groups that met in the past",
        long_about = "Insert historical groups into the pairing ledger. Newer meetings are never moved back.",
        after_help = "EXAMPLES:\n    # Two groups met on 3 April 2024\n    lb history 03.04.2024 '[[\"ann\",\"bob\"],[\"cat\",\"dan\"]]'"
    )]
    History(cmd::history::HistoryArgs),

    #[command(
        next_help_heading = "Ledger",
        about = "Merge another pairing ledger into this one",
        long_about = "Union two ledgers, keeping the later meeting date for every pair.",
        after_help = "EXAMPLES:\n    # Merge a ledger from another office\n    lb merge ../berlin/.lunchbot/data/ledger.json\n\n    # Preview without saving\n    lb merge other.json --dry-run --json"
    )]
    Merge(cmd::merge::MergeArgs),

    #[command(
        next_help_heading = "Ledger",
        about = "Fold the latest organized lunch into the ledger",
        after_help = "EXAMPLES:\n    lb refresh"
    )]
    Refresh(cmd::refresh::RefreshArgs),

    #[command(
        next_help_heading = "Ledger",
        about = "Score a lunch against the pairing ledger",
        long_about = "Sum, over every member, the mean number of weeks since they last met the rest of their group.\nHigher is better.",
        after_help = "EXAMPLES:\n    lb score --date 2024-04-17"
    )]
    Score(cmd::score::ScoreArgs),

    #[command(
        next_help_heading = "Diagnostics",
        about = "Print the RNG seed for a lunch date",
        after_help = "EXAMPLES:\n    lb seed 2024-04-17"
    )]
    Seed(cmd::seed::SeedArgs),

    #[command(
        next_help_heading = "Diagnostics",
        about = "Simulate weeks of lunches",
        long_about = "Run deterministic simulations of weekly lunches and check the grouping invariants."
    )]
    Sim(cmd::sim::SimArgs),

    #[command(
        next_help_heading = "Bot",
        about = "Run the bot on the console",
        long_about = "Read control messages from stdin until it closes:\n\n    !announce | !organize | !setpayer <id> <true|false>\n    !history <dd.mm.yyyy> <json groups> | !fixup <id>... | +<id> | -<id>",
        after_help = "EXAMPLES:\n    # Interactive session\n    lb run\n\n    # Scripted session\n    printf '!announce\\n+ann\\n+bob\\n' | lb run --json"
    )]
    Run(cmd::run::RunArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    lb completions bash > /etc/bash_completion.d/lb"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("LUNCHBOT_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "lunchbot=debug,info"
        } else {
            "lunchbot=info,warn"
        })
    });

    let format = env::var("LUNCHBOT_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn dispatch(command: Commands, output: OutputMode, config: &LunchConfig, project_root: &std::path::Path) -> anyhow::Result<()> {
    match command {
        Commands::Announce(args) => cmd::announce::run_announce(&args, output, config, project_root),
        Commands::Add(args) => cmd::add::run_add(&args, output, config, project_root),
        Commands::Organize(args) => cmd::organize::run_organize(&args, output, config, project_root),
        Commands::Show(args) => cmd::show::run_show(&args, output, config, project_root),
        Commands::Fixup(args) => cmd::fixup::run_fixup(&args, output, config, project_root),
        Commands::Payer(args) => cmd::payer::run_payer(&args, output, config, project_root),
        Commands::History(args) => cmd::history::run_history(&args, output, config, project_root),
        Commands::Merge(args) => cmd::merge::run_merge(&args, output, config, project_root),
        Commands::Refresh(args) => cmd::refresh::run_refresh(&args, output, config, project_root),
        Commands::Score(args) => cmd::score::run_score(&args, output, config, project_root),
        Commands::Seed(args) => cmd::seed::run_seed(&args, output),
        Commands::Sim(args) => cmd::sim::run_sim(&args, output),
        Commands::Run(args) => cmd::run::run_bot(&args, output, config, project_root),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let project_root = env::current_dir()?;
    let fallback = if cli.json { OutputMode::Json } else { OutputMode::Text };

    let config = match resolve_config(&project_root) {
        Ok(config) => config,
        Err(err) => {
            output::render_error(fallback, &CliError::from(&err))?;
            std::process::exit(2);
        }
    };
    let output = OutputMode::resolve(cli.json, &config);
    debug!(?output, "resolved output mode");

    if let Err(err) = dispatch(cli.command, output, &config, &project_root) {
        output::render_error(output, &CliError::from(&err))?;
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn json_flag_after_subcommand() {
        let cli = Cli::parse_from(["lb", "show", "--json"]);
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Show(_)));
    }

    #[test]
    fn add_requires_people() {
        assert!(Cli::try_parse_from(["lb", "add"]).is_err());
        let cli = Cli::parse_from(["lb", "add", "ann", "bob", "--remove"]);
        match cli.command {
            Commands::Add(args) => {
                assert_eq!(args.people, vec!["ann", "bob"]);
                assert!(args.remove);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn sim_run_parses_flattened_params() {
        let cli = Cli::parse_from(["lb", "sim", "run", "--seeds", "3", "--people", "12"]);
        match cli.command {
            Commands::Sim(cmd::sim::SimArgs {
                command: cmd::sim::SimCommand::Run(args),
            }) => {
                assert_eq!(args.seeds, 3);
                assert_eq!(args.params.people, 12);
                assert_eq!(args.params.group_size, 6);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn fixup_requires_people() {
        assert!(Cli::try_parse_from(["lb", "fixup"]).is_err());
        let cli = Cli::parse_from(["lb", "fixup", "ann", "bob", "--date", "2024-04-17"]);
        match cli.command {
            Commands::Fixup(args) => {
                assert_eq!(args.people, vec!["ann", "bob"]);
                assert_eq!(args.date.as_deref(), Some("2024-04-17"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn history_takes_date_and_groups() {
        let cli = Cli::parse_from(["lb", "history", "03.04.2024", r#"[["ann","bob"]]"#]);
        assert!(matches!(cli.command, Commands::History(_)));
    }
}
