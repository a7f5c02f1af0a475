#![forbid(unsafe_code)]

mod author;
mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use output::OutputMode;
use std::env;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "rf",
    author,
    version,
    about = "reef: a git-native issue tracker that merges itself",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Log errors only.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format (defaults to pretty on a TTY, text when piped).
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Emit JSON output (same as --format json).
    #[arg(long, global = true)]
    json: bool,

    /// Override author identity (skips env resolution).
    #[arg(long, global = true)]
    author: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Derive the output mode from flags, env, and TTY state.
    fn output_mode(&self) -> OutputMode {
        output::resolve_output_mode(self.format, self.json)
    }

    /// Get the author flag as an `Option<&str>` for resolution.
    fn author_flag(&self) -> Option<&str> {
        self.author.as_deref()
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Lifecycle",
        about = "Initialize a reef project",
        long_about = "Create the .reef directory with a default config in the current directory.",
        after_help = "EXAMPLES:\n    # Initialize a project in the current directory\n    rf init\n\n    # Emit machine-readable output\n    rf init --json"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Create a new work item",
        long_about = "Create a new work item in the snapshot and assign it a fresh ID.",
        after_help = "EXAMPLES:\n    # Create an item\n    rf create \"Fix login timeout\"\n\n    # Create a tagged subtask\n    rf create \"Rotate session keys\" --parent rf-abc123 -t security\n\n    # Emit machine-readable output\n    rf create \"Fix login timeout\" --json"
    )]
    Create(cmd::create::CreateArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Edit fields on a work item",
        long_about = "Apply field edits to an existing work item and bump its update time.",
        after_help = "EXAMPLES:\n    # Start work\n    rf update rf-abc123 --status in-progress\n\n    # Retag and reassign\n    rf update rf-abc123 --add-tag backend --assignee ana\n\n    # Emit machine-readable output\n    rf update rf-abc123 -p high --json"
    )]
    Update(cmd::update::UpdateArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Comment on a work item",
        long_about = "Attach an authored comment to a work item.",
        after_help = "EXAMPLES:\n    # Add a comment\n    rf comment rf-abc123 \"root cause found\" --author ana\n\n    # Author from the environment\n    REEF_AUTHOR=ana rf comment rf-abc123 \"root cause found\"\n\n    # Emit machine-readable output\n    rf comment rf-abc123 \"done\" --author ana --json"
    )]
    Comment(cmd::comment::CommentArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Soft-delete work items",
        long_about = "Mark one or more work items deleted, keeping them in the snapshot as tombstones.",
        after_help = "EXAMPLES:\n    # Delete with a reason\n    rf delete rf-abc123 --reason duplicate\n\n    # Delete several without prompting\n    rf delete rf-abc123 rf-def456 --force\n\n    # Emit machine-readable output\n    rf delete rf-abc123 --force --json"
    )]
    Delete(cmd::delete::DeleteArgs),

    #[command(
        next_help_heading = "Read",
        about = "List work items",
        long_about = "List work items with optional filters, flat or as a tree.",
        after_help = "EXAMPLES:\n    # List active items\n    rf list\n\n    # Filter by status and tag\n    rf list -s in-progress -t backend\n\n    # Show the hierarchy\n    rf list --tree\n\n    # Emit machine-readable output\n    rf list --json"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one work item",
        long_about = "Show full details for a single work item by ID, including comments.",
        after_help = "EXAMPLES:\n    # Show an item\n    rf show rf-abc123\n\n    # Use a short prefix when unique\n    rf show abc\n\n    # Emit machine-readable output\n    rf show rf-abc123 --json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Sync",
        about = "Sync the snapshot through git",
        long_about = "Fetch the remote snapshot, merge both sides, write the result, and publish it.",
        after_help = "EXAMPLES:\n    # Full sync\n    rf sync\n\n    # See what would change\n    rf sync --dry-run\n\n    # Merge locally but keep it unpublished\n    rf sync --no-push\n\n    # Emit machine-readable output\n    rf sync --json"
    )]
    Sync(cmd::sync::SyncArgs),

    #[command(
        next_help_heading = "Utility",
        about = "Generate shell completions",
        long_about = "Write a completion script for the given shell to stdout.",
        after_help = "EXAMPLES:\n    # Bash\n    rf completions bash >> ~/.bashrc\n\n    # Zsh\n    rf completions zsh > ~/.zfunc/_rf"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool, quiet: bool) {
    let filter = EnvFilter::try_from_env("REEF_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "reef=debug,info"
        } else if quiet {
            "reef=error"
        } else {
            "reef=info,warn"
        })
    });

    let format = env::var("REEF_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so JSON output on stdout stays parseable.
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

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let cwd = std::env::current_dir()?;
    let output = cli.output_mode();

    match cli.command {
        Commands::Init(ref args) => cmd::init::run_init(args, output, &cwd),
        Commands::Create(ref args) => {
            cmd::create::run_create(args, cli.author_flag(), output, &cwd)
        }
        Commands::Update(ref args) => cmd::update::run_update(args, output, &cwd),
        Commands::Comment(ref args) => {
            cmd::comment::run_comment(args, cli.author_flag(), output, &cwd)
        }
        Commands::Delete(ref args) => {
            cmd::delete::run_delete(args, cli.author_flag(), output, &cwd)
        }
        Commands::List(ref args) => cmd::list::run_list(args, output, &cwd),
        Commands::Show(ref args) => cmd::show::run_show(args, output, &cwd),
        Commands::Sync(ref args) => cmd::sync::run_sync(args, output, &cwd),
        Commands::Completions(ref args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}
