use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stacker")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Create, update and watch CloudFormation stacks", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to stacker.toml
    #[arg(short, long, global = true, env = "STACKER_CONFIG")]
    pub config: Option<PathBuf>,

    /// AWS region (overrides the configured region)
    #[arg(short, long, global = true, env = "AWS_REGION")]
    pub region: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a stack that does not exist yet
    Create(CreateArgs),

    /// Update a stack through a change set
    Update(UpdateArgs),

    /// Show the change set an update would execute
    Diff {
        /// Stack name from stacker.toml
        stack: String,
    },

    /// Show stack status and drift
    Status {
        /// Stack name (all configured stacks if omitted)
        stack: Option<String>,
    },

    /// Show stack outputs
    Outputs {
        /// Stack name from stacker.toml
        stack: String,

        /// Print outputs as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct WaitArgs {
    /// Submit and return without waiting for the stack to settle
    #[arg(long)]
    pub no_wait: bool,

    /// Give up waiting after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

#[derive(Args)]
pub struct CreateArgs {
    /// Stack name from stacker.toml
    pub stack: String,

    #[command(flatten)]
    pub wait: WaitArgs,
}

#[derive(Args)]
pub struct UpdateArgs {
    /// Stack name from stacker.toml
    pub stack: String,

    /// Execute change sets that remove or replace resources
    #[arg(long)]
    pub allow_destructive: bool,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,

    #[command(flatten)]
    pub wait: WaitArgs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_update_flags() {
        let cli = Cli::try_parse_from([
            "stacker",
            "-vv",
            "--region",
            "eu-west-1",
            "update",
            "web",
            "--no-wait",
            "--allow-destructive",
            "--timeout",
            "600",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.region.as_deref(), Some("eu-west-1"));
        let Command::Update(args) = cli.command else {
            panic!("expected update");
        };
        assert_eq!(args.stack, "web");
        assert!(args.allow_destructive);
        assert!(!args.yes);
        assert!(args.wait.no_wait);
        assert_eq!(args.wait.timeout, Some(600));
    }

    #[test]
    fn test_status_stack_is_optional() {
        let cli = Cli::try_parse_from(["stacker", "status"]).unwrap();
        assert!(matches!(cli.command, Command::Status { stack: None }));
    }
}
