use clap::{ArgAction, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "acc", version, about = "AtCoder contest helper")]
pub struct Cli {
    /// More output, repeat for more detail (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Login to AtCoder
    Login {
        /// Skip the username prompt
        #[arg(short, long, env = "ACC_USERNAME")]
        username: Option<String>,
    },
    /// Delete login session information
    Logout,
    /// Check whether the saved session is logged in
    Session,
    /// Get contest information
    Contest { contest_id: String },
    /// Get the task list of a contest
    Tasks { contest_id: String },
    /// Get one task of a contest
    Task { contest_id: String, task_id: String },
    /// Print the site, contest or task URL
    Url {
        contest: Option<String>,
        task: Option<String>,
    },
    /// Print the configuration directory
    ConfigDir,
}
