use clap::{Parser, Subcommand};

use vote_ui_protocol::v1::AppCmd;

use crate::error::CliError;

#[derive(Debug, Parser)]
#[command(multicall = true, disable_help_subcommand = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Reload the election list
    Elections,
    /// Select an election and show its ballot
    Select { election_id: u64 },
    /// Vote for a candidate of the selected election
    Vote { candidate_id: u64 },
    /// Re-read the selected election, its candidates and your ballot
    Refresh,
    /// Show the results of a closed election
    Results { election_id: Option<u64> },
    /// List wallet accounts
    Accounts,
    /// Connect a wallet account, the first one by default
    Connect { account: Option<String> },
    /// Switch to another wallet account
    Switch { account: String },
    /// Forget the connected account
    Disconnect,
    /// Move the chain clock forward (local development chains only)
    AdvanceTime,
    Help,
    Exit,
}

/// What a line of input asks the REPL to do.
#[derive(Debug, PartialEq)]
pub enum ReplInput {
    Cmd(AppCmd),
    Help,
    Exit,
}

impl From<Commands> for ReplInput {
    fn from(command: Commands) -> Self {
        let cmd = match command {
            Commands::Elections => AppCmd::LoadElections,
            Commands::Select { election_id } => AppCmd::SelectElection { election_id },
            Commands::Vote { candidate_id } => AppCmd::Vote { candidate_id },
            Commands::Refresh => AppCmd::Refresh,
            Commands::Results { election_id } => AppCmd::Results { election_id },
            Commands::Accounts => AppCmd::ListAccounts,
            Commands::Connect { account } => AppCmd::Connect { account },
            Commands::Switch { account } => AppCmd::SwitchAccount { account },
            Commands::Disconnect => AppCmd::Disconnect,
            Commands::AdvanceTime => AppCmd::AdvanceTime,
            Commands::Help => return ReplInput::Help,
            Commands::Exit => return ReplInput::Exit,
        };
        ReplInput::Cmd(cmd)
    }
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<ReplInput>, CliError> {
    let args = shlex::split(line).ok_or(CliError::SplitLineError)?;
    if args.is_empty() {
        return Ok(None);
    }
    let cli = Cli::try_parse_from(args)
        .map_err(|e| CliError::UnknownCommand(e.render().to_string().trim().to_string()))?;
    Ok(Some(cli.command.into()))
}

pub fn help_text() -> &'static str {
    "Commands:
  elections              reload the election list
  select <id>            select an election
  vote <candidate>       vote in the selected election
  refresh                re-read the selected election
  results [id]           show results of a closed election
  accounts               list wallet accounts
  connect [address]      connect an account (first one by default)
  switch <address>       switch to another account
  disconnect             forget the connected account
  advance-time           move the chain clock forward (local chains only)
  help                   show this help
  exit                   quit"
}
