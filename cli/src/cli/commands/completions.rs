//! Shell completion generation.

use clap::CommandFactory;
use clap_complete::{generate, Shell};

use crate::cli::{Cli, ShellType};
use crate::error::Result;

/// Handles the `mediactl completions <shell>` command.
pub fn handle_completions(shell: ShellType) -> Result<()> {
    let mut cmd = Cli::command();
    let shell = match shell {
        ShellType::Bash => Shell::Bash,
        ShellType::Zsh => Shell::Zsh,
        ShellType::Fish => Shell::Fish,
    };

    generate(shell, &mut cmd, "mediactl", &mut std::io::stdout());

    Ok(())
}
