pub mod tank;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Handle Tank archives
    Tank {
        #[command(subcommand)]
        command: tank::TankCommands,
    },
}

impl Commands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            Commands::Tank { command } => command.handle(),
        }
    }
}
