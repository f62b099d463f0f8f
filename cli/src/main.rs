mod commands;
mod input;
mod terminal;

use commands::{CommandLine, Commands, addresses, apply, check, firewall, plan};
use terminal::print;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    terminal::logging::init(commands.verbose, commands.quiet);
    let cfg = commands.config();
    print::banner(cfg.quiet);

    let success = match &commands.command {
        Commands::Check { definition } => check::check(definition, &cfg)?,
        Commands::Addresses { definition } => addresses::addresses(definition, &cfg)?,
        Commands::Firewall { definition, machine } => firewall::firewall(definition, machine, &cfg)?,
        Commands::Plan { definition, .. } => plan::plan(definition, &cfg)?,
        Commands::Apply { definition, .. } => apply::apply(definition, &cfg).await?,
    };

    print::end_of_program();
    if !success {
        std::process::exit(1);
    }
    Ok(())
}
