mod cli;
mod run;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Command::Compose(args) => run::compose(args),
        Command::Markup(args) => run::markup(args),
        Command::Config(args) => run::config(args),
    }
}
