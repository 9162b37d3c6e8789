use crate::demo::{run_fx_rates, run_price, run_sgk_parse, FxRatesArgs, PriceArgs, SgkParseArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use liman::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "liman",
    about = "Terminal pricing and SGK compliance service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Exchange-rate lookups against the configured sources
    Fx {
        #[command(subcommand)]
        command: FxCommand,
    },
    /// Offline tools for monthly SGK service lists
    Sgk {
        #[command(subcommand)]
        command: SgkCommand,
    },
    /// Price one service line against the demo catalog
    Price(PriceArgs),
}

#[derive(Subcommand, Debug)]
enum FxCommand {
    /// Print the rates in force on a date
    Rates(FxRatesArgs),
}

#[derive(Subcommand, Debug)]
enum SgkCommand {
    /// Print the identities extracted from a service-list PDF
    Parse(SgkParseArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Fx {
            command: FxCommand::Rates(args),
        } => run_fx_rates(args).await,
        Command::Sgk {
            command: SgkCommand::Parse(args),
        } => run_sgk_parse(args).await,
        Command::Price(args) => run_price(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["liman"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn price_collects_repeated_inputs() {
        let cli = Cli::try_parse_from([
            "liman",
            "price",
            "--service",
            "FORKLIFT",
            "--date",
            "2025-11-21",
            "--input",
            "weight=5",
            "--input",
            "minutes=45",
        ])
        .expect("parses");
        let Some(Command::Price(args)) = cli.command else {
            panic!("expected the price command");
        };
        assert_eq!(args.service, "FORKLIFT");
        assert_eq!(args.inputs.len(), 2);
        assert_eq!(args.inputs[0].0, "weight");
    }

    #[test]
    fn sgk_parse_rejects_malformed_periods() {
        let result = Cli::try_parse_from(["liman", "sgk", "parse", "list.pdf", "--period", "202513"]);
        assert!(result.is_err());
    }
}
