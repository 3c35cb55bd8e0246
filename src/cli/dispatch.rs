use super::{
    Cli,
    commands::{Command, ConfigCommand},
};
use crate::{Result, config::Config, handlers, output};
use std::sync::Arc;

pub async fn dispatch(mut cli: Cli, config: Arc<Config>) -> Result<()> {
    let command = match cli.command.take() {
        Some(cmd) => cmd,
        None => {
            eprintln!("No command provided. Use --help for usage.");
            std::process::exit(1);
        }
    };
    let pretty = config.output.json_pretty;

    match command {
        Command::Login {
            qr_output,
            force_pairing,
        } => {
            let result =
                handlers::auth::handle_login(config.clone(), qr_output, force_pairing).await?;
            output::print_output(&result, cli.json, pretty)
        }
        Command::Send { to, message } => {
            let result = handlers::send::handle_send(config.clone(), &to, &message).await?;
            output::print_output(&result, cli.json, pretty)
        }
        Command::Inbox { limit } => {
            let result = handlers::inbox::handle_inbox(config.clone(), limit).await?;
            output::print_output(&result, cli.json, pretty)
        }
        Command::Config { subcommand } => handle_config_command(subcommand, &cli, &config),
    }
}

fn handle_config_command(subcommand: ConfigCommand, cli: &Cli, config: &Config) -> Result<()> {
    match subcommand {
        ConfigCommand::Init => {
            let result = handlers::config_handler::handle_config_init(config)?;
            output::print_output(&result, cli.json, true)
        }
        ConfigCommand::Show => {
            let result = handlers::config_handler::handle_config_show(config);
            output::print_output(&result, cli.json, true)
        }
        ConfigCommand::Path => {
            let result = handlers::config_handler::handle_config_path(config)?;
            output::print_output(&result, cli.json, true)
        }
    }
}
