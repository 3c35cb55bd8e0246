use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    #[command(about = "Pair with a phone (or restore the saved session) and store credentials")]
    Login {
        #[arg(long, help = "Where to write QR code images (PNG)")]
        qr_output: Option<PathBuf>,
        #[arg(long, help = "Discard stored credentials and pair again")]
        force_pairing: bool,
    },

    #[command(about = "Send a text message")]
    Send {
        #[arg(help = "Recipient phone number or contact name")]
        to: String,
        #[arg(help = "Message text")]
        message: String,
    },

    #[command(about = "List recent conversations")]
    Inbox {
        #[arg(long, help = "Limit number of conversations")]
        limit: Option<usize>,
    },

    #[command(about = "Manage configuration")]
    Config {
        #[command(subcommand)]
        subcommand: ConfigCommand,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    #[command(about = "Initialize config file with defaults")]
    Init,

    #[command(about = "Show current configuration")]
    Show,

    #[command(about = "Show config and credentials file paths")]
    Path,
}
