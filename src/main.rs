use messages_web::output::text;
use std::process;

#[tokio::main]
async fn main() {
    let verbose = std::env::args().any(|arg| arg == "--verbose" || arg == "-v");
    init_logging(verbose);

    if let Err(e) = messages_web::cli::run().await {
        eprintln!("{}", text::error(&e.to_string()));
        for hint in e.suggestions() {
            eprintln!("  {}", hint);
        }
        process::exit(e.exit_code());
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = if verbose {
        EnvFilter::new("debug,chromiumoxide=info")
    } else {
        match std::env::var(EnvFilter::DEFAULT_ENV) {
            Ok(directives) if !directives.is_empty() => {
                EnvFilter::new(format!("{},chromiumoxide=off", directives))
            }
            _ => EnvFilter::new("warn,chromiumoxide=off"),
        }
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
