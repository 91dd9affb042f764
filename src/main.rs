use std::env;
use propvest::api::{CliError, resolve_port, run_cli};
use tracing::error;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("propvest=info"));
    // stdout carries the JSON projection in CLI mode.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let raw_args: Vec<String> = env::args().collect();
    match raw_args.get(1).map(String::as_str) {
        Some("serve") => {
            let env_port = env::var("PROPVEST_PORT").ok();
            let port = resolve_port(raw_args.get(2).map(String::as_str), env_port.as_deref());
            if let Err(e) = propvest::api::run_http_server(port).await {
                error!(error = %e, "server error");
                std::process::exit(1);
            }
        }
        Some("project") => match run_cli(raw_args[1..].iter().cloned()) {
            Ok(json) => println!("{json}"),
            Err(CliError::Parse(e)) => e.exit(),
            Err(e) => {
                error!(error = %e, "projection failed");
                std::process::exit(1);
            }
        },
        _ => {
            eprintln!("Usage: propvest serve [port] | propvest project [options]");
            std::process::exit(1);
        }
    }
}
