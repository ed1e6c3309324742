//! RAX FTP Client - Entry Point
//!
//! Connects to the configured server and runs the interactive shell.

use log::{error, info};
use std::process;
use tokio::io::BufReader;

use rax_ftp_client::error::handlers::{handle_error, user_message};
use rax_ftp_client::{ClientConfig, Session, Shell};

#[tokio::main]
async fn main() {
    // Initialize the logger (env_logger picks up RUST_LOG environment variable)
    env_logger::init();

    let config = match ClientConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    info!("Connecting to {}...", config.control_addr());
    let mut session = Session::new(config);
    match session.connect().await {
        Ok(greeting) => println!("{}", greeting),
        Err(e) => {
            handle_error(&e);
            eprintln!("{}", user_message(&e));
            process::exit(1);
        }
    }

    let mut shell = Shell::new(session);
    let input = BufReader::new(tokio::io::stdin());
    let mut output = tokio::io::stdout();
    if let Err(e) = shell.run(input, &mut output).await {
        error!("Terminal I/O failed: {}", e);
    }
}
