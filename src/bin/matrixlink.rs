use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use matrixlink::{
    setup_console_tracing, setup_tracing, AppResult, LinkConfig, Message, MessageType, Server,
    TokioHost,
};
use tokio::{runtime, signal};
use tracing::info;

#[derive(Parser)]
#[command(version)]
pub struct CommandLine {
    /// path to config file
    #[arg(short, long)]
    pub conf: Option<String>,
    #[command(subcommand)]
    pub command: Option<Command>,
    /// log level (v: info, vv: debug, vvv: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    PrintConfig,
    /// connect, send one message and report the queues
    Send {
        /// header block
        #[arg(long)]
        request: String,
        /// optional body written after the header
        #[arg(long)]
        payload: Option<String>,
        #[arg(long = "type", default_value = "send")]
        message_type: MessageType,
    },
}

fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

async fn send_one(config: LinkConfig, message: Message) -> AppResult<()> {
    let host = Arc::new(TokioHost::new()?);
    let mut server = Server::from_config(&config, host);

    server.connect()?;
    server.wait_connected().await?;
    server.send_or_queue(message).await;

    info!(
        server = server.name(),
        pending = server.send_queue().len(),
        received = server.receive_queue().len(),
        "send finished"
    );
    server.disconnect().await;
    Ok(())
}

fn main() -> AppResult<()> {
    dotenv().ok();

    let commandline: CommandLine = CommandLine::parse();
    let config_path = commandline.conf.as_ref().map_or_else(
        || {
            let mut path = PathBuf::from("./");
            path.push("conf.toml");
            path
        },
        PathBuf::from,
    );
    let config = LinkConfig::set_up_config(config_path)?;

    let level = log_level(commandline.verbose);
    let _log_guard = if config.general.log_dir.is_empty() {
        setup_console_tracing(level)?;
        None
    } else {
        Some(setup_tracing(&config.general.log_dir, level)?)
    };

    match commandline.command {
        Some(Command::PrintConfig) | None => {
            let mut printable = config;
            if !printable.server.password.is_empty() {
                printable.server.password = "********".to_string();
            }
            println!("{:#?}", printable);
            Ok(())
        }
        Some(Command::Send {
            request,
            payload,
            message_type,
        }) => {
            let mut message = Message::new(message_type, request);
            if let Some(payload) = payload {
                message = message.with_payload(payload);
            }
            let rt = runtime::Builder::new_current_thread().enable_all().build()?;
            rt.block_on(async {
                tokio::select! {
                    result = send_one(config, message) => result,
                    _ = signal::ctrl_c() => {
                        info!("interrupted, giving up");
                        Ok(())
                    }
                }
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_selects_directive() {
        let parse = |args: &[&str]| log_level(CommandLine::parse_from(args).verbose);
        assert_eq!(parse(&["matrixlink"]), "warn");
        assert_eq!(parse(&["matrixlink", "-v"]), "info");
        assert_eq!(parse(&["matrixlink", "-vv", "print-config"]), "debug");
        assert_eq!(parse(&["matrixlink", "-vvvv"]), "trace");
    }
}
