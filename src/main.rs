// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>
// Patent Pending — DE Gebrauchsmuster, filed 2026-02-23

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use frameproxy::config::Config;
use frameproxy::gateway;
use frameproxy::proxy::codec;

/// `frameproxy` - embed any site in an iframe.
#[derive(Parser, Debug)]
#[command(name = "frameproxy")]
#[command(version)]
#[command(about = "Transparent web proxy with in-flight HTML rewriting.", long_about = None)]
struct Cli {
    /// Config file (default: platform config dir/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the proxy gateway
    Serve {
        /// Address to bind (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the proxy token and path for a URL
    Encode {
        /// Absolute http(s) URL
        url: String,
    },

    /// Print the URL a proxy token stands for
    Decode {
        /// Token as it appears after the proxy prefix
        token: String,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "frameproxy=debug,tower_http=debug" } else { "frameproxy=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Serve { host, port } => {
            let mut config = Config::load(cli.config.as_deref())?;
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            gateway::run_gateway(config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Encode { url } => {
            let config = Config::load(cli.config.as_deref())?;
            let target = frameproxy::proxy::ProxyTarget::parse(&url)?;
            let token = codec::encode(target.url().as_str());
            println!("{token}");
            println!("{}", codec::proxy_path(&config.proxy.prefix, target.url().as_str()));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Decode { token } => match codec::decode(&token) {
            Ok(url) => {
                println!("{url}");
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                eprintln!("❌ {e}");
                Ok(ExitCode::FAILURE)
            }
        },
    }
}
