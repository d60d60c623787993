// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! OPC UA server for the digital factory tags.
//!
//! 1. Loads a configuration file, or uses the factory defaults
//! 2. Loads the tag manifest into the address space
//! 3. Optionally drives the tags with simulated values
//! 4. Serves clients until Ctrl-C
use std::path::PathBuf;

use log::{error, info};
use vbl_opcua::{
    core::config::Config,
    server::{constants, ServerConfig, ServerCore},
};

struct Args {
    help: bool,
    check: bool,
    simulate: bool,
    config: Option<PathBuf>,
    manifest: Option<PathBuf>,
    port: Option<u16>,
}

impl Args {
    pub fn parse_args() -> Result<Args, Box<dyn std::error::Error>> {
        let mut args = pico_args::Arguments::from_env();
        Ok(Args {
            help: args.contains(["-h", "--help"]),
            check: args.contains("--check"),
            simulate: args.contains("--simulate"),
            config: args.opt_value_from_str("--config")?,
            manifest: args.opt_value_from_str("--manifest")?,
            port: args.opt_value_from_str("--port")?,
        })
    }

    pub fn usage() {
        println!(
            r#"VBL Digital Factory OPC UA Server
Usage:
  -h, --help           Show help
  --config [path]      Server configuration file (default: built in factory settings)
  --manifest [path]    Tag manifest to load into the address space
  --port [port]        Port to listen on (default: {})
  --simulate           Drive the tags with simulated values
  --check              Build the server without binding, then exit"#,
            constants::DEFAULT_PORT
        );
    }
}

fn server_config(args: &Args) -> Result<ServerConfig, ()> {
    let mut config = match args.config {
        Some(ref path) => ServerConfig::load(path)?,
        None => ServerConfig::factory(),
    };
    if let Some(port) = args.port {
        config.tcp_config.port = port;
        config.discovery_urls = vec![format!(
            "{}{}",
            config.base_endpoint_url(),
            constants::ENDPOINT_PATH
        )];
    }
    if args.manifest.is_some() {
        config.tag_manifest = args.manifest.clone();
    }
    if args.simulate {
        config.simulation.enabled = true;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), ()> {
    let args = Args::parse_args().map_err(|_| Args::usage())?;
    if args.help {
        Args::usage();
        return Ok(());
    }

    vbl_opcua::console_logging::init();

    let config = server_config(&args)?;
    let (server, handle) = ServerCore::new(config).map_err(|e| error!("{}", e))?;
    if args.check {
        info!(
            "Server check passed, {} tag variables",
            server.tag_variables().len()
        );
        return Ok(());
    }

    let token = handle.token().clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, stopping the server");
                token.cancel();
            }
            Err(e) => error!("Cannot listen for Ctrl-C: {}", e),
        }
    });

    server.run().await.map_err(|e| error!("{}", e))
}
