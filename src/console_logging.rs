// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Console logger for the server binary. Filtering is taken from `RUST_OPCUA_LOG` rather
//! than `RUST_LOG` so output of other tools does not end up on the console.

use std::{env, io::Write};

/// White on red
const ANSI_ERROR: &str = "\x1b[37m\x1b[41m";
/// Yellow on black
const ANSI_WARN: &str = "\x1b[33m";
/// Blue on black
const ANSI_INFO: &str = "\x1b[36m";
/// Reset code
const ANSI_RESET: &str = "\x1b[0m";

/// Environment variable holding the log filters, e.g. `vbl_opcua=debug`
pub const LOG_FILTER_VAR: &str = "RUST_OPCUA_LOG";

pub fn init() {
    let filters = env::var(LOG_FILTER_VAR).unwrap_or_else(|_| "info".to_string());

    let mut builder = env_logger::Builder::new();
    builder.format(|buf, record| {
        let time_fmt = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let module_path = record.module_path().unwrap_or("");
        let colour = match record.level() {
            log::Level::Error => Some(ANSI_ERROR),
            log::Level::Warn => Some(ANSI_WARN),
            log::Level::Info => Some(ANSI_INFO),
            _ => None,
        };
        match colour {
            Some(colour) => writeln!(
                buf,
                "{} - {}{}{} - {} - {}",
                time_fmt,
                colour,
                record.level(),
                ANSI_RESET,
                module_path,
                record.args()
            ),
            None => writeln!(
                buf,
                "{} - {} - {} - {}",
                time_fmt,
                record.level(),
                module_path,
                record.args()
            ),
        }
    });
    builder.parse_filters(&filters);

    match builder.try_init() {
        Ok(()) => info!(
            "Logging is enabled, use {} environment variable to control filtering, logging level",
            LOG_FILTER_VAR
        ),
        Err(e) => eprintln!("Logger error, check error = {}", e),
    }
}
