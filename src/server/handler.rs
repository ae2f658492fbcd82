//! Command handlers for the front-end

use super::Server;
use crate::protocol::{Command, ResponseWriter};
use crate::record::parse_cache_key;
use std::borrow::Cow;

/// Execute a parsed command
pub async fn execute(server: &Server, cmd: Command<'_>, response: &mut ResponseWriter) {
    match cmd {
        Command::Get { keys } => {
            server.metrics.cmd_get.inc();
            handle_get(server, &keys, response).await;
        }
        Command::Version => {
            handle_version(response);
        }
        Command::Stats => {
            handle_stats(server, response);
        }
        Command::Quit => {
            // Handled in connection loop
        }
    }
}

fn handle_version(response: &mut ResponseWriter) {
    response.version(concat!("readthrough ", env!("CARGO_PKG_VERSION")));
}

/// Resolve every key in order; any failure fails the whole command
async fn handle_get(server: &Server, keys: &[Cow<'_, [u8]>], response: &mut ResponseWriter) {
    let mut ids = Vec::with_capacity(keys.len());
    for key in keys {
        match parse_cache_key(key) {
            Some(id) => ids.push(id),
            None => {
                server.metrics.protocol_errors.inc();
                response.client_error(&format!(
                    "not a post key: {}",
                    String::from_utf8_lossy(key)
                ));
                return;
            }
        }
    }

    let mut values = Vec::with_capacity(ids.len());
    for id in ids {
        let resolution = match server.resolver.resolve(id).await {
            Ok(resolution) => resolution,
            Err(e) => {
                response.server_error(&single_line(&e.to_string()));
                return;
            }
        };
        match resolution.record.to_json() {
            Ok(json) => values.push(json),
            Err(e) => {
                response.server_error(&single_line(&e.to_string()));
                return;
            }
        }
    }

    for (key, json) in keys.iter().zip(&values) {
        response.value(key, 0, json);
    }
    response.end();
}

fn handle_stats(server: &Server, response: &mut ResponseWriter) {
    let metrics = &server.metrics;
    response.stat("cmd_get", metrics.cmd_get.get());
    response.stat("cache_hits", metrics.cache_hits.get());
    response.stat("durable_hits", metrics.durable_hits.get());
    response.stat("origin_hits", metrics.origin_hits.get());
    response.stat("durable_conflicts", metrics.durable_conflicts.get());
    response.stat("resolve_failures", metrics.failures());
    response.stat(
        "curr_connections",
        metrics.active_connections.get().max(0) as u64,
    );
    response.stat("total_connections", metrics.total_connections.get());
    response.stat("bytes_read", metrics.bytes_read.get());
    response.stat("bytes_written", metrics.bytes_written.get());
    response.end();
}

fn single_line(message: &str) -> String {
    message.replace(['\r', '\n'], " ")
}
