//! Connection handling for individual client connections

use super::Server;
use super::handler;
use crate::protocol::parser::find_crlf;
use crate::protocol::{Command, ParseResult, ResponseWriter, parse};
use bytes::BytesMut;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::OwnedSemaphorePermit;
use tracing::debug;

/// Handle a single client connection
pub async fn handle(
    server: Arc<Server>,
    mut stream: TcpStream,
    _permit: OwnedSemaphorePermit,
) -> anyhow::Result<()> {
    let result = serve(&server, &mut stream).await;
    server.metrics.active_connections.dec();
    result
}

async fn serve(server: &Server, stream: &mut TcpStream) -> anyhow::Result<()> {
    let mut read_buf = BytesMut::with_capacity(server.config.read_buffer_size);
    let mut response = ResponseWriter::new(server.config.write_buffer_size);

    loop {
        tokio::select! {
            _ = server.cancel_token.cancelled() => {
                break;
            }
            result = stream.read_buf(&mut read_buf) => {
                match result {
                    Ok(0) => {
                        // Connection closed
                        break;
                    }
                    Ok(n) => {
                        server.metrics.bytes_read.inc_by(n as u64);

                        // Process all complete commands in the buffer
                        loop {
                            let parse_result = parse(&read_buf);

                            match parse_result {
                                ParseResult::Complete(cmd, consumed) => {
                                    let should_quit = matches!(cmd, Command::Quit);

                                    handler::execute(server, cmd, &mut response).await;
                                    let _ = read_buf.split_to(consumed);

                                    if !response.is_empty() {
                                        let buf = response.take();
                                        server.metrics.bytes_written.inc_by(buf.len() as u64);
                                        stream.write_all(&buf).await?;
                                    }
                                    response.clear();

                                    if should_quit {
                                        return Ok(());
                                    }
                                }
                                ParseResult::NeedMoreData => break,
                                ParseResult::Error(e) => {
                                    server.metrics.protocol_errors.inc();
                                    response.client_error(&e.to_string());

                                    // Skip the offending line and keep going
                                    match find_crlf(&read_buf) {
                                        Some(pos) => {
                                            let _ = read_buf.split_to(pos + 2);
                                        }
                                        None => read_buf.clear(),
                                    }

                                    let buf = response.take();
                                    server.metrics.bytes_written.inc_by(buf.len() as u64);
                                    stream.write_all(&buf).await?;
                                    response.clear();
                                }
                            }
                        }
                    }
                    Err(e) => {
                        debug!("Read error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}
