//! protoc-gen-rust-rpc - A protoc plugin for generating Rust messages and RPC stubs
//!
//! This binary reads a CodeGeneratorRequest from stdin and writes a
//! CodeGeneratorResponse to stdout, following the protoc plugin protocol.

use prost::Message;
use prost_types::compiler::CodeGeneratorResponse;
use std::io::{self, Read, Write};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter (stderr only)
const LOG_ENV: &str = "PROTOC_GEN_RUST_RPC_LOG";

fn main() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            tracing::error!(error = %e, "failed to exchange plugin messages");
            std::process::exit(1);
        }
    }
}

/// Returns `Ok(false)` when generation failed and an error response was written.
fn run() -> Result<bool, Box<dyn std::error::Error>> {
    // Read raw bytes from stdin
    let mut buf = Vec::new();
    io::stdin().read_to_end(&mut buf)?;

    let (response, ok) = match protoc_gen_rust_rpc::generate_from_bytes(&buf) {
        Ok(response) => (response, true),
        Err(e) => {
            tracing::error!(error = %e, "generation failed");
            let response = CodeGeneratorResponse {
                error: Some(e.to_string()),
                ..Default::default()
            };
            (response, false)
        }
    };

    tracing::debug!(files = response.file.len(), "writing response");
    for f in &response.file {
        tracing::trace!(name = f.name.as_deref().unwrap_or("<unnamed>"), "generated");
    }

    // Write CodeGeneratorResponse to stdout
    let mut out = Vec::new();
    response.encode(&mut out)?;
    io::stdout().write_all(&out)?;

    Ok(ok)
}
