//! Server command implementation

use std::path::Path;

use anyhow::Result;
use tally_server::{AppState, ServerConfig};

use super::open_service;

pub async fn cmd_serve(
    db_path: &Path,
    config_path: Option<&Path>,
    host: &str,
    port: u16,
    allowed_origins: Vec<String>,
) -> Result<()> {
    println!("🚀 Starting Tally API server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);
    if allowed_origins.is_empty() {
        println!("   CORS: same-origin only");
    } else {
        println!("   CORS origins: {}", allowed_origins.join(", "));
    }
    println!("   Tenant header: {}", tally_server::USER_ID_HEADER);
    println!();
    println!("   Press Ctrl+C to stop");

    let service = open_service(db_path, config_path)?;
    let state = AppState::new(service, ServerConfig { allowed_origins });

    tally_server::serve(state, host, port).await
}
