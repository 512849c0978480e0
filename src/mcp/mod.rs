mod hints;
mod params;
mod server;

use std::path::PathBuf;

use rmcp::transport::stdio;

pub use server::AtlasServer;

/// Serve the code-atlas tools over stdio until the client disconnects.
pub async fn run(project_root: PathBuf) -> anyhow::Result<()> {
    let service = AtlasServer::new(project_root);
    let server = rmcp::serve_server(service, stdio()).await?;
    server.waiting().await?;
    Ok(())
}
