//! Background removal API server

use bgremove_api::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}
