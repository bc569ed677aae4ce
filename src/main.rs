//! meterbox CLI entry point.

use meterbox::cli::{self, Cli};
use meterbox::core::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse_args();

    // Execute the command
    cli::execute(cli).await
}
