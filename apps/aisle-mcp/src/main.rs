use clap::Parser;

use aisle_mcp::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	aisle_mcp::run(args).await
}
