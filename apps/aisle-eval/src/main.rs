// crates.io
use clap::Parser;
// self
use aisle_eval::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = Args::parse();
	aisle_eval::run(args).await
}
