use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = recall_worker::Args::parse();

	recall_worker::run(args).await
}
