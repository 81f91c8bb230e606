use clap::Parser;
use log::LevelFilter;
use minidrive::args::ClientArgs;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_level(LevelFilter::Warn)
        .parse_default_env()
        .init();

    let args = ClientArgs::parse();
    minidrive::client::run(args.endpoint).await
}
