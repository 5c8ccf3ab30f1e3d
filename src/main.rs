use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = authgate::cli::Cli::parse();
    if let Err(e) = authgate::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
