use stagehand::ui::output;

#[tokio::main]
async fn main() {
    if let Err(err) = stagehand::cli::run().await {
        output::error(format!("{:#}", err));
        std::process::exit(1);
    }
}
