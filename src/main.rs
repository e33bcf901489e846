#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    ragchat::logging::init();
    ragchat::run().await
}
