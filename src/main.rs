#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = alphabet_mastery_api::run().await {
        eprintln!("alphabet-mastery-api fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
