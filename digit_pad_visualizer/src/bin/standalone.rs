use digit_pad_visualizer::{ServerConfig, start_server};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Bind address, model path and pad overrides from env
    let cfg = ServerConfig::from_env()?;
    if cfg.model_path.is_none() {
        tracing::warn!("DIGIT_PAD_MODEL is unset; predictions will report the model as unavailable");
    }

    let handle = start_server(cfg).await?;
    // Park forever
    handle.await.ok();
    Ok(())
}
