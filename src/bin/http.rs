#[cfg(feature = "http_api")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use due_date_scheduler::{ServerConfig, http_api};
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).compact().init();

    let config = ServerConfig::from_env()?;
    let board = config.load_board()?;
    let mut state = http_api::AppState::new(board);

    #[cfg(feature = "sqlite")]
    if let Some(path) = &config.store_path {
        let store = due_date_scheduler::SqliteBoardStore::new(path)?;
        state = state.with_store(std::sync::Arc::new(store));
    }

    http_api::serve(config.http_addr, state).await?;
    Ok(())
}

#[cfg(not(feature = "http_api"))]
fn main() {
    eprintln!("Rebuild with the `http_api` feature to enable the HTTP server.");
}
