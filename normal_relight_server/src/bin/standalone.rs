use normal_relight_server::{init_tracing, start_server, AppState, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("normal_relight=info,normal_relight_server=info");

    let cfg = ServerConfig::from_env();
    let state = AppState::new(cfg.bus_capacity);
    let handle = start_server(state, &cfg).await?;

    // Park until interrupted.
    tokio::signal::ctrl_c().await?;
    handle.shutdown().await
}
