use etf_data_mcp::{
    build_app,
    config::{Config, Transport},
    db::{etfs::EtfStore, users::UserStore},
    logging, stdio, AppState,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let config = Config::from_env()?;

    let users = UserStore::open(&config.users_db_path).await?;
    let etfs = EtfStore::open(&config.etf_db_path).await?;
    info!(
        users_db = %config.users_db_path.display(),
        etf_db = %config.etf_db_path.display(),
        "databases ready"
    );

    let state = AppState::new(config.api_token.clone(), users, etfs);

    match config.transport {
        Transport::Stdio => stdio::serve(state).await?,
        Transport::Http => {
            let bind_socket = config.bind_socket()?;
            let app = build_app(state);
            let listener = tokio::net::TcpListener::bind(bind_socket).await?;

            info!(
                bind_addr = %config.bind_addr,
                bind_port = config.bind_port,
                "server starting"
            );

            axum::serve(listener, app.into_make_service()).await?;
        }
    }

    Ok(())
}
