use mediaflow_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let app = mediaflow_api::setup::initialize_app(config.clone()).await?;

    mediaflow_api::setup::server::start_server(&config, app.router).await?;

    app.cleanup_task.abort();
    Ok(())
}
