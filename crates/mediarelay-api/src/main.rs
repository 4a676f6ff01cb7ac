use mediarelay_api::setup;
use mediarelay_core::RelayConfig;

// Use mimalloc as the global allocator for lower fragmentation under many
// concurrent streaming bodies, especially on musl-based container images.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = RelayConfig::from_env()?;

    let (_state, router) = setup::initialize_app(config.clone()).await?;

    setup::server::start_server(&config, router).await?;

    Ok(())
}
