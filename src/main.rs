#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use ndn_node::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    simple_logger::init_with_level(config.log_level.as_level())?;
    ndn_node::startup(config).await
}
