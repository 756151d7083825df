pub mod commands;
pub mod config;
pub mod forwarding;
pub mod node;
pub mod registry;
pub mod server;
pub mod topology;

use tokio::io::{AsyncBufReadExt, BufReader};

use self::{config::Config, node::Node};

/// Bring a node up and drive it from stdin until it exits.
///
/// Split out of `main` so integration tests can start a node and feed it
/// commands directly through its handle instead of a terminal.
pub async fn startup(config: Config) -> anyhow::Result<()> {
    let (node, handle) = Node::bind(&config).await?;

    // Stdin closing drops the handle, which the event loop treats as exit.
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if !handle.command(&line) {
                break;
            }
        }
    });

    node.run().await
}
