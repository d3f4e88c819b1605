use crate::cli::Commands;
use anyhow::Result;

pub mod exec;
pub mod health;
pub mod namespaces;
pub mod serve;
pub mod validate;

/// Dispatch command to appropriate handler
pub async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Serve {
            interface,
            config,
            client_ip,
            dns,
            netns,
            max_restarts,
        } => {
            let args = serve::ServeArgs {
                interface,
                config,
                client_ip,
                dns,
                netns,
                max_restarts,
            };
            serve::execute(args).await
        }

        Commands::Validate { path } => validate::execute(&path),

        Commands::Namespaces { pid, json } => namespaces::execute(pid, json),

        Commands::Exec { netns, command } => exec::execute(&netns, &command),

        Commands::Health => health::execute(),
    }
}
