use gigbook_core::config::LoadOptions;
use gigbook_engine::bootstrap;

use crate::commands::{bootstrap_failure, CommandResult};

/// Bootstrapping applies pending migrations, so a successful bootstrap is a
/// successful migrate.
pub fn run() -> CommandResult {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    runtime.block_on(async {
        match bootstrap(LoadOptions::default()).await {
            Ok(app) => {
                app.db_pool.close().await;
                CommandResult::success("migrate", "applied pending migrations")
            }
            Err(error) => bootstrap_failure("migrate", error),
        }
    })
}
