use queue_storage_demo::{run_cli, DemoError};
use tracing::error;

#[tokio::main]
async fn main() {
    if let Err(e) = run_cli().await {
        error!("Demo failed: {}", e);

        let exit_code = match e {
            DemoError::Configuration(_) => 1,
            DemoError::Storage(_) => 2,
            DemoError::StepFailed { .. } => 3,
            DemoError::Io(_) | DemoError::Json(_) => 5,
        };

        std::process::exit(exit_code);
    }
}
