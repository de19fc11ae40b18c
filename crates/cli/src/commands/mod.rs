pub mod config;
pub mod doctor;
pub mod migrate;
pub mod portfolio;
pub mod settle;
pub mod unread;

use std::future::Future;

use gigbook_core::config::LoadOptions;
use gigbook_core::errors::ApplicationError;
use gigbook_engine::{bootstrap, Application, BootstrapError};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            correlation_id: None,
            data: None,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn success_with(command: &str, message: impl Into<String>, data: &impl Serialize) -> Self {
        let data = match serde_json::to_value(data) {
            Ok(data) => data,
            Err(error) => {
                return Self::failure(command, "serialization", error.to_string(), 1);
            }
        };
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            correlation_id: None,
            data: Some(data),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            correlation_id: None,
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Maps an engine error through the interface taxonomy so the envelope
    /// carries the user-facing message and the request's correlation id.
    pub fn from_application_error(
        command: &str,
        error: ApplicationError,
        correlation_id: &str,
    ) -> Self {
        let detail = error.to_string();
        let interface = error.into_interface(correlation_id);
        let exit_code = match interface.class() {
            "bad_request" => 2,
            "not_found" => 7,
            "forbidden" => 8,
            "conflict" | "partially_applied" => 9,
            _ => 6,
        };
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(interface.class().to_string()),
            message: format!("{} ({detail})", interface.user_message()),
            correlation_id: Some(interface.correlation_id().to_string()),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn bootstrap_failure(command: &str, error: BootstrapError) -> CommandResult {
    let (error_class, exit_code) = match &error {
        BootstrapError::Config(_) | BootstrapError::Notifications(_) => ("config_validation", 2),
        BootstrapError::DatabaseConnect(_) => ("db_connectivity", 4),
        BootstrapError::Migration(_) => ("migration", 5),
    };
    CommandResult::failure(command, error_class, error.to_string(), exit_code)
}

/// Boots the application on a current-thread runtime and runs one engine
/// operation, rendering its result as the command's JSON envelope.
pub(crate) fn run_with_app<T, F, Fut>(
    command: &str,
    message: &str,
    operation: F,
) -> CommandResult
where
    T: Serialize,
    F: FnOnce(Application, String) -> Fut,
    Fut: Future<Output = Result<T, ApplicationError>>,
{
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    runtime.block_on(async {
        let app = match bootstrap(LoadOptions::default()).await {
            Ok(app) => app,
            Err(error) => return bootstrap_failure(command, error),
        };
        let pool = app.db_pool.clone();
        let correlation_id = Uuid::new_v4().to_string();

        let result = match operation(app, correlation_id.clone()).await {
            Ok(data) => CommandResult::success_with(command, message, &data),
            Err(error) => CommandResult::from_application_error(command, error, &correlation_id),
        };
        pool.close().await;
        result
    })
}
