pub mod config;
pub mod migrate;
pub mod pending;
pub mod seed;
pub mod show;
pub mod workflow;

use clap::Args;
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Runtime;
use uuid::Uuid;

use tripflow_core::audit::TracingAuditSink;
use tripflow_core::config::{AppConfig, LoadOptions};
use tripflow_core::domain::employee::ActingUser;
use tripflow_core::errors::ApplicationError;
use tripflow_core::flows::ApprovalEngine;
use tripflow_core::service::WorkflowService;
use tripflow_db::{
    connect_with_settings, migrations, DbPool, SqlDirectory, SqlWorkflowRecordStore,
};

pub type CliService = WorkflowService<SqlWorkflowRecordStore, SqlDirectory, TracingAuditSink>;

/// Identity flags shared by every command that acts on a record.
#[derive(Debug, Clone, Args)]
pub struct ActorArgs {
    #[arg(long, help = "Employee id of the acting user")]
    pub actor: String,
    #[arg(long, help = "Login id of the acting user (defaults to the employee id)")]
    pub user: Option<String>,
    #[arg(long, help = "Correlation id for logs and audit events (defaults to a new UUID)")]
    pub correlation_id: Option<String>,
}

impl ActorArgs {
    pub fn new(actor: impl Into<String>) -> Self {
        Self { actor: actor.into(), user: None, correlation_id: None }
    }

    pub fn acting_user(&self) -> ActingUser {
        let user_id = self.user.clone().unwrap_or_else(|| self.actor.clone());
        ActingUser::employee(user_id, self.actor.clone())
    }

    pub fn correlation_id(&self) -> String {
        self.correlation_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string())
    }
}

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
        Self::success_with_data(command, message, None, Value::Null)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        correlation_id: Option<String>,
        data: Value,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            correlation_id,
            data: (!data.is_null()).then_some(data),
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

    /// Workflow failures keep the technical detail in `message` and add the
    /// operator-facing hint under `data.user_message`.
    pub fn from_application_error(
        command: &str,
        error: ApplicationError,
        correlation_id: &str,
    ) -> Self {
        let error_class = error.class();
        let exit_code = exit_code_for(error_class);
        let message = error.to_string();
        let interface = error.into_interface(correlation_id);

        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message,
            correlation_id: Some(correlation_id.to_string()),
            data: Some(serde_json::json!({ "user_message": interface.user_message() })),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn exit_code_for(error_class: &str) -> u8 {
    match error_class {
        "not_found" => 10,
        "validation" => 11,
        "invalid_state" => 12,
        "unauthorized" => 13,
        "conflict" => 14,
        "persistence" => 15,
        _ => 16,
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

/// Why a command stopped: either the plumbing around the workflow (config,
/// runtime, database) or the workflow itself refused the action.
#[derive(Debug)]
pub enum CommandFailure {
    Setup { error_class: &'static str, message: String, exit_code: u8 },
    Application(ApplicationError),
}

impl CommandFailure {
    pub fn setup(error_class: &'static str, message: impl Into<String>, exit_code: u8) -> Self {
        Self::Setup { error_class, message: message.into(), exit_code }
    }

    pub fn into_result(self, command: &str, correlation_id: &str) -> CommandResult {
        match self {
            Self::Setup { error_class, message, exit_code } => {
                CommandResult::failure(command, error_class, message, exit_code)
            }
            Self::Application(error) => {
                CommandResult::from_application_error(command, error, correlation_id)
            }
        }
    }
}

impl From<ApplicationError> for CommandFailure {
    fn from(value: ApplicationError) -> Self {
        Self::Application(value)
    }
}

pub fn load_config() -> Result<AppConfig, CommandFailure> {
    AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandFailure::setup("config_validation", format!("configuration issue: {error}"), 2)
    })
}

pub fn build_runtime() -> Result<Runtime, CommandFailure> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandFailure::setup(
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}

/// Connects and brings the schema up to date; every record command can run
/// against a fresh database file.
pub async fn open_pool(config: &AppConfig) -> Result<DbPool, CommandFailure> {
    let pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(|error| CommandFailure::setup("db_connectivity", error.to_string(), 4))?;
    migrations::run_pending(&pool)
        .await
        .map_err(|error| CommandFailure::setup("migration", error.to_string(), 5))?;
    Ok(pool)
}

pub fn workflow_service(pool: DbPool, config: &AppConfig) -> CliService {
    WorkflowService::with_audit(
        SqlWorkflowRecordStore::new(pool.clone()),
        SqlDirectory::new(pool),
        TracingAuditSink,
        ApprovalEngine::with_config(config.engine_config()),
    )
}
