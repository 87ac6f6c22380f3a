//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Report, Result, eyre};
use rhassistant_core::{Assistant, DEFAULT_HISTORY_LIMIT};
use rhassistant_shared::{
    AppConfig, AssistantError, Caller, HrDocument, Query, QueryType, Role, ValidationId, init_config,
    load_config, load_config_from,
};
use rhassistant_storage::Storage;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// rhassistant: the CDG HR question-answering assistant.
#[derive(Parser)]
#[command(
    name = "rhassistant",
    version,
    about = "Answer HR questions and review answers held for HR validation.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Identity of the caller.
    #[arg(long, default_value_t = 1, global = true, env = "RHASSISTANT_USER_ID")]
    pub user_id: i64,

    /// Role of the caller.
    #[arg(long, default_value = "user", global = true)]
    pub role: RoleArg,

    /// Config file to use instead of ~/.rhassistant/rhassistant.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum RoleArg {
    User,
    Admin,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::User => Role::User,
            RoleArg::Admin => Role::Admin,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Ask the assistant a question.
    Ask {
        /// The question, in French.
        text: String,

        /// Conversation session (a fresh one per call by default).
        #[arg(short, long)]
        session: Option<String>,

        /// User the query is asked for (defaults to --user-id).
        #[arg(long)]
        user: Option<i64>,

        /// Always route the answer to an HR expert.
        #[arg(long)]
        sensitive: bool,
    },

    /// List answers waiting for HR validation (admin).
    Pending,

    /// Approve or reject a pending answer (admin).
    Decide {
        /// Validation record ID.
        id: ValidationId,

        #[arg(long, conflicts_with = "reject", required_unless_present = "reject")]
        approve: bool,

        #[arg(long)]
        reject: bool,

        /// Note for the requester.
        #[arg(long)]
        feedback: Option<String>,
    },

    /// Show chat history, newest first.
    History {
        /// Whose history (defaults to --user-id; others require admin).
        #[arg(long)]
        user: Option<i64>,

        #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: u32,
    },

    /// Validation queue and usage counters (admin).
    Stats,

    /// Index a plain-text HR document (admin).
    Ingest {
        /// UTF-8 text file.
        file: PathBuf,

        #[arg(long)]
        title: String,

        #[arg(long)]
        category: String,

        /// Provenance shown as the answer source (defaults to the file name).
        #[arg(long)]
        source: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "rhassistant=info",
        1 => "rhassistant=debug",
        _ => "rhassistant=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so stdout stays pure JSON.
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let caller = Caller {
        user_id: cli.user_id,
        role: cli.role.into(),
    };
    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
        Command::Ask {
            text,
            session,
            user,
            sensitive,
        } => {
            let assistant = open_assistant(config_path).await?;
            let query_type = if sensitive {
                QueryType::Sensitive
            } else {
                QueryType::General
            };
            let session = session.unwrap_or_else(|| Uuid::now_v7().to_string());
            let query = Query::new(session, user.unwrap_or(caller.user_id), text, query_type);
            print_json(&assistant.handle_chat(&caller, &query).await?)
        }
        Command::Pending => {
            let assistant = open_assistant(config_path).await?;
            print_json(&assistant.list_pending_validations(&caller).await?)
        }
        Command::Decide {
            id,
            approve,
            reject: _,
            feedback,
        } => {
            let assistant = open_assistant(config_path).await?;
            let record = assistant
                .decide_validation(&caller, &id, approve, feedback)
                .await?;
            print_json(&record)
        }
        Command::History { user, limit } => {
            let assistant = open_assistant(config_path).await?;
            let user_id = user.unwrap_or(caller.user_id);
            print_json(&assistant.history(&caller, user_id, limit).await?)
        }
        Command::Stats => {
            let assistant = open_assistant(config_path).await?;
            print_json(&assistant.stats(&caller).await?)
        }
        Command::Ingest {
            file,
            title,
            category,
            source,
        } => {
            let assistant = open_assistant(config_path).await?;
            let doc = read_document(&file, title, category, source)?;
            print_json(&assistant.ingest_document(&caller, &doc).await?)
        }
    }
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Failures reported to the caller as a distinct result rather than a crash report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Refusal {
    ServiceUnavailable,
    NotFound,
    PermissionDenied,
}

impl Refusal {
    /// Classify a command failure; `None` for everything else.
    pub(crate) fn classify(report: &Report) -> Option<Self> {
        match report.downcast_ref::<AssistantError>()? {
            AssistantError::NotFound { .. } => Some(Self::NotFound),
            AssistantError::PermissionDenied(_) => Some(Self::PermissionDenied),
            e if e.is_service_unavailable() => Some(Self::ServiceUnavailable),
            _ => None,
        }
    }

    /// sysexits(3) codes.
    pub(crate) fn code(self) -> u8 {
        match self {
            Self::NotFound => 66,
            Self::ServiceUnavailable => 69,
            Self::PermissionDenied => 77,
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::ServiceUnavailable => "service unavailable",
            Self::NotFound => "not found",
            Self::PermissionDenied => "permission denied",
        }
    }
}

/// Print a refusal on stderr and turn it into its exit code; other failures stay reports.
pub(crate) fn report_outcome(result: Result<()>) -> Result<ExitCode> {
    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(report) => match Refusal::classify(&report) {
            Some(refusal) => {
                eprintln!("error ({}): {report}", refusal.label());
                Ok(ExitCode::from(refusal.code()))
            }
            None => Err(report),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    })
}

async fn open_assistant(config_path: Option<&Path>) -> Result<Assistant> {
    let config = resolve_config(config_path)?;
    let db_path = config.db_path()?;
    let storage = Arc::new(Storage::open(&db_path).await?);

    let purged = storage.purge_expired_cache().await?;
    if purged > 0 {
        debug!(purged, "dropped expired cache entries");
    }

    info!(db = %db_path.display(), "assistant ready");
    Ok(Assistant::from_config(&config, storage)?)
}

fn read_document(
    file: &Path,
    title: String,
    category: String,
    source: Option<String>,
) -> Result<HrDocument> {
    let content = std::fs::read_to_string(file)
        .map_err(|e| eyre!("cannot read '{}': {e}", file.display()))?;
    let source = match source {
        Some(s) => s,
        None => file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| eyre!("'{}' has no file name; pass --source", file.display()))?,
    };
    Ok(HrDocument {
        title,
        content,
        source,
        category,
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decide_requires_a_verdict() {
        let id = ValidationId::new().to_string();
        assert!(Cli::try_parse_from(["rhassistant", "decide", &id]).is_err());
        assert!(
            Cli::try_parse_from(["rhassistant", "decide", &id, "--approve", "--reject"]).is_err()
        );

        let cli = Cli::try_parse_from([
            "rhassistant",
            "--role",
            "admin",
            "decide",
            &id,
            "--reject",
            "--feedback",
            "Voir la note de service",
        ])
        .unwrap();
        match cli.command {
            Command::Decide {
                approve, feedback, ..
            } => {
                assert!(!approve);
                assert_eq!(feedback.as_deref(), Some("Voir la note de service"));
            }
            _ => panic!("expected decide"),
        }
    }

    #[test]
    fn refusals_map_to_distinct_exit_codes() {
        let cases = [
            (
                AssistantError::Storage("disk I/O error".into()),
                Refusal::ServiceUnavailable,
            ),
            (AssistantError::not_found(ValidationId::new()), Refusal::NotFound),
            (
                AssistantError::PermissionDenied("admin role required".into()),
                Refusal::PermissionDenied,
            ),
        ];
        let mut codes = Vec::new();
        for (error, expected) in cases {
            let report = Report::from(error);
            assert_eq!(Refusal::classify(&report), Some(expected));
            assert!(report_outcome(Err(report)).is_ok());
            codes.push(expected.code());
        }
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), 3);
        assert!(!codes.contains(&1));
    }

    #[test]
    fn other_failures_stay_reports() {
        let upstream = Report::from(AssistantError::Upstream("timeout".into()));
        assert_eq!(Refusal::classify(&upstream), None);
        assert!(report_outcome(Err(upstream)).is_err());
        assert!(report_outcome(Err(eyre!("cannot read file"))).is_err());
        assert!(report_outcome(Ok(())).is_ok());
    }

    #[test]
    fn malformed_validation_id_is_rejected() {
        assert!(Cli::try_parse_from(["rhassistant", "decide", "42", "--approve"]).is_err());
    }

    #[test]
    fn ask_flags() {
        let cli = Cli::try_parse_from([
            "rhassistant",
            "ask",
            "Ma pension ?",
            "--sensitive",
            "--user-id",
            "7",
        ])
        .unwrap();
        assert_eq!(cli.user_id, 7);
        assert!(matches!(cli.command, Command::Ask { sensitive: true, .. }));
    }

    #[test]
    fn ingest_source_defaults_to_file_name() {
        let path = std::env::temp_dir().join(format!("rha_doc_{}.txt", Uuid::now_v7()));
        std::fs::write(&path, "Télétravail deux jours par semaine.").unwrap();

        let doc = read_document(&path, "Charte".into(), "organisation".into(), None).unwrap();
        assert_eq!(
            doc.source,
            path.file_name().unwrap().to_string_lossy().as_ref()
        );
        assert!(doc.content.starts_with("Télétravail"));

        std::fs::remove_file(&path).ok();
    }
}
