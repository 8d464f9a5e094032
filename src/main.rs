/// Version injected at compile time via ZPACTL_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("ZPACTL_VERSION") {
    Some(v) => v,
    None => "dev",
};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use serde_json::{json, Map, Value};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use zpactl::config::Settings;
use zpactl::resource::get_all_kinds;
use zpactl::zpa::auth::Credentials;
use zpactl::zpa::http::status_hint;
use zpactl::{Operation, Verb, ZpaError};

/// Bring a ZPA resource or policy rule to a desired state
#[derive(Parser, Debug)]
#[command(name = "zpactl", version, about, long_about = None)]
struct Args {
    /// Resource kind, e.g. segment_group or policy_access_rule
    #[arg(required_unless_present = "list_kinds")]
    kind: Option<String>,

    /// Desired state of the resource
    #[arg(short, long, value_enum, default_value = "present")]
    state: State,

    /// Desired fields as a JSON or YAML file ("-" reads stdin)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Single desired field, KEY=VALUE; VALUE is parsed as JSON when possible
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,

    /// Settings file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// API root, overrides the settings file and ZPA_BASE_URL
    #[arg(long)]
    base_url: Option<String>,

    /// Print the supported kinds and exit
    #[arg(long)]
    list_kinds: bool,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum State {
    Present,
    Absent,
    Query,
}

impl From<State> for Verb {
    fn from(state: State) -> Self {
        match state {
            State::Present => Verb::Present,
            State::Absent => Verb::Absent,
            State::Query => Verb::Query,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Logging disabled, cannot open {}: {}", log_path.display(), e);
            return None;
        },
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    let filter = log_filter(tracing_level, std::env::var("ZPACTL_LOG").ok().as_deref());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("zpactl {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

/// `ZPACTL_LOG` overrides --log-level
fn log_filter(level: Level, directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(level.to_string()))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("zpactl").join("zpactl.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".zpactl").join("zpactl.log");
    }
    PathBuf::from("zpactl.log")
}

/// JSON first, YAML as the fallback
fn parse_document(content: &str) -> Result<Value> {
    if let Ok(value) = serde_json::from_str(content) {
        return Ok(value);
    }
    serde_yaml::from_str(content).context("Input is neither JSON nor YAML")
}

fn load_desired(input: Option<&Path>, sets: &[String]) -> Result<Value> {
    let mut desired = match input {
        Some(path) if path == Path::new("-") => {
            let mut content = String::new();
            std::io::stdin()
                .read_to_string(&mut content)
                .context("Failed to read desired state from stdin")?;
            parse_document(&content)?
        },
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            parse_document(&content)?
        },
        None => Value::Object(Map::new()),
    };

    if desired.is_null() {
        desired = Value::Object(Map::new());
    }
    let Value::Object(fields) = &mut desired else {
        bail!("Desired state must be a mapping of fields");
    };

    for assignment in sets {
        let Some((key, raw)) = assignment.split_once('=') else {
            bail!("--set expects KEY=VALUE, got {assignment:?}");
        };
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        fields.insert(key.trim().to_string(), value);
    }

    Ok(desired)
}

fn load_settings(args: &Args) -> Result<Settings> {
    let settings = match &args.config {
        Some(path) => Settings::load_from(path).with_context(|| format!("Failed to load {}", path.display()))?,
        None => Settings::load(),
    };
    let mut settings = settings.with_env();
    if let Some(url) = &args.base_url {
        settings.base_url = url.clone();
    }
    Ok(settings)
}

fn failure(err: &ZpaError) -> Value {
    let mut report = json!({"failed": true, "msg": err.to_string()});
    if let Some(hint) = err.status().and_then(status_hint) {
        report["hint"] = json!(hint);
    }
    report
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    if args.list_kinds {
        for kind in get_all_kinds() {
            println!("{kind}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let _log_guard = setup_logging(args.log_level);

    let Some(kind) = args.kind.as_deref() else {
        bail!("A resource kind is required");
    };
    let settings = load_settings(&args)?;
    let desired = load_desired(args.input.as_deref(), &args.set)?;
    let credentials = Credentials::from_env()?;

    let operation = Operation::new(credentials, kind, desired, args.state.into());

    match operation.run(&settings).await {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(ExitCode::SUCCESS)
        },
        Err(err) => {
            tracing::error!("{} {} failed: {}", kind, operation.verb, err);
            println!("{}", serde_json::to_string_pretty(&failure(&err))?);
            Ok(ExitCode::FAILURE)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_document_json_and_yaml() {
        assert_eq!(parse_document(r#"{"name": "G1"}"#).unwrap(), json!({"name": "G1"}));
        assert_eq!(
            parse_document("name: G1\nenabled: true\n").unwrap(),
            json!({"name": "G1", "enabled": true})
        );
    }

    #[test]
    fn test_set_values_parse_as_json_when_possible() {
        let sets = vec![
            "name=G1".to_string(),
            "enabled=true".to_string(),
            "rule_order=2".to_string(),
            "domain_names=[\"a.example.com\"]".to_string(),
        ];
        assert_eq!(
            load_desired(None, &sets).unwrap(),
            json!({"name": "G1", "enabled": true, "rule_order": 2, "domain_names": ["a.example.com"]})
        );
    }

    #[test]
    fn test_set_requires_equals() {
        assert!(load_desired(None, &["name".to_string()]).is_err());
    }

    #[test]
    fn test_log_filter_override() {
        use tracing_subscriber::filter::LevelFilter;

        assert_eq!(log_filter(Level::WARN, None).max_level_hint(), Some(LevelFilter::WARN));
        assert_eq!(
            log_filter(Level::WARN, Some("zpactl=trace")).max_level_hint(),
            Some(LevelFilter::TRACE)
        );
        // unparseable override falls back to the flag
        assert_eq!(
            log_filter(Level::INFO, Some("zpactl=loud")).max_level_hint(),
            Some(LevelFilter::INFO)
        );
    }

    #[test]
    fn test_failure_report_carries_hint() {
        let err = ZpaError::FatalHttp {
            operation: "GET".into(),
            path: "/mgmtconfig/v1/admin/customers/7200/segmentGroup".into(),
            status: Some(401),
            body: "{}".into(),
        };
        let report = failure(&err);
        assert_eq!(report["failed"], json!(true));
        assert!(report.get("hint").is_some());
    }
}
