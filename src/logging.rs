use std::env;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};

const DEFAULT_LOG_FILTER: &str = "warn,ragchat=info";
const DEFAULT_LOG_FILE_PATH: &str = "logs/ragchat.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

type InitResult = Result<(), Box<dyn std::error::Error + Send + Sync + 'static>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LogOutput {
    Stderr,
    File,
    Both,
}

impl LogOutput {
    fn as_str(self) -> &'static str {
        match self {
            Self::Stderr => "stderr",
            Self::File => "file",
            Self::Both => "both",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct LogSettings {
    format: LogFormat,
    output: LogOutput,
    file_path: PathBuf,
}

impl LogSettings {
    fn from_env_with(mut get_var: impl FnMut(&str) -> Option<String>) -> Self {
        let format = match lowercase(get_var("LOG_FORMAT")).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };
        let output = match lowercase(get_var("LOG_OUTPUT")).as_deref() {
            Some("file") => LogOutput::File,
            Some("both") => LogOutput::Both,
            _ => LogOutput::Stderr,
        };
        let file_path = get_var("LOG_FILE_PATH")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE_PATH));

        Self {
            format,
            output,
            file_path,
        }
    }
}

fn lowercase(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_ascii_lowercase())
}

fn rolling_file_writer(path: &Path) -> std::io::Result<(NonBlocking, WorkerGuard)> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| OsStr::new("ragchat.log"));

    fs::create_dir_all(dir)?;
    Ok(tracing_appender::non_blocking(
        tracing_appender::rolling::daily(dir, file_name),
    ))
}

fn install(format: LogFormat, writer: BoxMakeWriter) -> InitResult {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer);
    match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
}

fn init_with(settings: &LogSettings) -> InitResult {
    if settings.output == LogOutput::Stderr {
        return install(settings.format, BoxMakeWriter::new(std::io::stderr));
    }

    let (file_writer, guard) = match rolling_file_writer(&settings.file_path) {
        Ok(pair) => pair,
        Err(err) => {
            let fallback = match settings.output {
                LogOutput::Both => "using stderr only",
                _ => "using stderr instead",
            };
            eprintln!(
                "ragchat: failed to initialize LOG_OUTPUT={} at '{}': {}; {}",
                settings.output.as_str(),
                settings.file_path.display(),
                err,
                fallback
            );
            return install(settings.format, BoxMakeWriter::new(std::io::stderr));
        }
    };

    let writer = match settings.output {
        LogOutput::Both => BoxMakeWriter::new(std::io::stderr.and(file_writer)),
        _ => BoxMakeWriter::new(file_writer),
    };
    let result = install(settings.format, writer);
    if result.is_ok() {
        let _ = LOG_GUARD.set(guard);
    }
    result
}

pub fn init() {
    let settings = LogSettings::from_env_with(|key| env::var(key).ok());
    // A subscriber installed earlier (tests, embedding hosts) wins.
    let _ = init_with(&settings);
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use super::{DEFAULT_LOG_FILE_PATH, LogFormat, LogOutput, LogSettings};

    fn settings(pairs: &[(&str, &str)]) -> LogSettings {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LogSettings::from_env_with(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_to_pretty_stderr() {
        let parsed = settings(&[]);
        assert_eq!(parsed.format, LogFormat::Pretty);
        assert_eq!(parsed.output, LogOutput::Stderr);
        assert_eq!(parsed.file_path, PathBuf::from(DEFAULT_LOG_FILE_PATH));
    }

    #[test]
    fn accepts_json_and_file_outputs_case_insensitively() {
        let parsed = settings(&[("LOG_FORMAT", " JSON "), ("LOG_OUTPUT", "Both")]);
        assert_eq!(parsed.format, LogFormat::Json);
        assert_eq!(parsed.output, LogOutput::Both);
        assert_eq!(settings(&[("LOG_OUTPUT", "file")]).output, LogOutput::File);
    }

    #[test]
    fn unknown_values_fall_back() {
        let parsed = settings(&[("LOG_FORMAT", "xml"), ("LOG_OUTPUT", "syslog")]);
        assert_eq!(parsed.format, LogFormat::Pretty);
        assert_eq!(parsed.output, LogOutput::Stderr);
    }

    #[test]
    fn blank_file_path_uses_default() {
        assert_eq!(
            settings(&[("LOG_FILE_PATH", "  ")]).file_path,
            PathBuf::from(DEFAULT_LOG_FILE_PATH)
        );
        assert_eq!(
            settings(&[("LOG_FILE_PATH", "custom/chat.log")]).file_path,
            PathBuf::from("custom/chat.log")
        );
    }
}
