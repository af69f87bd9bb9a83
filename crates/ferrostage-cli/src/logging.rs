//! Tracing subscriber setup

use anyhow::{anyhow, Context, Result};
use ferrostage_config::LoggingConfig;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt, EnvFilter};

/// Pick the log level from command line flags, falling back to the config
pub fn resolve_level<'a>(configured: &'a str, debug: bool, verbose: bool, quiet: bool) -> &'a str {
    if debug {
        "debug"
    } else if verbose {
        "info"
    } else if quiet {
        "error"
    } else {
        configured
    }
}

/// Install the global subscriber
///
/// Events go to stderr, and additionally to `config.log_file` when set. The
/// returned guard flushes the file writer and must live until exit.
pub fn init_logging(config: &LoggingConfig, level: &str) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level '{level}'"))?;

    let (writer, guard) = match &config.log_file {
        Some(path) => {
            let (file_writer, guard) = file_writer(path)?;
            (
                BoxMakeWriter::new(std::io::stderr.and(file_writer)),
                Some(guard),
            )
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(config.log_file.is_none())
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let installed = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow!("failed to install logger: {e}"))?;

    Ok(guard)
}

fn file_writer(
    path: &Path,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("log file {} has no file name", path.display()))?;

    std::fs::create_dir_all(directory)
        .with_context(|| format!("cannot create log directory {}", directory.display()))?;
    let appender = tracing_appender::rolling::never(directory, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(true, false, false, "debug")]
    #[case(false, true, false, "info")]
    #[case(false, false, true, "error")]
    #[case(false, false, false, "warn")]
    #[case(true, false, true, "debug")]
    fn test_resolve_level(
        #[case] debug: bool,
        #[case] verbose: bool,
        #[case] quiet: bool,
        #[case] expected: &str,
    ) {
        assert_eq!(resolve_level("warn", debug, verbose, quiet), expected);
    }
}
