//! Subscriber setup: stderr console plus an optional rotating JSON file.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn rotation(name: Option<&str>) -> Rotation {
    match name {
        Some("daily") => Rotation::DAILY,
        Some("hourly") => Rotation::HOURLY,
        _ => Rotation::NEVER,
    }
}

/// Install the global subscriber. Later calls are ignored.
///
/// The returned guard flushes the file writer on drop; hold it until exit.
pub fn init_logging(
    json: bool,
    cli_level: &str,
    cfg: &pump_config::Logging,
) -> Option<WorkerGuard> {
    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut file_guard = None;

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false);
    layers.push(if json {
        console.json().with_filter(filter(cli_level)).boxed()
    } else {
        console.with_filter(filter(cli_level)).boxed()
    });

    if let Some(file) = cfg.file.as_deref() {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .map_or_else(|| "pump.log".into(), |n| n.to_string_lossy().into_owned());
        let appender = RollingFileAppender::new(rotation(cfg.rotation.as_deref()), dir, name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        file_guard = Some(guard);
        let level = cfg.level.as_deref().unwrap_or("info");
        layers.push(
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter(level))
                .boxed(),
        );
    }

    let _ = tracing_subscriber::registry().with(layers).try_init();
    file_guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_names_map_to_policies() {
        assert_eq!(rotation(Some("daily")), Rotation::DAILY);
        assert_eq!(rotation(Some("hourly")), Rotation::HOURLY);
        assert_eq!(rotation(Some("never")), Rotation::NEVER);
        assert_eq!(rotation(None), Rotation::NEVER);
    }
}
