use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::path::{Path, PathBuf};

pub const ENV_METRICS_TEXTFILE: &str = "METRICS_TEXTFILE";

/// Prometheus recorder for a short-lived process: nothing is served, the
/// exposition is written to a file after each run for a textfile collector.
pub struct Metrics {
    pub handle: PrometheusHandle,
    textfile: Option<PathBuf>,
}

impl Metrics {
    /// Install the global recorder. `None` when one is already installed.
    pub fn init(textfile: Option<PathBuf>) -> Option<Self> {
        match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => Some(Self { handle, textfile }),
            Err(e) => {
                tracing::warn!(error = %e, "prometheus recorder not installed");
                None
            }
        }
    }

    pub fn from_env() -> Option<Self> {
        let textfile = std::env::var(ENV_METRICS_TEXTFILE)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        Self::init(textfile)
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Write the current exposition to the configured textfile, if any.
    pub fn flush(&self) -> Result<()> {
        let Some(path) = &self.textfile else {
            return Ok(());
        };
        write_textfile(path, &self.render())
    }
}

/// Replace `path` atomically so a collector never reads a half-written file.
fn write_textfile(path: &Path, body: &str) -> Result<()> {
    use std::io::Write;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir).context("metrics temp file")?;
    tmp.write_all(body.as_bytes()).context("writing metrics")?;
    tmp.persist(path)
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}
