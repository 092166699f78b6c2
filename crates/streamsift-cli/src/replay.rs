//! Replaying a generation through the filter engine

use crate::input::Fragment;
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use streamsift_core::{Error, OutputEvent, StreamSummary};
use streamsift_filter::{presets, FilterConfig, FilterEngine};
use tracing::{debug, info, warn};

/// Resolve the filter configuration from a file or a preset name
pub fn resolve_config(config: Option<&Path>, preset: Option<&str>) -> Result<FilterConfig> {
    match (config, preset) {
        (Some(path), None) => FilterConfig::from_file(path)
            .with_context(|| format!("failed to load configuration {}", path.display())),
        (None, Some(name)) => match presets::by_name(name) {
            Some(config) => Ok(config),
            None => bail!(
                "unknown preset '{}' (available: {})",
                name,
                presets::NAMES.join(", ")
            ),
        },
        (None, None) => Ok(FilterConfig::default()),
        (Some(_), Some(_)) => bail!("--config and --preset are mutually exclusive"),
    }
}

/// Outcome of one replay
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplayReport {
    pub fragments: usize,
    pub events: usize,

    /// The generation was cut short by the repetition guard
    pub aborted: bool,

    pub summary: StreamSummary,
}

/// Feed every fragment, then flush, writing each event as a JSON line
pub fn replay(
    config: FilterConfig,
    fragments: &[Fragment],
    out: &mut impl Write,
) -> Result<ReplayReport> {
    let mut engine = FilterEngine::new(config);
    let mut report = ReplayReport::default();

    for fragment in fragments {
        report.fragments += 1;
        match engine.write(&fragment.text, &fragment.token_ids, &fragment.logprobs) {
            Ok(events) => emit(&events, &mut report, out)?,
            Err(e @ Error::RepetitionLimit { .. }) => {
                warn!(error = %e, fragment = report.fragments, "generation aborted");
                report.aborted = true;
                break;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("fragment {} rejected", report.fragments))
            }
        }
    }

    let events = engine.flush().context("flush failed")?;
    emit(&events, &mut report, out)?;

    info!(
        fragments = report.fragments,
        events = report.events,
        aborted = report.aborted,
        "replay complete"
    );
    Ok(report)
}

fn emit(events: &[OutputEvent], report: &mut ReplayReport, out: &mut impl Write) -> Result<()> {
    for event in events {
        debug!(kind = event.kind_name(), "event");
        serde_json::to_writer(&mut *out, event)?;
        out.write_all(b"\n")?;
        report.summary.absorb(event);
        report.events += 1;
    }
    Ok(())
}

/// Every preset as a YAML document
pub fn presets_yaml() -> Result<String> {
    let mut yaml = String::new();
    for name in presets::NAMES {
        let config = presets::by_name(name).with_context(|| format!("preset {} missing", name))?;
        yaml.push_str(&format!("---\n# {}\n", name));
        yaml.push_str(&config.to_yaml()?);
    }
    Ok(yaml)
}
