//! Optional terminal progress reporting for the map and reduce stages.
//!
//! Grounded on this codebase's ETL progress helpers, which wrap
//! `indicatif` spinners/bars behind a thin constructor so call sites never
//! touch the `indicatif` API directly. Unlike the ETL's bars, stage length
//! isn't known up front (a [`crate::source::Source`] doesn't expose a
//! count), so these are spinners ticked once per dispatched task rather
//! than bars driven by a known total.

use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ";

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner} {msg}: {pos} dispatched ({per_sec})")
        .expect("static template is valid")
        .tick_chars(TICK_CHARS)
}

/// Builds a labeled spinner, or `None` if `enabled` is false — callers
/// pass [`crate::config::JobOptions`]'s `progress` flag straight through.
pub fn make_stage_spinner(enabled: bool, label: &str) -> Option<ProgressBar> {
    if !enabled {
        return None;
    }
    let bar = ProgressBar::new_spinner();
    bar.set_style(spinner_style());
    bar.set_message(label.to_string());
    bar.enable_steady_tick(std::time::Duration::from_millis(120));
    Some(bar)
}

/// Wraps a `ProgressBar` as the `on_dispatch` tick callback the map and
/// reduce stages invoke once per completed task.
pub fn tick_callback(bar: Option<ProgressBar>) -> Option<Arc<dyn Fn() + Send + Sync>> {
    bar.map(|bar| Arc::new(move || bar.inc(1)) as Arc<dyn Fn() + Send + Sync>)
}
