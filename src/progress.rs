//! Terminal progress for apply-style commands

use colored::Colorize;
use declarative::{OperationResult, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar per domain, printing failures above the bar
pub struct BarProgress {
    hidden: bool,
    bar: Option<ProgressBar>,
}

impl BarProgress {
    /// `hidden` for quiet or machine-readable output
    pub fn new(hidden: bool) -> Self {
        Self { hidden, bar: None }
    }
}

impl ProgressCallback for BarProgress {
    fn on_domain_start(&mut self, domain: &str, count: usize) {
        if self.hidden || count == 0 {
            self.bar = None;
            return;
        }
        let bar = ProgressBar::new(count as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar.set_prefix(domain.to_string());
        self.bar = Some(bar);
    }

    fn on_item_start(&mut self, description: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(description.to_string());
        }
    }

    fn on_item_complete(&mut self, result: &OperationResult) {
        let Some(bar) = &self.bar else {
            return;
        };
        if let Some(error) = result.outcome.error() {
            bar.suspend(|| {
                eprintln!("  {} {} ({})", "✗".red(), result.display_name(), error);
            });
        }
        bar.inc(1);
    }

    fn on_domain_complete(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}
