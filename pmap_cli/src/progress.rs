use indicatif::{ProgressBar, ProgressStyle};

use pmap_core::Progress;

const TEMPLATE: &str = "{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent:>3}% ({eta})";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg} [{elapsed_precise}] {pos}";

/// Progress bar on stderr, driven by encoder/decoder progress units.
///
/// Falls back to a spinner when the total is unknown.
pub struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    pub fn new(label: &'static str) -> Self {
        let bar = ProgressBar::new(0);
        bar.set_message(label);
        Self { bar }
    }

    /// Units advanced so far.
    pub fn done(&self) -> u64 {
        self.bar.position()
    }

    pub fn total(&self) -> Option<u64> {
        self.bar.length()
    }
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

impl Progress for TerminalProgress {
    fn start(&self, total: Option<u64>) {
        match total {
            Some(total) => {
                self.bar.set_style(style(TEMPLATE));
                self.bar.set_length(total);
            }
            None => {
                self.bar.set_style(style(SPINNER_TEMPLATE));
                self.bar.unset_length();
            }
        }
        self.bar.set_position(0);
        self.bar.reset_elapsed();
    }

    fn advance(&self, units: u64) {
        self.bar.inc(units);
    }

    fn finish(&self) {
        self.bar.finish();
    }
}
