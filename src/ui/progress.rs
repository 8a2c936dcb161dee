//! A thin `indicatif` wrapper for upload/download progress.

use anyhow::Result;
use indicatif::{ProgressBar as Bar, ProgressStyle as Style};

const PROGRESS_TEMPLATE: &str = "{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";

pub struct ProgressBar {
    bar: Bar,
}

impl ProgressBar {
    pub fn new(total: u64, description: &str) -> Result<Self> {
        let bar = Bar::new(total);
        bar.set_style(Style::with_template(PROGRESS_TEMPLATE)?.progress_chars("●○ "));
        bar.set_message(description.to_owned());
        Ok(Self { bar })
    }

    #[inline]
    pub fn add(&self, delta: u64) {
        self.bar.inc(delta)
    }

    #[inline]
    pub fn finish(&self) {
        self.bar.finish()
    }
}

impl Drop for ProgressBar {
    fn drop(&mut self) {
        if self.bar.is_finished() {
            self.bar.finish_with_message("Done");
        }
    }
}
