use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Progress is the shared per-run context handed to every host task.
/// Cloning is cheap and all clones drive the same bar.
#[derive(Clone)]
pub struct Progress {
    bar: ProgressBar,
}

impl Progress {
    pub fn new(title: &str, total_units: u64) -> Self {
        let bar = ProgressBar::new(total_units);
        bar.set_style(
            ProgressStyle::with_template("{msg} {bar:40.cyan/blue} {pos}/{len} [{elapsed_precise}]")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.set_message(title.to_string());
        Self { bar }
    }

    /// A progress handle that draws nothing
    pub fn hidden(total_units: u64) -> Self {
        Self {
            bar: ProgressBar::with_draw_target(Some(total_units), ProgressDrawTarget::hidden()),
        }
    }

    pub fn advance(&self, units: u64) {
        self.bar.inc(units);
    }

    /// Print a per-host event line above the bar
    pub fn log(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::debug!("{}", message);
        if self.bar.is_hidden() {
            return;
        }
        self.bar.println(message);
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(&self) {
        self.bar.finish();
    }
}
