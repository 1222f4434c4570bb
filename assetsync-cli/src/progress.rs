//! Terminal rendering of update notifications.

use std::sync::{Arc, Mutex, PoisonError};

use assetsync::UpdateEvent;
use indicatif::{ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str = "{msg:20} [{bar:40.green/dim}] {pos:>3}%";

/// Progress bar driven by [`UpdateEvent`]s.
///
/// Cloning shares the bar and the error count, so one clone can be moved
/// into the manager's listener while the command keeps another.
#[derive(Clone)]
pub struct UpdateProgress {
    bar: ProgressBar,
    errors: Arc<Mutex<usize>>,
}

impl UpdateProgress {
    pub fn new(quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(100)
        };
        if let Ok(style) = ProgressStyle::default_bar().template(BAR_TEMPLATE) {
            bar.set_style(style.progress_chars("##-"));
        }
        bar.set_message("checking");
        Self {
            bar,
            errors: Arc::new(Mutex::new(0)),
        }
    }

    /// Listener to hand to the assets manager.
    pub fn listener(&self) -> impl FnMut(&UpdateEvent) + Send + 'static {
        let this = self.clone();
        move |event: &UpdateEvent| this.on_event(event)
    }

    pub fn error_count(&self) -> usize {
        *self.errors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    fn on_event(&self, event: &UpdateEvent) {
        match event {
            UpdateEvent::UpdatingProgress { percent } => {
                self.bar.set_position(u64::from(*percent));
            }
            UpdateEvent::AssetLoaded { asset_id } => {
                self.bar.set_message(asset_id.clone());
            }
            UpdateEvent::NewVersionFound => self.bar.set_message("new version"),
            UpdateEvent::Error { .. } | UpdateEvent::NoLocalManifest { .. } => {
                *self.errors.lock().unwrap_or_else(PoisonError::into_inner) += 1;
                self.bar.println(format!("  ! {}", event));
            }
            UpdateEvent::AlreadyUpToDate | UpdateEvent::UpdateFinished => {
                self.bar.set_position(100);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assetsync::manager::UpdateErrorCode;

    #[test]
    fn test_counts_errors() {
        let progress = UpdateProgress::new(true);
        let mut listener = progress.listener();

        listener(&UpdateEvent::UpdatingProgress { percent: 50 });
        listener(&UpdateEvent::Error {
            code: UpdateErrorCode::Network,
            message: "reset".into(),
            asset_id: Some("a".into()),
        });

        assert_eq!(progress.error_count(), 1);
        assert_eq!(progress.bar.position(), 50);
    }
}
