use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

/// Host-environment notification seam. Delivery is best effort; failures are
/// swallowed so a missing notification can never stall a timer tick.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str);
}

#[derive(Debug)]
pub struct LogNotifier {
    logs_dir: PathBuf,
    guard: Mutex<()>,
}

impl LogNotifier {
    pub fn new(logs_dir: impl Into<PathBuf>) -> Self {
        Self {
            logs_dir: logs_dir.into(),
            guard: Mutex::new(()),
        }
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, message: &str) {
        let Ok(_guard) = self.guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("notifications.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "title": title,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn notifications(&self) -> Vec<(String, String)> {
        self.notifications
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, message: &str) {
        if let Ok(mut guard) = self.notifications.lock() {
            guard.push((title.to_string(), message.to_string()));
        }
    }
}
