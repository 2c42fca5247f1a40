use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use wastewatch_core::HubEvent;

const DEFAULT_DISMISS_AFTER: Duration = Duration::from_secs(5);

/// OS-level notification permission.
///
/// Starts at `Default` and transitions exactly once, via an explicit
/// `request_permission()` call triggered by user action.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Permission {
    #[default]
    Default,
    Granted,
    Denied,
}

/// A desktop notification derived from a hub event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DesktopNotification {
    /// Stable dedup key; the platform replaces a visible notification that
    /// shares the tag instead of stacking a duplicate.
    pub tag: String,
    pub title: String,
    pub body: String,
    pub require_interaction: bool,
}

/// Platform seam for the OS notification surface.
pub trait NotificationBackend: Send + Sync {
    /// Trigger the platform permission prompt and return the outcome.
    fn request_permission(&self) -> Permission;
    /// Show a notification, replacing any visible one with the same tag.
    fn show(&self, notification: &DesktopNotification);
    /// Dismiss the notification with the given tag, if still visible.
    fn close(&self, tag: &str);
    /// Bring the application window to the foreground.
    fn focus_window(&self);
}

type NavigateFn = Box<dyn Fn(&str) + Send + Sync>;

/// Maps qualifying hub events to OS notifications.
///
/// Gated on permission state, deduplicated by tag, auto-dismissed on a
/// per-notification timer unless interaction is required. Every failure
/// path degrades to "no notification shown"; nothing here returns an error
/// to the event pipeline.
pub struct NotificationPresenter {
    backend: Arc<dyn NotificationBackend>,
    permission: Mutex<Permission>,
    timers: DashMap<String, CancellationToken>,
    dismiss_after: Duration,
    on_navigate: RwLock<Option<NavigateFn>>,
}

impl NotificationPresenter {
    pub fn new(backend: Arc<dyn NotificationBackend>) -> Arc<Self> {
        Self::with_dismiss_after(backend, DEFAULT_DISMISS_AFTER)
    }

    pub fn with_dismiss_after(
        backend: Arc<dyn NotificationBackend>,
        dismiss_after: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            backend,
            permission: Mutex::new(Permission::Default),
            timers: DashMap::new(),
            dismiss_after,
            on_navigate: RwLock::new(None),
        })
    }

    /// Set the navigation callback invoked when a notification is clicked.
    pub fn on_navigate(&self, callback: impl Fn(&str) + Send + Sync + 'static) {
        *self.on_navigate.write() = Some(Box::new(callback));
    }

    pub fn permission(&self) -> Permission {
        *self.permission.lock()
    }

    /// Trigger the platform permission prompt. Only meaningful from the
    /// `Default` state; later calls return the settled state without
    /// prompting again. The first grant shows a one-time confirmation.
    pub fn request_permission(self: &Arc<Self>) -> Permission {
        {
            let mut permission = self.permission.lock();
            if *permission != Permission::Default {
                return *permission;
            }
            *permission = self.backend.request_permission();
            if *permission != Permission::Granted {
                tracing::info!(state = ?*permission, "Notification permission not granted");
                return *permission;
            }
        }

        let confirmation = DesktopNotification {
            tag: "wastewatch-enabled".to_string(),
            title: "Notifications enabled".to_string(),
            body: "You will be alerted when new reports come in".to_string(),
            require_interaction: false,
        };
        self.show(confirmation);
        Permission::Granted
    }

    /// Present a hub event as a desktop notification.
    ///
    /// A no-op unless permission is granted; the in-app state store still
    /// sees the event either way. Stats pushes never notify.
    pub fn present(self: &Arc<Self>, event: &HubEvent) {
        if self.permission() != Permission::Granted {
            tracing::debug!(
                event_type = event.event_type(),
                "Skipping desktop notification, permission not granted"
            );
            return;
        }

        let Some(notification) = notification_for(event) else {
            return;
        };
        self.show(notification);
    }

    /// Simulate the user clicking the notification with this tag: focus the
    /// window, navigate, then dismiss.
    pub fn handle_click(&self, tag: &str) {
        if let Some((_, timer)) = self.timers.remove(tag) {
            timer.cancel();
        }
        self.backend.focus_window();
        if let Some(navigate) = self.on_navigate.read().as_ref() {
            navigate(tag);
        }
        self.backend.close(tag);
    }

    /// Cancel every pending auto-dismiss timer. Called on teardown so no
    /// timer outlives the presenter's host.
    pub fn shutdown(&self) {
        for entry in self.timers.iter() {
            entry.value().cancel();
        }
        self.timers.clear();
    }

    fn show(self: &Arc<Self>, notification: DesktopNotification) {
        // Replacing a visible notification re-arms its timer.
        if let Some((_, previous)) = self.timers.remove(&notification.tag) {
            previous.cancel();
        }

        self.backend.show(&notification);

        if notification.require_interaction {
            // Persists until the user dismisses or clicks it.
            return;
        }

        let token = CancellationToken::new();
        self.timers.insert(notification.tag.clone(), token.clone());

        let presenter = Arc::clone(self);
        let tag = notification.tag;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(presenter.dismiss_after) => {
                    presenter.backend.close(&tag);
                    presenter.timers.remove(&tag);
                }
            }
        });
    }
}

/// Derive the notification for an event, if the event kind qualifies.
fn notification_for(event: &HubEvent) -> Option<DesktopNotification> {
    match event {
        HubEvent::NewReport {
            report, message, ..
        } => Some(DesktopNotification {
            tag: format!("report-{}", report.id),
            title: report.title.clone(),
            body: message.clone(),
            require_interaction: report.priority.is_urgent(),
        }),
        HubEvent::UrgentAlert {
            report, message, ..
        } => Some(DesktopNotification {
            tag: format!("report-{}", report.id),
            title: format!("Urgent: {}", report.title),
            body: message.clone(),
            require_interaction: true,
        }),
        HubEvent::DashboardUpdate { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wastewatch_core::{Priority, Report};

    /// Recording backend standing in for the OS notification surface.
    #[derive(Default)]
    struct MockBackend {
        permission_response: Mutex<Permission>,
        prompts: AtomicUsize,
        shown: Mutex<Vec<DesktopNotification>>,
        visible: Mutex<HashMap<String, DesktopNotification>>,
        focus_calls: AtomicUsize,
    }

    impl MockBackend {
        fn granting() -> Arc<Self> {
            let backend = Arc::new(Self::default());
            *backend.permission_response.lock() = Permission::Granted;
            backend
        }

        fn denying() -> Arc<Self> {
            let backend = Arc::new(Self::default());
            *backend.permission_response.lock() = Permission::Denied;
            backend
        }

        fn visible_tags(&self) -> Vec<String> {
            self.visible.lock().keys().cloned().collect()
        }
    }

    impl NotificationBackend for MockBackend {
        fn request_permission(&self) -> Permission {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            *self.permission_response.lock()
        }

        fn show(&self, notification: &DesktopNotification) {
            self.shown.lock().push(notification.clone());
            self.visible
                .lock()
                .insert(notification.tag.clone(), notification.clone());
        }

        fn close(&self, tag: &str) {
            self.visible.lock().remove(tag);
        }

        fn focus_window(&self) {
            self.focus_calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn critical_report() -> Report {
        Report::new("Illegal Dumping", "Main St", Priority::Critical)
    }

    #[tokio::test]
    async fn present_without_permission_is_silent() {
        let backend = MockBackend::granting();
        let presenter = NotificationPresenter::new(Arc::clone(&backend) as Arc<dyn NotificationBackend>);

        presenter.present(&HubEvent::new_report(critical_report()));

        assert!(backend.shown.lock().is_empty());
        assert_eq!(presenter.permission(), Permission::Default);
    }

    #[tokio::test]
    async fn denied_permission_degrades_silently() {
        let backend = MockBackend::denying();
        let presenter = NotificationPresenter::new(Arc::clone(&backend) as Arc<dyn NotificationBackend>);

        assert_eq!(presenter.request_permission(), Permission::Denied);
        presenter.present(&HubEvent::new_report(critical_report()));

        assert!(backend.shown.lock().is_empty());
    }

    #[tokio::test]
    async fn first_grant_shows_confirmation_once() {
        let backend = MockBackend::granting();
        let presenter = NotificationPresenter::new(Arc::clone(&backend) as Arc<dyn NotificationBackend>);

        assert_eq!(presenter.request_permission(), Permission::Granted);
        assert_eq!(presenter.request_permission(), Permission::Granted);

        assert_eq!(backend.prompts.load(Ordering::SeqCst), 1);
        let shown = backend.shown.lock();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].tag, "wastewatch-enabled");
    }

    #[tokio::test]
    async fn same_tag_replaces_not_stacks() {
        let backend = MockBackend::granting();
        let presenter = NotificationPresenter::new(Arc::clone(&backend) as Arc<dyn NotificationBackend>);
        presenter.request_permission();

        let report = critical_report();
        presenter.present(&HubEvent::new_report(report.clone()));
        presenter.present(&HubEvent::urgent_alert(report.clone()));

        let tag = format!("report-{}", report.id);
        let report_tags: Vec<String> = backend
            .visible_tags()
            .into_iter()
            .filter(|t| t.starts_with("report-"))
            .collect();
        assert_eq!(report_tags, vec![tag]);
    }

    #[tokio::test(start_paused = true)]
    async fn non_urgent_notification_auto_dismisses() {
        let backend = MockBackend::granting();
        let presenter = NotificationPresenter::with_dismiss_after(
            Arc::clone(&backend) as Arc<dyn NotificationBackend>,
            Duration::from_secs(5),
        );
        presenter.request_permission();

        let report = Report::new("Full bin", "Elm St", Priority::Low);
        let tag = format!("report-{}", report.id);
        presenter.present(&HubEvent::new_report(report));
        assert!(backend.visible_tags().contains(&tag));

        tokio::time::sleep(Duration::from_secs(6)).await;

        assert!(!backend.visible_tags().contains(&tag));
    }

    #[tokio::test(start_paused = true)]
    async fn urgent_notification_persists() {
        let backend = MockBackend::granting();
        let presenter = NotificationPresenter::with_dismiss_after(
            Arc::clone(&backend) as Arc<dyn NotificationBackend>,
            Duration::from_secs(5),
        );
        presenter.request_permission();

        let report = critical_report();
        let tag = format!("report-{}", report.id);
        presenter.present(&HubEvent::urgent_alert(report));

        tokio::time::sleep(Duration::from_secs(60)).await;

        assert!(backend.visible_tags().contains(&tag));
    }

    #[tokio::test]
    async fn click_focuses_navigates_and_dismisses() {
        let backend = MockBackend::granting();
        let presenter = NotificationPresenter::new(Arc::clone(&backend) as Arc<dyn NotificationBackend>);
        presenter.request_permission();

        let clicked = Arc::new(Mutex::new(Vec::new()));
        let c = Arc::clone(&clicked);
        presenter.on_navigate(move |tag| c.lock().push(tag.to_string()));

        let report = critical_report();
        let tag = format!("report-{}", report.id);
        presenter.present(&HubEvent::urgent_alert(report));

        presenter.handle_click(&tag);

        assert_eq!(backend.focus_calls.load(Ordering::SeqCst), 1);
        assert_eq!(clicked.lock().as_slice(), [tag.clone()]);
        assert!(!backend.visible_tags().contains(&tag));
    }

    #[tokio::test]
    async fn stats_updates_never_notify() {
        let backend = MockBackend::granting();
        let presenter = NotificationPresenter::new(Arc::clone(&backend) as Arc<dyn NotificationBackend>);
        presenter.request_permission();

        presenter.present(&HubEvent::dashboard_update(
            wastewatch_core::StatsAction::ReportCreated,
            wastewatch_core::StatsDelta::default(),
        ));

        // Only the enablement confirmation was ever shown
        assert_eq!(backend.shown.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_timers() {
        let backend = MockBackend::granting();
        let presenter = NotificationPresenter::with_dismiss_after(
            Arc::clone(&backend) as Arc<dyn NotificationBackend>,
            Duration::from_secs(5),
        );
        presenter.request_permission();

        let report = Report::new("Full bin", "Elm St", Priority::Low);
        let tag = format!("report-{}", report.id);
        presenter.present(&HubEvent::new_report(report));

        presenter.shutdown();
        tokio::time::sleep(Duration::from_secs(10)).await;

        // Timer was cancelled, so no close fired; the host tears the
        // surface down itself.
        assert!(backend.visible_tags().contains(&tag));
    }
}
