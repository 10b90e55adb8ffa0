// Linux D-Bus notification handoff
// Surfaces background push messages through org.freedesktop.Notifications

#[cfg(target_os = "linux")]
use std::collections::HashMap;

#[cfg(target_os = "linux")]
use std::future::Future;

#[cfg(target_os = "linux")]
use std::pin::Pin;

#[cfg(target_os = "linux")]
use std::sync::Arc;

#[cfg(target_os = "linux")]
use tokio::sync::OnceCell;

#[cfg(target_os = "linux")]
use zbus::Connection;
#[cfg(target_os = "linux")]
use zbus::zvariant::Value;

#[cfg(target_os = "linux")]
use crate::components::config::HandoffConfig;
#[cfg(target_os = "linux")]
use crate::components::router::{BackgroundHandoff, HandoffRequest};
#[cfg(target_os = "linux")]
use crate::components::{PushError, PushResult};

#[cfg(target_os = "linux")]
#[zbus::proxy(
    interface = "org.freedesktop.Notifications",
    default_service = "org.freedesktop.Notifications",
    default_path = "/org/freedesktop/Notifications",
    gen_blocking = false
)]
trait Notifications {
    /// Send a notification to the desktop notification daemon
    #[allow(clippy::too_many_arguments)]
    fn notify(
        &self,
        app_name: &str,
        replaces_id: u32,
        app_icon: &str,
        summary: &str,
        body: &str,
        actions: &[&str],
        hints: HashMap<&str, &Value<'_>>,
        expire_timeout: i32,
    ) -> zbus::Result<u32>;
}

/// Posts each background message as a desktop notification
#[cfg(target_os = "linux")]
pub struct DbusHandoff {
    config: HandoffConfig,
    connection: Arc<OnceCell<Connection>>,
}

#[cfg(target_os = "linux")]
impl DbusHandoff {
    pub fn new(config: HandoffConfig) -> Self {
        Self {
            config,
            connection: Arc::new(OnceCell::new()),
        }
    }

    async fn get_connection(&self) -> PushResult<Connection> {
        self.connection
            .get_or_try_init(|| async {
                Connection::session().await.map_err(|e| {
                    PushError::handoff("dbus", format!("Failed to connect to D-Bus session: {e}"))
                })
            })
            .await
            .cloned()
    }

    /// Summary and body taken from the configured payload keys
    fn render(&self, request: &HandoffRequest) -> (String, String) {
        let summary = request
            .payload
            .get(&self.config.title_key)
            .unwrap_or(self.config.app_name.as_str())
            .to_string();
        let body = request
            .payload
            .get(&self.config.body_key)
            .unwrap_or_default()
            .to_string();
        (summary, body)
    }
}

#[cfg(target_os = "linux")]
impl BackgroundHandoff for DbusHandoff {
    fn name(&self) -> &'static str {
        "dbus"
    }

    fn hand_off(
        &self,
        request: HandoffRequest,
    ) -> Pin<Box<dyn Future<Output = PushResult<()>> + Send + '_>> {
        Box::pin(async move {
            let connection = self.get_connection().await?;
            let proxy = NotificationsProxy::new(&connection).await.map_err(|e| {
                PushError::handoff("dbus", format!("Failed to create D-Bus proxy: {e}"))
            })?;

            let (summary, body) = self.render(&request);
            let urgency = Value::U8(1);
            let desktop_entry = Value::from(self.config.app_name.as_str());
            let mut hints = HashMap::new();
            hints.insert("urgency", &urgency);
            hints.insert("desktop-entry", &desktop_entry);

            let native_id = proxy
                .notify(
                    &self.config.app_name,
                    0,
                    &self.config.app_icon,
                    &summary,
                    &body,
                    &[],
                    hints,
                    self.config.expire_timeout_ms.unwrap_or(-1),
                )
                .await
                .map_err(|e| PushError::handoff("dbus", format!("Notify call failed: {e}")))?;

            tracing::debug!(
                envelope = %request.envelope_id,
                native_id,
                "Posted background message as desktop notification"
            );
            Ok(())
        })
    }
}
