//! Outbound notifications driven by entity hooks.
//!
//! [`register_notification`] installs a hook that, after the matching event
//! commits, builds a [`Notification`] from the instance and hands it to a
//! [`Notifier`] on the side-effect executor. The transport itself belongs to
//! the `Notifier` implementation.

use std::collections::BTreeMap;
use std::sync::Arc;

use relcascade_core::{Result, SchemaProvider, Value};
use serde::Serialize;

use crate::hooks::{HookArgs, HookRegistry};

/// Where and how to deliver a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationTarget {
    /// Destination, e.g. a URL.
    pub target: String,
    /// Delivery method, e.g. `POST`.
    pub method: String,
    /// Fixed body replacing the instance payload.
    pub body: Option<String>,
}

impl NotificationTarget {
    /// `POST` to `target` with the instance as payload.
    pub fn post(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            method: "POST".to_string(),
            body: None,
        }
    }

    /// Override the delivery method.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into().to_ascii_uppercase();
        self
    }

    /// Send a fixed body instead of the instance.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Whether the method carries a body.
    pub fn has_body(&self) -> bool {
        matches!(self.method.as_str(), "POST" | "PATCH" | "PUT")
    }
}

/// A notification ready for delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    /// Entity type that changed.
    pub entity: String,
    /// Event that fired.
    pub event: String,
    /// Destination.
    pub target: String,
    /// Delivery method.
    pub method: String,
    /// Primary key of the changed instance.
    pub primary_key: BTreeMap<String, Value>,
    /// Body: the fixed body, the instance as JSON, or null for body-less
    /// methods.
    pub payload: serde_json::Value,
}

/// Delivers notifications.
pub trait Notifier: Send + Sync {
    /// Deliver one notification.
    fn send(&self, notification: &Notification) -> Result<()>;
}

/// Build the notification for `args` and `target`.
pub fn build_notification(
    provider: &dyn SchemaProvider,
    args: &HookArgs<'_>,
    target: &NotificationTarget,
) -> Result<Notification> {
    let schema = provider.require(args.entity)?;
    let primary_key = schema
        .primary_key_columns()
        .into_iter()
        .map(|c| (c.to_string(), args.instance.get_or_null(c)))
        .collect();
    let payload = if !target.has_body() {
        serde_json::Value::Null
    } else if let Some(body) = &target.body {
        serde_json::Value::String(body.clone())
    } else {
        args.instance
            .to_json()
            .map_err(|e| relcascade_core::Error::Config(format!("cannot encode payload: {e}")))?
    };
    Ok(Notification {
        entity: args.entity.to_string(),
        event: args.event.to_string(),
        target: target.target.clone(),
        method: target.method.clone(),
        primary_key,
        payload,
    })
}

/// Install a hook delivering `target` notifications for (`entity`, `event`).
///
/// The hook is named `notify:<target>` so it can be removed or ordered
/// against.
pub fn register_notification(
    hooks: &HookRegistry,
    provider: Arc<dyn SchemaProvider>,
    entity: &str,
    event: impl AsRef<str>,
    target: NotificationTarget,
    notifier: Arc<dyn Notifier>,
) {
    let name = format!("notify:{}", target.target);
    let task_name = name.clone();
    hooks.chain(entity, event).add(
        name,
        Arc::new(move |args: &HookArgs<'_>| {
            let notification = match build_notification(provider.as_ref(), args, &target) {
                Ok(n) => n,
                Err(err) => {
                    tracing::warn!(
                        target: "relcascade::notify",
                        entity = args.entity,
                        error = %err,
                        "notification not built"
                    );
                    return;
                }
            };
            let notifier = Arc::clone(&notifier);
            let spawned = args.effects.spawn(task_name.clone(), move || {
                if let Err(err) = notifier.send(&notification) {
                    tracing::error!(
                        target: "relcascade::notify",
                        entity = %notification.entity,
                        destination = %notification.target,
                        error = %err,
                        "notification delivery failed"
                    );
                }
            });
            if let Err(err) = spawned {
                tracing::warn!(target: "relcascade::notify", error = %err, "notification dropped");
            }
        }),
    );
}
