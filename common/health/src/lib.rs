use std::collections::HashMap;
use std::ops::Add;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use time::OffsetDateTime;
use tracing::warn;

/// Liveness reporting for the long-running loops of the service.
///
/// The ingestion process runs a webhook receiver, an rdkafka producer and
/// one consumer loop per topic. A consumer loop exits for good when its
/// transport fails, so the process is only live while every registered
/// component keeps reporting before its deadline:
///   - a component that never reported is `Starting` (not live)
///   - a component whose last report is older than its deadline is `Stalled`
///   - a component that exited reports `Unhealthy` on its way out
#[derive(Default, Debug)]
pub struct HealthStatus {
    pub healthy: bool,
    pub components: HashMap<String, ComponentStatus>,
}

impl IntoResponse for HealthStatus {
    fn into_response(self) -> Response {
        let body = format!("{self:?}");
        match self.healthy {
            true => (StatusCode::OK, body),
            false => (StatusCode::INTERNAL_SERVER_ERROR, body),
        }
        .into_response()
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ComponentStatus {
    Starting,
    HealthyUntil(OffsetDateTime),
    Unhealthy,
    Stalled,
}

type Components = Arc<RwLock<HashMap<String, ComponentStatus>>>;

#[derive(Clone)]
pub struct HealthHandle {
    component: String,
    deadline: Duration,
    components: Components,
}

impl HealthHandle {
    /// Must be called more frequently than the registered deadline.
    pub fn report_healthy(&self) {
        self.report_status(ComponentStatus::HealthyUntil(
            OffsetDateTime::now_utc().add(self.deadline),
        ))
    }

    pub fn report_status(&self, status: ComponentStatus) {
        match self.components.write() {
            Ok(mut map) => {
                map.insert(self.component.clone(), status);
            }
            // The probe will fail on the next read and the process gets restarted
            Err(_) => warn!("poisoned health registry lock"),
        }
    }
}

#[derive(Clone)]
pub struct HealthRegistry {
    name: String,
    components: Components,
}

impl HealthRegistry {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            components: Default::default(),
        }
    }

    /// Registers a component in `Starting` state. The returned handle is
    /// moved into the component's loop.
    pub fn register(&self, component: &str, deadline: Duration) -> HealthHandle {
        let handle = HealthHandle {
            component: component.to_owned(),
            deadline,
            components: self.components.clone(),
        };
        handle.report_status(ComponentStatus::Starting);
        handle
    }

    /// Usable directly as an axum handler through `move || ready(registry.get_status())`.
    pub fn get_status(&self) -> HealthStatus {
        let Ok(components) = self.components.read() else {
            warn!("{} health check failed: poisoned lock", self.name);
            return HealthStatus::default();
        };

        let now = OffsetDateTime::now_utc();
        let mut status = HealthStatus {
            healthy: !components.is_empty(),
            components: HashMap::with_capacity(components.len()),
        };

        for (name, component) in components.iter() {
            let effective = match component {
                ComponentStatus::HealthyUntil(until) if *until > now => component.clone(),
                ComponentStatus::HealthyUntil(_) => ComponentStatus::Stalled,
                other => other.clone(),
            };
            if !matches!(effective, ComponentStatus::HealthyUntil(_)) {
                status.healthy = false;
            }
            status.components.insert(name.clone(), effective);
        }

        if !status.healthy {
            warn!("{} health check failed: {:?}", self.name, status.components);
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use std::ops::Sub;
    use std::time::Duration;

    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use time::OffsetDateTime;

    use crate::{ComponentStatus, HealthRegistry, HealthStatus};

    #[test]
    fn empty_registry_is_not_live() {
        let registry = HealthRegistry::new("liveness");
        assert!(!registry.get_status().healthy);
    }

    #[test]
    fn component_lifecycle() {
        let registry = HealthRegistry::new("liveness");
        let handle = registry.register("player_events_consumer", Duration::from_secs(30));

        let status = registry.get_status();
        assert!(!status.healthy);
        assert_eq!(
            status.components.get("player_events_consumer"),
            Some(&ComponentStatus::Starting)
        );

        handle.report_healthy();
        assert!(registry.get_status().healthy);

        handle.report_status(ComponentStatus::Unhealthy);
        assert!(!registry.get_status().healthy);
    }

    #[test]
    fn expired_report_is_stalled() {
        let registry = HealthRegistry::new("liveness");
        let handle = registry.register("rdkafka", Duration::from_secs(30));
        handle.report_status(ComponentStatus::HealthyUntil(
            OffsetDateTime::now_utc().sub(time::Duration::seconds(1)),
        ));

        let status = registry.get_status();
        assert!(!status.healthy);
        assert_eq!(
            status.components.get("rdkafka"),
            Some(&ComponentStatus::Stalled)
        );
    }

    #[test]
    fn every_component_must_be_live() {
        let registry = HealthRegistry::new("liveness");
        let players = registry.register("player_events_consumer", Duration::from_secs(30));
        let kills = registry.register("kill_events_consumer", Duration::from_secs(30));

        players.report_healthy();
        assert!(!registry.get_status().healthy);

        kills.report_healthy();
        assert!(registry.get_status().healthy);

        kills.report_status(ComponentStatus::Unhealthy);
        assert!(!registry.get_status().healthy);
    }

    #[tokio::test]
    async fn into_response() {
        let nok = HealthStatus::default().into_response();
        assert_eq!(nok.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let ok = HealthStatus {
            healthy: true,
            components: Default::default(),
        }
        .into_response();
        assert_eq!(ok.status(), StatusCode::OK);
    }
}
