//! Shared application state for Axum routers.

use std::sync::Arc;

use taskboard_loader::LoaderConfig;
use taskboard_storage::Store;

use crate::auth::AuthConfig;
use crate::config::ApiConfig;
use crate::events::EventBus;
use crate::loaders::RequestLoaders;
use crate::middleware::RateLimitState;
use crate::routes::graphql::{build_schema, TaskboardSchema};

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub auth: Arc<AuthConfig>,
    pub config: Arc<ApiConfig>,
    /// Change events feeding GraphQL subscriptions.
    pub events: EventBus,
    pub graphql_schema: TaskboardSchema,
    pub rate_limit: RateLimitState,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, auth: AuthConfig, config: ApiConfig) -> Self {
        let auth = Arc::new(auth);
        let events = EventBus::new(config.event_capacity);
        let graphql_schema = build_schema(
            store.clone(),
            auth.clone(),
            events.clone(),
            config.loader_config(),
        );
        let rate_limit = RateLimitState::new(&config);

        Self {
            store,
            auth,
            config: Arc::new(config),
            events,
            graphql_schema,
            rate_limit,
            start_time: std::time::Instant::now(),
        }
    }

    /// Fresh loaders for one request.
    pub fn request_loaders(&self) -> RequestLoaders {
        RequestLoaders::new(self.store.clone(), self.loader_config())
    }

    pub fn loader_config(&self) -> LoaderConfig {
        self.config.loader_config()
    }
}

crate::impl_from_ref!(Arc<dyn Store>, store);
crate::impl_from_ref!(Arc<AuthConfig>, auth);
crate::impl_from_ref!(Arc<ApiConfig>, config);
crate::impl_from_ref!(EventBus, events);
crate::impl_from_ref!(TaskboardSchema, graphql_schema);
crate::impl_from_ref!(RateLimitState, rate_limit);
crate::impl_from_ref!(std::time::Instant, start_time);
