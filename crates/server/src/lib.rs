pub mod athena;
pub mod bootstrap;
pub mod health;
pub mod invocations;
pub mod sigv4;
pub mod tools;

pub use athena::AthenaQueryService;
pub use bootstrap::{bootstrap, bootstrap_with_config, build_dispatcher, Application, BootstrapError};

use axum::Router;

/// The full HTTP surface: tool routes, `/invocations` and `/health`.
pub fn app_router(app: &Application) -> Router {
    let health = health::HealthState::from_config(&app.config, app.dispatcher.templates().len());
    tools::router(app.dispatcher.clone())
        .merge(invocations::router(app.agent.clone()))
        .merge(health::router(health))
}
