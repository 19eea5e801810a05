//! OpenAPI Specification for the Taskboard API
//!
//! Generated by utoipa from route annotations and DTO schemas.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::auth::TokenPair;
use crate::error::{ApiError, ErrorCode};
use crate::routes::health::{ComponentHealth, HealthDetails, HealthResponse, HealthStatus};
use crate::routes::{health, projects, tasks, upload, users};
use crate::types::*;

use taskboard_core::Role;

/// OpenAPI document for the REST API. GraphQL is self-describing and not
/// listed here.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Taskboard API",
        version = "0.1.0",
        description = "Users, projects and tasks over REST and GraphQL"
    ),
    servers(
        (url = "http://localhost:3000", description = "Local Development")
    ),
    tags(
        (name = "Users", description = "Registration, login and profile"),
        (name = "Projects", description = "Projects owned by users"),
        (name = "Tasks", description = "Tasks assigned within projects"),
        (name = "Uploads", description = "Image uploads"),
        (name = "Health", description = "Liveness and readiness probes")
    ),
    paths(
        // === User Routes ===
        users::register,
        users::login,
        users::refresh,
        users::profile,

        // === Project Routes ===
        projects::list_projects,
        projects::get_project,
        projects::create_project,
        projects::update_project,
        projects::delete_project,

        // === Task Routes ===
        tasks::list_tasks,
        tasks::get_task,
        tasks::create_task,
        tasks::update_task,
        tasks::delete_task,

        // === Upload Routes ===
        upload::upload_file,

        // === Health Routes ===
        health::ping,
        health::readiness,
    ),
    components(
        schemas(
            ApiError, ErrorCode, Role, TokenPair,
            RegisterRequest, LoginRequest, RefreshRequest, UserResponse,
            CreateProjectRequest, UpdateProjectRequest, ProjectResponse, ProjectDetailResponse,
            CreateTaskRequest, UpdateTaskRequest, TaskResponse,
            UploadResponse,
            HealthResponse, HealthStatus, HealthDetails, ComponentHealth
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Access token from /users/login"))
                        .build(),
                ),
            );
        }
    }
}

impl ApiDoc {
    /// The document as pretty-printed JSON.
    pub fn to_json() -> Result<String, serde_json::Error> {
        Self::openapi().to_pretty_json()
    }
}
