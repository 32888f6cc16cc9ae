use axum::{
    Router,
    http::{HeaderValue, Method, header, request::Parts},
};
use deployment::Deployment;
use services::services::config::Config;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

pub mod error;
pub mod middleware;
pub mod routes;

pub type DeploymentImpl = local_deployment::LocalDeployment;

/// Build the full application: `/health`, the `/api` tree and the shared layers.
pub fn app(deployment: DeploymentImpl) -> Router {
    let cors = cors_layer(deployment.config());

    Router::new()
        .merge(routes::health_router())
        .nest("/api", routes::router(&deployment))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(deployment)
}

/// Exact origins plus any origin whose host ends with one of the configured suffixes.
fn cors_layer(config: &Config) -> CorsLayer {
    let exact: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    let suffixes = config.cors_origin_suffixes.clone();
    info!(
        origins = exact.len(),
        suffixes = suffixes.len(),
        "CORS configured"
    );

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &Parts| {
                exact.contains(origin) || origin_matches_suffix(origin, &suffixes)
            },
        ))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

fn origin_matches_suffix(origin: &HeaderValue, suffixes: &[String]) -> bool {
    if suffixes.is_empty() {
        return false;
    }
    let Some(host) = origin
        .to_str()
        .ok()
        .and_then(|origin| url::Url::parse(origin).ok())
        .and_then(|url| url.host_str().map(str::to_owned))
    else {
        return false;
    };
    suffixes.iter().any(|suffix| host_matches_suffix(&host, suffix))
}

/// A suffix only matches on a label boundary. `.example.com` covers subdomains,
/// `example.com` covers the apex as well.
fn host_matches_suffix(host: &str, suffix: &str) -> bool {
    let domain = suffix.trim_start_matches('.');
    if domain.is_empty() {
        return false;
    }
    match host.strip_suffix(domain) {
        Some("") => !suffix.starts_with('.'),
        Some(rest) => rest.ends_with('.'),
        None => false,
    }
}
