//! Loadout builds. Reads accept an optional token so owners see their private builds.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::{
    build::{BuildDetails, BuildFilter, CreateBuild, UpdateBuild},
    item::DEFAULT_LANG,
    tag::TagUsage,
};
use deployment::Deployment;
use serde::Deserialize;
use services::services::build::{FavoriteState, LikeState};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::ApiError,
    middleware::{CurrentUser, MaybeUser, optional_auth},
};

const DEFAULT_POPULAR_LIMIT: i64 = 10;

#[derive(Debug, Default, Deserialize, TS)]
pub struct LangQuery {
    pub lang: Option<String>,
}

impl LangQuery {
    fn lang(&self) -> &str {
        self.lang.as_deref().unwrap_or(DEFAULT_LANG)
    }
}

#[derive(Debug, Default, Deserialize, TS)]
pub struct PopularQuery {
    pub lang: Option<String>,
    pub limit: Option<i64>,
}

type BuildResponse = ResponseJson<ApiResponse<BuildDetails>>;
type BuildListResponse = ResponseJson<ApiResponse<Vec<BuildDetails>>>;

pub async fn list_builds(
    State(deployment): State<DeploymentImpl>,
    viewer: MaybeUser,
    Query(filter): Query<BuildFilter>,
) -> Result<BuildListResponse, ApiError> {
    let builds = deployment.builds().list(&filter, viewer.id()).await?;
    Ok(ResponseJson(ApiResponse::success(builds)))
}

pub async fn list_builds_by_tag(
    State(deployment): State<DeploymentImpl>,
    viewer: MaybeUser,
    Path(tag): Path<String>,
    Query(mut filter): Query<BuildFilter>,
) -> Result<BuildListResponse, ApiError> {
    filter.tags = Some(tag);
    let builds = deployment.builds().list(&filter, viewer.id()).await?;
    Ok(ResponseJson(ApiResponse::success(builds)))
}

pub async fn popular_builds(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<PopularQuery>,
) -> Result<BuildListResponse, ApiError> {
    let lang = query.lang.as_deref().unwrap_or(DEFAULT_LANG);
    let limit = query.limit.unwrap_or(DEFAULT_POPULAR_LIMIT);
    let builds = deployment.builds().popular(lang, limit).await?;
    Ok(ResponseJson(ApiResponse::success(builds)))
}

pub async fn popular_tags(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<PopularQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<TagUsage>>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_POPULAR_LIMIT);
    let tags = deployment.builds().popular_tags(limit).await?;
    Ok(ResponseJson(ApiResponse::success(tags)))
}

pub async fn favorite_builds(
    State(deployment): State<DeploymentImpl>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<LangQuery>,
) -> Result<BuildListResponse, ApiError> {
    let builds = deployment.builds().favorites(user.id, query.lang()).await?;
    Ok(ResponseJson(ApiResponse::success(builds)))
}

pub async fn get_build(
    State(deployment): State<DeploymentImpl>,
    viewer: MaybeUser,
    Path(id): Path<Uuid>,
    Query(query): Query<LangQuery>,
) -> Result<BuildResponse, ApiError> {
    let build = deployment.builds().view(id, viewer.id(), query.lang()).await?;
    Ok(ResponseJson(ApiResponse::success(build)))
}

pub async fn create_build(
    State(deployment): State<DeploymentImpl>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<LangQuery>,
    Json(payload): Json<CreateBuild>,
) -> Result<(StatusCode, BuildResponse), ApiError> {
    let build = deployment
        .builds()
        .create(&user, payload, query.lang())
        .await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(build))))
}

pub async fn update_build(
    State(deployment): State<DeploymentImpl>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Query(query): Query<LangQuery>,
    Json(payload): Json<UpdateBuild>,
) -> Result<BuildResponse, ApiError> {
    let build = deployment
        .builds()
        .update(&user, id, payload, query.lang())
        .await?;
    Ok(ResponseJson(ApiResponse::success(build)))
}

pub async fn delete_build(
    State(deployment): State<DeploymentImpl>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    deployment.builds().delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn clone_build(
    State(deployment): State<DeploymentImpl>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Query(query): Query<LangQuery>,
) -> Result<(StatusCode, BuildResponse), ApiError> {
    let build = deployment
        .builds()
        .clone_build(&user, id, query.lang())
        .await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(build))))
}

pub async fn like_build(
    State(deployment): State<DeploymentImpl>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<LikeState>>, ApiError> {
    let state = deployment.builds().toggle_like(&user, id).await?;
    Ok(ResponseJson(ApiResponse::success(state)))
}

pub async fn favorite_build(
    State(deployment): State<DeploymentImpl>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<FavoriteState>>, ApiError> {
    let state = deployment.builds().toggle_favorite(&user, id).await?;
    Ok(ResponseJson(ApiResponse::success(state)))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    // Static segments win over `/{id}` in the matcher, so `/popular` never parses as an id.
    let builds = Router::new()
        .route("/", get(list_builds).post(create_build))
        .route("/popular", get(popular_builds))
        .route("/favorites", get(favorite_builds))
        .route("/tags/popular", get(popular_tags))
        .route("/tags/{tag}", get(list_builds_by_tag))
        .route(
            "/{id}",
            get(get_build).put(update_build).delete(delete_build),
        )
        .route("/{id}/clone", post(clone_build))
        .route("/{id}/like", post(like_build))
        .route("/{id}/favorite", post(favorite_build))
        .route_layer(from_fn_with_state(deployment.clone(), optional_auth));

    Router::new().nest("/builds", builds)
}
