use axum::{
    Router,
    extract::{Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::container::{Container, ContainerFilter, ContainerListItem};
use deployment::Deployment;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

pub async fn list_containers(
    State(deployment): State<DeploymentImpl>,
    Query(filter): Query<ContainerFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<ContainerListItem>>>, ApiError> {
    let sort_column = filter.sort_column()?;
    let containers = Container::list(&deployment.db().pool, &filter, sort_column).await?;
    Ok(ResponseJson(ApiResponse::success(containers)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/containers", get(list_containers))
}
