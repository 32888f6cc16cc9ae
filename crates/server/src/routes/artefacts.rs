use axum::{
    Router,
    extract::{Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::artefact::{Artefact, ArtefactFilter, ArtefactListItem};
use deployment::Deployment;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

pub async fn list_artefacts(
    State(deployment): State<DeploymentImpl>,
    Query(filter): Query<ArtefactFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<ArtefactListItem>>>, ApiError> {
    let sort_column = filter.sort_column()?;
    let artefacts = Artefact::list(&deployment.db().pool, &filter, sort_column).await?;
    Ok(ResponseJson(ApiResponse::success(artefacts)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/artefacts", get(list_artefacts))
}
