use axum::{
    Router,
    extract::{Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::armor::{Armor, ArmorFilter, ArmorListItem};
use deployment::Deployment;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

pub async fn list_armor(
    State(deployment): State<DeploymentImpl>,
    Query(filter): Query<ArmorFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<ArmorListItem>>>, ApiError> {
    let armor = Armor::list(&deployment.db().pool, &filter).await?;
    Ok(ResponseJson(ApiResponse::success(armor)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/armor", get(list_armor))
}
