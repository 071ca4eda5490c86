use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::config::AppConfig;
use crate::handlers;
use crate::state::AppState;

pub fn routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::health::health))
        .routes(routes!(handlers::auth::me))
        .merge(asset_routes(config))
}

fn asset_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            handlers::asset::upload_asset,
            handlers::asset::list_assets,
            handlers::asset::delete_asset
        ))
        .layer(handlers::asset::upload_body_limit(
            config.upload.size_limits(),
        ))
}
