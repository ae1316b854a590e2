use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handlers;
use crate::state::AppState;

pub fn api_routes(max_upload_size: u64) -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest("/v1", v1_routes(max_upload_size))
}

fn v1_routes(max_upload_size: u64) -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest("/files", file_routes(max_upload_size))
}

fn file_routes(max_upload_size: u64) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            handlers::files::list_files,
            handlers::files::upload_file
        ))
        .routes(routes!(handlers::files::storage_stats))
        .routes(routes!(handlers::files::get_file))
        .routes(routes!(handlers::files::download_file))
        .layer(handlers::files::upload_body_limit(max_upload_size))
}
