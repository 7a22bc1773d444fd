use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Resource Router Module
///
/// Maps the five generic actions onto every registered resource. The `{resource}`
/// segment selects the controller (and, by default, the model of the same name).
pub fn resource_routes() -> Router<AppState> {
    Router::new()
        // GET /api/{resource}   -> index (filter, order, project, paginate)
        // POST /api/{resource}  -> save
        .route(
            "/api/{resource}",
            get(handlers::list_records).post(handlers::create_record),
        )
        // GET /api/{resource}/{id}    -> read
        // PUT /api/{resource}/{id}    -> update
        // DELETE /api/{resource}/{id} -> soft delete (status sentinel)
        .route(
            "/api/{resource}/{id}",
            get(handlers::read_record)
                .put(handlers::update_record)
                .delete(handlers::delete_record),
        )
}
