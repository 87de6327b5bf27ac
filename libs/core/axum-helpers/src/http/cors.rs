use tower_http::cors::CorsLayer;

/// Creates a permissive CORS layer: any origin, method and header.
pub fn create_permissive_cors_layer() -> CorsLayer {
    CorsLayer::permissive()
}
