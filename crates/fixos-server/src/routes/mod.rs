// Export route modules
pub mod analyze_audio;
pub mod find_shops;
pub mod repair_guide;

use crate::state::AppState;
use axum::Router;

// Function to configure all routes
pub fn configure(state: AppState) -> Router {
    Router::new()
        .merge(analyze_audio::routes(state.clone()))
        .merge(find_shops::routes(state.clone()))
        .merge(repair_guide::routes(state))
}
