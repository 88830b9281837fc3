use std::sync::Arc;

use crate::service::ActivityService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ActivityService>,
}

impl AppState {
    pub fn new(service: Arc<ActivityService>) -> Self {
        Self { service }
    }
}
