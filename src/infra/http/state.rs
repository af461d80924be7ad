use std::sync::Arc;

use crate::application::evaluation::RolloutService;

#[derive(Clone)]
pub struct HttpState {
    pub rollout: Arc<RolloutService>,
}

impl HttpState {
    pub fn new(rollout: Arc<RolloutService>) -> Self {
        Self { rollout }
    }
}
