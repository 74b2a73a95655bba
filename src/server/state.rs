use std::sync::Arc;

use crate::studio::Studio;

#[derive(Clone)]
pub(crate) struct ServerState {
    pub(crate) studio: Arc<Studio>,
}
