use std::sync::Arc;

use crate::admission::AdmissionController;
use crate::config::ServerConfig;
use crate::login::ThrottledLogin;

/// Shared state handed to every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    pub login: Arc<ThrottledLogin>,
    pub admission: Arc<AdmissionController>,
    pub server: Arc<ServerConfig>,
    /// When false the admission middleware passes every request through.
    pub admission_enabled: bool,
}

impl AppState {
    pub fn new(
        login: Arc<ThrottledLogin>,
        admission: Arc<AdmissionController>,
        server: ServerConfig,
        admission_enabled: bool,
    ) -> Self {
        Self {
            login,
            admission,
            server: Arc::new(server),
            admission_enabled,
        }
    }
}
