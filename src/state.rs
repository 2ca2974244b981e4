//! Shared application state for all routes: admin setup plus the collaborators each request's module borrows.

use crate::module::{AdminEnv, Collaborators};
use crate::permission::AuthorizationSource;
use crate::record::RecordStore;
use crate::session::SessionProvider;
use crate::settings::SettingsPersistence;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub env: Arc<AdminEnv>,
    pub records: Arc<dyn RecordStore>,
    pub settings: Arc<dyn SettingsPersistence>,
    pub sessions: Arc<dyn SessionProvider>,
    pub authorization: Arc<dyn AuthorizationSource>,
}

impl AppState {
    /// Collaborators for one request, bound to the caller's session and user.
    pub fn collaborators(&self, session_id: &str, user: Option<&str>) -> Collaborators {
        Collaborators {
            records: self.records.clone(),
            authorizer: self.authorization.for_user(user),
            settings: self.settings.clone(),
            session: self.sessions.session(session_id),
        }
    }
}
