// src/state.rs
use std::sync::Arc;

use crate::auth::TokenKeys;
use crate::config::AuthConfig;
use crate::identity::IdentityService;
use crate::ledger::VoteLedger;
use crate::poll::PollService;
use crate::store::Store;

/// Services shared by every handler, all backed by the same store.
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<IdentityService>,
    pub polls: Arc<PollService>,
    pub ledger: Arc<VoteLedger>,
    pub tokens: Arc<TokenKeys>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, auth: &AuthConfig) -> Self {
        Self {
            identity: Arc::new(IdentityService::new(store.clone())),
            polls: Arc::new(PollService::new(store.clone())),
            ledger: Arc::new(VoteLedger::new(store)),
            tokens: Arc::new(TokenKeys::new(auth)),
        }
    }
}
