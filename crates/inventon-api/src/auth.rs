use std::sync::Arc;

use axum::http::StatusCode;
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::warn;

use inventon_core::stats::StatisticsAggregator;
use inventon_core::{Actor, AuthorizationGate, FaqIndex, TicketManager};
use inventon_types::RecordStore;
use inventon_types::api::Claims;
use inventon_types::models::UserProfile;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub tickets: TicketManager,
    pub faq: FaqIndex,
    pub stats: StatisticsAggregator,
    pub gate: AuthorizationGate,
    pub jwt_secret: String,
}

impl AppStateInner {
    pub fn new(store: Arc<dyn RecordStore>, gate: AuthorizationGate, jwt_secret: String) -> AppState {
        let stats = StatisticsAggregator::new(store.clone());
        Arc::new(Self {
            tickets: TicketManager::new(store.clone(), stats.clone()),
            faq: FaqIndex::new(store, stats.clone()),
            stats,
            gate,
            jwt_secret,
        })
    }

    pub fn is_privileged(&self, claims: &Claims) -> bool {
        self.gate.is_privileged(&Actor::from(claims))
    }

    /// 403 unless the caller passes the authorization gate.
    pub fn require_privileged(&self, claims: &Claims) -> Result<(), StatusCode> {
        if self.is_privileged(claims) {
            Ok(())
        } else {
            warn!("User {} denied administrative operation", claims.sub);
            Err(StatusCode::FORBIDDEN)
        }
    }

    /// The caller's profile as recorded on every interaction.
    pub fn profile_of(&self, claims: &Claims) -> UserProfile {
        UserProfile {
            user_id: claims.sub,
            username: claims.username.clone(),
            display_name: claims.display_name.clone(),
            is_admin: self.is_privileged(claims),
        }
    }
}

/// Signs `claims` with the shared secret. The chat-bot front end mints the
/// same tokens on its side.
pub fn create_token(secret: &str, claims: &Claims) -> anyhow::Result<String> {
    let token = encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}
