use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    dto::orders::OrderRequest,
    error::{AppError, AppResult},
};

pub const DEFAULT_SESSION_TTL_SECS: i64 = 300;

/// A pending two-phase checkout. The token is a single-use capability: it is
/// removed from the store the first time anyone presents it.
#[derive(Debug, Clone)]
pub struct PaymentSession {
    pub user_id: Uuid,
    pub order_request: OrderRequest,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PaymentSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Process-local session map. Expired entries are swept lazily on `create`
/// and discovered on `consume`; there is no background eviction, so memory is
/// bounded only by traffic through those two calls. Sessions do not survive a
/// restart.
#[derive(Debug)]
pub struct PaymentSessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<String, PaymentSession>>,
}

impl Default for PaymentSessionStore {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_SESSION_TTL_SECS))
    }
}

impl PaymentSessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn create(&self, user_id: Uuid, order_request: OrderRequest) -> String {
        self.create_at(user_id, order_request, Utc::now())
    }

    pub fn consume(&self, token: &str) -> AppResult<PaymentSession> {
        self.consume_at(token, Utc::now())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub(crate) fn create_at(
        &self,
        user_id: Uuid,
        order_request: OrderRequest,
        now: DateTime<Utc>,
    ) -> String {
        let mut sessions = self.lock();

        let mut token = Uuid::new_v4().simple().to_string();
        while sessions.contains_key(&token) {
            token = Uuid::new_v4().simple().to_string();
        }

        sessions.insert(
            token.clone(),
            PaymentSession {
                user_id,
                order_request,
                created_at: now,
                expires_at: now + self.ttl,
            },
        );

        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired_at(now));
        let swept = before - sessions.len();
        if swept > 0 {
            tracing::debug!(swept, "expired payment sessions discarded");
        }

        token
    }

    pub(crate) fn consume_at(&self, token: &str, now: DateTime<Utc>) -> AppResult<PaymentSession> {
        let session = self
            .lock()
            .remove(token)
            .ok_or(AppError::SessionNotFound)?;

        if session.is_expired_at(now) {
            return Err(AppError::SessionExpired);
        }
        Ok(session)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PaymentSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
