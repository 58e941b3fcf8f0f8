use super::bounded;
use crate::domain::clock::Clock;
use crate::domain::ports::{SessionStore, UserDirectory};
use crate::domain::session::{
    AccessClaims, RefreshToken, SessionTokens, TokenKeys, generate_refresh_token,
    hash_refresh_token,
};
use crate::domain::user::UserAccount;
use crate::error::{AuthFailure, EngineError, Result};
use chrono::TimeDelta;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Issues and rotates refresh-token sessions.
///
/// Each refresh token is good for exactly one rotation. Presenting a revoked
/// token again means it was copied, so every session of its owner is
/// revoked before the caller hears `ReuseDetected`.
pub struct SessionRotator {
    users: Arc<dyn UserDirectory>,
    sessions: Arc<dyn SessionStore>,
    keys: TokenKeys,
    access_ttl: TimeDelta,
    refresh_ttl: TimeDelta,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

fn ttl(value: Duration, name: &str) -> Result<TimeDelta> {
    TimeDelta::from_std(value)
        .map_err(|_| EngineError::Validation(format!("{name} is out of range")))
}

impl SessionRotator {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        sessions: Arc<dyn SessionStore>,
        keys: TokenKeys,
        access_ttl: Duration,
        refresh_ttl: Duration,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            users,
            sessions,
            keys,
            access_ttl: ttl(access_ttl, "access_ttl")?,
            refresh_ttl: ttl(refresh_ttl, "refresh_ttl")?,
            clock,
            timeout,
        })
    }

    async fn active_user(&self, user_id: Uuid) -> Result<UserAccount> {
        bounded(self.timeout, self.users.get_user(user_id))
            .await?
            .filter(|u| u.is_active)
            .ok_or(EngineError::Auth(AuthFailure::UserInactive))
    }

    async fn open_session(&self, user: &UserAccount) -> Result<SessionTokens> {
        let now = self.clock.now();
        let raw = generate_refresh_token();
        let record = RefreshToken::new(user.id, hash_refresh_token(&raw), now, self.refresh_ttl);
        bounded(self.timeout, self.sessions.insert_refresh_token(record)).await?;

        let access_token = self
            .keys
            .sign_access(user.id, user.role, now, self.access_ttl)?;
        Ok(SessionTokens {
            access_token,
            refresh_token: raw,
            token_type: "Bearer",
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    pub async fn issue_session(&self, user_id: Uuid) -> Result<SessionTokens> {
        let user = self.active_user(user_id).await?;
        let tokens = self.open_session(&user).await?;
        info!(user_id = %user_id, "session issued");
        Ok(tokens)
    }

    pub async fn rotate(&self, presented: &str) -> Result<SessionTokens> {
        let hash = hash_refresh_token(presented.trim());
        let record = bounded(self.timeout, self.sessions.find_by_hash(&hash))
            .await?
            .ok_or(EngineError::Auth(AuthFailure::InvalidToken))?;

        if record.is_revoked() {
            return Err(self.reuse_detected(record.user_id).await);
        }
        let now = self.clock.now();
        if record.is_expired(now) {
            return Err(EngineError::Auth(AuthFailure::Expired));
        }
        // Losing this race means another rotation already spent the token.
        if !bounded(self.timeout, self.sessions.revoke_if_active(record.id, now)).await? {
            return Err(self.reuse_detected(record.user_id).await);
        }

        let user = self.active_user(record.user_id).await?;
        let tokens = self.open_session(&user).await?;
        info!(user_id = %user.id, "session rotated");
        Ok(tokens)
    }

    async fn reuse_detected(&self, user_id: Uuid) -> EngineError {
        match bounded(
            self.timeout,
            self.sessions.revoke_all_for_user(user_id, self.clock.now()),
        )
        .await
        {
            Ok(revoked) => {
                warn!(
                    user_id = %user_id,
                    revoked,
                    "refresh token reuse detected, sessions revoked"
                );
                EngineError::Auth(AuthFailure::ReuseDetected)
            }
            Err(e) => {
                warn!(
                    user_id = %user_id,
                    error = %e,
                    "refresh token reuse detected, revocation failed"
                );
                e
            }
        }
    }

    /// Revokes every active session of the user; returns how many.
    pub async fn revoke_all(&self, user_id: Uuid) -> Result<usize> {
        let revoked = bounded(
            self.timeout,
            self.sessions.revoke_all_for_user(user_id, self.clock.now()),
        )
        .await?;
        info!(user_id = %user_id, revoked, "sessions revoked");
        Ok(revoked)
    }

    pub fn verify_access(&self, access_token: &str) -> Result<AccessClaims> {
        self.keys.verify_access(access_token, self.clock.now())
    }
}
