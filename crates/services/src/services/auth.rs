//! Accounts, sessions and password resets.

use db::{
    DBService,
    models::{
        password_reset_token::PasswordResetToken,
        refresh_token::RefreshToken,
        user::{CreateUser, User, UserRole, UserSummary},
    },
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use utils::{
    jwt::{
        ACCESS_TOKEN_TTL, JwtError, JwtService, REFRESH_TOKEN_TTL, RESET_TOKEN_TTL,
        SESSION_TOKEN_TTL, TokenKind,
    },
    password::{PasswordError, hash_password, verify_password},
};
use uuid::Uuid;

const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("email or username already in use")]
    AlreadyExists,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("account is disabled")]
    Inactive,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("user not found")]
    UserNotFound,
    #[error(transparent)]
    Jwt(JwtError),
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<JwtError> for AuthError {
    fn from(e: JwtError) -> Self {
        match e {
            JwtError::Encode(_) => AuthError::Jwt(e),
            JwtError::Expired | JwtError::Invalid(_) | JwtError::WrongKind { .. } => {
                AuthError::InvalidToken
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// Returned by register and login.
#[derive(Debug, Clone, Serialize, TS)]
pub struct AuthSession {
    pub token: String,
    pub refresh_token: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct AccessToken {
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct PasswordResetTicket {
    pub message: String,
    pub token: String,
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(AuthError::Validation("invalid email address".into())),
    }
}

fn validate_username(username: &str) -> Result<(), AuthError> {
    if username.chars().count() < MIN_USERNAME_LEN {
        return Err(AuthError::Validation(format!(
            "username must be at least {MIN_USERNAME_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct AuthService {
    db: DBService,
    jwt: JwtService,
}

impl AuthService {
    pub fn new(db: DBService, jwt: JwtService) -> Self {
        Self { db, jwt }
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<AuthSession, AuthError> {
        let email = req.email.trim().to_lowercase();
        let username = req.username.trim().to_string();
        validate_email(&email)?;
        validate_username(&username)?;
        validate_password(&req.password)?;

        if User::email_or_username_taken(&self.db.pool, &email, &username).await? {
            return Err(AuthError::AlreadyExists);
        }

        let user = User::create(
            &self.db.pool,
            &CreateUser {
                email,
                username,
                password_hash: hash_password(&req.password)?,
                role: UserRole::User,
            },
        )
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => AuthError::AlreadyExists,
            _ => AuthError::Database(e),
        })?;

        info!(user_id = %user.id, "User registered");
        self.open_session(user).await
    }

    pub async fn login(&self, req: LoginRequest) -> Result<AuthSession, AuthError> {
        let email = req.email.trim().to_lowercase();
        let user = User::find_by_email(&self.db.pool, &email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(&req.password, &user.password_hash)? {
            warn!(user_id = %user.id, "Failed login attempt");
            return Err(AuthError::InvalidCredentials);
        }
        if !user.is_active {
            return Err(AuthError::Inactive);
        }

        self.open_session(user).await
    }

    async fn open_session(&self, user: User) -> Result<AuthSession, AuthError> {
        let session = self.jwt.issue(user.id, TokenKind::Access, SESSION_TOKEN_TTL)?;
        let refresh = self.jwt.issue(user.id, TokenKind::Refresh, REFRESH_TOKEN_TTL)?;
        RefreshToken::create(&self.db.pool, user.id, &refresh.token, refresh.expires_at).await?;

        Ok(AuthSession {
            token: session.token,
            refresh_token: refresh.token,
            user,
        })
    }

    /// Resolve an access token to an active user.
    pub async fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        let claims = self.jwt.verify(token, TokenKind::Access)?;
        let user = User::find_by_id(&self.db.pool, claims.sub)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        if !user.is_active {
            return Err(AuthError::Inactive);
        }
        Ok(user)
    }

    pub async fn update_profile(
        &self,
        user: &User,
        req: UpdateProfileRequest,
    ) -> Result<User, AuthError> {
        let username = req.username.map(|u| u.trim().to_string());
        if let Some(username) = &username {
            validate_username(username)?;
            if User::username_taken_by_other(&self.db.pool, username, user.id).await? {
                return Err(AuthError::AlreadyExists);
            }
        }

        let password_hash = match &req.password {
            Some(password) => {
                validate_password(password)?;
                Some(hash_password(password)?)
            }
            None => None,
        };

        Ok(User::update_profile(
            &self.db.pool,
            user.id,
            username.as_deref(),
            password_hash.as_deref(),
        )
        .await?)
    }

    /// Exchange a stored refresh token for a short-lived access token.
    pub async fn refresh(&self, token: &str) -> Result<AccessToken, AuthError> {
        let claims = self.jwt.verify(token, TokenKind::Refresh)?;
        let stored = RefreshToken::find(&self.db.pool, token)
            .await?
            .filter(|t| t.user_id == claims.sub && !t.is_expired())
            .ok_or(AuthError::InvalidToken)?;

        let access = self.jwt.issue(stored.user_id, TokenKind::Access, ACCESS_TOKEN_TTL)?;
        Ok(AccessToken {
            access_token: access.token,
        })
    }

    /// Revoke one refresh token of `user_id`, or all of them.
    pub async fn logout(&self, user_id: Uuid, refresh_token: Option<&str>) -> Result<(), AuthError> {
        match refresh_token {
            Some(token) => {
                let owned = RefreshToken::find(&self.db.pool, token)
                    .await?
                    .is_some_and(|t| t.user_id == user_id);
                if owned {
                    RefreshToken::delete(&self.db.pool, token).await?;
                }
            }
            None => {
                RefreshToken::delete_all_for_user(&self.db.pool, user_id).await?;
            }
        }
        Ok(())
    }

    pub async fn forgot_password(&self, email: &str) -> Result<PasswordResetTicket, AuthError> {
        let user = User::find_by_email(&self.db.pool, &email.trim().to_lowercase())
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let reset = self.jwt.issue(user.id, TokenKind::Reset, RESET_TOKEN_TTL)?;
        PasswordResetToken::create(&self.db.pool, user.id, &reset.token, reset.expires_at).await?;
        info!(user_id = %user.id, "Password reset requested");

        Ok(PasswordResetTicket {
            message: "password reset token issued".into(),
            token: reset.token,
        })
    }

    /// Set a new password with a reset token. Each token works once; a reset spends every
    /// outstanding token of the user.
    pub async fn reset_password(&self, req: ResetPasswordRequest) -> Result<(), AuthError> {
        let invalid = || AuthError::Validation("invalid or expired reset token".into());
        let claims = self
            .jwt
            .verify(&req.token, TokenKind::Reset)
            .map_err(|_| invalid())?;
        validate_password(&req.new_password)?;

        let user = User::find_by_id(&self.db.pool, claims.sub)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if !PasswordResetToken::consume(&self.db.pool, &req.token, user.id).await? {
            warn!(user_id = %user.id, "Reset token reused or unknown");
            return Err(invalid());
        }

        let hash = hash_password(&req.new_password)?;
        User::update_profile(&self.db.pool, user.id, None, Some(&hash)).await?;
        PasswordResetToken::delete_all_for_user(&self.db.pool, user.id).await?;
        let revoked = RefreshToken::delete_all_for_user(&self.db.pool, user.id).await?;

        info!(user_id = %user.id, revoked, "Password reset");
        Ok(())
    }

    pub async fn list_users(&self) -> Result<Vec<UserSummary>, AuthError> {
        Ok(User::list_summaries(&self.db.pool).await?)
    }
}
