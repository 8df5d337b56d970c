use crate::domain_model::*;
use crate::domain_port::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("token invalid")]
    InvalidToken,
    #[error("wrong token kind")]
    WrongTokenKind,
    #[error("token revoked")]
    TokenRevoked,
    #[error("identity not found")]
    IdentityNotFound,
    #[error("insufficient role")]
    InsufficientRole,
    #[error("ownership denied")]
    OwnershipDenied,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account disabled")]
    AccountDisabled,
    #[error("email already registered")]
    EmailTaken,
    #[error("validation failed: {0}")]
    ValidationFailed(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl From<StoreError> for AuthError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Duplicate => AuthError::Store("duplicate key".to_string()),
            StoreError::Backend(e) => AuthError::Store(e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// Signs and verifies expiring bearer tokens.
pub trait TokenCodec: Send + Sync {
    fn issue_access(&self, subject: UserId, role: Role) -> Result<IssuedToken, AuthError>;
    fn issue_refresh(&self, subject: UserId) -> Result<IssuedToken, AuthError>;
    /// Verifies signature, expiry, issuer and audience. Every failure is `InvalidToken`.
    fn decode(&self, token: &str) -> Result<Claims, AuthError>;
}

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, AuthError>;
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn register(&self, input: RegisterInput) -> Result<UserProfile, AuthError>;
    async fn login(&self, input: LoginInput) -> Result<AuthTokens, AuthError>;
    /// Single-use exchange: the presented refresh token is revoked before the new pair is issued.
    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AuthError>;
    async fn logout(&self, access_token: &str) -> Result<(), AuthError>;

    /// Decode, kind and revocation checks, without an identity lookup.
    async fn verify_access(&self, token: &str) -> Result<Claims, AuthError>;
    /// Full per-request resolution including a fresh identity lookup.
    async fn resolve(&self, token: &str) -> Result<Identity, AuthError>;
    /// Subject of a well-signed access token, for rate-limit keying only. No I/O.
    fn subject_hint(&self, token: &str) -> Option<UserId>;

    async fn sweep_revocations(&self) -> Result<u64, AuthError>;
}

pub fn require_role(identity: &Identity, required: Role) -> Result<(), AuthError> {
    if identity.role.satisfies(required) {
        Ok(())
    } else {
        Err(AuthError::InsufficientRole)
    }
}

/// Per-resource check used by resource handlers; admins pass for any owner.
pub fn require_owner(identity: &Identity, owner: UserId) -> Result<(), AuthError> {
    if identity.id == owner || identity.role == Role::Admin {
        Ok(())
    } else {
        Err(AuthError::OwnershipDenied)
    }
}
