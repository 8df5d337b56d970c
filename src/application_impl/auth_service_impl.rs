use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Arc;

const MIN_PASSWORD_LEN: usize = 8;

pub struct RealAuthService {
    user_repo: Arc<dyn UserRepo>,
    revocation_store: Arc<dyn RevocationStore>,
    credential_hasher: Arc<dyn CredentialHasher>,
    token_codec: Arc<dyn TokenCodec>,
}

impl RealAuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        revocation_store: Arc<dyn RevocationStore>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_codec: Arc<dyn TokenCodec>,
    ) -> Self {
        Self {
            user_repo,
            revocation_store,
            credential_hasher,
            token_codec,
        }
    }

    fn validate_registration(input: &RegisterInput) -> Result<(), AuthError> {
        let email = input.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => return Err(AuthError::ValidationFailed("invalid email".to_string())),
        }
        if input.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::ValidationFailed("password too short".to_string()));
        }
        Ok(())
    }

    fn issue_pair(&self, identity: &Identity) -> Result<AuthTokens, AuthError> {
        let access = self.token_codec.issue_access(identity.id, identity.role)?;
        let refresh = self.token_codec.issue_refresh(identity.id)?;
        Ok(AuthTokens::bearer(access, refresh))
    }

    /// Fresh lookup; inactive accounts are treated as absent.
    async fn active_identity(&self, user_id: UserId) -> Result<Identity, AuthError> {
        match self.user_repo.get_by_id(user_id).await? {
            Some(record) if record.is_active => Ok(record.identity()),
            _ => Err(AuthError::IdentityNotFound),
        }
    }

    async fn ensure_not_revoked(&self, claims: &Claims) -> Result<(), AuthError> {
        if let Some(jti) = &claims.jti {
            if self.revocation_store.is_revoked(jti).await? {
                return Err(AuthError::TokenRevoked);
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn register(&self, input: RegisterInput) -> Result<UserProfile, AuthError> {
        Self::validate_registration(&input)?;
        let email = input.email.trim().to_string();

        if self.user_repo.get_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = self.credential_hasher.hash_password(&input.password).await?;
        let record = self
            .user_repo
            .create(&NewUser {
                email,
                password_hash,
                display_name: input.display_name,
            })
            .await
            .map_err(|e| match e {
                // lost a race with a concurrent registration
                StoreError::Duplicate => AuthError::EmailTaken,
                other => other.into(),
            })?;

        tracing::info!(user_id = %record.user_id, "user registered");
        Ok(record.profile())
    }

    async fn login(&self, input: LoginInput) -> Result<AuthTokens, AuthError> {
        let record = self
            .user_repo
            .get_by_email(input.email.trim())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let ok = self
            .credential_hasher
            .verify_password(&input.password, &record.password_hash)
            .await?;
        if !ok {
            return Err(AuthError::InvalidCredentials);
        }
        if !record.is_active {
            return Err(AuthError::AccountDisabled);
        }

        self.issue_pair(&record.identity())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        let claims = self.token_codec.decode(refresh_token)?;
        if claims.kind != TokenKind::Refresh {
            return Err(AuthError::WrongTokenKind);
        }
        self.ensure_not_revoked(&claims).await?;

        // Rotation: the presented token is spent before anything new is issued.
        // Without a jti it could never be spent, so it is not accepted at all.
        let jti = claims.jti.as_ref().ok_or(AuthError::InvalidToken)?;
        let newly_revoked = self.revocation_store.revoke(jti, claims.expires_at).await?;
        if !newly_revoked {
            return Err(AuthError::TokenRevoked);
        }

        let identity = self.active_identity(claims.subject).await?;
        tracing::debug!(user_id = %identity.id, "refresh token rotated");
        self.issue_pair(&identity)
    }

    async fn logout(&self, access_token: &str) -> Result<(), AuthError> {
        let claims = self.verify_access(access_token).await?;
        self.active_identity(claims.subject).await?;

        if let Some(jti) = &claims.jti {
            self.revocation_store.revoke(jti, claims.expires_at).await?;
        }
        tracing::debug!(user_id = %claims.subject, "access token revoked");
        Ok(())
    }

    async fn verify_access(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.token_codec.decode(token)?;
        if claims.kind != TokenKind::Access {
            return Err(AuthError::WrongTokenKind);
        }
        self.ensure_not_revoked(&claims).await?;
        Ok(claims)
    }

    async fn resolve(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = self.verify_access(token).await?;
        self.active_identity(claims.subject).await
    }

    fn subject_hint(&self, token: &str) -> Option<UserId> {
        self.token_codec
            .decode(token)
            .ok()
            .filter(|claims| claims.kind == TokenKind::Access)
            .map(|claims| claims.subject)
    }

    async fn sweep_revocations(&self) -> Result<u64, AuthError> {
        Ok(self.revocation_store.sweep().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::{FakeCredentialHasher, JwtConfig, JwtHs256Codec};
    use crate::infra_memory::{MemoryRevocationStore, MemoryUserRepo};
    use std::time::Duration;

    struct Fixture {
        service: RealAuthService,
        users: Arc<MemoryUserRepo>,
        codec: Arc<JwtHs256Codec>,
    }

    fn fixture() -> Fixture {
        let users = Arc::new(MemoryUserRepo::new());
        let codec = Arc::new(JwtHs256Codec::new(JwtConfig {
            issuer: "fasttrack.test".to_string(),
            audience: "fasttrack-client".to_string(),
            access_ttl: Duration::from_secs(15 * 60),
            refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            signing_key: b"unit-test-key".to_vec(),
        }));
        let service = RealAuthService::new(
            users.clone(),
            Arc::new(MemoryRevocationStore::new()),
            Arc::new(FakeCredentialHasher),
            codec.clone(),
        );
        Fixture {
            service,
            users,
            codec,
        }
    }

    async fn registered(fx: &Fixture, email: &str) -> (UserProfile, AuthTokens) {
        let profile = fx
            .service
            .register(RegisterInput {
                email: email.to_string(),
                password: "password123".to_string(),
                display_name: "Test".to_string(),
            })
            .await
            .unwrap();
        let tokens = fx
            .service
            .login(LoginInput {
                email: email.to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap();
        (profile, tokens)
    }

    #[tokio::test]
    async fn fresh_access_token_resolves_until_revoked() {
        let fx = fixture();
        let (profile, tokens) = registered(&fx, "a@x.io").await;

        let identity = fx.service.resolve(&tokens.access_token).await.unwrap();
        assert_eq!(identity.id, profile.id);
        assert_eq!(identity.role, Role::User);

        fx.service.logout(&tokens.access_token).await.unwrap();
        assert!(matches!(
            fx.service.resolve(&tokens.access_token).await,
            Err(AuthError::TokenRevoked)
        ));
    }

    #[tokio::test]
    async fn refresh_token_is_not_an_access_credential() {
        let fx = fixture();
        let (_, tokens) = registered(&fx, "a@x.io").await;

        assert!(matches!(
            fx.service.resolve(&tokens.refresh_token).await,
            Err(AuthError::WrongTokenKind)
        ));
        assert!(matches!(
            fx.service.refresh(&tokens.access_token).await,
            Err(AuthError::WrongTokenKind)
        ));
        assert_eq!(fx.service.subject_hint(&tokens.refresh_token), None);
    }

    #[tokio::test]
    async fn refresh_rotation_is_single_use() {
        let fx = fixture();
        let (_, tokens) = registered(&fx, "a@x.io").await;

        let rotated = fx.service.refresh(&tokens.refresh_token).await.unwrap();
        assert!(fx.service.resolve(&rotated.access_token).await.is_ok());
        assert!(matches!(
            fx.service.refresh(&tokens.refresh_token).await,
            Err(AuthError::TokenRevoked)
        ));
        assert!(fx.service.refresh(&rotated.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn logout_leaves_other_tokens_alone() {
        let fx = fixture();
        let (_, first) = registered(&fx, "a@x.io").await;
        let second = fx
            .service
            .login(LoginInput {
                email: "a@x.io".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap();

        fx.service.logout(&first.access_token).await.unwrap();
        assert!(fx.service.resolve(&first.access_token).await.is_err());
        assert!(fx.service.resolve(&second.access_token).await.is_ok());
        assert!(fx.service.refresh(&first.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn deactivation_is_observed_on_next_resolve() {
        let fx = fixture();
        let (profile, tokens) = registered(&fx, "a@x.io").await;

        let changes = UserChanges {
            is_active: Some(false),
            ..UserChanges::default()
        };
        fx.users.update(profile.id, &changes).await.unwrap();

        assert!(matches!(
            fx.service.resolve(&tokens.access_token).await,
            Err(AuthError::IdentityNotFound)
        ));
        assert!(matches!(
            fx.service
                .login(LoginInput {
                    email: "a@x.io".to_string(),
                    password: "password123".to_string(),
                })
                .await,
            Err(AuthError::AccountDisabled)
        ));
    }

    #[tokio::test]
    async fn role_change_is_observed_without_reissue() {
        let fx = fixture();
        let (profile, tokens) = registered(&fx, "a@x.io").await;
        let changes = UserChanges {
            role: Some(Role::Admin),
            ..UserChanges::default()
        };
        fx.users.update(profile.id, &changes).await.unwrap();

        let identity = fx.service.resolve(&tokens.access_token).await.unwrap();
        assert!(require_role(&identity, Role::Admin).is_ok());
    }

    #[tokio::test]
    async fn token_for_unknown_subject_is_rejected() {
        let fx = fixture();
        let ghost = fx.codec.issue_access(UserId(404), Role::User).unwrap();

        assert!(matches!(
            fx.service.resolve(&ghost.token).await,
            Err(AuthError::IdentityNotFound)
        ));
        assert!(fx.service.verify_access(&ghost.token).await.is_ok());
    }

    #[tokio::test]
    async fn login_and_register_failures() {
        let fx = fixture();
        registered(&fx, "a@x.io").await;

        let duplicate = fx
            .service
            .register(RegisterInput {
                email: "a@x.io".to_string(),
                password: "password123".to_string(),
                display_name: String::new(),
            })
            .await;
        assert!(matches!(duplicate, Err(AuthError::EmailTaken)));

        let short = fx
            .service
            .register(RegisterInput {
                email: "b@x.io".to_string(),
                password: "short".to_string(),
                display_name: String::new(),
            })
            .await;
        assert!(matches!(short, Err(AuthError::ValidationFailed(_))));

        let bad_password = fx
            .service
            .login(LoginInput {
                email: "a@x.io".to_string(),
                password: "nope-nope".to_string(),
            })
            .await;
        assert!(matches!(bad_password, Err(AuthError::InvalidCredentials)));

        let unknown = fx
            .service
            .login(LoginInput {
                email: "zzz@x.io".to_string(),
                password: "password123".to_string(),
            })
            .await;
        assert!(matches!(unknown, Err(AuthError::InvalidCredentials)));
    }

    // Misses the email precheck like a registration racing a concurrent one.
    struct RacingRepo(MemoryUserRepo);

    #[async_trait::async_trait]
    impl UserRepo for RacingRepo {
        async fn create(&self, user: &NewUser) -> Result<UserRecord, StoreError> {
            self.0.create(user).await
        }
        async fn get_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, StoreError> {
            self.0.get_by_id(user_id).await
        }
        async fn get_by_email(&self, _email: &str) -> Result<Option<UserRecord>, StoreError> {
            Ok(None)
        }
        async fn list_after(
            &self,
            after: Option<UserId>,
            limit: u32,
        ) -> Result<Vec<UserRecord>, StoreError> {
            self.0.list_after(after, limit).await
        }
        async fn update(
            &self,
            user_id: UserId,
            changes: &UserChanges,
        ) -> Result<Option<UserRecord>, StoreError> {
            self.0.update(user_id, changes).await
        }
    }

    #[tokio::test]
    async fn duplicate_insert_is_reported_as_email_taken() {
        let fx = fixture();
        let service = RealAuthService::new(
            Arc::new(RacingRepo(MemoryUserRepo::new())),
            Arc::new(MemoryRevocationStore::new()),
            Arc::new(FakeCredentialHasher),
            fx.codec.clone(),
        );
        let input = RegisterInput {
            email: "race@x.io".to_string(),
            password: "password123".to_string(),
            display_name: String::new(),
        };
        service.register(input.clone()).await.unwrap();
        assert!(matches!(
            service.register(input).await,
            Err(AuthError::EmailTaken)
        ));
    }

    #[tokio::test]
    async fn garbage_token_is_invalid() {
        let fx = fixture();
        assert!(matches!(
            fx.service.resolve("garbage").await,
            Err(AuthError::InvalidToken)
        ));
        assert_eq!(fx.service.subject_hint("garbage"), None);
    }
}
