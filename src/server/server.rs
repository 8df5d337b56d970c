use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::server::*;
use crate::settings::Settings;
use anyhow::anyhow;
use sqlx::MySqlPool;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pub user_service: Arc<dyn UserService>,
    pub connection_manager: Arc<ConnectionManager>,
    pub rate_limiter: Arc<RateLimiter>,
    pub notifier: Arc<Notifier>,
    maintenance_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    pool: Option<MySqlPool>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let (user_repo, stored_revocations, pool): (
            Arc<dyn UserRepo>,
            Arc<dyn RevocationStore>,
            Option<MySqlPool>,
        ) = match settings.storage.backend.as_str() {
            "memory" => (
                Arc::new(MemoryUserRepo::new()),
                Arc::new(MemoryRevocationStore::new()),
                None,
            ),
            "mysql" => {
                let url = settings
                    .storage
                    .mysql_url
                    .as_deref()
                    .ok_or_else(|| anyhow!("storage.mysql_url is required for mysql storage"))?;
                let pool = MySqlPool::connect(url).await?;
                (
                    Arc::new(MySqlUserRepo::new(pool.clone())),
                    Arc::new(MySqlRevocationStore::new(pool.clone())),
                    Some(pool),
                )
            }
            other => return Err(anyhow!("Unknown storage backend: {}", other)),
        };

        let revocation_store: Arc<dyn RevocationStore> =
            match settings.revocation.backend.as_str() {
                "storage" => stored_revocations,
                "redis" => {
                    let url = settings.revocation.redis_url.as_deref().ok_or_else(|| {
                        anyhow!("revocation.redis_url is required for redis revocation")
                    })?;
                    let redis_client = redis::Client::open(url)?;
                    let redis_manager = redis_client.get_connection_manager().await?;
                    Arc::new(RedisRevocationStore::new(
                        redis_manager,
                        settings.revocation.redis_prefix.clone(),
                    ))
                }
                other => return Err(anyhow!("Unknown revocation backend: {}", other)),
            };

        let credential_hasher: Arc<dyn CredentialHasher> = match settings.auth.hasher.as_str() {
            "argon2" => Arc::new(Argon2PasswordHasher),
            "fake" => Arc::new(FakeCredentialHasher),
            other => return Err(anyhow!("Unknown credential hasher: {}", other)),
        };

        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtHs256Codec::new(JwtConfig {
            issuer: settings.auth.issuer.clone(),
            audience: settings.auth.audience.clone(),
            access_ttl: Duration::from_secs(settings.auth.access_ttl_secs),
            refresh_ttl: Duration::from_secs(settings.auth.refresh_ttl_secs),
            signing_key: settings.auth.signing_key.clone().into_bytes(),
        }));

        let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            user_repo.clone(),
            revocation_store,
            credential_hasher,
            token_codec,
        ));
        let user_service: Arc<dyn UserService> = Arc::new(RealUserService::new(user_repo));

        // region runtime infra
        let cancel = CancellationToken::new();

        let connection_manager = Arc::new(ConnectionManager::new(Duration::from_secs(
            settings.realtime.ping_interval_secs,
        )));
        let rate_limiter = Arc::new(RateLimiter::new(
            settings.rate_limit.capacity,
            Duration::from_secs(settings.rate_limit.window_secs),
        ));
        let notifier = Arc::new(Notifier::new(connection_manager.clone()));

        let maintenance = Maintenance::new(
            auth_service.clone(),
            rate_limiter.clone(),
            Duration::from_secs(settings.revocation.sweep_interval_secs),
            cancel.clone(),
        );
        let maintenance_handle = tokio::spawn(async move { maintenance.run().await });

        // endregion

        info!(
            storage = %settings.storage.backend,
            revocation = %settings.revocation.backend,
            "server started"
        );

        Ok(Self {
            auth_service,
            user_service,
            connection_manager,
            rate_limiter,
            notifier,
            maintenance_handle: Mutex::new(Some(maintenance_handle)),
            cancel,
            pool,
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.cancel.cancel();

        let handle = self
            .maintenance_handle
            .lock()
            .ok()
            .and_then(|mut lock| lock.take());
        if let Some(handle) = handle {
            let r = handle.await;
            info!("maintenance handle dropped: {:?}", r);
        }

        self.connection_manager.shutdown().await;
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
