use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::infra_smtp::*;
use crate::logger::*;
use crate::settings::Settings;
use sqlx::{MySql, Pool};
use std::sync::Arc;
use std::time::Duration;

/// Composition root: picks the adapters named in settings and wires the
/// services on top of them.
pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pub magic_link_service: Arc<dyn MagicLinkService>,
    pool: Option<Pool<MySql>>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let store: Arc<dyn RevocationStore> = match settings.backend.store.as_str() {
            "memory" => {
                warn!("revocation state is in-process and will not survive a restart");
                Arc::new(MemoryRevocationStore::new())
            }
            "redis" => {
                let redis = settings
                    .redis
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("missing [redis] settings"))?;
                let redis_client = redis::Client::open(redis.url.as_str())?;
                let redis_manager = redis_client.get_connection_manager().await?;
                Arc::new(RedisRevocationStore::new(
                    redis_manager,
                    redis.key_prefix.clone(),
                    Duration::from_millis(redis.op_timeout_ms),
                ))
            }
            other => return Err(anyhow::anyhow!("Unknown store backend: {}", other)),
        };

        let (user_repo, audit_log, pool): (Arc<dyn UserRepo>, Arc<dyn AuditLog>, _) =
            match settings.backend.users.as_str() {
                "memory" => (
                    Arc::new(MemoryUserRepo::new()),
                    Arc::new(MemoryAuditLog::new()),
                    None,
                ),
                "mysql" => {
                    let mysql = settings
                        .mysql
                        .as_ref()
                        .ok_or_else(|| anyhow::anyhow!("missing [mysql] settings"))?;
                    let pool = Pool::<MySql>::connect(&mysql.url).await?;
                    (
                        Arc::new(MySqlUserRepo::new(pool.clone())),
                        Arc::new(MySqlAuditLog::new(pool.clone())),
                        Some(pool),
                    )
                }
                other => return Err(anyhow::anyhow!("Unknown users backend: {}", other)),
            };

        let email_sender: Arc<dyn EmailSender> = match settings.email.backend.as_str() {
            "fake" => Arc::new(FakeEmailSender::new()),
            "smtp" => Arc::new(SmtpEmailSender::new(&SmtpConfig {
                host: settings.email.smtp_host.clone().unwrap_or_default(),
                port: settings.email.smtp_port,
                username: settings.email.smtp_user.clone().unwrap_or_default(),
                password: settings.email.smtp_password.clone().unwrap_or_default(),
                from: settings.email.from.clone(),
            })?),
            other => return Err(anyhow::anyhow!("Unknown email backend: {}", other)),
        };

        let token_service: Arc<dyn TokenService> = Arc::new(RealTokenService::new(
            JwtCodec::new(settings.jwt.access_secret.as_bytes()),
            store.clone(),
            audit_log.clone(),
            TokenConfig {
                access_ttl: Duration::from_secs(settings.jwt.access_ttl_secs),
                refresh_ttl: Duration::from_secs(settings.jwt.refresh_ttl_secs),
            },
        ));

        let magic_link_service: Arc<dyn MagicLinkService> = Arc::new(RealMagicLinkService::new(
            JwtCodec::new(settings.magic_link.secret.as_bytes()),
            store.clone(),
            audit_log,
            user_repo.clone(),
            email_sender,
            MagicLinkConfig {
                ttl: Duration::from_secs(settings.magic_link.ttl_secs),
                frontend_url: settings.magic_link.frontend_url.clone(),
                send_limit: settings.magic_link.send_limit,
                send_window: Duration::from_secs(settings.magic_link.send_window_secs),
            },
        ));

        let login_throttle: Arc<dyn LoginThrottle> = Arc::new(RealLoginThrottle::new(
            store,
            ThrottleConfig {
                max_attempts: settings.throttle.max_attempts,
                window: Duration::from_secs(settings.throttle.window_secs),
            },
        ));

        let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            user_repo,
            Arc::new(Argon2PasswordHasher),
            token_service,
            magic_link_service.clone(),
            login_throttle,
        ));

        info!(
            store = %settings.backend.store,
            users = %settings.backend.users,
            email = %settings.email.backend,
            "server started"
        );

        Ok(Self {
            auth_service,
            magic_link_service,
            pool,
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
