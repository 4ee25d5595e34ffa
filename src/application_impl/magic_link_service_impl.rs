use super::JwtCodec;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const MAGIC_LINK_PREFIX: &str = "magic-link:";
const SEND_LIMIT_PREFIX: &str = "send-limit:";
const SUBJECT: &str = "Your Magic Login Link";

#[derive(Debug, Clone)]
pub struct MagicLinkConfig {
    pub ttl: Duration,
    /// Base URL of the web client; the link points at its verify page.
    pub frontend_url: String,
    /// Links mailed to one address per `send_window`.
    pub send_limit: u64,
    pub send_window: Duration,
}

pub struct RealMagicLinkService {
    codec: JwtCodec,
    store: Arc<dyn RevocationStore>,
    audit_log: Arc<dyn AuditLog>,
    user_repo: Arc<dyn UserRepo>,
    email_sender: Arc<dyn EmailSender>,
    cfg: MagicLinkConfig,
}

impl RealMagicLinkService {
    pub fn new(
        codec: JwtCodec,
        store: Arc<dyn RevocationStore>,
        audit_log: Arc<dyn AuditLog>,
        user_repo: Arc<dyn UserRepo>,
        email_sender: Arc<dyn EmailSender>,
        cfg: MagicLinkConfig,
    ) -> Self {
        Self {
            codec,
            store,
            audit_log,
            user_repo,
            email_sender,
            cfg,
        }
    }

    #[inline]
    fn link_key(link_id: &LinkId) -> String {
        format!("{MAGIC_LINK_PREFIX}{link_id}")
    }

    #[inline]
    fn send_limit_key(email: &Email) -> String {
        format!("{SEND_LIMIT_PREFIX}{email}")
    }

    /// Counts the request against the per-address window, refusing once the
    /// limit is spent. Refused requests still count.
    async fn charge_send(&self, email: &Email) -> Result<(), AuthError> {
        let sent = self
            .store
            .increment_with_ttl_on_first(
                &Self::send_limit_key(email),
                self.cfg.send_window.as_secs().max(1),
            )
            .await?;
        if sent > self.cfg.send_limit {
            warn!(attempts = sent, "magic link send limit reached");
            return Err(AuthError::TooManyAttempts);
        }
        Ok(())
    }

    fn link_url(&self, token: &str) -> String {
        format!(
            "{}/auth/magic-link/verify?token={}",
            self.cfg.frontend_url.trim_end_matches('/'),
            token
        )
    }

    fn render_body(&self, url: &str) -> String {
        let minutes = self.cfg.ttl.as_secs() / 60;
        format!(
            r#"<div style="font-family: sans-serif; max-width: 600px; margin: 0 auto;">
  <h2>Login to Your Account</h2>
  <p>Click the button below to log in. This link will expire in {minutes} minutes.</p>
  <p><a href="{url}" style="display: inline-block; padding: 12px 24px; background: #4f46e5; color: #fff; text-decoration: none; border-radius: 6px;">Log In</a></p>
  <p style="color: #666; font-size: 14px;">If you didn't request this link, you can safely ignore this email.</p>
  <p style="color: #999; font-size: 12px;">Or copy this link: {url}</p>
</div>"#
        )
    }

    /// First touch provisions the account; a magic-link user may never set a
    /// password.
    async fn find_or_provision(&self, email: &Email) -> Result<UserRecord, AuthError> {
        if let Some(user) = self.user_repo.find_by_email(email).await? {
            return Ok(user);
        }
        match self
            .user_repo
            .create(NewUser::provisioned(email.clone(), Provider::MagicLink))
            .await
        {
            Ok(user) => {
                info!(user_id = %user.user_id, "user provisioned from magic link request");
                Ok(user)
            }
            // lost a creation race with a concurrent request
            Err(AuthError::UserExists) => self
                .user_repo
                .find_by_email(email)
                .await?
                .ok_or(AuthError::UserNotFound),
            Err(e) => Err(e),
        }
    }

    /// Verify and burn the link in one store round trip.
    async fn redeem(&self, token: &str) -> Result<(MagicLinkClaims, Email), CredentialError> {
        let claims: MagicLinkClaims = self.codec.verify(token)?;
        let email = Email::parse(&claims.email).map_err(|_| CredentialError::Malformed)?;

        let owner = self
            .store
            .take(&Self::link_key(&claims.jti))
            .await?
            .ok_or(CredentialError::NotFound)?;
        if owner != claims.sub.to_string() {
            return Err(CredentialError::OwnerMismatch);
        }
        Ok((claims, email))
    }
}

#[async_trait::async_trait]
impl MagicLinkService for RealMagicLinkService {
    async fn send(&self, email: &str) -> Result<(), AuthError> {
        let email = Email::parse(email).map_err(|e| AuthError::InvalidInput(e.to_string()))?;
        self.charge_send(&email).await?;
        let user = self.find_or_provision(&email).await?;

        let link_id = LinkId::generate();
        let iat_dt = Utc::now();
        let exp_dt = iat_dt + self.cfg.ttl;
        let claims = MagicLinkClaims {
            sub: user.user_id,
            email: user.email.to_string(),
            jti: link_id.clone(),
            iat: iat_dt.timestamp(),
            exp: exp_dt.timestamp(),
        };
        let token = self.codec.sign(&claims)?;

        self.store
            .set_with_ttl(
                &Self::link_key(&link_id),
                &user.user_id.to_string(),
                self.cfg.ttl.as_secs().max(1),
            )
            .await?;
        if let Err(e) = self
            .audit_log
            .record_magic_link_issued(&link_id, user.user_id, exp_dt)
            .await
        {
            warn!(error = %e, "audit: magic link issuance not recorded");
        }

        let url = self.link_url(&token);
        self.email_sender
            .send(user.email.as_str(), SUBJECT, &self.render_body(&url))
            .await
            .map_err(|e| {
                error!(error = %e, user_id = %user.user_id, "magic link delivery failed");
                AuthError::from(e)
            })?;

        info!(user_id = %user.user_id, "magic link sent");
        Ok(())
    }

    async fn consume(&self, token: &str) -> Result<MagicLinkLogin, AuthError> {
        let (claims, email) = self.redeem(token).await?;

        if let Err(e) = self.audit_log.mark_magic_link_used(&claims.jti).await {
            warn!(error = %e, "audit: magic link use not recorded");
        }
        self.user_repo
            .update_email_verified(claims.sub, true)
            .await?;

        info!(user_id = %claims.sub, "magic link consumed");
        Ok(MagicLinkLogin {
            user_id: claims.sub,
            email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra_memory::*;
    use futures_util::future::join_all;

    const SECRET: &[u8] = b"test-magic-link-secret";

    struct Fixture {
        store: Arc<MemoryRevocationStore>,
        audit: Arc<MemoryAuditLog>,
        users: Arc<MemoryUserRepo>,
        outbox: Arc<RecordingEmailSender>,
        service: Arc<RealMagicLinkService>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryRevocationStore::new());
        let audit = Arc::new(MemoryAuditLog::new());
        let users = Arc::new(MemoryUserRepo::new());
        let outbox = Arc::new(RecordingEmailSender::new());
        let service = Arc::new(RealMagicLinkService::new(
            JwtCodec::new(SECRET),
            store.clone(),
            audit.clone(),
            users.clone(),
            outbox.clone(),
            MagicLinkConfig {
                ttl: Duration::from_secs(15 * 60),
                frontend_url: "https://app.example.com/".to_string(),
                send_limit: 5,
                send_window: Duration::from_secs(3600),
            },
        ));
        Fixture {
            store,
            audit,
            users,
            outbox,
            service,
        }
    }

    fn sent_token(f: &Fixture) -> String {
        f.outbox.last().unwrap().link_token().unwrap().to_string()
    }

    #[tokio::test]
    async fn send_provisions_user_and_mails_a_link() {
        let f = fixture();
        f.service.send("  B@X.com").await.unwrap();

        let email = Email::parse("b@x.com").unwrap();
        let user = f.users.find_by_email(&email).await.unwrap().unwrap();
        assert_eq!(user.provider, Provider::MagicLink);
        assert!(!user.email_verified);
        assert!(user.password_hash.is_none());

        let mail = f.outbox.last().unwrap();
        assert_eq!(mail.to, "b@x.com");
        assert_eq!(mail.subject, "Your Magic Login Link");
        assert!(
            mail.html_body
                .contains("https://app.example.com/auth/magic-link/verify?token=")
        );
        assert!(mail.html_body.contains("15 minutes"));

        let claims: MagicLinkClaims = JwtCodec::new(SECRET).verify(&sent_token(&f)).unwrap();
        assert_eq!(claims.sub, user.user_id);
        assert!(f.audit.magic_link(&claims.jti).is_some());
        let owner = f
            .store
            .get(&format!("magic-link:{}", claims.jti))
            .await
            .unwrap();
        assert_eq!(owner, Some(user.user_id.to_string()));
    }

    #[tokio::test]
    async fn send_reuses_an_existing_account() {
        let f = fixture();
        f.service.send("b@x.com").await.unwrap();
        f.service.send("B@x.com").await.unwrap();

        let first: MagicLinkClaims = JwtCodec::new(SECRET)
            .verify(f.outbox.sent()[0].link_token().unwrap())
            .unwrap();
        let second: MagicLinkClaims = JwtCodec::new(SECRET)
            .verify(f.outbox.sent()[1].link_token().unwrap())
            .unwrap();
        assert_eq!(first.sub, second.sub);
        assert_ne!(first.jti, second.jti);
    }

    #[tokio::test]
    async fn consume_succeeds_once_and_verifies_the_email() {
        let f = fixture();
        f.service.send("b@x.com").await.unwrap();
        let token = sent_token(&f);

        let login = f.service.consume(&token).await.unwrap();
        assert_eq!(login.email.as_str(), "b@x.com");

        let user = f.users.find_by_id(login.user_id).await.unwrap().unwrap();
        assert!(user.email_verified);
        let claims: MagicLinkClaims = JwtCodec::new(SECRET).verify(&token).unwrap();
        assert!(f.audit.magic_link(&claims.jti).unwrap().closed);

        let err = f.service.consume(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpired));
    }

    #[tokio::test]
    async fn tampered_link_fails_and_leaves_the_real_one_usable() {
        let f = fixture();
        f.service.send("b@x.com").await.unwrap();
        let token = sent_token(&f);

        let (head, signature) = token.rsplit_once('.').unwrap();
        let mut signature: Vec<char> = signature.chars().collect();
        signature[0] = if signature[0] == 'A' { 'B' } else { 'A' };
        let tampered = format!("{head}.{}", signature.into_iter().collect::<String>());

        let err = f.service.consume(&tampered).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpired));

        f.service.consume(&token).await.unwrap();
        let err = f.service.consume(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpired));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_consumes_have_exactly_one_winner() {
        let f = fixture();
        f.service.send("b@x.com").await.unwrap();
        let token = sent_token(&f);

        let attempts = (0..8).map(|_| {
            let service = f.service.clone();
            let token = token.clone();
            tokio::spawn(async move { service.consume(&token).await })
        });
        let winners = join_all(attempts)
            .await
            .into_iter()
            .filter(|joined| matches!(joined, Ok(Ok(_))))
            .count();
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn link_signed_with_another_secret_is_rejected() {
        let f = fixture();
        f.service.send("b@x.com").await.unwrap();
        let genuine: MagicLinkClaims = JwtCodec::new(SECRET).verify(&sent_token(&f)).unwrap();

        let forged = JwtCodec::new(b"test-access-secret").sign(&genuine).unwrap();
        let err = f.service.consume(&forged).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpired));
    }

    #[tokio::test]
    async fn owner_mismatch_fails_closed() {
        let f = fixture();
        f.service.send("b@x.com").await.unwrap();
        let token = sent_token(&f);
        let claims: MagicLinkClaims = JwtCodec::new(SECRET).verify(&token).unwrap();
        f.store
            .set_with_ttl(
                &format!("magic-link:{}", claims.jti),
                &UserId::generate().to_string(),
                60,
            )
            .await
            .unwrap();

        let err = f.service.consume(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpired));
        let user = f.users.find_by_id(claims.sub).await.unwrap().unwrap();
        assert!(!user.email_verified);
    }

    #[tokio::test]
    async fn delivery_failure_is_reported_distinctly() {
        let f = fixture();
        f.outbox.set_failing(true);

        let err = f.service.send("b@x.com").await.unwrap_err();
        assert!(matches!(err, AuthError::DeliveryFailed(_)));
        assert!(f.outbox.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sixth_send_within_the_hour_is_refused() {
        let f = fixture();
        for _ in 0..5 {
            f.service.send("b@x.com").await.unwrap();
        }
        let err = f.service.send("B@x.com").await.unwrap_err();
        assert!(matches!(err, AuthError::TooManyAttempts));
        assert_eq!(f.outbox.sent().len(), 5);

        // other addresses have their own budget
        f.service.send("c@x.com").await.unwrap();

        tokio::time::advance(Duration::from_secs(3601)).await;
        f.service.send("b@x.com").await.unwrap();
        assert_eq!(f.outbox.sent().len(), 7);
    }

    #[tokio::test]
    async fn send_limit_outage_is_reported() {
        let f = fixture();
        f.store.set_available(false);
        let err = f.service.send("b@x.com").await.unwrap_err();
        assert!(matches!(err, AuthError::StoreUnavailable(_)));
        assert!(f.outbox.sent().is_empty());
    }

    #[tokio::test]
    async fn invalid_address_is_refused_before_any_side_effect() {
        let f = fixture();
        let err = f.service.send("not-an-email").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidInput(_)));
        assert!(f.outbox.sent().is_empty());
    }
}
