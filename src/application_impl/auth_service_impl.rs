use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

const MIN_PASSWORD_LEN: usize = 12;
const MAX_PASSWORD_LEN: usize = 128;
const PASSWORD_SPECIALS: &str = "!@#$%^&*(),.?\":{}|<>";
const MAX_NAME_LEN: usize = 100;
const MAX_AVATAR_LEN: usize = 1024;

/// Password policy shared by registration and password change.
fn validate_password(password: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    let problem = if len < MIN_PASSWORD_LEN {
        format!("password must be at least {MIN_PASSWORD_LEN} characters")
    } else if len > MAX_PASSWORD_LEN {
        format!("password must be at most {MAX_PASSWORD_LEN} characters")
    } else if !password.chars().any(|c| c.is_ascii_lowercase()) {
        "password must contain a lowercase letter".to_string()
    } else if !password.chars().any(|c| c.is_ascii_uppercase()) {
        "password must contain an uppercase letter".to_string()
    } else if !password.chars().any(|c| c.is_ascii_digit()) {
        "password must contain a digit".to_string()
    } else if !password.chars().any(|c| PASSWORD_SPECIALS.contains(c)) {
        format!("password must contain one of {PASSWORD_SPECIALS}")
    } else {
        return Ok(());
    };
    Err(AuthError::InvalidInput(problem))
}

fn validate_name(name: &str) -> Result<(), AuthError> {
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AuthError::InvalidInput(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

pub struct Argon2PasswordHasher;

#[async_trait::async_trait]
impl CredentialHasher for Argon2PasswordHasher {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            Argon2::default()
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| AuthError::InternalError(e.to_string()))
        })
        .await
        .map_err(|e| AuthError::InternalError(format!("hashing task: {e}")))?
    }

    async fn verify_password(
        &self,
        password: &str,
        password_hash: &str,
    ) -> Result<bool, AuthError> {
        let password = password.to_owned();
        let password_hash = password_hash.to_owned();
        tokio::task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&password_hash)
                .map_err(|e| AuthError::InternalError(format!("invalid PHC hash: {e}")))?;

            match Argon2::default().verify_password(password.as_bytes(), &parsed) {
                Ok(()) => Ok(true),
                Err(argon2::password_hash::Error::Password) => Ok(false),
                Err(e) => Err(AuthError::InternalError(format!("verify error: {e}"))),
            }
        })
        .await
        .map_err(|e| AuthError::InternalError(format!("verify task: {e}")))?
    }
}

pub struct RealAuthService {
    user_repo: Arc<dyn UserRepo>,
    credential_hasher: Arc<dyn CredentialHasher>,
    token_service: Arc<dyn TokenService>,
    magic_link_service: Arc<dyn MagicLinkService>,
    login_throttle: Arc<dyn LoginThrottle>,
    // Verified against when the account has no hash, so unknown users cost
    // the same as wrong passwords.
    dummy_hash: OnceCell<String>,
}

impl RealAuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_service: Arc<dyn TokenService>,
        magic_link_service: Arc<dyn MagicLinkService>,
        login_throttle: Arc<dyn LoginThrottle>,
    ) -> Self {
        Self {
            user_repo,
            credential_hasher,
            token_service,
            magic_link_service,
            login_throttle,
            dummy_hash: OnceCell::new(),
        }
    }

    /// Resolve any credential flow to the user it proves.
    async fn verify_credential(&self, flow: CredentialFlow) -> Result<UserRecord, AuthError> {
        match flow {
            CredentialFlow::Password { email, password } => {
                self.verify_password(&email, &password).await
            }
            CredentialFlow::OAuth(profile) => self.verify_oauth(profile).await,
            CredentialFlow::MagicLink { token } => self.verify_magic_link(&token).await,
        }
    }

    async fn verify_password(&self, email: &str, password: &str) -> Result<UserRecord, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        // Throttle state is advisory: an unreachable store lets the attempt through.
        let allowed = self
            .login_throttle
            .may_attempt(email.as_str())
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "throttle unavailable, allowing attempt");
                true
            });
        if !allowed {
            return Err(AuthError::TooManyAttempts);
        }

        let user = self.user_repo.find_by_email(&email).await?;
        let verified = match user.as_ref().and_then(|u| u.password_hash.as_deref()) {
            Some(hash) => self.credential_hasher.verify_password(password, hash).await?,
            None => {
                let dummy = self
                    .dummy_hash
                    .get_or_try_init(|| self.credential_hasher.hash_password("latchkey-unused"))
                    .await?;
                self.credential_hasher.verify_password(password, dummy).await?;
                false
            }
        };

        match user {
            Some(user) if verified => {
                if let Err(e) = self.login_throttle.clear(email.as_str()).await {
                    warn!(error = %e, "failed attempts not cleared");
                }
                Ok(user)
            }
            _ => {
                match self.login_throttle.record_failure(email.as_str()).await {
                    Ok(count) => debug!(count, "password rejected"),
                    Err(e) => warn!(error = %e, "failed attempt not recorded"),
                }
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    async fn verify_oauth(&self, profile: OAuthProfile) -> Result<UserRecord, AuthError> {
        let raw_email = profile
            .email
            .as_deref()
            .ok_or(AuthError::InvalidCredentials)?;
        let email = Email::parse(raw_email).map_err(|_| AuthError::InvalidCredentials)?;

        match self.user_repo.find_by_email(&email).await? {
            Some(user) if user.provider == Provider::Google => Ok(user),
            Some(user) => {
                info!(user_id = %user.user_id, from = %user.provider, "linking account to google");
                self.user_repo
                    .link_provider(
                        user.user_id,
                        Provider::Google,
                        &profile.provider_id,
                        profile.avatar.as_deref(),
                    )
                    .await
            }
            None => {
                self.user_repo
                    .create(NewUser {
                        email,
                        password_hash: None,
                        name: profile.display_name,
                        avatar: profile.avatar,
                        provider: Provider::Google,
                        provider_id: Some(profile.provider_id),
                        email_verified: true,
                    })
                    .await
            }
        }
    }

    async fn verify_magic_link(&self, token: &str) -> Result<UserRecord, AuthError> {
        let login = self.magic_link_service.consume(token).await?;
        self.user_repo
            .find_by_id(login.user_id)
            .await?
            .ok_or(AuthError::InvalidOrExpired)
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn register(&self, request: RegisterInput) -> Result<LoginResult, AuthError> {
        let RegisterInput {
            email,
            password,
            name,
        } = request;

        let email = Email::parse(&email).map_err(|e| AuthError::InvalidInput(e.to_string()))?;
        validate_password(&password)?;
        if let Some(name) = name.as_deref() {
            validate_name(name)?;
        }

        if self.user_repo.find_by_email(&email).await?.is_some() {
            return Err(AuthError::UserExists);
        }

        let password_hash = self.credential_hasher.hash_password(&password).await?;
        let user = self
            .user_repo
            .create(NewUser {
                email,
                password_hash: Some(password_hash),
                name,
                avatar: None,
                provider: Provider::Local,
                provider_id: None,
                email_verified: false,
            })
            .await?;

        let tokens = self
            .token_service
            .issue_token_pair(user.user_id, user.email.as_str())
            .await?;

        info!(user_id = %user.user_id, "user registered");
        Ok(LoginResult { user, tokens })
    }

    async fn authenticate(&self, flow: CredentialFlow) -> Result<LoginResult, AuthError> {
        let flow_name = flow.name();
        let user = self.verify_credential(flow).await?;
        let tokens = self
            .token_service
            .issue_token_pair(user.user_id, user.email.as_str())
            .await?;

        info!(user_id = %user.user_id, flow = flow_name, "authenticated");
        Ok(LoginResult { user, tokens })
    }

    async fn current_user(&self, access_token: &str) -> Result<UserRecord, AuthError> {
        let claims = self.token_service.verify_access_token(access_token)?;
        self.user_repo
            .find_by_id(claims.sub)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        self.token_service.rotate_refresh_token(refresh_token).await
    }

    async fn logout(&self, refresh_token: Option<&str>) -> Result<(), AuthError> {
        let Some(refresh_token) = refresh_token else {
            return Ok(());
        };
        match self.token_service.revoke_refresh_token(refresh_token).await {
            Ok(()) | Err(AuthError::InvalidOrExpired) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn logout_all(&self, user_id: UserId) -> Result<(), AuthError> {
        self.token_service.revoke_all_for_subject(user_id).await
    }

    async fn change_password(
        &self,
        user_id: UserId,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        let current_hash = user
            .password_hash
            .as_deref()
            .ok_or(AuthError::InvalidCredentials)?;

        if !self
            .credential_hasher
            .verify_password(current_password, current_hash)
            .await?
        {
            return Err(AuthError::InvalidCredentials);
        }
        validate_password(new_password)?;

        let new_hash = self.credential_hasher.hash_password(new_password).await?;
        self.user_repo
            .update_password_hash(user_id, &new_hash)
            .await?;
        self.token_service.revoke_all_for_subject(user_id).await?;

        info!(%user_id, "password changed, sessions revoked");
        Ok(())
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        update: ProfileUpdate,
    ) -> Result<UserRecord, AuthError> {
        if let Some(name) = update.name.as_deref() {
            validate_name(name)?;
        }
        if update
            .avatar
            .as_deref()
            .is_some_and(|avatar| avatar.chars().count() > MAX_AVATAR_LEN)
        {
            return Err(AuthError::InvalidInput(format!(
                "avatar must be at most {MAX_AVATAR_LEN} characters"
            )));
        }

        let user = self.user_repo.update_profile(user_id, &update).await?;
        info!(%user_id, "profile updated");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::*;
    use crate::infra_memory::*;
    use std::time::Duration;

    /// Keeps tests fast; argon2 itself is covered separately.
    struct PlainHasher;

    #[async_trait::async_trait]
    impl CredentialHasher for PlainHasher {
        async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
            Ok(format!("plain:{password}"))
        }

        async fn verify_password(
            &self,
            password: &str,
            password_hash: &str,
        ) -> Result<bool, AuthError> {
            Ok(password_hash == format!("plain:{password}"))
        }
    }

    struct Fixture {
        store: Arc<MemoryRevocationStore>,
        users: Arc<MemoryUserRepo>,
        outbox: Arc<RecordingEmailSender>,
        service: RealAuthService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryRevocationStore::new());
        let audit = Arc::new(MemoryAuditLog::new());
        let users = Arc::new(MemoryUserRepo::new());
        let outbox = Arc::new(RecordingEmailSender::new());

        let token_service = Arc::new(RealTokenService::new(
            JwtCodec::new(b"test-access-secret"),
            store.clone(),
            audit.clone(),
            TokenConfig::default(),
        ));
        let magic_link_service = Arc::new(RealMagicLinkService::new(
            JwtCodec::new(b"test-magic-link-secret"),
            store.clone(),
            audit,
            users.clone(),
            outbox.clone(),
            MagicLinkConfig {
                ttl: Duration::from_secs(15 * 60),
                frontend_url: "http://localhost:5173".to_string(),
                send_limit: 5,
                send_window: Duration::from_secs(3600),
            },
        ));
        let login_throttle = Arc::new(RealLoginThrottle::new(
            store.clone(),
            ThrottleConfig::default(),
        ));
        let service = RealAuthService::new(
            users.clone(),
            Arc::new(PlainHasher),
            token_service,
            magic_link_service,
            login_throttle,
        );
        Fixture {
            store,
            users,
            outbox,
            service,
        }
    }

    fn password(email: &str, password: &str) -> CredentialFlow {
        CredentialFlow::Password {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    async fn register(f: &Fixture, email: &str, pw: &str) -> LoginResult {
        f.service
            .register(RegisterInput {
                email: email.to_string(),
                password: pw.to_string(),
                name: Some("Tester".to_string()),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn argon2_hash_round_trip() {
        let hasher = Argon2PasswordHasher;
        let hash = hasher.hash_password("correct horse").await.unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(hasher.verify_password("correct horse", &hash).await.unwrap());
        assert!(!hasher.verify_password("wrong horse", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn register_then_login_with_password() {
        let f = fixture();
        let registered = register(&f, "A@x.com", "Hunter2!hunter2").await;
        assert_eq!(registered.user.email.as_str(), "a@x.com");
        assert_eq!(registered.user.provider, Provider::Local);

        let login = f
            .service
            .authenticate(password("a@x.com", "Hunter2!hunter2"))
            .await
            .unwrap();
        assert_eq!(login.user.user_id, registered.user.user_id);

        let me = f
            .service
            .current_user(&login.tokens.access_token.0)
            .await
            .unwrap();
        assert_eq!(me.user_id, registered.user.user_id);
    }

    #[tokio::test]
    async fn register_rejects_duplicates_and_short_passwords() {
        let f = fixture();
        register(&f, "a@x.com", "Hunter2!hunter2").await;

        let dup = f
            .service
            .register(RegisterInput {
                email: "A@X.COM".to_string(),
                password: "Another-Passw0rd!".to_string(),
                name: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(dup, AuthError::UserExists));

        let short = f
            .service
            .register(RegisterInput {
                email: "b@x.com".to_string(),
                password: "short".to_string(),
                name: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(short, AuthError::InvalidInput(_)));
    }

    #[test]
    fn password_policy_names_each_missing_class() {
        let too_long = format!("Aa1!{}", "x".repeat(125));
        let rejected = [
            ("Sh0rt!pass", "at least 12"),
            (too_long.as_str(), "at most 128"),
            ("ALLUPPER123!!", "lowercase"),
            ("alllower123!!", "uppercase"),
            ("NoDigitsHere!!", "digit"),
            ("NoSpecials1234", "one of"),
        ];
        for (candidate, reason) in rejected {
            match validate_password(candidate) {
                Err(AuthError::InvalidInput(msg)) => {
                    assert!(msg.contains(reason), "{candidate:?}: {msg}")
                }
                other => panic!("{candidate:?}: unexpected {other:?}"),
            }
        }

        validate_password("Hunter2!hunter2").unwrap();
        validate_password(&format!("Aa1!{}", "x".repeat(124))).unwrap();
    }

    #[tokio::test]
    async fn register_and_change_password_share_the_policy() {
        let f = fixture();
        let weak = f
            .service
            .register(RegisterInput {
                email: "b@x.com".to_string(),
                password: "longbutnouppercase1!".to_string(),
                name: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(weak, AuthError::InvalidInput(_)));
        assert!(
            f.users
                .find_by_email(&Email::parse("b@x.com").unwrap())
                .await
                .unwrap()
                .is_none()
        );

        let registered = register(&f, "a@x.com", "Hunter2!hunter2").await;
        let err = f
            .service
            .change_password(registered.user.user_id, "Hunter2!hunter2", "NoSpecials1234")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidInput(_)));
        f.service
            .authenticate(password("a@x.com", "Hunter2!hunter2"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn register_rejects_long_names_and_addresses() {
        let f = fixture();
        let long_name = f
            .service
            .register(RegisterInput {
                email: "a@x.com".to_string(),
                password: "Hunter2!hunter2".to_string(),
                name: Some("n".repeat(101)),
            })
            .await
            .unwrap_err();
        assert!(matches!(long_name, AuthError::InvalidInput(_)));

        let long_email = f
            .service
            .register(RegisterInput {
                email: format!("{}@x.com", "a".repeat(250)),
                password: "Hunter2!hunter2".to_string(),
                name: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(long_email, AuthError::InvalidInput(_)));

        register(&f, "a@x.com", "Hunter2!hunter2").await;
    }

    #[tokio::test]
    async fn profile_update_changes_name_and_avatar() {
        let f = fixture();
        let registered = register(&f, "a@x.com", "Hunter2!hunter2").await;

        let updated = f
            .service
            .update_profile(
                registered.user.user_id,
                ProfileUpdate {
                    name: Some("Ada".to_string()),
                    avatar: Some("https://img/ada.png".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name.as_deref(), Some("Ada"));
        assert_eq!(updated.avatar.as_deref(), Some("https://img/ada.png"));

        let kept = f
            .service
            .update_profile(registered.user.user_id, ProfileUpdate::default())
            .await
            .unwrap();
        assert_eq!(kept.name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn profile_update_validates_and_needs_a_user() {
        let f = fixture();
        let registered = register(&f, "a@x.com", "Hunter2!hunter2").await;

        let err = f
            .service
            .update_profile(
                registered.user.user_id,
                ProfileUpdate {
                    name: Some("n".repeat(101)),
                    avatar: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidInput(_)));
        let user = f.users.find_by_id(registered.user.user_id).await.unwrap().unwrap();
        assert_eq!(user.name.as_deref(), Some("Tester"));

        let err = f
            .service
            .update_profile(UserId::generate(), ProfileUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));
    }

    #[tokio::test]
    async fn unknown_user_and_wrong_password_look_the_same() {
        let f = fixture();
        register(&f, "a@x.com", "Hunter2!hunter2").await;

        let wrong = f
            .service
            .authenticate(password("a@x.com", "nope-nope"))
            .await
            .unwrap_err();
        let unknown = f
            .service
            .authenticate(password("ghost@x.com", "nope-nope"))
            .await
            .unwrap_err();
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert!(matches!(unknown, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn five_failures_lock_out_even_the_right_password() {
        let f = fixture();
        register(&f, "c@x.com", "Hunter2!hunter2").await;

        for _ in 0..5 {
            let _ = f.service.authenticate(password("C@x.com", "bad-guess")).await;
        }
        let err = f
            .service
            .authenticate(password("c@x.com", "Hunter2!hunter2"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TooManyAttempts));
    }

    #[tokio::test]
    async fn successful_login_clears_failures() {
        let f = fixture();
        register(&f, "c@x.com", "Hunter2!hunter2").await;

        for _ in 0..4 {
            let _ = f.service.authenticate(password("c@x.com", "bad-guess")).await;
        }
        f.service
            .authenticate(password("c@x.com", "Hunter2!hunter2"))
            .await
            .unwrap();
        for _ in 0..4 {
            let _ = f.service.authenticate(password("c@x.com", "bad-guess")).await;
        }
        f.service
            .authenticate(password("c@x.com", "Hunter2!hunter2"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn magic_link_only_user_cannot_use_password_flow() {
        let f = fixture();
        f.service
            .magic_link_service
            .send("m@x.com")
            .await
            .unwrap();

        let err = f
            .service
            .authenticate(password("m@x.com", "anything-at-all"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn magic_link_flow_issues_a_session() {
        let f = fixture();
        f.service.magic_link_service.send("m@x.com").await.unwrap();
        let token = f.outbox.last().unwrap().link_token().unwrap().to_string();

        let login = f
            .service
            .authenticate(CredentialFlow::MagicLink {
                token: token.clone(),
            })
            .await
            .unwrap();
        assert!(login.user.email_verified);
        assert_eq!(login.user.provider, Provider::MagicLink);

        let replay = f
            .service
            .authenticate(CredentialFlow::MagicLink { token })
            .await
            .unwrap_err();
        assert!(matches!(replay, AuthError::InvalidOrExpired));
    }

    #[tokio::test]
    async fn oauth_creates_a_verified_google_account() {
        let f = fixture();
        let login = f
            .service
            .authenticate(CredentialFlow::OAuth(OAuthProfile {
                provider_id: "google-123".to_string(),
                email: Some("G@x.com".to_string()),
                display_name: Some("Gee".to_string()),
                avatar: Some("https://img/g.png".to_string()),
            }))
            .await
            .unwrap();

        assert_eq!(login.user.email.as_str(), "g@x.com");
        assert_eq!(login.user.provider, Provider::Google);
        assert_eq!(login.user.provider_id.as_deref(), Some("google-123"));
        assert!(login.user.email_verified);
    }

    #[tokio::test]
    async fn oauth_links_an_existing_local_account() {
        let f = fixture();
        let registered = register(&f, "a@x.com", "Hunter2!hunter2").await;

        let login = f
            .service
            .authenticate(CredentialFlow::OAuth(OAuthProfile {
                provider_id: "google-9".to_string(),
                email: Some("a@x.com".to_string()),
                display_name: None,
                avatar: None,
            }))
            .await
            .unwrap();
        assert_eq!(login.user.user_id, registered.user.user_id);
        assert_eq!(login.user.provider, Provider::Google);
        assert!(login.user.email_verified);
    }

    #[tokio::test]
    async fn oauth_without_email_is_refused() {
        let f = fixture();
        let err = f
            .service
            .authenticate(CredentialFlow::OAuth(OAuthProfile {
                provider_id: "google-1".to_string(),
                email: None,
                display_name: None,
                avatar: None,
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn change_password_revokes_every_session() {
        let f = fixture();
        let registered = register(&f, "a@x.com", "Hunter2!hunter2").await;
        let other_device = f
            .service
            .authenticate(password("a@x.com", "Hunter2!hunter2"))
            .await
            .unwrap();

        f.service
            .change_password(registered.user.user_id, "Hunter2!hunter2", "New-Password-1!")
            .await
            .unwrap();

        for tokens in [&registered.tokens, &other_device.tokens] {
            let err = f.service.refresh(&tokens.refresh_token.0).await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidOrExpired));
        }
        f.service
            .authenticate(password("a@x.com", "New-Password-1!"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn change_password_requires_the_current_one() {
        let f = fixture();
        let registered = register(&f, "a@x.com", "Hunter2!hunter2").await;

        let err = f
            .service
            .change_password(registered.user.user_id, "not-it-at-all", "New-Password-1!")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        f.service.refresh(&registered.tokens.refresh_token.0).await.unwrap();
    }

    #[tokio::test]
    async fn logout_tolerates_bad_tokens_but_not_outages() {
        let f = fixture();
        let registered = register(&f, "a@x.com", "Hunter2!hunter2").await;

        f.service.logout(None).await.unwrap();
        f.service.logout(Some("garbage")).await.unwrap();
        f.service
            .logout(Some(&registered.tokens.refresh_token.0))
            .await
            .unwrap();
        assert!(f.service.refresh(&registered.tokens.refresh_token.0).await.is_err());

        let again = f
            .service
            .authenticate(password("a@x.com", "Hunter2!hunter2"))
            .await
            .unwrap();
        f.store.set_available(false);
        let err = f
            .service
            .logout(Some(&again.tokens.refresh_token.0))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn throttle_outage_fails_open() {
        let f = fixture();
        register(&f, "a@x.com", "Hunter2!hunter2").await;
        let user = f
            .users
            .find_by_email(&Email::parse("a@x.com").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(user.password_hash.is_some());

        f.store.set_available(false);
        // password check passes; only token issuance needs the store
        let err = f
            .service
            .authenticate(password("a@x.com", "Hunter2!hunter2"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::StoreUnavailable(_)));
    }
}
