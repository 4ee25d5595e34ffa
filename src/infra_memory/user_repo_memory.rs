use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// User directory keyed by id with a unique email index.
#[derive(Default)]
pub struct MemoryUserRepo {
    users: DashMap<UserId, UserRecord>,
    by_email: DashMap<Email, UserId>,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<F>(&self, user_id: UserId, apply: F) -> Result<UserRecord, AuthError>
    where
        F: FnOnce(&mut UserRecord),
    {
        let mut user = self.users.get_mut(&user_id).ok_or(AuthError::UserNotFound)?;
        apply(user.value_mut());
        Ok(user.clone())
    }
}

#[async_trait::async_trait]
impl UserRepo for MemoryUserRepo {
    async fn find_by_email(&self, email: &Email) -> Result<Option<UserRecord>, AuthError> {
        let Some(user_id) = self.by_email.get(email).map(|id| *id) else {
            return Ok(None);
        };
        self.find_by_id(user_id).await
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, AuthError> {
        Ok(self.users.get(&user_id).map(|user| user.clone()))
    }

    async fn create(&self, user: NewUser) -> Result<UserRecord, AuthError> {
        match self.by_email.entry(user.email.clone()) {
            Entry::Occupied(_) => Err(AuthError::UserExists),
            Entry::Vacant(vacant) => {
                let record = UserRecord {
                    user_id: UserId::generate(),
                    email: user.email,
                    password_hash: user.password_hash,
                    name: user.name,
                    avatar: user.avatar,
                    provider: user.provider,
                    provider_id: user.provider_id,
                    email_verified: user.email_verified,
                    created_at: Utc::now(),
                };
                self.users.insert(record.user_id, record.clone());
                vacant.insert(record.user_id);
                Ok(record)
            }
        }
    }

    async fn update_email_verified(
        &self,
        user_id: UserId,
        verified: bool,
    ) -> Result<(), AuthError> {
        self.update(user_id, |user| user.email_verified = verified)
            .map(|_| ())
    }

    async fn update_password_hash(
        &self,
        user_id: UserId,
        password_hash: &str,
    ) -> Result<(), AuthError> {
        self.update(user_id, |user| {
            user.password_hash = Some(password_hash.to_string())
        })
        .map(|_| ())
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        update: &ProfileUpdate,
    ) -> Result<UserRecord, AuthError> {
        self.update(user_id, |user| {
            if let Some(name) = &update.name {
                user.name = Some(name.clone());
            }
            if let Some(avatar) = &update.avatar {
                user.avatar = Some(avatar.clone());
            }
        })
    }

    async fn link_provider(
        &self,
        user_id: UserId,
        provider: Provider,
        provider_id: &str,
        avatar: Option<&str>,
    ) -> Result<UserRecord, AuthError> {
        self.update(user_id, |user| {
            user.provider = provider;
            user.provider_id = Some(provider_id.to_string());
            user.email_verified = true;
            if user.avatar.is_none() {
                user.avatar = avatar.map(str::to_string);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn email_is_unique() {
        let repo = MemoryUserRepo::new();
        let email = Email::parse("a@x.com").unwrap();
        repo.create(NewUser::provisioned(email.clone(), Provider::MagicLink))
            .await
            .unwrap();

        let err = repo
            .create(NewUser::provisioned(email, Provider::Local))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserExists));
    }

    #[tokio::test]
    async fn linking_keeps_existing_avatar() {
        let repo = MemoryUserRepo::new();
        let mut new_user = NewUser::provisioned(Email::parse("a@x.com").unwrap(), Provider::Local);
        new_user.avatar = Some("mine.png".to_string());
        let user = repo.create(new_user).await.unwrap();

        let linked = repo
            .link_provider(user.user_id, Provider::Google, "g-1", Some("theirs.png"))
            .await
            .unwrap();
        assert_eq!(linked.provider, Provider::Google);
        assert_eq!(linked.avatar.as_deref(), Some("mine.png"));
        assert!(linked.email_verified);
    }

    #[tokio::test]
    async fn profile_update_touches_only_given_fields() {
        let repo = MemoryUserRepo::new();
        let mut new_user = NewUser::provisioned(Email::parse("a@x.com").unwrap(), Provider::Local);
        new_user.avatar = Some("mine.png".to_string());
        let user = repo.create(new_user).await.unwrap();

        let update = ProfileUpdate {
            name: Some("Ada".to_string()),
            avatar: None,
        };
        let updated = repo.update_profile(user.user_id, &update).await.unwrap();
        assert_eq!(updated.name.as_deref(), Some("Ada"));
        assert_eq!(updated.avatar.as_deref(), Some("mine.png"));

        let err = repo
            .update_profile(UserId::generate(), &update)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));
    }
}
