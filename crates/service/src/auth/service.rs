use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use super::domain::{AuthResult, InputRules, LoginInput, NewUser, RegisterInput, User};
use super::errors::AuthError;
use super::hasher::{CredentialHasher, HashError};
use super::repository::{Lookup, UserRepository};
use super::token::TokenIssuer;
use crate::metrics::{record_auth, LOGINS_TOTAL, REGISTRATIONS_TOTAL};

/// Auth business service independent of web framework.
///
/// Stateless over its collaborators; safe to share across requests.
#[derive(Clone)]
pub struct AuthService {
    repo: Arc<dyn UserRepository>,
    hasher: Arc<dyn CredentialHasher>,
    tokens: Arc<dyn TokenIssuer>,
    rules: InputRules,
    /// Hash checked on unknown-email logins, built on first use.
    decoy_hash: Arc<OnceCell<String>>,
}

impl AuthService {
    pub fn new(
        repo: Arc<dyn UserRepository>,
        hasher: Arc<dyn CredentialHasher>,
        tokens: Arc<dyn TokenIssuer>,
    ) -> Self {
        Self { repo, hasher, tokens, rules: InputRules::default(), decoy_hash: Arc::default() }
    }

    pub fn with_rules(mut self, rules: InputRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn tokens(&self) -> &Arc<dyn TokenIssuer> {
        &self.tokens
    }

    /// Register a new account and issue its first access token.
    ///
    /// A token failure after the user row was written is reported as
    /// [`AuthError::GenAccessToken`]; the account is kept.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use service::auth::{AuthService, RegisterInput};
    /// use service::auth::hasher::Argon2Hasher;
    /// use service::auth::repository::mock::MemoryUserRepository;
    /// use service::auth::token::JwtTokenIssuer;
    ///
    /// let repo = Arc::new(MemoryUserRepository::new());
    /// let hasher = Arc::new(Argon2Hasher::new(argon2::Params::new(64, 1, 1, None).unwrap()));
    /// let tokens = Arc::new(JwtTokenIssuer::new("secret", "chirper", chrono::Duration::hours(1)));
    /// let svc = AuthService::new(repo, hasher, tokens);
    /// let input = RegisterInput {
    ///     username: "mo".into(),
    ///     email: "mo@mail.com".into(),
    ///     password: "password".into(),
    ///     confirm_password: "password".into(),
    /// };
    /// let res = tokio_test::block_on(svc.register(input)).unwrap();
    /// assert_eq!(res.user.username, "mo");
    /// assert!(!res.access_token.is_empty());
    /// ```
    #[instrument(skip(self, input), fields(username = %input.username.trim()))]
    pub async fn register(&self, input: RegisterInput) -> Result<AuthResult, AuthError> {
        let res = self.register_inner(input).await;
        record_auth(&REGISTRATIONS_TOTAL, outcome(&res));
        res
    }

    async fn register_inner(&self, mut input: RegisterInput) -> Result<AuthResult, AuthError> {
        input.sanitize();
        input.validate(&self.rules)?;

        match self.repo.get_by_username(&input.username).await {
            Lookup::Found(_) => return Err(AuthError::UsernameTaken),
            Lookup::NotFound => {}
            Lookup::Failed(e) => return Err(AuthError::Server(e.to_string())),
        }
        match self.repo.get_by_email(&input.email).await {
            Lookup::Found(_) => return Err(AuthError::EmailTaken),
            Lookup::NotFound => {}
            Lookup::Failed(e) => return Err(AuthError::Server(e.to_string())),
        }

        let password = std::mem::take(&mut input.password);
        let password_hash = self
            .with_hasher(move |h| h.hash(&password))
            .await?
            .map_err(|e| AuthError::Server(e.to_string()))?;

        let user = self
            .repo
            .create(NewUser { username: input.username, email: input.email, password_hash })
            .await
            .map_err(|e| {
                debug!(error = %e, "create rejected");
                AuthError::from(e)
            })?;
        info!(user_id = %user.id, username = %user.username, "user_registered");

        self.issue(user)
    }

    /// Authenticate by email and password.
    ///
    /// Unknown email and wrong password are indistinguishable to the caller.
    #[instrument(skip(self, input))]
    pub async fn login(&self, input: LoginInput) -> Result<AuthResult, AuthError> {
        let res = self.login_inner(input).await;
        record_auth(&LOGINS_TOTAL, outcome(&res));
        res
    }

    async fn login_inner(&self, mut input: LoginInput) -> Result<AuthResult, AuthError> {
        input.sanitize();
        input.validate()?;

        let user = match self.repo.get_by_email(&input.email).await {
            Lookup::Found(user) => user,
            Lookup::NotFound => {
                self.verify_decoy(input.password).await;
                return Err(AuthError::BadCredentials);
            }
            Lookup::Failed(e) => return Err(AuthError::Server(e.to_string())),
        };

        let password = input.password;
        let stored = user.password_hash.clone();
        match self.with_hasher(move |h| h.verify(&password, &stored)).await? {
            Ok(true) => {}
            Ok(false) => return Err(AuthError::BadCredentials),
            Err(HashError::Malformed(e)) => {
                warn!(user_id = %user.id, error = %e, "stored password hash is unreadable");
                return Err(AuthError::BadCredentials);
            }
            Err(e) => return Err(AuthError::Server(e.to_string())),
        }
        debug!(user_id = %user.id, "password verified");

        self.issue(user)
    }

    /// Run a hasher call on the blocking pool; argon2 is CPU bound.
    async fn with_hasher<T, F>(&self, f: F) -> Result<T, AuthError>
    where
        F: FnOnce(&dyn CredentialHasher) -> T + Send + 'static,
        T: Send + 'static,
    {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || f(hasher.as_ref()))
            .await
            .map_err(|e| AuthError::Server(format!("hashing task failed: {e}")))
    }

    /// Spend one verification on a throwaway hash so an unknown email costs
    /// as much as a wrong password. The outcome is discarded.
    async fn verify_decoy(&self, password: String) {
        let decoy = Arc::clone(&self.decoy_hash);
        let res = self
            .with_hasher(move |h| {
                let hash = decoy.get_or_try_init(|| h.hash("decoy password"))?;
                h.verify(&password, hash)
            })
            .await;
        if let Ok(Err(e)) = res {
            debug!(error = %e, "decoy verification failed");
        }
    }

    fn issue(&self, user: User) -> Result<AuthResult, AuthError> {
        let access_token = self.tokens.create_access_token(user.id).map_err(|e| {
            warn!(user_id = %user.id, error = %e, "access token generation failed");
            AuthError::GenAccessToken(e.to_string())
        })?;
        Ok(AuthResult { user, access_token })
    }
}

fn outcome<T>(res: &Result<T, AuthError>) -> &'static str {
    match res {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hasher::cheap_hasher;
    use crate::auth::repository::mock::{Faults, MemoryUserRepository};
    use crate::auth::repository::UniqueField;
    use crate::auth::token::{AccessClaims, JwtTokenIssuer, TokenError};
    use std::sync::Mutex;
    use std::thread::{self, ThreadId};
    use uuid::Uuid;

    /// Cheap argon2 that records which calls ran and on which thread.
    #[derive(Default)]
    struct RecordingHasher {
        calls: Mutex<Vec<(&'static str, ThreadId)>>,
    }

    impl RecordingHasher {
        fn record(&self, name: &'static str) {
            self.calls.lock().unwrap().push((name, thread::current().id()));
        }

        fn count(&self, name: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|(n, _)| *n == name).count()
        }

        fn threads(&self) -> Vec<ThreadId> {
            self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
        }
    }

    impl CredentialHasher for RecordingHasher {
        fn hash(&self, secret: &str) -> Result<String, HashError> {
            self.record("hash");
            cheap_hasher().hash(secret)
        }

        fn verify(&self, secret: &str, hash: &str) -> Result<bool, HashError> {
            self.record("verify");
            cheap_hasher().verify(secret, hash)
        }
    }

    struct FailingIssuer;

    impl TokenIssuer for FailingIssuer {
        fn create_access_token(&self, _user_id: Uuid) -> Result<String, TokenError> {
            Err(TokenError::Encode("boom".into()))
        }

        fn parse_access_token(&self, _token: &str) -> Result<AccessClaims, TokenError> {
            Err(TokenError::Invalid("boom".into()))
        }
    }

    fn jwt() -> Arc<dyn TokenIssuer> {
        Arc::new(JwtTokenIssuer::new("test-secret", "chirper", chrono::Duration::hours(1)))
    }

    fn svc_with(repo: &Arc<MemoryUserRepository>, tokens: Arc<dyn TokenIssuer>) -> AuthService {
        AuthService::new(repo.clone(), Arc::new(cheap_hasher()), tokens)
    }

    fn valid_register() -> RegisterInput {
        RegisterInput {
            username: "Mo".into(),
            email: "mo@mail.com".into(),
            password: "password".into(),
            confirm_password: "password".into(),
        }
    }

    fn valid_login() -> LoginInput {
        LoginInput { email: "mo@mail.com".into(), password: "password".into() }
    }

    fn seed_mo(repo: &MemoryUserRepository) -> User {
        let hash = cheap_hasher().hash("password").unwrap();
        repo.seed("Mo", "mo@mail.com", &hash)
    }

    #[tokio::test]
    async fn can_register() {
        let repo = Arc::new(MemoryUserRepository::new());
        let res = svc_with(&repo, jwt()).register(valid_register()).await.expect("register");
        assert!(!res.user.id.is_nil());
        assert!(!res.access_token.is_empty());
        assert_ne!(res.user.password_hash, "password");
        assert_eq!(repo.count("create"), 1);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn username_taken_skips_email_lookup_and_create() {
        let repo = Arc::new(MemoryUserRepository::new());
        repo.seed("Mo", "other@mail.com", "$hash");
        let err = svc_with(&repo, jwt()).register(valid_register()).await.unwrap_err();
        assert_eq!(err, AuthError::UsernameTaken);
        assert_eq!(repo.count("get_by_username"), 1);
        assert_eq!(repo.count("get_by_email"), 0);
        assert_eq!(repo.count("create"), 0);
    }

    #[tokio::test]
    async fn email_taken_skips_create() {
        let repo = Arc::new(MemoryUserRepository::new());
        repo.seed("someone", "mo@mail.com", "$hash");
        let err = svc_with(&repo, jwt()).register(valid_register()).await.unwrap_err();
        assert_eq!(err, AuthError::EmailTaken);
        assert_eq!(repo.count("get_by_email"), 1);
        assert_eq!(repo.count("create"), 0);
    }

    #[tokio::test]
    async fn lookup_failure_is_server_error() {
        let repo = Arc::new(MemoryUserRepository::new());
        repo.set_faults(Faults { lookups: true, ..Faults::default() });
        let err = svc_with(&repo, jwt()).register(valid_register()).await.unwrap_err();
        assert!(matches!(err, AuthError::Server(_)));
        assert_eq!(repo.count("get_by_email"), 0);
        assert_eq!(repo.count("create"), 0);
    }

    #[tokio::test]
    async fn creation_failed() {
        let repo = Arc::new(MemoryUserRepository::new());
        repo.set_faults(Faults { create: true, ..Faults::default() });
        let err = svc_with(&repo, jwt()).register(valid_register()).await.unwrap_err();
        assert!(matches!(err, AuthError::Server(_)));
    }

    #[tokio::test]
    async fn create_time_conflicts_keep_their_kind() {
        let repo = Arc::new(MemoryUserRepository::new());
        repo.set_faults(Faults { create_conflict: Some(UniqueField::Username), ..Faults::default() });
        let err = svc_with(&repo, jwt()).register(valid_register()).await.unwrap_err();
        assert_eq!(err, AuthError::UsernameTaken);

        repo.set_faults(Faults { create_conflict: Some(UniqueField::Email), ..Faults::default() });
        let err = svc_with(&repo, jwt()).register(valid_register()).await.unwrap_err();
        assert_eq!(err, AuthError::EmailTaken);
    }

    #[tokio::test]
    async fn invalid_input_makes_no_store_calls() {
        let repo = Arc::new(MemoryUserRepository::new());
        let svc = svc_with(&repo, jwt());
        let cases = [
            RegisterInput { username: "M".into(), ..valid_register() },
            RegisterInput { email: "mo".into(), ..valid_register() },
            RegisterInput { confirm_password: "wrong".into(), ..valid_register() },
            RegisterInput { password: "pw".into(), confirm_password: "pw".into(), ..valid_register() },
        ];
        for input in cases {
            let err = svc.register(input).await.unwrap_err();
            assert!(matches!(err, AuthError::Validation(_)), "{err:?}");
        }
        assert!(repo.calls().is_empty());
    }

    #[tokio::test]
    async fn cannot_generate_access_token_after_create() {
        let repo = Arc::new(MemoryUserRepository::new());
        let err = svc_with(&repo, Arc::new(FailingIssuer)).register(valid_register()).await.unwrap_err();
        assert!(matches!(err, AuthError::GenAccessToken(_)));
        // the account stays committed
        assert_eq!(repo.count("create"), 1);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn register_sanitizes_before_lookup() {
        let repo = Arc::new(MemoryUserRepository::new());
        let input = RegisterInput { username: " Mo ".into(), email: " MO@Mail.com".into(), ..valid_register() };
        let res = svc_with(&repo, jwt()).register(input).await.expect("register");
        assert_eq!(res.user.username, "Mo");
        assert_eq!(res.user.email, "mo@mail.com");
    }

    #[tokio::test]
    async fn can_login() {
        let repo = Arc::new(MemoryUserRepository::new());
        let user = seed_mo(&repo);
        let tokens = jwt();
        let res = svc_with(&repo, tokens.clone()).login(valid_login()).await.expect("login");
        assert_eq!(res.user.id, user.id);
        let claims = tokens.parse_access_token(&res.access_token).expect("claims");
        assert_eq!(claims.user_id().unwrap(), user.id);
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_look_the_same() {
        let repo = Arc::new(MemoryUserRepository::new());
        let svc = svc_with(&repo, jwt());
        let missing = svc.login(valid_login()).await.unwrap_err();

        seed_mo(&repo);
        let wrong = svc
            .login(LoginInput { password: "wrong pwd".into(), ..valid_login() })
            .await
            .unwrap_err();

        assert_eq!(missing, AuthError::BadCredentials);
        assert_eq!(missing, wrong);
        assert_eq!(missing.to_string(), wrong.to_string());
        assert_eq!(missing.code(), wrong.code());
    }

    #[tokio::test]
    async fn unknown_email_still_runs_a_verification() {
        let repo = Arc::new(MemoryUserRepository::new());
        let hasher = Arc::new(RecordingHasher::default());
        let svc = AuthService::new(repo.clone(), hasher.clone(), jwt());

        let err = svc.login(valid_login()).await.unwrap_err();
        assert_eq!(err, AuthError::BadCredentials);
        assert_eq!(hasher.count("verify"), 1);

        // the throwaway hash is built once per service
        svc.login(valid_login()).await.unwrap_err();
        assert_eq!(hasher.count("hash"), 1);
        assert_eq!(hasher.count("verify"), 2);
    }

    #[tokio::test]
    async fn hashing_runs_off_the_async_thread() {
        let repo = Arc::new(MemoryUserRepository::new());
        let hasher = Arc::new(RecordingHasher::default());
        let svc = AuthService::new(repo.clone(), hasher.clone(), jwt());

        svc.register(valid_register()).await.expect("register");
        svc.login(valid_login()).await.expect("login");

        let here = thread::current().id();
        let threads = hasher.threads();
        assert_eq!(threads.len(), 2);
        assert!(threads.iter().all(|t| *t != here));
    }

    #[tokio::test]
    async fn login_lookup_failure_is_server_error() {
        let repo = Arc::new(MemoryUserRepository::new());
        repo.set_faults(Faults { lookups: true, ..Faults::default() });
        let err = svc_with(&repo, jwt()).login(valid_login()).await.unwrap_err();
        assert!(matches!(err, AuthError::Server(_)));
    }

    #[tokio::test]
    async fn login_invalid_input_makes_no_store_calls() {
        let repo = Arc::new(MemoryUserRepository::new());
        let err = svc_with(&repo, jwt())
            .login(LoginInput { email: "mo".into(), password: String::new() })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
        assert!(repo.calls().is_empty());
    }

    #[tokio::test]
    async fn login_cannot_generate_access_token() {
        let repo = Arc::new(MemoryUserRepository::new());
        seed_mo(&repo);
        let err = svc_with(&repo, Arc::new(FailingIssuer)).login(valid_login()).await.unwrap_err();
        assert!(matches!(err, AuthError::GenAccessToken(_)));
    }

    #[tokio::test]
    async fn unreadable_stored_hash_is_bad_credentials() {
        let repo = Arc::new(MemoryUserRepository::new());
        repo.seed("Mo", "mo@mail.com", "plaintext-oops");
        let err = svc_with(&repo, jwt()).login(valid_login()).await.unwrap_err();
        assert_eq!(err, AuthError::BadCredentials);
    }

    #[tokio::test]
    async fn register_then_login() {
        let repo = Arc::new(MemoryUserRepository::new());
        let svc = svc_with(&repo, jwt());
        let reg = svc.register(valid_register()).await.unwrap();
        let login = svc.login(LoginInput { email: "MO@mail.com ".into(), ..valid_login() }).await.unwrap();
        assert_eq!(reg.user.id, login.user.id);
    }
}
