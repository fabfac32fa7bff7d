use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use db::{
    ConnectionTrait, DbErr,
    models::user::{CreateUser, User},
    types::UserRole,
};
use thiserror::Error;
use utils_jwt::{Claims, TokenError, generate_access_token, validate_access_token};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Email already registered")]
    EmailTaken,
    #[error("Password hashing failed")]
    Hash,
}

/// Hash a plaintext password with Argon2id and a random salt, returning
/// the PHC string for storage.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| AuthError::Hash)?;
    Ok(hash.to_string())
}

/// Verify a plaintext password against a stored PHC hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|_| AuthError::Hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(_) => Err(AuthError::Hash),
    }
}

/// Issues and validates the bearer tokens carried by every authenticated
/// request.
#[derive(Clone)]
pub struct AuthService {
    secret: String,
    token_ttl_hours: i64,
}

impl AuthService {
    pub fn new(secret: String, token_ttl_hours: i64) -> Self {
        Self {
            secret,
            token_ttl_hours,
        }
    }

    pub fn issue_token(&self, user_id: Uuid) -> Result<String, AuthError> {
        Ok(generate_access_token(
            user_id,
            &self.secret,
            self.token_ttl_hours,
        )?)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        Ok(validate_access_token(token, &self.secret)?)
    }

    /// Create an account and sign its first token. Duplicate emails are a
    /// conflict, reported before the unique index would fire.
    pub async fn register<C: ConnectionTrait>(
        &self,
        db: &C,
        name: String,
        email: String,
        password: &str,
        role: Option<UserRole>,
    ) -> Result<(User, String), AuthError> {
        if User::find_by_email(db, &email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = hash_password(password)?;
        let user = User::create(
            db,
            &CreateUser {
                name,
                email,
                password_hash,
                role,
            },
        )
        .await?;
        let token = self.issue_token(user.id)?;
        Ok((user, token))
    }

    /// Exchange credentials for a token. Unknown email and wrong password
    /// are indistinguishable to the caller.
    pub async fn login<C: ConnectionTrait>(
        &self,
        db: &C,
        email: &str,
        password: &str,
    ) -> Result<(User, String), AuthError> {
        let credentials = User::find_credentials_by_email(db, email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &credentials.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.issue_token(credentials.user.id)?;
        Ok((credentials.user, token))
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    fn service() -> AuthService {
        AuthService::new("test-secret-that-is-long-enough".to_string(), 1)
    }

    #[test]
    fn hash_and_verify_roundtrip() {
        let hash = hash_password("correct-horse-battery-staple").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct-horse-battery-staple", &hash).unwrap());
        assert!(!verify_password("wrong-password", &hash).unwrap());
    }

    #[tokio::test]
    async fn register_then_login() {
        let db = setup_db().await;
        let auth = service();

        let (user, token) = auth
            .register(&db, "Xenia".to_string(), "x@example.com".to_string(), "hunter22", None)
            .await
            .unwrap();
        assert!(!token.is_empty());

        let claims = auth.verify_token(&token).unwrap();
        assert_eq!(claims.sub, user.id);

        let (logged_in, _token) = auth.login(&db, "x@example.com", "hunter22").await.unwrap();
        assert_eq!(logged_in.id, user.id);
    }

    #[tokio::test]
    async fn duplicate_registration_is_a_conflict() {
        let db = setup_db().await;
        let auth = service();

        auth.register(&db, "A".to_string(), "dup@example.com".to_string(), "hunter22", None)
            .await
            .unwrap();
        let result = auth
            .register(&db, "B".to_string(), "dup@example.com".to_string(), "hunter22", None)
            .await;
        assert!(matches!(result, Err(AuthError::EmailTaken)));
    }

    #[tokio::test]
    async fn bad_credentials_are_rejected() {
        let db = setup_db().await;
        let auth = service();

        auth.register(&db, "A".to_string(), "a@example.com".to_string(), "hunter22", None)
            .await
            .unwrap();

        assert!(matches!(
            auth.login(&db, "a@example.com", "wrong").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login(&db, "nobody@example.com", "hunter22").await,
            Err(AuthError::InvalidCredentials)
        ));
    }
}
