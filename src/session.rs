use crate::{
    authorize::BypassRole,
    error::{AuthError, AuthResult},
    models::{Account, AccountId, NewAccount, RoleId},
    password,
    repository::{RepositoryError, RepositoryState},
    token::TokenCodec,
};

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 50;
pub const PASSWORD_MIN_LEN: usize = 6;

/// Same error for an unknown username and a wrong password.
const INVALID_CREDENTIALS: AuthError = AuthError::Unauthorized("invalid credentials");

/// LoginOutcome
///
/// Both freshly minted tokens plus the account, role name filled in.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub access_token: String,
    pub refresh_token: String,
    pub account: Account,
}

/// SessionService
///
/// The only place new tokens are minted. Combines the password verifier, the token codec
/// and the account/role store. Nothing here retries: credential and token failures are
/// final, and store failures are logged and surfaced as `Internal`.
///
/// Self-registration never hands out the bypass role.
#[derive(Clone)]
pub struct SessionService {
    repo: RepositoryState,
    tokens: TokenCodec,
    bypass: BypassRole,
}

impl SessionService {
    pub fn new(repo: RepositoryState, tokens: TokenCodec, bypass: BypassRole) -> Self {
        Self {
            repo,
            tokens,
            bypass,
        }
    }

    /// login
    ///
    /// An unknown username and a wrong password produce the same `Unauthorized`, and both
    /// pay for one hash verification. An account whose role is missing is data corruption
    /// and reported as `Internal`.
    pub async fn login(&self, username: &str, password: &str) -> AuthResult<LoginOutcome> {
        let account = self
            .repo
            .find_account_by_username(username)
            .await
            .map_err(|e| {
                tracing::error!(username, error = %e, "error finding account by username during login");
                AuthError::Internal
            })?;

        let Some(mut account) = account else {
            password::verify_against_dummy(password);
            tracing::debug!(username, "login rejected: unknown username");
            return Err(INVALID_CREDENTIALS);
        };

        if !password::verify_password(password, &account.password_hash) {
            tracing::debug!(account_id = account.id, "login rejected: wrong password");
            return Err(INVALID_CREDENTIALS);
        }

        let role = self
            .repo
            .find_role_by_id(account.role_id)
            .await
            .map_err(|e| {
                tracing::error!(account_id = account.id, error = %e, "error finding role for account");
                AuthError::Internal
            })?
            .ok_or_else(|| {
                tracing::error!(
                    account_id = account.id,
                    role_id = account.role_id,
                    "role not found for account: inconsistent data"
                );
                AuthError::Internal
            })?;
        account.role_name = Some(role.name);

        let access_token = self.tokens.issue_access(&account)?;
        let refresh_token = self.tokens.issue_refresh(&account)?;

        tracing::info!(account_id = account.id, role_id = account.role_id, "login succeeded");
        Ok(LoginOutcome {
            access_token,
            refresh_token,
            account,
        })
    }

    /// register
    ///
    /// Validates input, rejects a taken username, an unknown role or the bypass role, hashes
    /// the password, then creates the account. The returned account never serializes the hash.
    pub async fn register(&self, username: &str, password: &str, role_id: RoleId) -> AuthResult<Account> {
        validate_registration(username, password)?;

        if self.bypass.covers(role_id) {
            tracing::warn!(username, role_id, "registration refused: bypass role requested");
            return Err(AuthError::bad_request("Invalid Role ID"));
        }

        let existing = self
            .repo
            .find_account_by_username(username)
            .await
            .map_err(|e| {
                tracing::error!(username, error = %e, "error checking existing account during registration");
                AuthError::Internal
            })?;
        if existing.is_some() {
            return Err(AuthError::bad_request("Username already exists"));
        }

        let role = self
            .repo
            .find_role_by_id(role_id)
            .await
            .map_err(|e| {
                tracing::error!(role_id, error = %e, "error checking role during registration");
                AuthError::Internal
            })?
            .ok_or_else(|| AuthError::bad_request("Invalid Role ID"))?;

        let password_hash = password::hash_password(password)?;

        let mut account = self
            .repo
            .create_account(NewAccount {
                username: username.to_string(),
                password_hash,
                role_id: role.id,
            })
            .await
            .map_err(|e| match e {
                // Lost a race with a concurrent registration of the same name.
                RepositoryError::Conflict(_) => AuthError::bad_request("Username already exists"),
                e => {
                    tracing::error!(username, error = %e, "failed to create account during registration");
                    AuthError::Internal
                }
            })?;
        account.role_name = Some(role.name);

        tracing::info!(account_id = account.id, role_id = account.role_id, "account registered");
        Ok(account)
    }

    /// refresh_token
    ///
    /// Exchanges a refresh token for a new access token. The account is re-read, so a
    /// deleted account can no longer refresh and a role change takes effect now.
    /// Refresh tokens are not rotated.
    pub async fn refresh_token(&self, refresh_token: &str) -> AuthResult<String> {
        let claims = self.tokens.verify_refresh(refresh_token)?;

        let account = self
            .repo
            .find_account_by_id(claims.account_id)
            .await
            .map_err(|e| {
                tracing::error!(account_id = claims.account_id, error = %e, "error finding account for refresh token");
                AuthError::Internal
            })?
            .ok_or_else(|| {
                tracing::info!(account_id = claims.account_id, "account not found for refresh token");
                AuthError::Unauthorized("invalid or expired token")
            })?;

        self.tokens.issue_access(&account)
    }

    /// current_account
    ///
    /// Profile lookup for an authenticated caller. A caller whose account has since been
    /// deleted is no longer authenticated.
    pub async fn current_account(&self, account_id: AccountId) -> AuthResult<Account> {
        self.repo
            .find_account_by_id(account_id)
            .await
            .map_err(|e| {
                tracing::error!(account_id, error = %e, "failed to get account by id");
                AuthError::Internal
            })?
            .ok_or(AuthError::Unauthorized("account no longer exists"))
    }
}

fn validate_registration(username: &str, password: &str) -> AuthResult<()> {
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(AuthError::bad_request(format!(
            "username must be between {USERNAME_MIN_LEN} and {USERNAME_MAX_LEN} characters"
        )));
    }
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(AuthError::bad_request(format!(
            "password must be at least {PASSWORD_MIN_LEN} characters"
        )));
    }
    Ok(())
}
