//! Accounts and sessions
//!
//! Sign-up creates the auth user and a matching row in `profiles`, which is
//! where first and last names are read from afterwards.

use super::client::{read_json, send_error, BackendClient, RemoteUser, TokenResponse, SINGLE_OBJECT};
use super::{AuthUser, IdentityGateway, SignIn, SignUp};
use crate::error::GatewayError;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct Profile {
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
}

/// What the sign-up endpoint returned: a session when no email confirmation
/// is required, otherwise only the user
enum SignUpOutcome {
    Session(TokenResponse),
    Pending(RemoteUser),
}

fn parse_sign_up(body: serde_json::Value) -> Result<SignUpOutcome, GatewayError> {
    let decode = |e: serde_json::Error| GatewayError::Decode(format!("Unexpected sign-up response: {}", e));

    if body.get("access_token").is_some() {
        return serde_json::from_value(body).map(SignUpOutcome::Session).map_err(decode);
    }
    let user = match body.get("user") {
        Some(user) => user.clone(),
        None => body,
    };
    serde_json::from_value(user).map(SignUpOutcome::Pending).map_err(decode)
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl BackendClient {
    /// Names from `profiles`. A missing profile is not an error.
    fn fetch_profile(&self, token: &str, user_id: &str) -> Profile {
        let result = self
            .request("GET", "/rest/v1/profiles", Some(token))
            .set("Accept", SINGLE_OBJECT)
            .query("select", "first_name,last_name")
            .query("id", &format!("eq.{}", user_id))
            .call()
            .map_err(send_error)
            .and_then(read_json::<Profile>);

        result.unwrap_or_else(|e| {
            tracing::debug!("No profile for {}: {}", user_id, e);
            Profile::default()
        })
    }

    fn with_profile(&self, token: &str, mut user: AuthUser) -> AuthUser {
        let profile = self.fetch_profile(token, &user.id);
        user.first_name = profile.first_name.or(user.first_name);
        user.last_name = profile.last_name.or(user.last_name);
        user
    }
}

impl IdentityGateway for BackendClient {
    fn sign_up(&self, request: &SignUp) -> Result<AuthUser, GatewayError> {
        request.validate()?;
        let email = request.email.trim();
        let first_name = non_blank(&request.first_name);
        let last_name = non_blank(&request.last_name);

        let response = self
            .request("POST", "/auth/v1/signup", None)
            .send_json(serde_json::json!({
                "email": email,
                "password": request.password,
                "data": { "firstName": first_name, "lastName": last_name },
            }))
            .map_err(send_error)?;
        let body: serde_json::Value = read_json(response)?;

        let (user_id, token) = match parse_sign_up(body)? {
            SignUpOutcome::Session(tokens) => {
                let mut session = tokens.into_session(chrono::Utc::now().timestamp());
                session.user.first_name = first_name.clone();
                session.user.last_name = last_name.clone();
                let ids = (session.user.id.clone(), Some(session.access_token.clone()));
                self.set_session(session)?;
                ids
            }
            SignUpOutcome::Pending(user) => {
                tracing::info!("Account created for {}, email confirmation pending", email);
                (user.id, None)
            }
        };

        self.request("POST", "/rest/v1/profiles", token.as_deref())
            .send_json(serde_json::json!([{
                "id": user_id,
                "first_name": first_name,
                "last_name": last_name,
                "email": email,
            }]))
            .map_err(send_error)?;

        Ok(AuthUser {
            id: user_id,
            email: email.to_string(),
            first_name,
            last_name,
        })
    }

    fn sign_in(&self, request: &SignIn) -> Result<AuthUser, GatewayError> {
        request.validate()?;

        let response = self
            .request("POST", "/auth/v1/token", None)
            .query("grant_type", "password")
            .send_json(serde_json::json!({
                "email": request.email.trim(),
                "password": request.password,
            }))
            .map_err(send_error)?;
        let tokens: TokenResponse = read_json(response)?;

        let mut session = tokens.into_session(chrono::Utc::now().timestamp());
        session.user = self.with_profile(&session.access_token, session.user);
        let user = session.user.clone();
        self.set_session(session)?;

        tracing::info!("Signed in as {}", user.email);
        Ok(user)
    }

    fn sign_out(&self) -> Result<(), GatewayError> {
        let Some(session) = self.stored_session() else {
            return Ok(());
        };

        let remote = self
            .request("POST", "/auth/v1/logout", Some(&session.access_token))
            .call()
            .map_err(send_error);
        self.clear_session()?;

        match remote {
            Ok(_) | Err(GatewayError::NotAuthenticated) => {
                tracing::info!("Signed out {}", session.user.email);
                Ok(())
            }
            Err(GatewayError::Remote { status: 401, .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn current_user(&self) -> Result<Option<AuthUser>, GatewayError> {
        let session = match self.active_session() {
            Ok(session) => session,
            Err(GatewayError::NotAuthenticated) => return Ok(None),
            Err(e) => return Err(e),
        };

        let response = self
            .request("GET", "/auth/v1/user", Some(&session.access_token))
            .call()
            .map_err(send_error);
        let remote: RemoteUser = match response {
            Ok(response) => read_json(response)?,
            Err(GatewayError::NotAuthenticated) | Err(GatewayError::Remote { status: 401, .. }) => {
                tracing::info!("Stored session was rejected, signing out locally");
                self.clear_session()?;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let mut user = remote.into_auth_user();
        if user.first_name.is_none() {
            user.first_name = session.user.first_name.clone();
        }
        if user.last_name.is_none() {
            user.last_name = session.user.last_name.clone();
        }
        Ok(Some(self.with_profile(&session.access_token, user)))
    }
}
