use poem_openapi::payload::Json;

use crate::{
    api::models::{AuthOutcomeDto, AuthResponse, NoContentResponse, SessionDto, SessionResponse},
    sync::{AuthOutcome, IdentityProvider},
};

pub struct SessionService<'a> {
    pub identity: &'a IdentityProvider,
}

impl<'a> SessionService<'a> {
    pub fn new(identity: &'a IdentityProvider) -> Self {
        Self { identity }
    }

    pub fn current(&self) -> SessionResponse {
        let current = self.identity.current();
        SessionResponse::Ok(Json(SessionDto::new(
            self.identity.is_configured(),
            current.as_ref(),
        )))
    }

    #[tracing::instrument(level = "debug", skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResponse {
        auth_response(self.identity.sign_in(email, password).await)
    }

    #[tracing::instrument(level = "debug", skip(self, password))]
    pub async fn sign_up(&self, email: &str, password: &str) -> AuthResponse {
        auth_response(self.identity.sign_up(email, password).await)
    }

    pub async fn sign_out(&self) -> NoContentResponse {
        self.identity.sign_out().await;
        NoContentResponse::NoContent
    }
}

fn auth_response(outcome: AuthOutcome) -> AuthResponse {
    if outcome.ok {
        AuthResponse::Ok(Json(AuthOutcomeDto::from(outcome)))
    } else {
        AuthResponse::Rejected(Json(AuthOutcomeDto::from(outcome)))
    }
}
