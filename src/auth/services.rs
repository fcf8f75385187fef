use std::sync::Arc;

use lazy_static::lazy_static;
use rand::{rngs::OsRng, Rng};
use regex::Regex;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use super::{
    password,
    repo_types::{NewUser, User},
};
use crate::{
    config::MailDelivery,
    error::{AppError, AppResult, StoreError},
    mail::{send_with_timeout, VerificationMessage},
    state::AppState,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex compiles");
    }
    EMAIL_RE.is_match(email)
}

/// Six decimal digits, zero padded, from the OS CSPRNG.
pub(crate) fn generate_verification_code() -> String {
    let n: u32 = OsRng.gen_range(0..1_000_000);
    format!("{n:06}")
}

/// Creates an unverified account and dispatches its verification code.
pub async fn register(st: &AppState, username: &str, email: &str, password: &str) -> AppResult<User> {
    let username = username.trim();
    let email = email.trim();
    if username.is_empty() || email.is_empty() || password.is_empty() {
        return Err(AppError::validation("username, email and password are required"));
    }
    if !is_valid_email(email) {
        return Err(AppError::validation("invalid email"));
    }

    let code = generate_verification_code();
    let password_hash = password::hash(password.to_owned())
        .await
        .map_err(AppError::Internal)?;

    let user = st
        .users
        .create(NewUser {
            username: username.to_owned(),
            email: email.to_owned(),
            password_hash,
            verification_code: code.clone(),
        })
        .await
        .map_err(|e| match e {
            StoreError::Conflict => AppError::Conflict("email already registered".into()),
            other => other.during("create user"),
        })?;

    info!(user_id = %user.id, "user registered");

    dispatch_verification(
        st,
        VerificationMessage {
            recipient: user.email.clone(),
            display_name: user.username.clone(),
            code,
            registered_at: user.created_at,
        },
    )
    .await?;

    Ok(user)
}

/// In background mode the send is detached from the request and bounded by
/// the mail timeout; registration success says nothing about delivery.
async fn dispatch_verification(st: &AppState, msg: VerificationMessage) -> AppResult<()> {
    let limit = st.config.mail.timeout();
    match st.config.mail.delivery {
        MailDelivery::Blocking => send_with_timeout(st.notifier.as_ref(), &msg, limit)
            .await
            .map_err(|e| AppError::ExternalService(e.context("send verification mail"))),
        MailDelivery::Background => {
            let notifier = Arc::clone(&st.notifier);
            let task = async move {
                match send_with_timeout(notifier.as_ref(), &msg, limit).await {
                    Ok(()) => info!(recipient = %msg.recipient, "verification mail sent"),
                    Err(e) => warn!(recipient = %msg.recipient, error = %e, "verification mail failed"),
                }
            };
            tokio::spawn(task.in_current_span());
            Ok(())
        }
    }
}

/// Consumes the verification code and returns the verified user with a token.
pub async fn verify_user(st: &AppState, email: &str, code: &str) -> AppResult<(User, String)> {
    let email = email.trim();
    let code = code.trim();
    if email.is_empty() || code.is_empty() {
        return Err(AppError::validation("email and verification code are required"));
    }

    let user = st.users.find_by_email(email).await.map_err(|e| match e {
        StoreError::NotFound => AppError::not_found("account not found"),
        other => other.during("find user by email"),
    })?;

    if user.is_verified {
        return Err(AppError::validation("account already verified"));
    }
    if user.verification_code.as_deref() != Some(code) {
        warn!(user_id = %user.id, "verification code mismatch");
        return Err(AppError::validation("invalid verification code"));
    }

    // A concurrent verification may have consumed the code in between.
    let user = st.users.set_verified(user.id, code).await.map_err(|e| match e {
        StoreError::NotFound => AppError::validation("verification code already used"),
        other => other.during("mark user verified"),
    })?;

    let token = st.jwt.sign(user.id).map_err(AppError::Internal)?;
    info!(user_id = %user.id, "user verified");
    Ok((user, token))
}

/// Every credential failure reads the same to the caller.
pub async fn login(st: &AppState, email: &str, password: &str) -> AppResult<(User, String)> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(AppError::validation("email and password are required"));
    }

    let user = match st.users.find_by_email(email).await {
        Ok(u) => u,
        Err(StoreError::NotFound) => {
            warn!("login unknown email");
            password::verify_dummy(password.to_owned()).await;
            return Err(AppError::unauthorized("invalid credentials"));
        }
        Err(e) => return Err(e.during("find user by email")),
    };

    if !user.is_verified {
        warn!(user_id = %user.id, "login before verification");
        password::verify_dummy(password.to_owned()).await;
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let ok = password::verify(password.to_owned(), user.password_hash.clone())
        .await
        .map_err(AppError::Internal)?;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let token = st.jwt.sign(user.id).map_err(AppError::Internal)?;
    info!(user_id = %user.id, "user logged in");
    Ok((user, token))
}

/// The account behind a validated token. A token whose subject no longer
/// exists is treated as an invalid credential.
pub async fn current_user(st: &AppState, user_id: Uuid) -> AppResult<User> {
    st.users.find_by_id(user_id).await.map_err(|e| match e {
        StoreError::NotFound => AppError::unauthorized("user not found"),
        other => other.during("find user by id"),
    })
}
