mod common;

use std::sync::atomic::Ordering;

use anyhow::Result;
use common::{session_for, spawn_backend, PASSWORD};

#[tokio::test]
async fn test_login_profile_logout() -> Result<()> {
    let api = spawn_backend().await?;
    let session = session_for(&api)?;
    session.bootstrap("center-01.example.com").await;
    let auth = session.auth();

    let user = auth.login_admin("ada@example.com", PASSWORD, true).await?;
    assert_eq!(user.email.as_deref(), Some("ada@example.com"));
    assert!(session.tokens().has_token());
    assert!(session.tokens().get_remember_me());
    assert!(session.refresh().is_armed());

    let profile = auth.fetch_admin_profile().await?.expect("profile");
    assert_eq!(profile.name.as_deref(), Some("Ada"));
    // Resolved tenant key travels with authenticated calls
    assert_eq!(api.backend.seen_api_keys.lock().unwrap().last().map(String::as_str), Some("tenant-api-key"));

    auth.logout_admin().await;
    assert_eq!(api.backend.logout_calls.load(Ordering::SeqCst), 1);
    assert!(!session.tokens().has_token());
    assert!(!session.refresh().is_armed());
    assert_eq!(auth.fetch_admin_profile().await?, None);
    Ok(())
}

#[tokio::test]
async fn test_bad_credentials_leave_store_empty() -> Result<()> {
    let api = spawn_backend().await?;
    let session = session_for(&api)?;

    let err = session
        .auth()
        .login_admin("ada@example.com", "wrong", false)
        .await
        .expect_err("login should fail");
    assert!(err.is_unauthorized());
    assert!(!session.tokens().has_token());
    // Login is a public call and never triggers a refresh
    assert_eq!(api.backend.refresh_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_expired_token_is_refreshed_and_retried_once() -> Result<()> {
    let api = spawn_backend().await?;
    let session = session_for(&api)?;
    let auth = session.auth();
    auth.login_admin("ada@example.com", PASSWORD, false).await?;
    let first = session.tokens().get_access_token();

    api.backend.expire_token();
    let (a, b) = tokio::join!(auth.fetch_admin_profile(), auth.fetch_admin_profile());
    assert!(a?.is_some());
    assert!(b?.is_some());

    assert_eq!(api.backend.refresh_count(), 1);
    assert_ne!(session.tokens().get_access_token(), first);
    assert!(session.refresh().is_armed());
    Ok(())
}

#[tokio::test]
async fn test_failed_refresh_ends_session() -> Result<()> {
    let api = spawn_backend().await?;
    let session = session_for(&api)?;
    let auth = session.auth();
    auth.login_admin("ada@example.com", PASSWORD, true).await?;

    api.backend.expire_token();
    api.backend.refresh_fails.store(true, Ordering::SeqCst);

    let err = auth.fetch_admin_profile().await.expect_err("refresh should fail");
    assert!(err.is_unauthorized());
    assert_eq!(api.backend.refresh_count(), 1);
    assert!(!session.tokens().has_token());
    assert!(!session.tokens().get_remember_me());
    assert!(!session.refresh().is_armed());
    Ok(())
}

#[tokio::test]
async fn test_manual_refresh_rotates_token() -> Result<()> {
    let api = spawn_backend().await?;
    let session = session_for(&api)?;
    let auth = session.auth();
    auth.login_admin("ada@example.com", PASSWORD, false).await?;

    let token = auth.refresh_admin_session().await?;
    assert_eq!(session.tokens().get_access_token().as_deref(), Some(token.as_str()));
    assert!(auth.fetch_admin_profile().await?.is_some());
    Ok(())
}
