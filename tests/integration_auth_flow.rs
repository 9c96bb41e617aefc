//! 注册、认证、跟踪与改密的端到端流程测试

use chrono::Duration;
use guardrs::audit::{EventType, InMemoryAuditLogger};
use guardrs::clock::{Clock, ManualClock};
use guardrs::error::{AuthError, Error};
use guardrs::mailer::InMemoryMailer;
use guardrs::password::PasswordHasher;
use guardrs::registry::{Authenticator, AuthenticatorConfig, Capability};
use guardrs::store::InMemorySecurityStore;
use std::net::IpAddr;
use std::sync::Arc;

struct Harness {
    clock: ManualClock,
    audit: Arc<InMemoryAuditLogger>,
    auth: Authenticator,
}

fn harness(config: AuthenticatorConfig) -> Harness {
    let clock = ManualClock::starting_now();
    let audit = Arc::new(InMemoryAuditLogger::new());
    let auth = Authenticator::new(
        Arc::new(InMemorySecurityStore::new()),
        Arc::new(clock.clone()),
        Arc::new(InMemoryMailer::new()),
        audit.clone(),
        config.with_hasher(PasswordHasher::fast_insecure()),
    )
    .unwrap();
    Harness { clock, audit, auth }
}

#[test]
fn register_then_authenticate() {
    let h = harness(AuthenticatorConfig::default());

    let account = h.auth.register("user@example.com", "Str0ng_password").unwrap();
    assert!(account.password_hash.is_some());

    let authed = h
        .auth
        .authenticate("user@example.com", "Str0ng_password", None)
        .unwrap();
    assert_eq!(authed.id, account.id);

    assert_eq!(h.audit.events_by_type(EventType::AccountCreated).len(), 1);
    assert_eq!(h.audit.events_by_type(EventType::LoginSucceeded).len(), 1);
}

#[test]
fn unknown_and_wrong_password_report_the_same_error() {
    let h = harness(AuthenticatorConfig::default());
    h.auth.register("user@example.com", "Str0ng_password").unwrap();

    // 未知邮箱与密码错误不可区分
    let unknown = h
        .auth
        .authenticate("ghost@example.com", "Str0ng_password", None)
        .unwrap_err();
    let wrong = h
        .auth
        .authenticate("user@example.com", "wrong_password1", None)
        .unwrap_err();
    assert_eq!(unknown, Error::Auth(AuthError::InvalidCredentials));
    assert_eq!(wrong, Error::Auth(AuthError::InvalidCredentials));
}

#[test]
fn tracking_shifts_current_into_last() {
    let h = harness(AuthenticatorConfig::default());
    h.auth.register("user@example.com", "Str0ng_password").unwrap();

    let first_ip: IpAddr = "203.0.113.7".parse().unwrap();
    let second_ip: IpAddr = "198.51.100.4".parse().unwrap();

    let first = h
        .auth
        .authenticate("user@example.com", "Str0ng_password", Some(first_ip))
        .unwrap();
    let first_at = h.clock.now();
    assert_eq!(first.stats.sign_in_count, 1);
    assert_eq!(first.stats.current_sign_in_ip, Some(first_ip));
    assert!(first.stats.last_sign_in_at.is_none());

    h.clock.advance(Duration::hours(5));
    let second = h
        .auth
        .authenticate("user@example.com", "Str0ng_password", Some(second_ip))
        .unwrap();
    assert_eq!(second.stats.sign_in_count, 2);
    assert_eq!(second.stats.current_sign_in_ip, Some(second_ip));
    assert_eq!(second.stats.last_sign_in_at, Some(first_at));
    assert_eq!(second.stats.last_sign_in_ip, Some(first_ip));
}

#[test]
fn tracking_disabled_records_nothing() {
    let h = harness(AuthenticatorConfig::default().with_modules([Capability::Database]));
    h.auth.register("user@example.com", "Str0ng_password").unwrap();

    let authed = h
        .auth
        .authenticate("user@example.com", "Str0ng_password", None)
        .unwrap();
    assert_eq!(authed.stats.sign_in_count, 0);
    assert!(authed.stats.current_sign_in_at.is_none());
}

#[test]
fn change_password_requires_current() {
    let h = harness(AuthenticatorConfig::default());
    let account = h.auth.register("user@example.com", "Str0ng_password").unwrap();

    let err = h
        .auth
        .change_password(&account.id, "wrong_password1", "N3w_password", "N3w_password")
        .unwrap_err();
    assert_eq!(err, Error::Auth(AuthError::InvalidCredentials));

    h.auth
        .change_password(&account.id, "Str0ng_password", "N3w_password", "N3w_password")
        .unwrap();

    // 旧密码失效，新密码生效
    assert!(
        h.auth
            .authenticate("user@example.com", "Str0ng_password", None)
            .is_err()
    );
    h.auth
        .authenticate("user@example.com", "N3w_password", None)
        .unwrap();
    assert_eq!(h.audit.events_by_type(EventType::PasswordChanged).len(), 1);
}

#[test]
fn session_timeout_from_last_sign_in() {
    let h = harness(AuthenticatorConfig::default());
    h.auth.register("user@example.com", "Str0ng_password").unwrap();

    let authed = h
        .auth
        .authenticate("user@example.com", "Str0ng_password", None)
        .unwrap();
    let last_activity = authed.stats.current_sign_in_at.unwrap();

    let timeout = h.auth.timeout();
    assert!(!timeout.is_expired(last_activity, h.clock.now()));

    h.clock.advance(Duration::hours(1));
    assert!(timeout.is_expired(last_activity, h.clock.now()));
}
