//! 记住我的端到端测试：窗口内多次验证、窗口外失效

use chrono::Duration;
use guardrs::clock::ManualClock;
use guardrs::password::PasswordHasher;
use guardrs::registry::{Authenticator, AuthenticatorConfig};
use guardrs::remember::RememberConfig;
use guardrs::store::InMemorySecurityStore;
use std::sync::Arc;

struct Harness {
    clock: ManualClock,
    auth: Authenticator,
    account_id: String,
}

fn harness(remember: RememberConfig) -> Harness {
    let clock = ManualClock::starting_now();
    let auth = Authenticator::new(
        Arc::new(InMemorySecurityStore::new()),
        Arc::new(clock.clone()),
        Arc::new(guardrs::mailer::NullMailer::new()),
        Arc::new(guardrs::audit::InMemoryAuditLogger::new()),
        AuthenticatorConfig::default()
            .with_hasher(PasswordHasher::fast_insecure())
            .with_remember(remember),
    )
    .unwrap();
    let account = auth.register("user@example.com", "Str0ng_password").unwrap();
    Harness {
        clock,
        auth,
        account_id: account.id,
    }
}

#[test]
fn token_survives_the_whole_window_then_dies() {
    let h = harness(RememberConfig::default());
    let issued = h.auth.remember().issue(&h.account_id).unwrap();

    // 一秒后、一天后都有效，且验证不消费
    h.clock.advance(Duration::seconds(1));
    assert!(h.auth.remember().validate(&h.account_id, &issued.secret).unwrap());

    h.clock.advance(Duration::days(1));
    assert!(h.auth.remember().validate(&h.account_id, &issued.secret).unwrap());
    assert!(h.auth.remember().validate(&h.account_id, &issued.secret).unwrap());

    // 两周窗口过后失效
    h.clock.advance(Duration::weeks(2));
    assert!(!h.auth.remember().validate(&h.account_id, &issued.secret).unwrap());
}

#[test]
fn shorter_window_is_respected() {
    let h = harness(RememberConfig::new().with_window(Duration::days(1)));
    let issued = h.auth.remember().issue(&h.account_id).unwrap();

    h.clock.advance(Duration::hours(23));
    assert!(h.auth.remember().validate(&h.account_id, &issued.secret).unwrap());

    h.clock.advance(Duration::hours(2));
    assert!(!h.auth.remember().validate(&h.account_id, &issued.secret).unwrap());
}

#[test]
fn reissue_supersedes_the_previous_cookie() {
    let h = harness(RememberConfig::default());
    let first = h.auth.remember().issue(&h.account_id).unwrap();
    let second = h.auth.remember().issue(&h.account_id).unwrap();

    assert!(!h.auth.remember().validate(&h.account_id, &first.secret).unwrap());
    assert!(h.auth.remember().validate(&h.account_id, &second.secret).unwrap());
}

#[test]
fn forget_logs_out_remembered_clients() {
    let h = harness(RememberConfig::default());
    let issued = h.auth.remember().issue(&h.account_id).unwrap();
    assert!(h.auth.remember().validate(&h.account_id, &issued.secret).unwrap());

    h.auth.remember().forget(&h.account_id).unwrap();
    assert!(!h.auth.remember().validate(&h.account_id, &issued.secret).unwrap());
}

#[test]
fn garbage_input_is_false_not_an_error() {
    let h = harness(RememberConfig::default());
    h.auth.remember().issue(&h.account_id).unwrap();

    assert!(!h.auth.remember().validate(&h.account_id, "not-a-token").unwrap());
    assert!(!h.auth.remember().validate("missing-account", "x").unwrap());
}
