//! Integration tests for registration, login and onboarding through the gateway.

mod common;

use common::{register_input, TestHarness};
use payfusion_core::domains::gateway::{GatewayError, ProfileUpdate, RegisterInput, TransferInput};
use test_context::test_context;

#[test_context(TestHarness)]
#[tokio::test]
async fn test_register_normalizes_phone_and_sends_code(ctx: &TestHarness) {
    let challenge = ctx
        .gateway()
        .register(register_input("+1 (555) 000-5001", None))
        .await
        .unwrap();

    assert!(challenge.delivery.is_sent());
    assert_eq!(ctx.notifier.sent()[0].phone_number, "+15550005001");

    let profile = ctx.gateway().profile(challenge.identity_id).await.unwrap();
    assert_eq!(profile.phone_number, "+15550005001");
    assert!(!profile.phone_verified);
    assert_eq!(profile.balance, 0);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_register_twice_fails(ctx: &TestHarness) {
    ctx.gateway().register(register_input("+15550005001", None)).await.unwrap();

    let err = ctx
        .gateway()
        .register(register_input("+1 555 000 5001", None))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::AlreadyRegistered));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_register_validation(ctx: &TestHarness) {
    let bad_phone = ctx.gateway().register(register_input("12", None)).await;
    assert!(matches!(bad_phone, Err(GatewayError::Validation(_))));

    let bad_pin = ctx
        .gateway()
        .register(register_input("+15550005002", Some("12ab")))
        .await;
    assert!(matches!(bad_pin, Err(GatewayError::Validation(_))));

    let no_name = ctx
        .gateway()
        .register(RegisterInput {
            first_name: "  ".to_string(),
            ..register_input("+15550005003", None)
        })
        .await;
    assert!(matches!(no_name, Err(GatewayError::Validation(_))));

    let bad_email = ctx
        .gateway()
        .register(RegisterInput {
            email: Some("not-an-email".to_string()),
            ..register_input("+15550005004", None)
        })
        .await;
    assert!(matches!(bad_email, Err(GatewayError::Validation(_))));

    assert!(ctx.notifier.sent().is_empty());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_login_unknown_phone(ctx: &TestHarness) {
    let err = ctx.gateway().login("+15550005999").await.unwrap_err();
    assert!(matches!(err, GatewayError::NotFound(_)));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_session_token_authenticates(ctx: &TestHarness) {
    let alice = ctx.verified_identity("+15550005001", "1234", "alice-phone").await;

    assert_eq!(ctx.gateway().authenticate(&alice.token).unwrap(), alice.identity_id);
    assert!(matches!(
        ctx.gateway().authenticate("garbage"),
        Err(GatewayError::Unauthorized)
    ));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_pin_setup_after_registration(ctx: &TestHarness) {
    let phone = "+15550005001";
    ctx.gateway().register(register_input(phone, None)).await.unwrap();
    let code = ctx.last_code(phone);
    let login = ctx.verify(phone, &code, "alice-phone").await;
    let alice = login.identity.id;
    ctx.fund(alice, 1000).await;

    let bob = ctx.verified_identity("+15550005002", "5678", "bob-phone").await;
    let send = |pin: &str| TransferInput {
        recipient_phone: bob.phone_number.clone(),
        amount: 100,
        transaction_pin: pin.to_string(),
        description: None,
        idempotency_key: None,
    };

    // No PIN yet
    let err = ctx.gateway().transfer(alice, "alice-phone", send("1234")).await.unwrap_err();
    assert!(matches!(err, GatewayError::PinNotSet));

    let profile = ctx.gateway().set_transaction_pin(alice, "1234", None).await.unwrap();
    assert!(profile.has_transaction_pin());
    assert!(profile.onboarding_complete);

    ctx.gateway().transfer(alice, "alice-phone", send("1234")).await.unwrap();
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_replacing_pin_needs_current_pin(ctx: &TestHarness) {
    let alice = ctx.verified_identity("+15550005001", "1234", "alice-phone").await;

    let no_current = ctx
        .gateway()
        .set_transaction_pin(alice.identity_id, "4321", None)
        .await;
    assert!(matches!(no_current, Err(GatewayError::Rejected)));

    let wrong_current = ctx
        .gateway()
        .set_transaction_pin(alice.identity_id, "4321", Some("0000"))
        .await;
    assert!(matches!(wrong_current, Err(GatewayError::Rejected)));

    ctx.gateway()
        .set_transaction_pin(alice.identity_id, "4321", Some("1234"))
        .await
        .unwrap();

    let bad_format = ctx
        .gateway()
        .set_transaction_pin(alice.identity_id, "1234567", Some("4321"))
        .await;
    assert!(matches!(bad_format, Err(GatewayError::Validation(_))));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_profile_update_keeps_omitted_fields(ctx: &TestHarness) {
    let me = ctx.verified_identity("+15550005301", "1234", "phone-1").await;

    let updated = ctx
        .gateway()
        .update_profile(
            me.identity_id,
            ProfileUpdate {
                first_name: Some("  Amara ".to_string()),
                last_name: Some("".to_string()),
                email: Some("amara@example.com".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.first_name, "Amara");
    assert_eq!(updated.last_name, "User");
    assert_eq!(updated.email.as_deref(), Some("amara@example.com"));

    let unchanged = ctx
        .gateway()
        .update_profile(me.identity_id, ProfileUpdate::default())
        .await
        .unwrap();
    assert_eq!(unchanged.first_name, "Amara");
    assert_eq!(unchanged.email.as_deref(), Some("amara@example.com"));
    assert_eq!(unchanged.phone_number, "+15550005301");
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_profile_update_validation(ctx: &TestHarness) {
    let me = ctx.verified_identity("+15550005302", "1234", "phone-1").await;

    let bad_email = ctx
        .gateway()
        .update_profile(
            me.identity_id,
            ProfileUpdate {
                email: Some("not-an-email".to_string()),
                ..ProfileUpdate::default()
            },
        )
        .await;
    assert!(matches!(bad_email, Err(GatewayError::Validation(_))));

    let long_name = ctx
        .gateway()
        .update_profile(
            me.identity_id,
            ProfileUpdate {
                first_name: Some("x".repeat(101)),
                ..ProfileUpdate::default()
            },
        )
        .await;
    assert!(matches!(long_name, Err(GatewayError::Validation(_))));

    let profile = ctx.gateway().profile(me.identity_id).await.unwrap();
    assert_eq!(profile.first_name, "Test");
    assert_eq!(profile.email, None);
}
