//! Integration tests for device binding and step-up device change.

mod common;

use chrono::Duration;
use common::{device, register_input, TestHarness};
use payfusion_core::domains::devices::ChangeProof;
use payfusion_core::domains::gateway::{GatewayError, TransferInput};
use test_context::test_context;

fn proof(account: &str, pin: &str) -> ChangeProof {
    ChangeProof {
        account: account.to_string(),
        transaction_pin: pin.to_string(),
    }
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_first_login_trusts_device(ctx: &TestHarness) {
    let alice = ctx.verified_identity("+15550003001", "1234", "alice-phone").await;

    let devices = ctx.gateway().list_devices(alice.identity_id).await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].device_identifier, "alice-phone");
    assert!(devices[0].trusted);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_repeat_login_recognizes_device(ctx: &TestHarness) {
    let alice = ctx.verified_identity("+15550003001", "1234", "alice-phone").await;

    ctx.gateway().login(&alice.phone_number).await.unwrap();
    let code = ctx.last_code(&alice.phone_number);
    let login = ctx.verify(&alice.phone_number, &code, "alice-phone").await;

    assert!(login.device.trusted);
    assert!(!login.device.newly_registered);
    assert_eq!(ctx.gateway().list_devices(alice.identity_id).await.unwrap().len(), 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_device_bound_to_one_identity(ctx: &TestHarness) {
    let alice = ctx.verified_identity("+15550003001", "1234", "shared-phone").await;
    let bob_phone = "+15550003002";
    ctx.gateway().register(register_input(bob_phone, Some("5678"))).await.unwrap();
    let code = ctx.last_code(bob_phone);

    // Login still succeeds, but the device is not Bob's
    let login = ctx.verify(bob_phone, &code, "shared-phone").await;
    assert!(!login.device.trusted);

    let err = ctx
        .gateway()
        .request_device_change(login.identity.id, device("shared-phone"), proof(bob_phone, "5678"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::DeviceConflict));

    let alice_devices = ctx.gateway().list_devices(alice.identity_id).await.unwrap();
    assert_eq!(alice_devices.len(), 1);
    assert!(ctx.gateway().list_devices(login.identity.id).await.unwrap().is_empty());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_device_change_wrong_pin_rejected(ctx: &TestHarness) {
    let alice = ctx.verified_identity("+15550003001", "1234", "alice-phone").await;

    let err = ctx
        .gateway()
        .request_device_change(alice.identity_id, device("alice-tablet"), proof(&alice.phone_number, "9999"))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Rejected));
    assert_eq!(ctx.gateway().list_devices(alice.identity_id).await.unwrap().len(), 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_device_change_wrong_account_rejected(ctx: &TestHarness) {
    let alice = ctx.verified_identity("+15550003001", "1234", "alice-phone").await;

    let err = ctx
        .gateway()
        .request_device_change(alice.identity_id, device("alice-tablet"), proof("+15550009999", "1234"))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Rejected));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_device_change_trusts_and_lists_first(ctx: &TestHarness) {
    let alice = ctx.verified_identity("+15550003001", "1234", "alice-phone").await;
    ctx.clock.advance(Duration::minutes(5));

    let trusted = ctx
        .gateway()
        .request_device_change(alice.identity_id, device("alice-tablet"), proof(&alice.phone_number, "1234"))
        .await
        .unwrap();
    assert!(trusted.trusted);

    let devices = ctx.gateway().list_devices(alice.identity_id).await.unwrap();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].device_identifier, "alice-tablet");
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_device_change_accepts_identity_id(ctx: &TestHarness) {
    let alice = ctx.verified_identity("+15550003001", "1234", "alice-phone").await;

    let result = ctx
        .gateway()
        .request_device_change(
            alice.identity_id,
            device("alice-laptop"),
            proof(&alice.identity_id.to_string(), "1234"),
        )
        .await;

    assert!(result.is_ok());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_untrusted_device_cannot_move_money(ctx: &TestHarness) {
    let alice = ctx.verified_identity("+15550003001", "1234", "alice-phone").await;
    let bob = ctx.verified_identity("+15550003002", "5678", "bob-phone").await;
    ctx.fund(alice.identity_id, 5000).await;

    let err = ctx
        .gateway()
        .transfer(
            alice.identity_id,
            "unknown-device",
            TransferInput {
                recipient_phone: bob.phone_number.clone(),
                amount: 1000,
                transaction_pin: "1234".to_string(),
                description: None,
                idempotency_key: None,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::DeviceNotTrusted));
    assert_eq!(ctx.balance(alice.identity_id).await, 5000);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_remove_device(ctx: &TestHarness) {
    let alice = ctx.verified_identity("+15550003001", "1234", "alice-phone").await;
    let bob = ctx.verified_identity("+15550003002", "5678", "bob-phone").await;

    // Bob cannot remove Alice's device
    let err = ctx
        .gateway()
        .remove_device(bob.identity_id, "alice-phone")
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::NotFound(_)));

    ctx.gateway().remove_device(alice.identity_id, "alice-phone").await.unwrap();
    assert!(ctx.gateway().list_devices(alice.identity_id).await.unwrap().is_empty());
}
