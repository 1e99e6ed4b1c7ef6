//! Contract Test: End-to-End Rotation
//!
//! Constraints verified:
//! - The old address is released and can no longer be associated
//! - The new address is bound to the exact private slot the old one held
//! - No other association on the interface is altered
//! - Provider calls happen in order: allocate, describe, disassociate,
//!   associate, release

mod common;

use common::*;
use eip_core::traits::{AddressProvider, AssociateRequest, Operation};
use eip_core::{Error, RotationEvent};

#[tokio::test]
async fn rotation_replaces_selected_slot_only() {
    let provider = scenario_provider().await;

    // eni-1, then the first associated slot (10.0.0.5)
    let (rotator, mut events) = rotator(&provider, ScriptedSelector::new(&[0, 0]), &["eni-1", "eni-2"]);

    let report = rotator.rotate().await.expect("rotation succeeds");

    assert_eq!(report.interface_id.as_str(), "eni-1");
    assert_eq!(report.private_ip, ip("10.0.0.5"));
    assert_eq!(report.old_public_ip, ip("1.2.3.4"));
    assert_eq!(report.new_public_ip, ip("9.9.9.9"));
    assert_eq!(report.old_allocation_id, "eipalloc-1");
    assert_eq!(report.new_allocation_id, "eipalloc-9");

    // New address on the vacated slot
    assert_eq!(
        provider.public_ip_at(&"eni-1".into(), ip("10.0.0.5")).await,
        Some(ip("9.9.9.9"))
    );
    // Neighbouring slot and other interface untouched
    assert_eq!(
        provider.public_ip_at(&"eni-1".into(), ip("10.0.0.6")).await,
        Some(ip("1.2.3.5"))
    );
    assert_eq!(
        provider.public_ip_at(&"eni-2".into(), ip("10.0.1.5")).await,
        Some(ip("5.6.7.8"))
    );
    let slots = provider.describe_interface(&"eni-1".into()).await.unwrap();
    assert_eq!(
        slots[1].association.as_ref().map(|a| a.association_id.as_str()),
        Some("a-2")
    );

    // Old address released
    assert!(!provider.is_allocated("eipalloc-1").await);
    assert!(provider.is_allocated("eipalloc-9").await);

    assert_eq!(
        provider.calls().await[..5],
        [
            Operation::AllocateAddress,
            Operation::DescribeInterface,
            Operation::DisassociateAddress,
            Operation::AssociateAddress,
            Operation::ReleaseAddress,
        ]
    );

    let events = drain(&mut events);
    assert_eq!(events.first(), Some(&RotationEvent::Started { pool_size: 2 }));
    assert_eq!(
        events.last(),
        Some(&RotationEvent::Completed {
            interface_id: "eni-1".into(),
            old_public_ip: ip("1.2.3.4"),
            new_public_ip: ip("9.9.9.9"),
        })
    );
}

#[tokio::test]
async fn released_address_cannot_be_associated_again() {
    let provider = scenario_provider().await;
    let (rotator, _events) = rotator(&provider, ScriptedSelector::new(&[0, 0]), &["eni-1", "eni-2"]);

    rotator.rotate().await.expect("rotation succeeds");

    let err = provider
        .associate_address(&AssociateRequest {
            allocation_id: "eipalloc-1".to_string(),
            interface_id: "eni-1".into(),
            private_ip: ip("10.0.0.5"),
            allow_reassociation: true,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn rotation_picks_second_slot_when_selected() {
    let provider = scenario_provider().await;
    let (rotator, _events) = rotator(&provider, ScriptedSelector::new(&[0, 1]), &["eni-1", "eni-2"]);

    let report = rotator.rotate().await.expect("rotation succeeds");

    assert_eq!(report.private_ip, ip("10.0.0.6"));
    assert_eq!(report.old_public_ip, ip("1.2.3.5"));
    assert_eq!(
        provider.public_ip_at(&"eni-1".into(), ip("10.0.0.6")).await,
        Some(ip("9.9.9.9"))
    );
    assert_eq!(
        provider.public_ip_at(&"eni-1".into(), ip("10.0.0.5")).await,
        Some(ip("1.2.3.4"))
    );
    assert!(!provider.is_allocated("eipalloc-2").await);
}

#[tokio::test]
async fn unassociated_slots_are_never_selected() {
    let provider = eip_core::MemoryAddressProvider::new();
    provider
        .add_interface("eni-1", &[ip("10.0.0.4"), ip("10.0.0.5"), ip("10.0.0.6")])
        .await;
    provider
        .bind_existing("eni-1", ip("10.0.0.6"), "eipalloc-1", ip("1.2.3.4"))
        .await
        .unwrap();

    let selector = ScriptedSelector::new(&[0, 0]);
    let (rotator, _events) = rotator(&provider, selector, &["eni-1"]);

    let report = rotator.rotate().await.expect("rotation succeeds");

    // Index 0 of the associated entries is the only bound slot
    assert_eq!(report.private_ip, ip("10.0.0.6"));
    assert_eq!(provider.public_ip_at(&"eni-1".into(), ip("10.0.0.4")).await, None);
    assert_eq!(provider.public_ip_at(&"eni-1".into(), ip("10.0.0.5")).await, None);
}

#[tokio::test]
async fn repeated_rotations_keep_allocation_count_stable() {
    let provider = scenario_provider().await;
    let (rotator, _events) = rotator(
        &provider,
        eip_core::RandomSelector::seeded(99),
        &["eni-1", "eni-2"],
    );

    let before = provider.allocation_count().await;
    for _ in 0..10 {
        rotator.rotate().await.expect("rotation succeeds");
    }

    assert_eq!(provider.allocation_count().await, before);
    for (interface, private_ip) in [("eni-1", "10.0.0.5"), ("eni-1", "10.0.0.6"), ("eni-2", "10.0.1.5")] {
        assert!(
            provider
                .public_ip_at(&interface.into(), ip(private_ip))
                .await
                .is_some(),
            "{} on {} lost its public address",
            private_ip,
            interface
        );
    }
}
