//! Test doubles and common fixtures for rotation contract tests
//!
//! Fixtures are built on `MemoryAddressProvider`, which follows VPC address
//! rules, plus a scripted selector so tests decide which interface and slot
//! a rotation picks.

#![allow(dead_code)]

use eip_core::config::{ProviderConfig, RotatorConfig};
use eip_core::pool::InterfacePool;
use eip_core::provider::MemoryAddressProvider;
use eip_core::traits::Selector;
use eip_core::{RotationEvent, Rotator};
use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// A selector that returns pre-scripted indices, in order
pub struct ScriptedSelector {
    script: Mutex<VecDeque<usize>>,
    /// Every `len` it was asked to choose from
    asked: Mutex<Vec<usize>>,
}

impl ScriptedSelector {
    pub fn new(script: &[usize]) -> Self {
        Self {
            script: Mutex::new(script.iter().copied().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }
}

impl Selector for ScriptedSelector {
    fn choose_index(&self, len: usize) -> usize {
        self.asked.lock().unwrap().push(len);
        let index = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .expect("selector script exhausted");
        assert!(index < len, "scripted index {} out of range 0..{}", index, len);
        index
    }
}

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

/// Rotator configuration for a memory-backed pool
pub fn memory_config(interfaces: &[&str]) -> RotatorConfig {
    RotatorConfig::new(
        InterfacePool::new(interfaces.iter().copied()),
        ProviderConfig::Custom {
            factory: "memory".to_string(),
            config: serde_json::json!({}),
        },
    )
}

/// The reference scenario account:
///
/// - `eni-1`: `10.0.0.5` bound to `1.2.3.4` (assoc `a-1`), `10.0.0.6` bound to `1.2.3.5` (assoc `a-2`)
/// - `eni-2`: `10.0.1.5` bound to `5.6.7.8` (assoc `a-3`)
/// - next allocation: `eipalloc-9` / `9.9.9.9`
pub async fn scenario_provider() -> MemoryAddressProvider {
    let provider = MemoryAddressProvider::new();

    provider
        .add_interface("eni-1", &[ip("10.0.0.5"), ip("10.0.0.6")])
        .await;
    provider.add_interface("eni-2", &[ip("10.0.1.5")]).await;

    provider
        .bind_existing_with_id("eni-1", ip("10.0.0.5"), "eipalloc-1", ip("1.2.3.4"), "a-1")
        .await
        .unwrap();
    provider
        .bind_existing_with_id("eni-1", ip("10.0.0.6"), "eipalloc-2", ip("1.2.3.5"), "a-2")
        .await
        .unwrap();
    provider
        .bind_existing_with_id("eni-2", ip("10.0.1.5"), "eipalloc-3", ip("5.6.7.8"), "a-3")
        .await
        .unwrap();

    provider.queue_allocation("eipalloc-9", ip("9.9.9.9")).await;

    provider
}

/// Build a rotator over a shared handle to `provider`
pub fn rotator(
    provider: &MemoryAddressProvider,
    selector: impl Selector + 'static,
    interfaces: &[&str],
) -> (Rotator, mpsc::Receiver<RotationEvent>) {
    Rotator::new(
        Box::new(provider.clone()),
        Box::new(selector),
        memory_config(interfaces),
    )
    .expect("rotator construction succeeds")
}

/// Drain every event currently buffered
pub fn drain(events: &mut mpsc::Receiver<RotationEvent>) -> Vec<RotationEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}
