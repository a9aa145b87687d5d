//! Bot cycles end to end over mock chain backends.

use std::sync::Arc;

use alloy_primitives::B256;
use serde_json::json;
use tokio::sync::mpsc::UnboundedSender;

use warden_core::application::strategy::gas::GasPriceCalculator;
use warden_core::application::strategy::gate::DepositGate;
use warden_core::application::strategy::StrategyRegistry;
use warden_core::application::TransactionSender;
use warden_core::foundation::constants::BLOCKS_IN_ONE_DAY;
use warden_core::foundation::types::{ETHER, GWEI};
use warden_core::infrastructure::chain::mock::{
    MockChain, MockModuleVault, MockPool, MockRelay, MockRouter, MockSecurity, MockSubmitter,
    MockVault,
};
use warden_core::infrastructure::chain::{BlockHeader, ModuleVault};
use warden_core::infrastructure::config::{GasConfig, ModulesConfig, RelayConfig};
use warden_core::infrastructure::transport::bus::BusProvider;
use warden_core::infrastructure::transport::storage::MessageStore;
use warden_core::testkit::{test_prefixes, GuardianKey};
use warden_service::bots::{DepositorBot, PauserBot, UnvetterBot};
use warden_service::metrics::Metrics;

struct Stack {
    chain: Arc<MockChain>,
    submitter: Arc<MockSubmitter>,
    relay: Arc<MockRelay>,
    security: Arc<MockSecurity>,
    router: Arc<MockRouter>,
    pool: Arc<MockPool>,
    vault: Arc<MockVault>,
    sender: Arc<TransactionSender>,
    metrics: Arc<Metrics>,
    bus: UnboundedSender<serde_json::Value>,
    store: Option<MessageStore>,
    alice: GuardianKey,
    bob: GuardianKey,
}

fn stack() -> Stack {
    let alice = GuardianKey::from_seed(1);
    let bob = GuardianKey::from_seed(2);

    let chain = Arc::new(MockChain::new());
    chain.set_head(10_000, B256::repeat_byte(0xbb), 10 * GWEI);
    chain.set_pending_base_fee(5 * GWEI);
    chain.fill_fee_history(10_000, BLOCKS_IN_ONE_DAY, 10 * GWEI, 2 * GWEI);

    let submitter = Arc::new(MockSubmitter::new());
    submitter.set_estimate(1_000_000);
    let relay = Arc::new(MockRelay::new());
    let security = Arc::new(MockSecurity::new(
        vec![alice.address(), bob.address()],
        2,
        test_prefixes(),
    ));
    let router = Arc::new(MockRouter::new());
    router.set_nonce(1, 5);
    router.set_depositable_keys(1, 100);
    let pool = Arc::new(MockPool::new(320 * ETHER));
    let vault = Arc::new(MockVault::new(B256::repeat_byte(0xdd)));

    let sender = Arc::new(TransactionSender::new(
        chain.clone(),
        submitter.clone(),
        Some(relay.clone()),
        GasConfig::default(),
        &RelayConfig::default(),
        false,
    ));
    let metrics = Arc::new(Metrics::new().unwrap());

    let (bus, provider) = BusProvider::channel("test-bus");
    let store = MessageStore::new(vec![Arc::new(provider)]);

    Stack {
        chain,
        submitter,
        relay,
        security,
        router,
        pool,
        vault,
        sender,
        metrics,
        bus,
        store: Some(store),
        alice,
        bob,
    }
}

fn head(number: u64) -> BlockHeader {
    BlockHeader {
        number,
        hash: B256::repeat_byte(0xbb),
        timestamp: number * 12,
        base_fee_per_gas: 10 * GWEI,
    }
}

fn deposit_envelope(
    key: &GuardianKey,
    block_number: u64,
    module_id: u64,
    nonce: u64,
) -> serde_json::Value {
    let msg = key.signed_deposit(
        &test_prefixes(),
        block_number,
        B256::repeat_byte(0xaa),
        B256::repeat_byte(0xdd),
        module_id,
        nonce,
    );
    json!({
        "type": "deposit",
        "blockNumber": msg.block_number,
        "blockHash": format!("0x{}", hex::encode(msg.block_hash.as_slice())),
        "depositRoot": format!("0x{}", hex::encode(msg.deposit_root.as_slice())),
        "stakingModuleId": msg.staking_module_id,
        "nonce": msg.nonce,
        "guardianAddress": format!("0x{}", hex::encode(msg.guardian.as_slice())),
        "signature": {
            "r": format!("0x{}", hex::encode(msg.signature.r.as_slice())),
            "vs": format!("0x{}", hex::encode(msg.signature.vs.as_slice())),
        },
    })
}

fn pause_envelope(key: &GuardianKey, block_number: u64, module_id: Option<u64>) -> serde_json::Value {
    let msg = key.signed_pause(&test_prefixes(), block_number, B256::repeat_byte(0xaa), module_id);
    let mut value = json!({
        "type": "pause",
        "blockNumber": msg.block_number,
        "guardianAddress": format!("0x{}", hex::encode(msg.guardian.as_slice())),
        "signature": {
            "r": format!("0x{}", hex::encode(msg.signature.r.as_slice())),
            "vs": format!("0x{}", hex::encode(msg.signature.vs.as_slice())),
        },
    });
    if let Some(block_hash) = msg.block_hash {
        value["blockHash"] = json!(format!("0x{}", hex::encode(block_hash.as_slice())));
    }
    if let Some(module_id) = msg.staking_module_id {
        value["stakingModuleId"] = json!(module_id);
    }
    value
}

fn unvet_envelope(key: &GuardianKey, block_number: u64, nonce: u64) -> serde_json::Value {
    let msg = key.signed_unvet(
        &test_prefixes(),
        block_number,
        B256::repeat_byte(0xaa),
        1,
        nonce,
        vec![0u8; 8],
        vec![0u8; 16],
    );
    json!({
        "type": "unvet",
        "blockNumber": msg.block_number,
        "blockHash": format!("0x{}", hex::encode(msg.block_hash.as_slice())),
        "stakingModuleId": msg.staking_module_id,
        "nonce": msg.nonce,
        "operatorIds": format!("0x{}", hex::encode(&msg.operator_ids)),
        "vettedKeysByOperator": format!("0x{}", hex::encode(&msg.vetted_keys_by_operator)),
        "guardianAddress": format!("0x{}", hex::encode(msg.guardian.as_slice())),
        "signature": {
            "r": format!("0x{}", hex::encode(msg.signature.r.as_slice())),
            "vs": format!("0x{}", hex::encode(msg.signature.vs.as_slice())),
        },
    })
}

async fn depositor_with(
    stack: &mut Stack,
    module_vaults: Vec<Arc<dyn ModuleVault>>,
    modules: &ModulesConfig,
) -> DepositorBot {
    let gas = Arc::new(GasPriceCalculator::new(stack.chain.clone(), GasConfig::default()));
    let gate = DepositGate::new(
        stack.chain.clone(),
        stack.router.clone(),
        stack.pool.clone(),
        gas,
        StrategyRegistry::from_config(modules),
    );
    DepositorBot::new(
        stack.security.clone(),
        stack.router.clone(),
        stack.vault.clone(),
        stack.pool.clone(),
        gate,
        stack.sender.clone(),
        stack.store.take().unwrap(),
        module_vaults,
        modules,
        stack.metrics.clone(),
    )
    .await
    .unwrap()
}

async fn depositor(stack: &mut Stack) -> DepositorBot {
    depositor_with(stack, Vec::new(), &ModulesConfig::default()).await
}

#[tokio::test]
async fn depositor_submits_via_relay_when_quorum_and_gates_clear() {
    let mut s = stack();
    s.bus.send(deposit_envelope(&s.alice, 9_990, 1, 5)).unwrap();
    s.bus.send(deposit_envelope(&s.bob, 9_990, 1, 5)).unwrap();
    let bot = depositor(&mut s).await;

    assert!(bot.execute_cycle(head(10_000)).await.unwrap());
    assert_eq!(s.relay.bundles().len(), 1);
    assert!(s.submitter.submissions().is_empty());
    assert_eq!(s.metrics.snapshot().deposits_submitted, 1);
}

#[tokio::test]
async fn depositor_idles_without_quorum() {
    let mut s = stack();
    s.bus.send(deposit_envelope(&s.alice, 9_990, 1, 5)).unwrap();
    let bot = depositor(&mut s).await;

    assert!(!bot.execute_cycle(head(10_000)).await.unwrap());
    assert!(s.relay.bundles().is_empty());
    assert!(s.submitter.submissions().is_empty());
}

#[tokio::test]
async fn depositor_respects_gas_ceiling() {
    let mut s = stack();
    s.bus.send(deposit_envelope(&s.alice, 9_990, 1, 5)).unwrap();
    s.bus.send(deposit_envelope(&s.bob, 9_990, 1, 5)).unwrap();
    // Pending base fee above the adaptive percentile ceiling.
    s.chain.set_pending_base_fee(20 * GWEI);
    let bot = depositor(&mut s).await;

    assert!(!bot.execute_cycle(head(10_000)).await.unwrap());
    assert!(s.relay.bundles().is_empty());
}

#[tokio::test]
async fn depositor_skips_paused_module_but_quorum_survives() {
    let mut s = stack();
    s.bus.send(deposit_envelope(&s.alice, 9_990, 1, 5)).unwrap();
    s.bus.send(deposit_envelope(&s.bob, 9_990, 1, 5)).unwrap();
    s.security.set_deposit_blocked(1, true);
    let bot = depositor(&mut s).await;

    assert!(!bot.execute_cycle(head(10_000)).await.unwrap());

    // Unblocking lets the held messages deposit on a later cycle.
    s.security.set_deposit_blocked(1, false);
    assert!(bot.execute_cycle(head(10_001)).await.unwrap());
    assert_eq!(s.relay.bundles().len(), 1);
}

#[tokio::test]
async fn pauser_pauses_module_once() {
    let mut s = stack();
    s.bus.send(pause_envelope(&s.alice, 9_995, Some(1))).unwrap();
    let bot = PauserBot::new(
        s.security.clone(),
        s.sender.clone(),
        s.store.take().unwrap(),
        s.metrics.clone(),
    )
    .await
    .unwrap();

    assert!(bot.execute_cycle(head(10_000)).await.unwrap());
    // Pauses go through the public mempool, not the relay.
    assert_eq!(s.submitter.submissions().len(), 1);
    assert!(s.relay.bundles().is_empty());
    assert_eq!(s.metrics.snapshot().pauses_submitted, 1);

    // Once the module reads as paused the backlog stops producing txs.
    s.security.set_module_paused(1, true);
    assert!(bot.execute_cycle(head(10_001)).await.unwrap());
    assert_eq!(s.submitter.submissions().len(), 1);
}

#[tokio::test]
async fn pauser_accepts_message_without_block_hash() {
    let mut s = stack();
    let mut envelope = pause_envelope(&s.alice, 9_995, Some(1));
    envelope.as_object_mut().unwrap().remove("blockHash");
    s.bus.send(envelope).unwrap();
    let bot = PauserBot::new(
        s.security.clone(),
        s.sender.clone(),
        s.store.take().unwrap(),
        s.metrics.clone(),
    )
    .await
    .unwrap();

    assert!(bot.execute_cycle(head(10_000)).await.unwrap());
    assert_eq!(s.submitter.submissions().len(), 1);
}

#[tokio::test]
async fn pauser_handles_protocol_wide_scope() {
    let mut s = stack();
    s.bus.send(pause_envelope(&s.alice, 9_995, None)).unwrap();
    let bot = PauserBot::new(
        s.security.clone(),
        s.sender.clone(),
        s.store.take().unwrap(),
        s.metrics.clone(),
    )
    .await
    .unwrap();

    s.security.set_protocol_paused(true);
    assert!(bot.execute_cycle(head(10_000)).await.unwrap());
    assert!(s.submitter.submissions().is_empty());

    s.security.set_protocol_paused(false);
    assert!(bot.execute_cycle(head(10_001)).await.unwrap());
    assert_eq!(s.submitter.submissions().len(), 1);
}

#[tokio::test]
async fn unvetter_requires_exact_nonce() {
    let mut s = stack();
    s.bus.send(unvet_envelope(&s.alice, 9_995, 4)).unwrap();
    s.bus.send(unvet_envelope(&s.bob, 9_995, 5)).unwrap();
    let bot = UnvetterBot::new(
        s.security.clone(),
        s.router.clone(),
        s.sender.clone(),
        s.store.take().unwrap(),
        s.metrics.clone(),
    )
    .await
    .unwrap();

    assert!(bot.execute_cycle(head(10_000)).await.unwrap());
    // Only the nonce-5 message matches the module nonce.
    assert_eq!(s.submitter.submissions().len(), 1);
    assert_eq!(s.metrics.snapshot().unvets_submitted, 1);
}

#[tokio::test]
async fn rotated_out_guardian_is_ignored_everywhere() {
    let mut s = stack();
    let mallory = GuardianKey::from_seed(66);
    s.bus.send(deposit_envelope(&mallory, 9_990, 1, 5)).unwrap();
    s.bus.send(deposit_envelope(&s.alice, 9_990, 1, 5)).unwrap();
    let bot = depositor(&mut s).await;

    // Mallory signs validly but is not in the guardian set, so the quorum
    // of two is never reached.
    assert!(!bot.execute_cycle(head(10_000)).await.unwrap());
    assert!(s.relay.bundles().is_empty());
}

fn ping_envelope(key: &GuardianKey, block_number: u64) -> serde_json::Value {
    json!({
        "type": "ping",
        "blockNumber": block_number,
        "guardianAddress": format!("0x{}", hex::encode(key.address().as_slice())),
    })
}

#[tokio::test]
async fn ping_from_unknown_address_does_not_count_as_live() {
    let mut s = stack();
    let mallory = GuardianKey::from_seed(66);
    s.bus.send(ping_envelope(&s.alice, 9_995)).unwrap();
    s.bus.send(ping_envelope(&mallory, 9_995)).unwrap();
    let bot = depositor(&mut s).await;

    assert!(!bot.execute_cycle(head(10_000)).await.unwrap());
    // Pings are unsigned, so only guardian-set membership gates the gauge.
    let text = s.metrics.encode().unwrap();
    assert!(text.contains("live_guardians 1"));
}

#[tokio::test]
async fn underallocated_module_deposits_first() {
    let mut s = stack();
    s.router.set_nonce(2, 5);
    s.router.set_depositable_keys(2, 100);
    s.router.set_validator_gap(1, 50);
    s.router.set_validator_gap(2, 10);
    s.bus.send(deposit_envelope(&s.alice, 9_990, 1, 5)).unwrap();
    s.bus.send(deposit_envelope(&s.bob, 9_990, 1, 5)).unwrap();
    s.bus.send(deposit_envelope(&s.alice, 9_990, 2, 5)).unwrap();
    s.bus.send(deposit_envelope(&s.bob, 9_990, 2, 5)).unwrap();
    let modules = ModulesConfig { whitelist: vec![1, 2], ..Default::default() };
    let bot = depositor_with(&mut s, Vec::new(), &modules).await;

    assert!(bot.execute_cycle(head(10_000)).await.unwrap());
    let bundles = s.relay.bundles();
    assert_eq!(bundles.len(), 2);
    // Module id sits after the "deposit" tag, block number, hash and root
    // in the mock calldata. Module 2 has the smaller validator gap.
    assert_eq!(bundles[0].0.calldata[79..87], 2u64.to_be_bytes());
    assert_eq!(bundles[1].0.calldata[79..87], 1u64.to_be_bytes());
}

#[tokio::test]
async fn failed_module_sits_out_cooldown() {
    let mut s = stack();
    s.bus.send(deposit_envelope(&s.alice, 9_990, 1, 5)).unwrap();
    s.bus.send(deposit_envelope(&s.bob, 9_990, 1, 5)).unwrap();
    let bot = depositor(&mut s).await;

    s.relay.set_failing(true);
    s.submitter.set_fail_submit(true);
    assert!(!bot.execute_cycle(head(10_000)).await.unwrap());
    assert!(s.submitter.submissions().is_empty());

    // Both paths recover, but the module is still cooling down and the
    // retained quorum must not be retried yet.
    s.relay.set_failing(false);
    s.submitter.set_fail_submit(false);
    assert!(!bot.execute_cycle(head(10_001)).await.unwrap());
    assert!(s.relay.bundles().is_empty());
    assert!(s.submitter.submissions().is_empty());
}

#[tokio::test]
async fn vault_backed_module_deposits_directly() {
    let mut s = stack();
    s.bus.send(deposit_envelope(&s.alice, 9_990, 1, 5)).unwrap();
    s.bus.send(deposit_envelope(&s.bob, 9_990, 1, 5)).unwrap();
    let vault: Arc<dyn ModuleVault> = Arc::new(MockModuleVault::new(1, 100 * ETHER));
    let bot = depositor_with(&mut s, vec![vault], &ModulesConfig::default()).await;

    assert!(bot.execute_cycle(head(10_000)).await.unwrap());
    let bundles = s.relay.bundles();
    assert_eq!(bundles.len(), 1);
    assert!(bundles[0].0.calldata.starts_with(b"direct"));
    assert_eq!(s.metrics.snapshot().deposits_submitted, 1);
}

#[tokio::test]
async fn reverting_direct_path_falls_back_to_standard() {
    let mut s = stack();
    s.bus.send(deposit_envelope(&s.alice, 9_990, 1, 5)).unwrap();
    s.bus.send(deposit_envelope(&s.bob, 9_990, 1, 5)).unwrap();
    s.submitter.set_reverting_calldata(b"direct".to_vec());
    let vault: Arc<dyn ModuleVault> = Arc::new(MockModuleVault::new(1, 100 * ETHER));
    let bot = depositor_with(&mut s, vec![vault], &ModulesConfig::default()).await;

    assert!(bot.execute_cycle(head(10_000)).await.unwrap());
    let bundles = s.relay.bundles();
    assert_eq!(bundles.len(), 1);
    assert!(bundles[0].0.calldata.starts_with(b"deposit"));
}

#[tokio::test]
async fn underfunded_vault_skips_direct_path() {
    let mut s = stack();
    s.bus.send(deposit_envelope(&s.alice, 9_990, 1, 5)).unwrap();
    s.bus.send(deposit_envelope(&s.bob, 9_990, 1, 5)).unwrap();
    // One ether is below the 32-ether direct-deposit threshold.
    let vault: Arc<dyn ModuleVault> = Arc::new(MockModuleVault::new(1, ETHER));
    let bot = depositor_with(&mut s, vec![vault], &ModulesConfig::default()).await;

    assert!(bot.execute_cycle(head(10_000)).await.unwrap());
    let bundles = s.relay.bundles();
    assert_eq!(bundles.len(), 1);
    assert!(bundles[0].0.calldata.starts_with(b"deposit"));
}

#[tokio::test]
async fn withdrawal_backlog_blocks_direct_path() {
    let mut s = stack();
    s.bus.send(deposit_envelope(&s.alice, 9_990, 1, 5)).unwrap();
    s.bus.send(deposit_envelope(&s.bob, 9_990, 1, 5)).unwrap();
    s.pool.set_unfinalized_withdrawals(1_000 * ETHER);
    let vault: Arc<dyn ModuleVault> = Arc::new(MockModuleVault::new(1, 100 * ETHER));
    let bot = depositor_with(&mut s, vec![vault], &ModulesConfig::default()).await;

    assert!(bot.execute_cycle(head(10_000)).await.unwrap());
    let bundles = s.relay.bundles();
    assert_eq!(bundles.len(), 1);
    assert!(bundles[0].0.calldata.starts_with(b"deposit"));
}
