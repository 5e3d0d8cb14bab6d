// crates/aludel-engine/tests/scenarios.rs
//
// End-to-end staking scenarios run against a full `Chain`.

use aludel_core::{
    Address, AludelError, Event, Keypair, TokenError, VaultCapability, VaultError, U256,
};
use aludel_engine::{
    rage_quit_cost, AludelData, Chain, ClaimReceipt, LaunchParams, PowerState, RewardScaling,
    TimelockHook, VaultData, BASE_SHARES_PER_WEI, DAY, MAX_BONUS_TOKENS, MAX_STAKES_PER_VAULT,
    RAGEQUIT_GAS, VAULT_RAGEQUIT_OVERHEAD,
};

const START: u64 = 1_700_000_000;

fn ether(n: u64) -> U256 {
    U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
}

fn gwei(n: u64) -> U256 {
    U256::from(n) * U256::from(1_000_000_000u64)
}

fn net_of_fee(amount: U256) -> U256 {
    amount * U256::from(9_900u64) / U256::from(10_000u64)
}

struct Harness {
    chain: Chain,
    admin: Address,
    fee_recipient: Address,
    user: Keypair,
    program: Address,
    staking: Address,
    reward: Address,
    factory: Address,
    vault: Address,
}

impl Harness {
    fn new(scaling: RewardScaling) -> Self {
        Self::with_params(scaling, |p| p)
    }

    fn with_params(scaling: RewardScaling, f: impl FnOnce(LaunchParams) -> LaunchParams) -> Self {
        let mut chain = Chain::new(1, START);
        let admin = Address::repeat_byte(0xad);
        let fee_recipient = Address::repeat_byte(0xfe);
        let staking = chain.create_token("STK", 18);
        let reward = chain.create_token("RWD", 9);
        let factory = chain.create_vault_factory();

        let params = LaunchParams::new(staking, reward, scaling)
            .with_name("test program", "https://example.org")
            .with_fee(fee_recipient, 100)
            .with_vault_factory(factory);
        let program = chain.launch(admin, f(params)).unwrap();

        chain.mint(reward, admin, gwei(1_000_000)).unwrap();
        chain.approve(reward, admin, program, U256::MAX);

        let user = Keypair::from_seed(b"user");
        let vault = chain.create_vault(factory, &user).unwrap();
        chain.mint(staking, vault, ether(1_000)).unwrap();

        Self {
            chain,
            admin,
            fee_recipient,
            user,
            program,
            staking,
            reward,
            factory,
            vault,
        }
    }

    fn fund(&mut self, amount: U256, duration: u64) {
        self.chain
            .fund(self.program, self.admin, amount, duration)
            .unwrap();
    }

    fn new_vault(&mut self, owner: &Keypair) -> Address {
        let vault = self.chain.create_vault(self.factory, owner).unwrap();
        self.chain.mint(self.staking, vault, ether(1_000)).unwrap();
        vault
    }

    fn stake(&mut self, owner: &Keypair, vault: Address, amount: U256) -> Result<(), AludelError> {
        let permission = self
            .chain
            .lock_permission(owner, self.program, vault, amount)?;
        self.chain
            .stake(self.program, owner.address(), vault, amount, &permission)
    }

    fn unstake(
        &mut self,
        owner: &Keypair,
        vault: Address,
        indices: &[usize],
        amounts: &[U256],
    ) -> Result<ClaimReceipt, AludelError> {
        let total = amounts.iter().fold(U256::ZERO, |acc, a| acc + *a);
        let permission = self
            .chain
            .unlock_permission(owner, self.program, vault, total)?;
        self.chain
            .unstake_and_claim(self.program, owner.address(), vault, indices, amounts, &permission)
    }

    fn rage_quit(&mut self, owner: &Keypair, vault: Address, gas_limit: u64) -> Result<bool, AludelError> {
        self.chain
            .rage_quit(owner.address(), vault, self.program, self.staking, gas_limit)
    }

    fn data(&self) -> AludelData {
        self.chain.program(self.program).unwrap().get_aludel_data().unwrap()
    }

    fn vault_data(&self, vault: Address) -> VaultData {
        self.chain
            .program(self.program)
            .unwrap()
            .get_vault_data(vault)
            .unwrap()
    }

    fn program_events(&self, from: usize) -> Vec<Event> {
        self.chain
            .events_since(from)
            .iter()
            .filter(|e| e.emitter == self.program)
            .map(|e| e.event.clone())
            .collect()
    }
}

fn default_scaling() -> RewardScaling {
    RewardScaling::new(33, 100, 60 * DAY).unwrap()
}

// ---------------------------------------------------------------------------
// Reward scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_full_duration_stake_earns_base_reward() {
    let mut h = Harness::new(default_scaling());
    let user = h.user.clone();
    let vault = h.vault;
    h.fund(gwei(1_000), 60 * DAY);
    h.stake(&user, vault, ether(100)).unwrap();
    h.chain.advance(60 * DAY);

    let receipt = h.unstake(&user, vault, &[0], &[ether(100)]).unwrap();

    let reward_amount = net_of_fee(gwei(1_000));
    assert_eq!(receipt.reward, reward_amount);
    assert_eq!(h.chain.balance_of(h.reward, vault), reward_amount);
    assert_eq!(h.data().reward_shares_outstanding, U256::ZERO);
    assert_eq!(h.data().total_stake, U256::ZERO);
    assert_eq!(h.data().total_stake_units, U256::ZERO);
}

#[test]
fn test_half_duration_stake_is_scaled() {
    let mut h = Harness::new(default_scaling());
    let user = h.user.clone();
    let vault = h.vault;
    h.fund(gwei(1_000), 60 * DAY);
    h.stake(&user, vault, ether(100)).unwrap();
    h.chain.advance(30 * DAY);

    let receipt = h.unstake(&user, vault, &[0], &[ether(100)]).unwrap();

    // half the schedule has vested and the staker owns every stake unit
    let base = net_of_fee(gwei(1_000)) / U256::from(2u64);
    let expected = base * U256::from(33u64) / U256::from(100u64)
        + base * U256::from(67u64) * U256::from(30 * DAY) / U256::from(60 * DAY * 100);
    assert_eq!(receipt.reward, expected);
    assert_eq!(receipt.reward, U256::from(329_175_000_000u64));
    assert_eq!(
        h.data().reward_shares_outstanding,
        (net_of_fee(gwei(1_000)) - expected) * U256::from(BASE_SHARES_PER_WEI)
    );
}

#[test]
fn test_sequential_stakes_unstake_first_record() {
    let mut h = Harness::new(RewardScaling::new(100, 100, 60 * DAY).unwrap());
    let user = h.user.clone();
    let vault = h.vault;
    let amount = ether(10);
    h.fund(gwei(1_000), 60 * DAY);

    h.stake(&user, vault, amount).unwrap();
    h.chain.advance(30 * DAY);
    h.stake(&user, vault, amount).unwrap();
    h.chain.advance(30 * DAY);
    h.stake(&user, vault, amount).unwrap();

    let receipt = h.unstake(&user, vault, &[0], &[amount]).unwrap();

    // 60 days of units out of 60 + 30 + 0
    let expected = net_of_fee(gwei(1_000)) * U256::from(60u64) / U256::from(90u64);
    assert_eq!(receipt.reward, expected);
    assert_eq!(receipt.stake_units_burned, amount * U256::from(60 * DAY));

    let data = h.vault_data(vault);
    assert_eq!(data.stakes.len(), 2);
    assert_eq!(data.stakes[0].timestamp, START + 30 * DAY);
    assert_eq!(data.stakes[1].timestamp, START + 60 * DAY);
    assert!(data.stakes.iter().all(|r| r.amount == amount));
    assert_eq!(h.data().total_stake_units, amount * U256::from(30 * DAY));
}

#[test]
fn test_scaling_boundary_pays_base() {
    let mut h = Harness::new(default_scaling());
    let user = h.user.clone();
    let vault = h.vault;
    h.fund(gwei(600), 10 * DAY);
    h.chain.advance(10 * DAY);
    h.stake(&user, vault, ether(1)).unwrap();
    h.chain.advance(60 * DAY);

    let preview = h
        .chain
        .program(h.program)
        .unwrap()
        .preview_unstake(vault, &[0], &[ether(1)], h.chain.now())
        .unwrap();
    let receipt = h.unstake(&user, vault, &[0], &[ether(1)]).unwrap();
    assert_eq!(receipt.reward, net_of_fee(gwei(600)));
    assert_eq!(preview.reward, receipt.reward);
}

#[test]
fn test_flash_stake_earns_nothing() {
    let mut h = Harness::new(default_scaling());
    let user = h.user.clone();
    let vault = h.vault;
    h.fund(gwei(1_000), DAY);
    h.chain.advance(DAY);
    let shares = h.data().reward_shares_outstanding;

    h.stake(&user, vault, ether(100)).unwrap();
    let receipt = h.unstake(&user, vault, &[0], &[ether(100)]).unwrap();

    assert_eq!(receipt.reward, U256::ZERO);
    assert_eq!(receipt.shares_burned, U256::ZERO);
    assert_eq!(h.data().reward_shares_outstanding, shares);
    assert_eq!(h.chain.balance_of(h.reward, vault), U256::ZERO);
}

fn units_at(h: &Harness, timestamp: u64) -> U256 {
    h.chain
        .program(h.program)
        .unwrap()
        .get_future_total_stake_units(timestamp)
        .unwrap()
}

#[test]
fn test_queries_and_zero_effect_calls_leave_accounting_unchanged() {
    let mut h = Harness::new(default_scaling());
    let user = h.user.clone();
    let vault = h.vault;
    let bonus = h.chain.create_token("BNS", 18);
    h.chain.register_bonus_token(h.program, h.admin, bonus).unwrap();
    h.fund(gwei(1_000), 60 * DAY);
    h.stake(&user, vault, ether(100)).unwrap();
    h.chain.advance(10 * DAY);

    let before = h.data();
    let now = h.chain.now();
    {
        let program = h.chain.program(h.program).unwrap();
        assert!(program.get_current_unlocked_rewards(now).unwrap() > U256::ZERO);
        assert!(program.get_future_total_stake_units(now + DAY).unwrap() > U256::ZERO);
        let preview = program.preview_unstake(vault, &[0], &[ether(50)], now).unwrap();
        assert!(preview.reward > U256::ZERO);
        assert!(program.get_current_vault_reward(vault, now).unwrap() >= preview.reward);
        let bonus_preview = program
            .preview_bonus(h.chain.ledger(), U256::from(1u64), now)
            .unwrap();
        assert_eq!(bonus_preview, vec![(bonus, U256::ZERO)]);
    }
    assert_eq!(h.data(), before);

    // registry changes at a later timestamp
    h.chain.advance(DAY);
    let later = h.chain.now();
    let units_later = units_at(&h, later);
    let extra = h.chain.create_vault_factory();
    h.chain.register_vault_factory(h.program, h.admin, extra).unwrap();
    h.chain.remove_vault_factory(h.program, h.admin, extra).unwrap();

    let after = h.data();
    assert_eq!(after.reward_shares_outstanding, before.reward_shares_outstanding);
    assert_eq!(after.total_stake, before.total_stake);
    assert_eq!(after.reward_schedules, before.reward_schedules);
    assert_eq!(units_at(&h, later), units_later);

    // a flash stake accrues but has no net effect
    let other = Keypair::from_seed(b"flash");
    let flash_vault = h.new_vault(&other);
    h.stake(&other, flash_vault, ether(10)).unwrap();
    let receipt = h.unstake(&other, flash_vault, &[0], &[ether(10)]).unwrap();
    assert_eq!(receipt.reward, U256::ZERO);

    let after = h.data();
    assert_eq!(after.last_update, later);
    assert_eq!(after.reward_shares_outstanding, before.reward_shares_outstanding);
    assert_eq!(after.total_stake, before.total_stake);
    assert_eq!(units_at(&h, later), units_later);
    assert_eq!(units_at(&h, later + DAY), units_later + before.total_stake * U256::from(DAY));
}

#[test]
fn test_multi_record_partial_unstake() {
    let mut h = Harness::new(RewardScaling::new(100, 100, DAY).unwrap());
    let user = h.user.clone();
    let vault = h.vault;
    h.fund(gwei(1_000), DAY);
    for _ in 0..3 {
        h.stake(&user, vault, ether(10)).unwrap();
        h.chain.advance(DAY);
    }

    let receipt = h
        .unstake(&user, vault, &[2, 0], &[ether(10), ether(4)])
        .unwrap();
    assert_eq!(receipt.amount, ether(14));

    let data = h.vault_data(vault);
    let amounts: Vec<U256> = data.stakes.iter().map(|r| r.amount).collect();
    assert_eq!(amounts, vec![ether(6), ether(10)]);
    assert_eq!(data.stakes[0].timestamp, START);
    assert_eq!(data.stakes[1].timestamp, START + DAY);
    assert_eq!(data.total_stake, ether(16));
    assert_eq!(h.data().total_stake, ether(16));
}

#[test]
fn test_unstake_array_errors() {
    let mut h = Harness::new(default_scaling());
    let user = h.user.clone();
    let vault = h.vault;
    h.stake(&user, vault, ether(10)).unwrap();

    assert_eq!(
        h.unstake(&user, vault, &[0], &[U256::ZERO]),
        Err(AludelError::NoAmountUnstaked)
    );
    assert_eq!(
        h.unstake(&user, vault, &[0], &[ether(10) + U256::from(1u64)]),
        Err(AludelError::InvalidAmountArray)
    );
    assert_eq!(
        h.unstake(&user, vault, &[0, 1], &[ether(1)]),
        Err(AludelError::InvalidAmountArray)
    );
    let empty_vault = h.new_vault(&user);
    assert_eq!(
        h.unstake(&user, empty_vault, &[0], &[ether(1)]),
        Err(AludelError::InsufficientVaultStake)
    );
}

#[test]
fn test_unstake_with_foreign_signature_fails() {
    let mut h = Harness::new(default_scaling());
    let user = h.user.clone();
    let vault = h.vault;
    h.stake(&user, vault, ether(10)).unwrap();
    h.chain.advance(DAY);

    let stranger = Keypair::from_seed(b"stranger");
    let result = h.unstake(&stranger, vault, &[0], &[ether(10)]);
    assert_eq!(result, Err(AludelError::Vault(VaultError::InvalidSignature)));
    assert_eq!(
        result.unwrap_err().to_string(),
        "ERC1271: Invalid signature"
    );
    assert_eq!(h.vault_data(vault).total_stake, ether(10));
}

#[test]
fn test_two_stakers_split_rewards_and_bonus() {
    let mut h = Harness::new(RewardScaling::new(100, 100, DAY).unwrap());
    let user = h.user.clone();
    let other = Keypair::from_seed(b"other");
    let vault = h.vault;
    let other_vault = h.new_vault(&other);

    let bonus = h.chain.create_token("BNS", 18);
    h.chain
        .register_bonus_token(h.program, h.admin, bonus)
        .unwrap();
    let pool = h.data().reward_pool;
    h.chain.mint(bonus, pool, U256::from(1_000u64)).unwrap();

    h.fund(gwei(1_000), 10 * DAY);
    h.stake(&user, vault, ether(10)).unwrap();
    h.stake(&other, other_vault, ether(10)).unwrap();
    h.chain.advance(10 * DAY);

    let from = h.chain.log().len();
    let first = h.unstake(&user, vault, &[0], &[ether(10)]).unwrap();
    let half = net_of_fee(gwei(1_000)) / U256::from(2u64);
    assert_eq!(first.reward, half);
    assert_eq!(first.bonus, vec![(bonus, U256::from(500u64))]);
    assert_eq!(h.chain.balance_of(bonus, vault), U256::from(500u64));

    let events = h.program_events(from);
    assert_eq!(
        events,
        vec![
            Event::Unstaked {
                vault,
                amount: ether(10)
            },
            Event::RewardClaimed {
                vault,
                token: h.reward,
                amount: half
            },
            Event::RewardClaimed {
                vault,
                token: bonus,
                amount: U256::from(500u64)
            },
        ]
    );

    let second = h.unstake(&other, other_vault, &[0], &[ether(10)]).unwrap();
    assert_eq!(second.reward, half);
    assert_eq!(second.bonus, vec![(bonus, U256::from(500u64))]);
    assert_eq!(h.data().reward_shares_outstanding, U256::ZERO);
}

#[test]
fn test_funding_mid_stream_does_not_touch_old_schedule() {
    let mut h = Harness::new(RewardScaling::new(100, 100, DAY).unwrap());
    let user = h.user.clone();
    let vault = h.vault;
    h.fund(gwei(1_000), 10 * DAY);
    h.stake(&user, vault, ether(1)).unwrap();
    h.chain.advance(5 * DAY);
    let before = h.data().reward_schedules[0].clone();
    h.fund(gwei(1_000), 10 * DAY);

    let data = h.data();
    assert_eq!(data.reward_schedules.len(), 2);
    assert_eq!(data.reward_schedules[0], before);
    assert_eq!(data.reward_schedules[1].start, START + 5 * DAY);

    // only the first schedule has vested anything yet
    let unlocked = h
        .chain
        .program(h.program)
        .unwrap()
        .get_current_unlocked_rewards(h.chain.now())
        .unwrap();
    assert_eq!(unlocked, net_of_fee(gwei(1_000)) / U256::from(2u64));
}

// ---------------------------------------------------------------------------
// Funding and admin
// ---------------------------------------------------------------------------

#[test]
fn test_fund_pays_fee_recipient() {
    let mut h = Harness::new(default_scaling());
    h.fund(gwei(1_000), DAY);
    assert_eq!(h.chain.balance_of(h.reward, h.fee_recipient), gwei(10));
    assert_eq!(h.chain.balance_of(h.reward, h.data().reward_pool), gwei(990));
}

#[test]
fn test_fund_without_allowance_reverts_atomically() {
    let mut h = Harness::new(default_scaling());
    h.chain.approve(h.reward, h.admin, h.program, U256::ZERO);
    let events = h.chain.log().len();
    let result = h.chain.fund(h.program, h.admin, gwei(1_000), DAY);
    assert_eq!(
        result,
        Err(AludelError::Token(TokenError::InsufficientAllowance))
    );
    assert!(h.data().reward_schedules.is_empty());
    assert_eq!(h.data().reward_shares_outstanding, U256::ZERO);
    assert_eq!(h.chain.log().len(), events);
}

#[test]
fn test_bonus_token_cap() {
    let mut h = Harness::new(default_scaling());
    let mut tokens = Vec::new();
    for i in 0..=MAX_BONUS_TOKENS {
        tokens.push(h.chain.create_token(&format!("B{}", i), 18));
    }
    for token in &tokens[..MAX_BONUS_TOKENS] {
        h.chain
            .register_bonus_token(h.program, h.admin, *token)
            .unwrap();
    }
    assert_eq!(
        h.chain
            .register_bonus_token(h.program, h.admin, tokens[MAX_BONUS_TOKENS]),
        Err(AludelError::MaxBonusTokensReached)
    );
    assert_eq!(
        h.chain.register_bonus_token(h.program, h.admin, tokens[0]),
        Err(AludelError::InvalidAddress)
    );
    let registered = h.chain.program(h.program).unwrap().get_bonus_tokens().unwrap();
    assert_eq!(registered.len(), MAX_BONUS_TOKENS);
}

#[test]
fn test_admin_calls_require_owner() {
    let mut h = Harness::new(default_scaling());
    let stranger = Address::repeat_byte(0x99);
    assert_eq!(
        h.chain.fund(h.program, stranger, gwei(1), DAY),
        Err(AludelError::NotOwner)
    );
    assert_eq!(
        h.chain.register_vault_factory(h.program, stranger, Address::repeat_byte(1)),
        Err(AludelError::NotOwner)
    );
    assert_eq!(
        h.chain.register_bonus_token(h.program, stranger, Address::repeat_byte(1)),
        Err(AludelError::NotOwner)
    );
    assert_eq!(h.chain.power_off(h.program, stranger), Err(AludelError::NotOwner));
}

#[test]
fn test_ownership_transfer() {
    let mut h = Harness::new(default_scaling());
    let new_owner = Address::repeat_byte(0x0b);
    h.chain
        .transfer_ownership(h.program, h.admin, new_owner)
        .unwrap();
    assert_eq!(
        h.chain.register_bonus_token(h.program, h.admin, Address::repeat_byte(1)),
        Err(AludelError::NotOwner)
    );
    h.chain
        .register_bonus_token(h.program, new_owner, Address::repeat_byte(1))
        .unwrap();
}

#[test]
fn test_rescue_stray_tokens() {
    let mut h = Harness::new(default_scaling());
    let stray = h.chain.create_token("STRAY", 18);
    let pool = h.data().reward_pool;
    h.chain.mint(stray, pool, U256::from(77u64)).unwrap();
    let recipient = Address::repeat_byte(0x0e);

    h.chain
        .rescue_tokens_from_reward_pool(h.program, h.admin, stray, recipient, U256::from(77u64))
        .unwrap();
    assert_eq!(h.chain.balance_of(stray, recipient), U256::from(77u64));

    assert_eq!(
        h.chain
            .rescue_tokens_from_reward_pool(h.program, h.admin, h.reward, recipient, U256::from(1u64)),
        Err(AludelError::InvalidAddress)
    );
    for forbidden in [pool, h.program, h.staking, h.reward, Address::ZERO] {
        assert_eq!(
            h.chain
                .rescue_tokens_from_reward_pool(h.program, h.admin, stray, forbidden, U256::ZERO),
            Err(AludelError::InvalidAddress)
        );
    }
}

// ---------------------------------------------------------------------------
// Vault validity
// ---------------------------------------------------------------------------

#[test]
fn test_stake_from_unregistered_factory() {
    let mut h = Harness::new(default_scaling());
    let user = h.user.clone();
    let rogue_factory = h.chain.create_vault_factory();
    let rogue_vault = h.chain.create_vault(rogue_factory, &user).unwrap();
    h.chain.mint(h.staking, rogue_vault, ether(10)).unwrap();

    assert_eq!(
        h.stake(&user, rogue_vault, ether(1)),
        Err(AludelError::InvalidVault)
    );
    h.chain
        .register_vault_factory(h.program, h.admin, rogue_factory)
        .unwrap();
    h.stake(&user, rogue_vault, ether(1)).unwrap();
}

#[test]
fn test_removed_factory_vaults_can_still_exit() {
    let mut h = Harness::new(default_scaling());
    let user = h.user.clone();
    let vault = h.vault;
    h.stake(&user, vault, ether(10)).unwrap();
    h.chain
        .remove_vault_factory(h.program, h.admin, h.factory)
        .unwrap();

    assert_eq!(h.stake(&user, vault, ether(1)), Err(AludelError::InvalidVault));
    h.chain.advance(DAY);
    h.unstake(&user, vault, &[0], &[ether(10)]).unwrap();
}

#[test]
fn test_stake_beyond_vault_balance() {
    let mut h = Harness::new(default_scaling());
    let user = h.user.clone();
    let vault = h.vault;
    assert_eq!(
        h.stake(&user, vault, ether(1_001)),
        Err(AludelError::Vault(VaultError::InsufficientBalance))
    );
    assert_eq!(h.data().total_stake, U256::ZERO);
    assert!(h.vault_data(vault).stakes.is_empty());
}

#[test]
fn test_max_stakes_per_vault() {
    let mut h = Harness::new(default_scaling());
    let user = h.user.clone();
    let vault = h.vault;
    for _ in 0..MAX_STAKES_PER_VAULT {
        h.stake(&user, vault, ether(1)).unwrap();
    }
    assert_eq!(
        h.stake(&user, vault, ether(1)),
        Err(AludelError::MaxStakesReached)
    );
}

// ---------------------------------------------------------------------------
// Power states
// ---------------------------------------------------------------------------

#[test]
fn test_offline_blocks_stake_but_not_exit() {
    let mut h = Harness::new(default_scaling());
    let user = h.user.clone();
    let vault = h.vault;
    h.fund(gwei(1_000), DAY);
    h.stake(&user, vault, ether(10)).unwrap();
    h.chain.power_off(h.program, h.admin).unwrap();
    assert_eq!(
        h.chain.program(h.program).unwrap().power_state().unwrap(),
        PowerState::Offline
    );

    assert_eq!(h.stake(&user, vault, ether(1)), Err(AludelError::PoweredNotOnline));
    assert_eq!(
        h.chain.fund(h.program, h.admin, gwei(1), DAY),
        Err(AludelError::PoweredNotOnline)
    );
    h.chain.advance(DAY);
    let receipt = h.unstake(&user, vault, &[0], &[ether(10)]).unwrap();
    assert!(receipt.reward > U256::ZERO);

    h.chain.power_on(h.program, h.admin).unwrap();
    h.stake(&user, vault, ether(1)).unwrap();
}

#[test]
fn test_shutdown_leaves_only_rage_quit_and_rescue() {
    let mut h = Harness::new(default_scaling());
    let user = h.user.clone();
    let vault = h.vault;
    h.fund(gwei(1_000), DAY);
    h.stake(&user, vault, ether(10)).unwrap();
    h.chain.emergency_shutdown(h.program, h.admin).unwrap();

    assert_eq!(
        h.unstake(&user, vault, &[0], &[ether(10)]),
        Err(AludelError::PoweredIsShutdown)
    );
    assert_eq!(
        h.chain.register_vault_factory(h.program, h.admin, Address::repeat_byte(1)),
        Err(AludelError::PoweredIsShutdown)
    );
    assert_eq!(
        h.chain.power_on(h.program, h.admin),
        Err(AludelError::CannotPowerOn)
    );

    assert!(h.rage_quit(&user, vault, VAULT_RAGEQUIT_OVERHEAD + RAGEQUIT_GAS).unwrap());

    let recipient = Address::repeat_byte(0x0e);
    let rescued = h
        .chain
        .rescue_reward_pool(h.program, h.admin, &[h.reward], recipient)
        .unwrap();
    assert_eq!(rescued, vec![(h.reward, gwei(990))]);
    assert_eq!(h.chain.balance_of(h.reward, recipient), gwei(990));
}

#[test]
fn test_pool_rescue_requires_shutdown() {
    let mut h = Harness::new(default_scaling());
    h.fund(gwei(1_000), DAY);
    assert_eq!(
        h.chain
            .rescue_reward_pool(h.program, h.admin, &[h.reward], h.admin),
        Err(AludelError::PoweredNotShutdown)
    );
}

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

#[test]
fn test_timelock_hook() {
    let mut h = Harness::with_params(default_scaling(), |p| {
        p.with_hook(Box::new(TimelockHook::new(7 * DAY)))
    });
    let user = h.user.clone();
    let vault = h.vault;
    h.stake(&user, vault, ether(10)).unwrap();
    h.chain.advance(3 * DAY);

    assert_eq!(
        h.unstake(&user, vault, &[0], &[ether(10)]),
        Err(AludelError::StakeTimelocked {
            index: 0,
            unlocks_at: START + 7 * DAY
        })
    );
    h.chain.advance(4 * DAY);
    h.unstake(&user, vault, &[0], &[ether(10)]).unwrap();
}

// ---------------------------------------------------------------------------
// Rage quit
// ---------------------------------------------------------------------------

#[test]
fn test_rage_quit_forfeits_without_burning_shares() {
    let mut h = Harness::new(default_scaling());
    let user = h.user.clone();
    let vault = h.vault;
    h.fund(gwei(1_000), 60 * DAY);
    h.stake(&user, vault, ether(100)).unwrap();
    h.chain.advance(60 * DAY);

    let from = h.chain.log().len();
    let notified = h
        .rage_quit(&user, vault, VAULT_RAGEQUIT_OVERHEAD + RAGEQUIT_GAS)
        .unwrap();
    assert!(notified);

    let data = h.data();
    assert_eq!(
        data.reward_shares_outstanding,
        net_of_fee(gwei(1_000)) * U256::from(BASE_SHARES_PER_WEI)
    );
    assert_eq!(data.total_stake, U256::ZERO);
    assert_eq!(data.total_stake_units, U256::ZERO);
    assert_eq!(data.last_update, h.chain.now());
    assert!(h.vault_data(vault).stakes.is_empty());
    assert_eq!(h.chain.balance_of(h.staking, vault), ether(1_000));

    let events: Vec<&Event> = h.chain.events_since(from).iter().map(|e| &e.event).collect();
    assert_eq!(
        events,
        vec![
            &Event::Unstaked {
                vault,
                amount: ether(100)
            },
            &Event::RageQuit {
                delegate: h.program,
                token: h.staking,
                notified: true
            },
        ]
    );
}

#[test]
fn test_rage_quit_survives_hostile_reward_token() {
    let mut h = Harness::new(default_scaling());
    let user = h.user.clone();
    let vault = h.vault;
    h.fund(gwei(1_000), DAY);
    h.stake(&user, vault, ether(10)).unwrap();
    h.chain.advance(DAY);
    h.chain.set_token_reverting(h.reward, true);

    let nonce_before = h.chain.vaults().get(vault).map(|v| v.nonce());
    let result = h.unstake(&user, vault, &[0], &[ether(10)]);
    assert!(matches!(
        result,
        Err(AludelError::Token(TokenError::Reverted { .. }))
    ));
    // nothing moved, including the vault nonce consumed by the unlock
    assert_eq!(h.vault_data(vault).total_stake, ether(10));
    let nonce_after = h.chain.vaults().get(vault).map(|v| v.nonce());
    assert_eq!(nonce_before, nonce_after);

    assert!(h.rage_quit(&user, vault, VAULT_RAGEQUIT_OVERHEAD + RAGEQUIT_GAS).unwrap());
    assert!(h.vault_data(vault).stakes.is_empty());
}

#[test]
fn test_rage_quit_without_lock() {
    let mut h = Harness::new(default_scaling());
    let user = h.user.clone();
    let vault = h.vault;
    assert_eq!(
        h.rage_quit(&user, vault, VAULT_RAGEQUIT_OVERHEAD + RAGEQUIT_GAS),
        Err(AludelError::Vault(VaultError::MissingLock))
    );
}

#[test]
fn test_rage_quit_by_stranger() {
    let mut h = Harness::new(default_scaling());
    let user = h.user.clone();
    let vault = h.vault;
    h.stake(&user, vault, ether(1)).unwrap();
    let stranger = Keypair::from_seed(b"stranger");
    assert_eq!(
        h.rage_quit(&stranger, vault, VAULT_RAGEQUIT_OVERHEAD + RAGEQUIT_GAS),
        Err(AludelError::Vault(VaultError::NotOwner))
    );
}

#[test]
fn test_rage_quit_gas_bound_is_record_sensitive() {
    let mut h = Harness::new(default_scaling());
    let user = h.user.clone();
    let vault = h.vault;

    // MAX - 1 records fit the full budget
    for _ in 0..MAX_STAKES_PER_VAULT - 1 {
        h.stake(&user, vault, ether(1)).unwrap();
    }
    assert!(h
        .rage_quit(&user, vault, VAULT_RAGEQUIT_OVERHEAD + RAGEQUIT_GAS)
        .unwrap());
    assert_eq!(h.data().total_stake, U256::ZERO);

    let single_stake_budget = VAULT_RAGEQUIT_OVERHEAD + rage_quit_cost(1);

    // the single-stake budget is too small once a second record exists
    let crowded = h.new_vault(&user);
    h.stake(&user, crowded, ether(1)).unwrap();
    h.stake(&user, crowded, ether(1)).unwrap();
    assert_eq!(
        h.rage_quit(&user, crowded, single_stake_budget),
        Err(AludelError::Vault(VaultError::InsufficientGas))
    );
    assert_eq!(h.vault_data(crowded).stakes.len(), 2);

    // and exactly enough for one record
    let single = h.new_vault(&user);
    h.stake(&user, single, ether(1)).unwrap();
    assert!(h.rage_quit(&user, single, single_stake_budget).unwrap());
    assert!(h.vault_data(single).stakes.is_empty());
}

#[test]
fn test_rage_quit_with_too_little_gas_for_overhead() {
    let mut h = Harness::new(default_scaling());
    let user = h.user.clone();
    let vault = h.vault;
    h.stake(&user, vault, ether(1)).unwrap();
    assert_eq!(
        h.rage_quit(&user, vault, VAULT_RAGEQUIT_OVERHEAD - 1),
        Err(AludelError::Vault(VaultError::InsufficientGas))
    );
    assert_eq!(h.vault_data(vault).stakes.len(), 1);
}
