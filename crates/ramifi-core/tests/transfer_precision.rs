//! Random cycles of supply growth and contraction, checking after each that
//! transfers move exactly the requested amount between two holders.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ramifi_core::math::{mul_div_u256, narrow_u128, Rounding};
use ramifi_core::{Address, ElasticToken, INITIAL_FRAGMENTS_SUPPLY};

const END_SUPPLY: u128 = 1 << 120;
const GROWTH_SCALE: i64 = 100_000;

fn check_transfer(token: &mut ElasticToken, from: Address, to: Address, amount: u128) {
    let from_before = token.balance_of(&from);
    let to_before = token.balance_of(&to);

    token.transfer(&from, &to, amount).unwrap();

    assert_eq!(token.balance_of(&from), from_before - amount);
    assert_eq!(token.balance_of(&to), to_before + amount);
    assert_eq!(
        token.balance_of(&from) + token.balance_of(&to),
        from_before + to_before
    );
}

/// `supply * growth / GROWTH_SCALE` for growth in [-0.5, 2.5]
fn rebase_amount(supply: u128, growth: i64) -> i128 {
    let magnitude = mul_div_u256(supply, growth.unsigned_abs() as u128, GROWTH_SCALE as u128, Rounding::Down)
        .ok()
        .and_then(narrow_u128)
        .unwrap();
    let magnitude = i128::try_from(magnitude).unwrap();
    if growth < 0 {
        -magnitude
    } else {
        magnitude
    }
}

#[test]
fn test_transfer_precision_across_rebases() {
    let deployer = Address::from_low_u64(1);
    let user = Address::from_low_u64(2);
    let mut token = ElasticToken::genesis(deployer, INITIAL_FRAGMENTS_SUPPLY).unwrap();
    token.set_monetary_policy(&deployer, deployer).unwrap();

    let mut rng = StdRng::seed_from_u64(0x5eed_f4a6);
    let mut rebase_amt = 0i128;
    let mut epoch = 1u64;

    loop {
        token.rebase(&deployer, epoch, rebase_amt, 0).unwrap();
        epoch += 1;

        check_transfer(&mut token, deployer, user, 1);
        check_transfer(&mut token, user, deployer, 1);

        let max = token.balance_of(&deployer);
        check_transfer(&mut token, deployer, user, max);
        check_transfer(&mut token, user, deployer, max);

        let supply = token.total_supply();
        let growth = rng.gen_range(-GROWTH_SCALE / 2..=GROWTH_SCALE * 5 / 2);
        rebase_amt = rebase_amount(supply, growth);

        let next = if rebase_amt >= 0 {
            supply.saturating_add(rebase_amt.unsigned_abs())
        } else {
            supply - rebase_amt.unsigned_abs()
        };
        if next >= END_SUPPLY || epoch > 2_000 {
            break;
        }
    }

    assert!(token.total_supply() > INITIAL_FRAGMENTS_SUPPLY);
}

#[test]
fn test_share_counts_past_2_pow_100() {
    let deployer = Address::from_low_u64(1);
    let user = Address::from_low_u64(2);
    let mut token = ElasticToken::genesis(deployer, INITIAL_FRAGMENTS_SUPPLY).unwrap();
    token.set_monetary_policy(&deployer, deployer).unwrap();
    token.rebase(&deployer, 1, (1i128 << 110) - INITIAL_FRAGMENTS_SUPPLY as i128, 0).unwrap();

    // a single unit still corresponds to a very large share quantity
    check_transfer(&mut token, deployer, user, 1);
    assert!(token.shares_of(&user) > ramifi_core::math::U256::ONE << 100);
    check_transfer(&mut token, user, deployer, 1);
}
