//! Property tests: shares are never created or destroyed by transfers or
//! rebases.

use proptest::prelude::*;

use ramifi_core::{Address, ElasticToken, CoreError};

#[derive(Debug, Clone)]
enum Op {
    Transfer { from: u8, to: u8, amount: u128 },
    TransferAll { from: u8, to: u8 },
    Rebase { delta: i64 },
}

fn account(n: u8) -> Address {
    Address::from_low_u64(100 + n as u64)
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..4, 0u8..4, 0u128..2_000_000).prop_map(|(from, to, amount)| Op::Transfer { from, to, amount }),
        (0u8..4, 0u8..4).prop_map(|(from, to)| Op::TransferAll { from, to }),
        any::<i64>().prop_map(|delta| Op::Rebase { delta }),
    ]
}

proptest! {
    #[test]
    fn prop_shares_conserved(ops in prop::collection::vec(op_strategy(), 1..64)) {
        let policy = Address::from_low_u64(1);
        let mut token = ElasticToken::genesis(account(0), 1_000_000).unwrap();
        token.set_monetary_policy(&account(0), policy).unwrap();
        let total_shares = token.ledger().unwrap().total_shares();
        let mut epoch = 0u64;

        for op in ops {
            let before = token.clone();
            let result = match op {
                Op::Transfer { from, to, amount } => {
                    token.transfer(&account(from), &account(to), amount).map(|_| ())
                }
                Op::TransferAll { from, to } => {
                    token.transfer_all(&account(from), &account(to)).map(|_| ())
                }
                Op::Rebase { delta } => {
                    epoch += 1;
                    token.rebase(&policy, epoch, delta as i128, 0).map(|_| ())
                }
            };

            match result {
                Ok(()) => {}
                Err(CoreError::InsufficientBalance { .. }) => {
                    // failed operations leave no trace
                    prop_assert_eq!(token.total_supply(), before.total_supply());
                    for n in 0..4 {
                        prop_assert_eq!(token.shares_of(&account(n)), before.shares_of(&account(n)));
                    }
                }
                Err(e) => prop_assert!(false, "unexpected error {}", e),
            }

            let ledger = token.ledger().unwrap();
            prop_assert_eq!(ledger.sum_of_shares().unwrap(), total_shares);
            prop_assert!(token.total_supply() >= 1);
        }
    }

    #[test]
    fn prop_transfer_moves_exact_amount(supply in 1u128..u64::MAX as u128, growth in -1_000_000i64..1_000_000_000, pct in 0u128..=100) {
        let policy = Address::from_low_u64(1);
        let mut token = ElasticToken::genesis(account(0), supply).unwrap();
        token.set_monetary_policy(&account(0), policy).unwrap();
        token.rebase(&policy, 1, growth as i128, 0).unwrap();

        let balance = token.balance_of(&account(0));
        let amount = balance * pct / 100;
        token.transfer(&account(0), &account(1), amount).unwrap();

        prop_assert_eq!(token.balance_of(&account(0)), balance - amount);
        prop_assert_eq!(token.balance_of(&account(1)), amount);
    }
}
