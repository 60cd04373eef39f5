//! Property-based tests for order aggregation and the ledger's stock rules.

mod common;

use common::TestApp;
use pos_api::{
    entities::order::{IndividualItem, MealSelection, OrderInfo, RecipeRef, Selections},
    errors::ServiceError,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn recipe_ref_strategy() -> impl Strategy<Value = RecipeRef> {
    (1i32..12).prop_map(|recipe_id| RecipeRef { recipe_id })
}

fn meal_strategy() -> impl Strategy<Value = MealSelection> {
    (
        0i32..20,
        prop::collection::vec(recipe_ref_strategy(), 0..3),
        prop::collection::vec(recipe_ref_strategy(), 0..3),
        prop::collection::vec(recipe_ref_strategy(), 0..2),
    )
        .prop_map(|(quantity, entrees, sides, drinks)| MealSelection {
            quantity,
            selections: Selections {
                entrees,
                sides,
                drinks,
            },
        })
}

fn item_strategy() -> impl Strategy<Value = IndividualItem> {
    (1i32..12, 0i32..20).prop_map(|(recipe_id, quantity)| IndividualItem {
        recipe_id,
        quantity,
    })
}

fn order_info_strategy() -> impl Strategy<Value = OrderInfo> {
    (
        prop::collection::vec(meal_strategy(), 0..5),
        prop::collection::vec(item_strategy(), 0..5),
    )
        .prop_map(|(meals, individual_items)| OrderInfo {
            meals,
            individual_items,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn aggregated_total_matches_every_selection(info in order_info_strategy()) {
        let expected: i32 = info
            .meals
            .iter()
            .map(|m| m.quantity * m.selections.recipe_ids().count() as i32)
            .sum::<i32>()
            + info.individual_items.iter().map(|i| i.quantity).sum::<i32>();

        let totals = info.recipe_quantities();
        prop_assert_eq!(totals.values().sum::<i32>(), expected);
    }

    #[test]
    fn aggregation_keeps_exactly_the_referenced_recipes(info in order_info_strategy()) {
        let referenced: BTreeSet<i32> = info
            .meals
            .iter()
            .flat_map(|m| m.selections.recipe_ids().collect::<Vec<_>>())
            .chain(info.individual_items.iter().map(|i| i.recipe_id))
            .collect();

        let keys: BTreeSet<i32> = info.recipe_quantities().keys().copied().collect();
        prop_assert_eq!(keys, referenced);
    }

    #[test]
    fn in_range_quantities_pass_the_check(info in order_info_strategy()) {
        prop_assert!(info.check_quantities().is_ok());
    }

    #[test]
    fn negative_quantities_always_fail(quantity in i32::MIN..0, recipe_id in 1i32..100) {
        let info = OrderInfo {
            meals: vec![],
            individual_items: vec![IndividualItem { recipe_id, quantity }],
        };
        prop_assert!(info.check_quantities().is_err());
    }

    #[test]
    fn payload_survives_json(info in order_info_strategy()) {
        let value = serde_json::to_value(&info).unwrap();
        let decoded: OrderInfo = serde_json::from_value(value).unwrap();
        prop_assert_eq!(decoded, info);
    }
}

#[derive(Debug, Clone, Copy)]
enum LedgerOp {
    Consume(i32),
    Replenish(i32),
}

fn ledger_op_strategy() -> impl Strategy<Value = LedgerOp> {
    prop_oneof![
        3 => (0i32..25).prop_map(LedgerOp::Consume),
        1 => (1i32..15).prop_map(LedgerOp::Replenish),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Every unit handed out was either there at the start or restocked, and
    /// a consume fails exactly when the ledger holds fewer units than asked.
    #[test]
    fn ledger_sequences_conserve_stock(
        initial in 0i32..60,
        ops in prop::collection::vec(ledger_op_strategy(), 1..25),
    ) {
        runtime().block_on(async {
            let app = TestApp::new().await;
            let item = app.seed_item("Rice", initial).await;
            let ledger = app.services().inventory.clone();

            let mut expected = initial;
            let mut granted = 0;
            let mut replenished = 0;
            for op in ops {
                match op {
                    LedgerOp::Consume(quantity) => match ledger.consume(item.id, quantity).await {
                        Ok(after) => {
                            prop_assert!(expected >= quantity);
                            expected -= quantity;
                            granted += quantity;
                            prop_assert_eq!(after.current_stock, expected);
                        }
                        Err(ServiceError::InsufficientInventory { available, .. }) => {
                            prop_assert!(expected < quantity);
                            prop_assert_eq!(available, expected);
                        }
                        Err(other) => prop_assert!(false, "unexpected error: {}", other),
                    },
                    LedgerOp::Replenish(quantity) => {
                        let after = ledger.replenish(item.id, quantity).await.unwrap();
                        expected += quantity;
                        replenished += quantity;
                        prop_assert_eq!(after.current_stock, expected);
                    }
                }
            }

            let final_stock = app.stock_of(item.id).await;
            prop_assert!(final_stock >= 0);
            prop_assert_eq!(granted + final_stock, initial + replenished);
            Ok(())
        })?;
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    /// Same conservation law when all operations race on separate connections
    #[test]
    fn concurrent_ledger_operations_conserve_stock(
        initial in 0i32..40,
        ops in prop::collection::vec(ledger_op_strategy(), 1..16),
    ) {
        runtime().block_on(async {
            let app = TestApp::file_backed().await;
            let item = app.seed_item("Rice", initial).await;

            let mut tasks = Vec::new();
            for op in ops {
                let ledger = app.services().inventory.clone();
                let id = item.id;
                tasks.push(tokio::spawn(async move {
                    match op {
                        LedgerOp::Consume(quantity) => match ledger.consume(id, quantity).await {
                            Ok(_) => Ok((quantity, 0)),
                            Err(ServiceError::InsufficientInventory { .. }) => Ok((0, 0)),
                            Err(other) => Err(other),
                        },
                        LedgerOp::Replenish(quantity) => {
                            ledger.replenish(id, quantity).await.map(|_| (0, quantity))
                        }
                    }
                }));
            }

            let mut granted = 0;
            let mut replenished = 0;
            for task in tasks {
                let outcome = task.await.unwrap();
                prop_assert!(outcome.is_ok(), "unexpected error: {:?}", outcome);
                if let Ok((consumed, added)) = outcome {
                    granted += consumed;
                    replenished += added;
                }
            }

            let final_stock = app.stock_of(item.id).await;
            prop_assert!(final_stock >= 0);
            prop_assert_eq!(granted + final_stock, initial + replenished);
            Ok(())
        })?;
    }
}
