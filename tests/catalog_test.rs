mod common;

use assert_matches::assert_matches;
use common::TestApp;
use pos_api::{
    entities::recipe::RecipeType,
    errors::ServiceError,
    services::{
        bom::BomRequirement,
        catalog::{AddBomEntryRequest, CreateInventoryItemRequest, CreateRecipeRequest},
    },
};
use rstest::rstest;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn recipe_request(name: &str, price: Decimal, per_batch: i32) -> CreateRecipeRequest {
    CreateRecipeRequest {
        name: name.to_string(),
        price_per_serving: price,
        orders_per_batch: per_batch,
        recipe_type: RecipeType::Side,
        image: None,
    }
}

#[tokio::test]
async fn created_rows_are_readable() {
    let app = TestApp::new().await;
    let item = app.seed_item("Rice", 40).await;
    let recipe = app.seed_recipe("Fried Rice", 6).await;

    assert_eq!(item.current_stock, 40);
    assert_eq!(recipe.orders_per_batch, 6);
    assert_eq!(recipe.recipe_type, RecipeType::Entree);
    assert_eq!(app.stock_of(item.id).await, 40);
    assert_eq!(app.prepared_of(recipe.id).await, None);
}

#[tokio::test]
async fn duplicate_names_conflict() {
    let app = TestApp::new().await;
    app.seed_item("Rice", 40).await;
    app.seed_recipe("Fried Rice", 6).await;

    let item = app
        .services()
        .catalog
        .create_inventory_item(CreateInventoryItemRequest {
            name: "Rice".to_string(),
            batch_purchase_cost: dec!(3.00),
            current_stock: 1,
            estimated_used_per_day: 0,
        })
        .await;
    assert_matches!(item, Err(ServiceError::Conflict(_)));

    let recipe = app
        .services()
        .catalog
        .create_recipe(recipe_request("Fried Rice", dec!(4.50), 2))
        .await;
    assert_matches!(recipe, Err(ServiceError::Conflict(_)));
}

#[rstest]
#[case::empty_name("", dec!(4.50), 2)]
#[case::negative_price("Egg Roll", dec!(-0.50), 2)]
#[case::zero_batch("Egg Roll", dec!(4.50), 0)]
#[tokio::test]
async fn invalid_recipes_are_rejected(
    #[case] name: &str,
    #[case] price: Decimal,
    #[case] per_batch: i32,
) {
    let app = TestApp::new().await;
    let result = app
        .services()
        .catalog
        .create_recipe(recipe_request(name, price, per_batch))
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn bom_pairs_are_unique() {
    let app = TestApp::new().await;
    let item = app.seed_item("Rice", 40).await;
    let recipe = app.seed_recipe("Fried Rice", 6).await;
    app.link(item.id, recipe.id, 2).await;

    let again = app
        .services()
        .catalog
        .add_bom_entry(AddBomEntryRequest {
            inventory_id: item.id,
            recipe_id: recipe.id,
            inventory_quantity: 5,
        })
        .await;
    assert_matches!(again, Err(ServiceError::Conflict(_)));
}

#[tokio::test]
async fn bom_entries_need_both_sides() {
    let app = TestApp::new().await;
    let item = app.seed_item("Rice", 40).await;
    let recipe = app.seed_recipe("Fried Rice", 6).await;

    let missing_item = app
        .services()
        .catalog
        .add_bom_entry(AddBomEntryRequest {
            inventory_id: 999,
            recipe_id: recipe.id,
            inventory_quantity: 1,
        })
        .await;
    assert_matches!(missing_item, Err(ServiceError::InventoryItemNotFound(999)));

    let missing_recipe = app
        .services()
        .catalog
        .add_bom_entry(AddBomEntryRequest {
            inventory_id: item.id,
            recipe_id: 999,
            inventory_quantity: 1,
        })
        .await;
    assert_matches!(missing_recipe, Err(ServiceError::RecipeNotFound(999)));

    let negative = app
        .services()
        .catalog
        .add_bom_entry(AddBomEntryRequest {
            inventory_id: item.id,
            recipe_id: recipe.id,
            inventory_quantity: -1,
        })
        .await;
    assert_matches!(negative, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn resolve_lists_requirements_in_inventory_order() {
    let app = TestApp::new().await;
    let rice = app.seed_item("Rice", 40).await;
    let egg = app.seed_item("Egg", 24).await;
    let oil = app.seed_item("Oil", 10).await;
    let recipe = app.seed_recipe("Fried Rice", 6).await;

    // Linked out of order on purpose
    app.link(oil.id, recipe.id, 1).await;
    app.link(rice.id, recipe.id, 3).await;
    app.link(egg.id, recipe.id, 2).await;

    let requirements = app.services().bom.resolve(recipe.id).await.unwrap();
    assert_eq!(
        requirements,
        vec![
            BomRequirement {
                inventory_id: rice.id,
                inventory_quantity: 3,
                inventory_name: Some("Rice".to_string()),
            },
            BomRequirement {
                inventory_id: egg.id,
                inventory_quantity: 2,
                inventory_name: Some("Egg".to_string()),
            },
            BomRequirement {
                inventory_id: oil.id,
                inventory_quantity: 1,
                inventory_name: Some("Oil".to_string()),
            },
        ]
    );
}

#[tokio::test]
async fn resolve_distinguishes_missing_recipe_from_empty_bom() {
    let app = TestApp::new().await;
    let recipe = app.seed_recipe("Tea", 10).await;

    assert!(app.services().bom.resolve(recipe.id).await.unwrap().is_empty());
    assert_matches!(
        app.services().bom.resolve(31337).await,
        Err(ServiceError::RecipeNotFound(31337))
    );
}

#[tokio::test]
async fn referenced_inventory_cannot_be_deleted() {
    let app = TestApp::new().await;
    let rice = app.seed_item("Rice", 40).await;
    let spare = app.seed_item("Spare Napkins", 500).await;
    let recipe = app.seed_recipe("Fried Rice", 6).await;
    app.link(rice.id, recipe.id, 3).await;

    assert_matches!(
        app.services().catalog.delete_inventory_item(rice.id).await,
        Err(ServiceError::ConstraintViolation(_))
    );
    assert_eq!(app.stock_of(rice.id).await, 40);

    app.services()
        .catalog
        .delete_inventory_item(spare.id)
        .await
        .unwrap();
    assert!(app
        .services()
        .inventory
        .get_inventory(spare.id)
        .await
        .unwrap()
        .is_none());

    assert_matches!(
        app.services().catalog.delete_inventory_item(spare.id).await,
        Err(ServiceError::InventoryItemNotFound(_))
    );
}

#[tokio::test]
async fn recipes_with_prepared_stock_cannot_be_deleted() {
    let app = TestApp::new().await;
    let cooked = app.seed_recipe("Fried Rice", 6).await;
    let unused = app.seed_recipe("Seasonal Special", 4).await;
    app.services()
        .prepared_stock
        .replenish(cooked.id, 6)
        .await
        .unwrap();

    assert_matches!(
        app.services().catalog.delete_recipe(cooked.id).await,
        Err(ServiceError::ConstraintViolation(_))
    );
    assert_eq!(app.prepared_of(cooked.id).await, Some(6));

    app.services().catalog.delete_recipe(unused.id).await.unwrap();
    assert_matches!(
        app.services().bom.resolve(unused.id).await,
        Err(ServiceError::RecipeNotFound(_))
    );
}
