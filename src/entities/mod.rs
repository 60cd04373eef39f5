pub mod bom_entry;
pub mod inventory_item;
pub mod order;
pub mod order_recipe_line;
pub mod prepared_stock;
pub mod production_run;
pub mod recipe;

pub use bom_entry::Entity as BomEntry;
pub use inventory_item::Entity as InventoryItem;
pub use order::Entity as Order;
pub use order_recipe_line::Entity as OrderRecipeLine;
pub use prepared_stock::Entity as PreparedStock;
pub use production_run::Entity as ProductionRun;
pub use recipe::Entity as Recipe;
