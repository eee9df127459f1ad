//! The three saga participants and their stores.

pub mod inventory;
pub mod payment;
pub mod product_validation;

pub use inventory::{
    InMemoryStockRepository, Inventory, InventoryService, OrderInventory, StockRepository,
};
pub use payment::{
    DEFAULT_MIN_AMOUNT, Payment, PaymentService, PaymentSettings, PaymentStatus, TOO_MANY_ITEMS,
};
pub use product_validation::{
    InMemoryProductCatalog, ProductCatalog, ProductValidationService, Validation,
};
