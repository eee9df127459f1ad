//! Orchestrated saga for order processing.
//!
//! An order is validated, paid for and reserved by three participants that
//! never call each other. Each participant consumes its own topics and
//! reports back to the orchestrator, which picks the next topic from a static
//! routing table keyed by (source, status). A failure turns the saga around:
//! the failing participant undoes its own partial work, then every earlier
//! participant is compensated in reverse order.
//!
//! ```text
//! start-saga → ORCHESTRATOR → product-validation-success → PRODUCT_VALIDATION
//!            → payment-success → PAYMENT → inventory-success → INVENTORY
//!            → finish-success → notify-ending
//! ```

pub mod coordinator;
pub mod error;
pub mod event;
pub mod handlers;
pub mod participant;
pub mod repository;
pub mod resolver;
pub mod routing;
pub mod services;
pub mod status;
pub mod topic;

pub use coordinator::SagaOrchestrator;
pub use error::{Result, RoutingTableError, SagaError};
pub use event::{Event, HistoryEntry, Order, OrderProducts, Product};
pub use handlers::{OrchestratorHandler, ParticipantHandler};
pub use participant::{SagaParticipant, StepExecutor, StepMessages, StepOutcome};
pub use repository::{InMemoryRecordRepository, RecordRepository, SagaRecord};
pub use resolver::{TopicResolver, Transition};
pub use routing::{Route, RoutingKey, SagaRoutingTable};
pub use services::{
    InMemoryProductCatalog, InMemoryStockRepository, InventoryService, PaymentService,
    PaymentSettings, ProductValidationService,
};
pub use status::{EventSource, SagaStatus};
pub use topic::Topic;
