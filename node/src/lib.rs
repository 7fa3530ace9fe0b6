//! Pricenode Node
//!
//! The node owns the source registry and everything that runs in the
//! background: one polling task per source and the blue market gap
//! refresher. Reports are built on demand from whatever the caches hold.

pub mod config;
pub mod error;
pub mod logging;
pub mod node;
pub mod state;

pub use config::NodeConfig;
pub use error::{NodeError, NodeResult};
pub use logging::init_tracing;
pub use node::{PollOutcome, PriceNode, PriceNodeBuilder};
pub use state::NodeState;
