//! Pricenode Consensus Engine
//!
//! Turns per-source BTC price observations into one consensus price per
//! currency.
//!
//! # Features
//!
//! - Per-source observation caches with lazy staleness eviction
//! - Currency-scoped rate transformers (e.g. ARS blue market)
//! - Mean/standard-deviation inlier filtering before averaging
//! - Per-source health metadata and a flat, currency-sorted report
//! - Supervised polling loops that contain every fetch failure
//!
//! # Example
//!
//! ```rust,ignore
//! use pricenode_engine::{EngineConfig, PriceService, Source, TransformPipeline};
//!
//! let sources = vec![Source::new(binance), Source::new(kraken)];
//! let service = PriceService::new(sources, TransformPipeline::empty(), &EngineConfig::default())?;
//!
//! let report = service.market_prices();
//! println!("{}", report.to_json()?);
//! ```

pub mod blue_market;
pub mod cache;
pub mod config;
pub mod consensus;
pub mod error;
pub mod exclusion;
pub mod gated_log;
pub mod health;
pub mod inlier;
pub mod poller;
pub mod report;
pub mod service;
pub mod source;
pub mod transform;

pub use blue_market::{ArsBlueRateTransformer, BlueGapCache, BlueLyticsQuote, GapFeed};
pub use cache::{SourceCache, SourceSnapshot};
pub use config::EngineConfig;
pub use consensus::{ConsensusAggregator, ConsensusRate, AGGREGATE_PROVIDER};
pub use error::{EngineError, EngineResult};
pub use exclusion::CurrencyExclusions;
pub use gated_log::GatedLog;
pub use health::{HealthReporter, SourceHealth};
pub use inlier::{filter_inliers, InlierRange};
pub use poller::SourcePoller;
pub use report::MarketPrices;
pub use service::PriceService;
pub use source::{PriceSource, Source, SourceMeta};
pub use transform::{RateTransformer, TransformPipeline};
