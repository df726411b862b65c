//! # OpenAPI Index
//!
//! Incremental ingestion of OpenAPI/Swagger specifications into a vector
//! database, one retrievable record per endpoint.
//!
//! A run compares the incoming specification to the snapshot cached by the
//! previous successful run and only re-embeds the operations whose
//! definitions changed. Progress is recorded in a checkpoint file, so an
//! interrupted run resumes without redoing stored work.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────────────┐   ┌──────────┐
//! │ Resolver │──▶│  Differ  │──▶│ Ingestion driver │──▶│  Milvus  │
//! │ URL/file │   │ vs cache │   │ summarize+record │   │  upsert  │
//! └──────────┘   └──────────┘   └────────┬─────────┘   └──────────┘
//!                                        │
//!                          ┌─────────────┴────────────┐
//!                          ▼                          ▼
//!                   ┌─────────────┐          ┌────────────────┐
//!                   │ Spec cache  │          │   Checkpoint   │
//!                   │ snapshot    │          │ ledger + log   │
//!                   └─────────────┘          └────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! oai ingest https://petstore.swagger.io/v2/swagger.json \
//!     --store-url http://localhost:19530 \
//!     --embedding openai:text-embedding-3-small:1536
//! oai diff ./swagger.json           # preview changed operations
//! oai status                        # snapshot and checkpoint summary
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Typed errors per component |
//! | [`resolver`] | Fetching and `$ref` resolution |
//! | [`cache`] | Cached snapshot of the last ingested spec |
//! | [`diff`] | Changed-operation detection |
//! | [`ledger`] | Checkpoint persistence and archiving |
//! | [`markup`] | HTML description to markdown |
//! | [`record`] | Endpoint record construction |
//! | [`summarizer`] | Optional description summarization |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Vector store trait and backends |
//! | [`ingest`] | Ingestion driver |
//! | [`progress`] | Progress reporting |
//! | [`status`] | Snapshot/checkpoint overview and diff preview |

pub mod cache;
pub mod config;
pub mod diff;
pub mod embedding;
pub mod error;
mod http;
pub mod ingest;
pub mod ledger;
pub mod markup;
pub mod models;
pub mod progress;
pub mod record;
pub mod resolver;
pub mod status;
pub mod store;
pub mod summarizer;
