//! # citeweave: a deep-research orchestration engine
//!
//! citeweave drives a fixed multi-stage pipeline — plan, federated search,
//! analyze, write, critic/quality-gate, validate — over a per-session
//! research working set, streaming structured progress events and pausing
//! at human-approval checkpoints along the way.
//!
//! ## Core Concepts
//!
//! - **Stages**: the Planner/Searcher/Analyzer/Writer/Critic/Validator
//!   executors, each consuming [`memory::ResearchMemory`] and an LLM
//!   ([`llm::CompletionProvider`]) and emitting [`model::timeline::AgentEvent`]s.
//! - **Coordinator**: the only component with full knowledge of stage order;
//!   walks the fixed pipeline, suspending at checkpoints.
//! - **Federator**: fans a query out across bibliographic [`sources`],
//!   merges and ranks the results, and caches both queries and papers.
//! - **SessionManager**: session lifecycle and the checkpoint rendezvous a
//!   client resolves from outside the pipeline.
//! - **EventStreamWriter**: normalises internal events into the wire
//!   contract a client actually reads.
//!
//! ## Quick Start
//!
//! ```
//! use citeweave::message::Message;
//!
//! let user_msg = Message::user("What's the evidence for X?");
//! assert!(user_msg.has_role(Message::USER));
//! ```
//!
//! ## Module Guide
//!
//! - [`model`] - The bibliographic/plan/event data model
//! - [`error`] - Crate-wide error taxonomy
//! - [`config`] - Environment-backed settings
//! - [`cache`] - Two-level paper/query cache
//! - [`sources`] - Federated bibliographic source clients
//! - [`federator`] - Fan-out, merge, and rank across sources
//! - [`memory`] - Per-session research working set
//! - [`compression`] - Context-budget-aware paper compression
//! - [`llm`] - The completion-provider contract and `OpenRouterProvider`
//! - [`citations`] - Pure-function citation formatters
//! - [`stages`] - The six pipeline stage executors
//! - [`coordinator`] - The fixed pipeline state machine
//! - [`session`] - Session lifecycle and checkpoint rendezvous
//! - [`stream`] - The wire event contract
//! - [`event_bus`] - Internal event fan-out (teacher-grounded)
//! - [`message`] - Message types and construction utilities

pub mod cache;
pub mod citations;
pub mod compression;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod event_bus;
pub mod federator;
pub mod llm;
pub mod memory;
pub mod message;
pub mod model;
pub mod session;
pub mod sources;
pub mod stages;
pub mod stream;
pub mod telemetry;
pub mod utils;
