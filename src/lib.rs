//! # Study Scout
//!
//! A course-aware learning resource finder for LMS platforms.
//!
//! Study Scout routes a free-text learning question (or an image of
//! educational content) through a three-stage resolution pipeline over a
//! course-management platform's hierarchy, returning the most relevant
//! pages, assignments, and files as one ranked list.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────────────┐   ┌─────────────┐
//! │ query/image  │──▶│   Resolution Pipeline     │──▶│   Ranked    │
//! │              │   │ course ▶ modules ▶ items  │   │  resources  │
//! └──────────────┘   └─────┬──────────────┬─────┘   └─────────────┘
//!                          │              │
//!                          ▼              ▼
//!                    ┌──────────┐   ┌──────────┐
//!                    │ Catalog  │   │  Oracle  │
//!                    │ (LMS API)│   │ (Gemini) │
//!                    └──────────┘   └──────────┘
//! ```
//!
//! Every oracle guess is validated against ground truth fetched from the
//! catalog; unreliable or malformed classifier output degrades through a
//! deterministic matching ladder instead of failing the request.
//!
//! ## Quick Start
//!
//! ```bash
//! export SCOUT_LMS_TOKEN=...       # platform bearer token
//! export SCOUT_ORACLE_KEY=...      # classifier API key
//! scout find "How does virtual memory work?"
//! scout find --image notes/diagram.png --verbose
//! scout courses                    # list the visible catalog
//! scout serve                      # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`catalog`] | Course catalog client (LMS REST API) |
//! | [`oracle`] | Multimodal classifier client |
//! | [`resolve`] | Guess validation and fallback matching |
//! | [`concept`] | Image → concept text extraction |
//! | [`pipeline`] | Stage orchestration and ranked merge |
//! | [`snapshot`] | Best-effort debug artifacts |
//! | [`server`] | HTTP API shell |

pub mod catalog;
pub mod concept;
pub mod config;
pub mod models;
pub mod oracle;
pub mod pipeline;
pub mod resolve;
pub mod server;
pub mod snapshot;
