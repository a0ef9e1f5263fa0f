//! # docquery
//!
//! Question answering over a single document: download a PDF, DOCX, or
//! text file, split it into passages, index them with one of three
//! interchangeable backends, re-rank the hits for each question, and
//! generate a grounded answer.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐   ┌──────────┐   ┌─────────────────────────┐
//! │ Fetch+Extract │──▶│ Chunker  │──▶│ IndexBackend            │
//! │ PDF/DOCX/text │   │ (core)   │   │ dense / tfidf / lexical │
//! └───────────────┘   └──────────┘   └────────────┬────────────┘
//!                                                 │ search(top_k)
//!                                                 ▼
//!                    ┌───────────┐          ┌──────────┐
//!                    │  Answer   │◀─────────│ Reranker │
//!                    │ Generator │          │ (core)   │
//!                    └─────┬─────┘          └──────────┘
//!                ┌─────────┴─────────┐
//!                ▼                   ▼
//!           ┌──────────┐       ┌──────────┐
//!           │   CLI    │       │   HTTP   │
//!           │  (docq)  │       │  server  │
//!           └──────────┘       └──────────┘
//! ```
//!
//! Chunking, indexing, embedding traits, and re-ranking live in the
//! `docquery-core` crate; this crate adds I/O, providers, and surfaces.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`fetch`] | Document download and local reads |
//! | [`extract`] | PDF/DOCX/text extraction |
//! | [`embedding`] | Embedding providers |
//! | [`answer`] | LLM answer generation with fallback |
//! | [`pipeline`] | The query service |
//! | [`server`] | HTTP API |
//! | [`commands`] | `ask` and `inspect` CLI commands |

pub mod answer;
pub mod commands;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod fetch;
pub mod pipeline;
mod retry;
pub mod server;
