//! # docquery core
//!
//! Runtime-free retrieval logic for docquery: passage models, the
//! document chunker, the [`IndexBackend`](index::IndexBackend) strategy
//! trait with its dense, TF-IDF and lexical-overlap implementations, the
//! [`Embedder`](embedding::Embedder) trait, and the relevance re-ranker.
//!
//! This crate performs no network or filesystem I/O and does not start an
//! async runtime. Document download, text extraction, embedding providers,
//! and answer generation live in the `docquery` service crate.

pub mod chunk;
pub mod embedding;
pub mod index;
pub mod models;
pub mod rerank;
pub mod vocab;
