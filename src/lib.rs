//! Conversational search service: answers natural-language questions from
//! web search results, optionally summarized by a generative model, and
//! keeps a per-user history organized into collections.

pub mod api;
pub mod auth;
pub mod config;
pub mod data_models;
pub mod db;
pub mod error;
pub mod fallback_answer;
pub mod fallback_links;
pub mod memory_store;
pub mod orchestrator;
pub mod store;
pub mod summarizer;
pub mod web_search;
