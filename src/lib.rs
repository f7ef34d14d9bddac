//! Decision capsules: a persistent knowledge base of engineering decisions.
//!
//! A capsule records one decision or finding made during a work session: the
//! question, the choice, the rationale and alternatives, and how it relates to
//! other capsules. Capsules are grouped per session into a single markdown
//! file and queried by file, tag, free text, recency, or dependency graph.
//!
//! # Architecture
//!
//! - **Storage**: one consolidated markdown file per session under
//!   `<root>/sessions/<session>/capsules.md`, rewritten whole on every change
//! - **Recall**: tiered strategies (file, git history, tag, text, repo, recent)
//!   merged by best match and rendered within a token budget
//! - **Similarity**: lexical duplicate and contradiction checks over keyword sets
//! - **Transport**: MCP over stdio (primary) or Streamable HTTP
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`error`] — The [`CapsuleError`](error::CapsuleError) taxonomy
//! - [`capsule`] — Capsule model, codec, store, similarity, graph, and recall
//! - [`sources`] — Session metadata, repository registry, and git log collaborators

pub mod capsule;
pub mod config;
pub mod error;
pub mod sources;
