//! Agent runtime - the tool-calling loop between the model and the database
//!
//! This crate is the "brain" of saleschat. It takes a stored conversation and
//! a new user message, then drives the model until it produces a final answer:
//!
//! 1. **Provider adapters** (`provider`) - Gemini and Ollama behind one
//!    `ModelProvider` trait, normalized to text / function-call parts
//! 2. **Query guard** (`guard`) - static screening of model-written SQL
//!    before anything reaches SQLite
//! 3. **Tool dispatch** (`tools`) - schema introspection, guarded SELECT
//!    execution, table sampling, and chart specs
//! 4. **The loop** (`runtime`) - generate, dispatch calls, feed results
//!    back, regenerate, bounded by a configured iteration cap
//!
//! # Key Types
//!
//! - `AgentRuntime` - Main orchestrator (see `runtime` module)
//! - `ModelProvider` - Pluggable trait for Gemini/Ollama
//! - `ToolDispatcher` - Executes model function calls against the sales DB
//!
//! # Safety Principle
//!
//! The model never touches the database directly. Every query it writes goes
//! through the guard's SELECT-only screen and schema check. Tool failures are
//! folded into error observations instead of aborting the turn, so the model
//! can correct itself.

pub mod guard;
pub mod provider;
pub mod runtime;
pub mod tools;
