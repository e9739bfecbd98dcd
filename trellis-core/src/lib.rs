//! Trellis Core
//!
//! This crate provides the claim graph at the center of the Trellis
//! template compiler: an incremental, demand-driven computation graph
//! that every compiler phase (HTML lowering, expression parsing,
//! resource resolution, AOT emission, editor queries) plugs into to get
//! correct, minimal re-computation as inputs change.
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `graph`: node identity, state storage, and dependency edges
//! - `engine`: the callback registry, pull engine, staleness
//!   propagation, and convergence driver
//!
//! # How phases use the graph
//!
//! Producers (file readers, upstream phases) seed leaf nodes with
//! [`ClaimGraph::set_input_value`]. Consumers register a callback per
//! node kind and [`ClaimGraph::pull`] whatever node they need; the
//! engine recursively pulls dependencies, caches fresh values, and only
//! re-runs work downstream of an actual change.
//!
//! # Example
//!
//! ```
//! use trellis_core::{ClaimGraph, EvalOutput};
//!
//! let mut graph: ClaimGraph<String, String> = ClaimGraph::new();
//! let file = graph.create_node("file", "app.html");
//! let template = graph.create_node("template", "app.html");
//!
//! graph.register_callback("template", move |_id, ctx| {
//!     let source = ctx.pull(file)?;
//!     let green = source.green().cloned().unwrap_or_default();
//!     Ok(EvalOutput {
//!         green: format!("template({green})"),
//!         red: format!("lowered({green})"),
//!     })
//! });
//!
//! graph.set_input_value(file, "<div/>".to_string(), "<div/>".to_string());
//! let lowered = graph.pull(template)?;
//! assert_eq!(lowered.green().map(String::as_str), Some("template(<div/>)"));
//! # Ok::<(), trellis_core::GraphError>(())
//! ```

pub mod engine;
pub mod graph;

pub use engine::{
    CallbackRegistry, ClaimGraph, Convergence, EqualityFn, EvalOutput, EvaluateCallback,
    EvaluationContext, GraphError, GraphOptions, PullResult, DEFAULT_CONVERGENCE_BUDGET,
};
pub use graph::{Edge, EdgeKind, Freshness, NodeId, NodeState};
