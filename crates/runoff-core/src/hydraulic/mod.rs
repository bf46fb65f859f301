//! Runoff routing: static flow graph → Manning flux → three-phase solver.
pub mod flow_graph;
pub mod manning;
pub mod solver;

pub use flow_graph::{build_flow_graph, compute_flow_links, steepest_descent};
pub use manning::{ManningParams, MIN_LINK_DISTANCE};
pub use solver::ManningSolver;
