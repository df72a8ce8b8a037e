//! Stack growth for recursive graph walks.
//!
//! Scope membership is pulled in recursively along value inputs and flow
//! successors, the compiler lowers expressions post-order, and nested
//! conditionals recurse once per `else if`. A generated or pasted program
//! can chain thousands of nodes, so every such walk goes through
//! [`ensure_sufficient_stack`].
//!
//! On native targets the `stacker` crate allocates a new segment when the
//! remaining stack falls under [`RED_ZONE`]. On wasm the closure is called
//! directly.

/// Remaining stack below which a new segment is allocated.
pub const RED_ZONE: usize = 64 * 1024;

/// Size of each freshly allocated segment.
pub const SEGMENT_SIZE: usize = 1024 * 1024;

/// Run `f`, growing the stack first when less than [`RED_ZONE`] is left.
///
/// ```text
/// fn lower(&mut self, graph: &Graph, node: NodeId) {
///     ensure_sufficient_stack(|| {
///         for input in graph.node(node).inputs() {
///             self.lower(graph, input);
///         }
///     });
/// }
/// ```
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, SEGMENT_SIZE, f)
}

/// Wasm manages its own stack; call through.
#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
