//! Process utilities.

mod prune;
mod shutdown;
pub use prune::prune_loop;
pub use shutdown::Shutdown;
