//! The six interchangeable LMD-GHOST head-selection strategies (spec.md
//! §4.3), all implementing `ghost_dag::ForkChoice` over the same arena.
//! `proto_array` lives in its own crate (`proto_array_fork_choice`): it
//! does not build on `ghost_dag::Arena` at all, so it has no dependency
//! on this one.

mod cached;
#[cfg(test)]
mod properties;
mod simple_back_prop;
mod spec;
mod stateful;
mod vitalik;

pub use cached::Cached;
pub use simple_back_prop::SimpleBackProp;
pub use spec::Spec;
pub use stateful::Stateful;
pub use vitalik::Vitalik;
