//! Resilience Primitives
//!
//! Deadlines, wall-clock budgets and the retry combinator shared by every
//! external call in the pipeline.

pub mod budget;
pub mod invoker;
pub mod timeout;

pub use budget::TimeBudget;
pub use invoker::{ResilientInvoker, RetryPolicy, invoke};
pub use timeout::with_timeout;
