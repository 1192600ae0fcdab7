//! Request queueing and per-caller rate limiting.
//!
//! All synthesis flows through a single FIFO queue drained by one worker,
//! so one request holds an engine at a time. Callers get immediate
//! feedback: a position when queued, a rejection when the queue is full or
//! their rate allowance is spent.

mod rate_limit;
mod request_queue;

pub use rate_limit::RateLimiter;
pub use request_queue::{QueueConsumer, QueueItem, QueueItemState, QueueState, RequestQueue};
