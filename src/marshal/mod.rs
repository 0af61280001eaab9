//! Native call buffering and structured marshaling
//!
//! The native remote access component returns variably-sized arrays of
//! fixed-layout records through caller-owned buffers, reporting an
//! insufficient buffer as a retriable status code. This module owns that
//! machinery: exclusive buffer ownership across the retry loop, the bounded
//! negotiation protocol itself, and the decoding of count-prefixed record
//! sequences out of a populated buffer.

pub mod buffer;
pub mod negotiate;
pub mod records;

pub use buffer::{allocation_counters, CallParams, CountedCallParams, NativeBuffer};
pub use negotiate::{BufferParams, RetryPolicy, MAX_ATTEMPTS};
pub use records::{FixedRecord, RecordSeq};
