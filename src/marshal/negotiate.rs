//! Buffer negotiation protocol for size-reporting native calls
//!
//! Several native entry points report an undersized buffer as status 603
//! and write the required byte count back through the in/out size field.
//! The negotiation loop reallocates and retries until the call succeeds,
//! a terminal status arrives, or the bounded attempt count runs out. On
//! every failure path the buffer is released before the error is returned;
//! on success the buffer holds the populated result.

use crate::config::NegotiationConfig;
use crate::error::{RasError, Result};
use crate::marshal::buffer::{CallParams, CountedCallParams};
use crate::native::status::{ERROR_BUFFER_TOO_SMALL, SUCCESS};

/// Upper bound on negotiation attempts.
///
/// When the native side never raises a size hint the buffer doubles each
/// round, so eight attempts walk a 64-byte default past 16 KiB, beyond any
/// realistic connection array. A native API that still reports 603 at that
/// point is not converging.
pub const MAX_ATTEMPTS: u32 = 8;

/// Default initial buffer size when the caller has no estimate
pub const DEFAULT_INITIAL_SIZE: usize = 64;

/// Sizing policy for one negotiated call
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// First allocation, in bytes
    pub initial_size: usize,
    /// Hard cap on any single allocation, in bytes
    pub max_size: usize,
}

impl RetryPolicy {
    /// Policy with a caller-supplied size estimate
    pub fn with_initial_size(&self, initial_size: usize) -> Self {
        Self {
            initial_size,
            max_size: self.max_size,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_size: DEFAULT_INITIAL_SIZE,
            max_size: 1024 * 1024,
        }
    }
}

impl From<&NegotiationConfig> for RetryPolicy {
    fn from(config: &NegotiationConfig) -> Self {
        Self {
            initial_size: config.initial_buffer_size,
            max_size: config.max_buffer_size,
        }
    }
}

/// Outcome of a single native invocation, as seen by the retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The buffer holds valid data
    Completed,
    /// Status 603: retry with at least `required` bytes
    NeedsLargerBuffer { required: usize },
    /// Terminal native status, surfaced verbatim
    Failed { code: u32 },
}

/// Classify a raw native status into a retry-loop transition.
///
/// 603 is the single status this layer interprets. The required size comes
/// from the in/out count when the native side raised it; otherwise the
/// current allocation doubles.
pub fn classify(status: u32, reported_size: usize, allocated: usize) -> Step {
    match status {
        SUCCESS => Step::Completed,
        ERROR_BUFFER_TOO_SMALL => {
            let required = if reported_size > allocated {
                reported_size
            } else {
                allocated.saturating_mul(2).max(1)
            };
            Step::NeedsLargerBuffer { required }
        }
        code => Step::Failed { code },
    }
}

/// The seam between the retry loop and the two parameter record shapes
pub trait BufferParams {
    fn reset(&mut self, size: usize) -> Result<()>;
    fn release(&mut self);
    /// The in/out byte count after the last invocation
    fn reported_size(&self) -> usize;
    fn allocated_len(&self) -> usize;
}

impl BufferParams for CallParams {
    fn reset(&mut self, size: usize) -> Result<()> {
        CallParams::reset(self, size)
    }

    fn release(&mut self) {
        CallParams::release(self);
    }

    fn reported_size(&self) -> usize {
        self.size()
    }

    fn allocated_len(&self) -> usize {
        CallParams::allocated_len(self)
    }
}

impl BufferParams for CountedCallParams {
    fn reset(&mut self, size: usize) -> Result<()> {
        CountedCallParams::reset(self, size)
    }

    fn release(&mut self) {
        CountedCallParams::release(self);
    }

    fn reported_size(&self) -> usize {
        self.size()
    }

    fn allocated_len(&self) -> usize {
        CountedCallParams::allocated_len(self)
    }
}

/// Drive `op` to completion, growing the buffer as the native side demands.
///
/// On `Ok(())` the params hold the populated buffer, sized by the final
/// successful attempt. On any error the buffer has already been released.
pub fn run<P, F>(params: &mut P, policy: &RetryPolicy, operation: &'static str, mut op: F) -> Result<()>
where
    P: BufferParams,
    F: FnMut(&mut P) -> u32,
{
    let mut size = policy.initial_size.max(1);

    for attempt in 1..=MAX_ATTEMPTS {
        if size > policy.max_size {
            params.release();
            return Err(RasError::Allocation(format!(
                "{operation} requires {size} bytes, above the configured cap of {} bytes",
                policy.max_size
            )));
        }

        params.reset(size)?;
        let status = op(params);

        match classify(status, params.reported_size(), size) {
            Step::Completed => {
                log::debug!("{operation} completed with a {size} byte buffer on attempt {attempt}");
                return Ok(());
            }
            Step::NeedsLargerBuffer { required } => {
                log::debug!(
                    "{operation} reported buffer too small on attempt {attempt}: have {size}, need {required}"
                );
                size = required;
            }
            Step::Failed { code } => {
                params.release();
                return Err(RasError::NativeCall { operation, code });
            }
        }
    }

    params.release();
    Err(RasError::NegotiationExhausted {
        operation,
        attempts: MAX_ATTEMPTS,
    })
}
