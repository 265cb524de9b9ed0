use super::*;

/// Folds events into a per-`(window, key)` accumulator of constant size.
///
/// Ratios and averages are derived in [`get_result`](Self::get_result) when
/// the window is finalized, never kept as running values.
pub trait AggregateFunction<IN, ACC, OUT>: Send {
    /// Empty state for a window that just received its first event.
    fn create_accumulator(&self) -> ACC;
    fn add(&self, acc: &mut ACC, element: &IN);
    /// Finalize; the accumulator is consumed because the window is evicted.
    fn get_result(&self, acc: ACC) -> OUT;
}
