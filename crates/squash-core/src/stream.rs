use crate::error::Result;

/// Outcome of a single `process`/`finish` call on a [`StreamAdaptor`].
///
/// Mirrors the three-valued progress result described in the specification:
/// `Ok` means the codec consumed what it could and is waiting for the next
/// call; `Processing` means the codec has more output to emit from the input
/// it already has (the caller must call again with an empty input slice
/// before refilling); `EndOfStream` means the codec has emitted its final
/// byte and the stream is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessResult {
    Ok,
    Processing,
    EndOfStream,
}

/// Incremental codec interface, wrapping whatever cursor-based state machine
/// the backend crate exposes (zlib's `next_in`/`avail_in`/`next_out`/`avail_out`,
/// zstd's `InBuffer`/`OutBuffer`, ...) behind a uniform slice-based call.
///
/// Invariants (matching the specification's stream adaptor instance):
/// - `total_in()` and `total_out()` are monotonically non-decreasing.
/// - A call only ever reads from `input` and writes into `output`; it never
///   retains a slice past the call.
/// - The adaptor is destroyed (dropped) when the splice completes or errors;
///   no explicit `free` is needed thanks to RAII.
pub trait StreamAdaptor: Send {
    /// Feed `input` and produce into `output`.
    ///
    /// Returns `(bytes_consumed, bytes_produced, result)`. `bytes_consumed`
    /// and `bytes_produced` are always `<= input.len()` / `<= output.len()`.
    fn process(&mut self, input: &[u8], output: &mut [u8]) -> Result<(usize, usize, ProcessResult)>;

    /// Signal that no more input is coming; drain any remaining internal
    /// state into `output`. Called repeatedly (with a fresh `output` slice
    /// each time) until it returns `EndOfStream`.
    fn finish(&mut self, output: &mut [u8]) -> Result<(usize, ProcessResult)>;

    fn total_in(&self) -> u64;

    fn total_out(&self) -> u64;
}
