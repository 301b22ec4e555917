//! Final stage: stereo block → interleaved device buffer

use crate::state::OutputMode;
use crate::types::StereoSample;

#[inline]
fn route(frame: StereoSample, mode: OutputMode) -> StereoSample {
    match mode {
        OutputMode::Stereo => frame,
        OutputMode::Mono => StereoSample::mono(frame.mid()),
        OutputMode::LeftOnly => StereoSample::mono(frame.left),
        OutputMode::RightOnly => StereoSample::mono(frame.right),
    }
}

/// Write `block` into `output` (interleaved, `channels` per frame)
///
/// A mono device receives the routed mid signal; channels beyond the
/// second are zeroed.
pub fn write_interleaved(block: &[StereoSample], mode: OutputMode, output: &mut [f32], channels: usize) {
    if channels == 0 {
        return;
    }
    for (frame, slot) in block.iter().zip(output.chunks_exact_mut(channels)) {
        let routed = route(*frame, mode);
        if channels == 1 {
            slot[0] = routed.mid();
            continue;
        }
        slot[0] = routed.left;
        slot[1] = routed.right;
        slot[2..].fill(0.0);
    }
}
