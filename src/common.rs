use std::num::{NonZeroU16, NonZeroU32};

/// Stream sample rate (frames per second).
pub type SampleRate = NonZeroU32;

/// Number of channels in a stream.
pub type ChannelCount = NonZeroU16;

/// A single decoded sample value, normalized to `[-1.0, 1.0]`.
pub type Sample = f32;

/// Position of a frame within a stream, counted from the first frame.
///
/// A frame holds one sample for every channel.
pub type FrameIndex = u64;

/// Compile-time check that an error type can be sent between threads, shared,
/// cloned and used as a `std::error::Error`.
macro_rules! assert_error_traits {
    ($to_test:path) => {
        const _: () = {
            const fn assert_error<T: ::std::error::Error + Send + Sync + Clone + 'static>() {}
            assert_error::<$to_test>();
        };
    };
}
pub(crate) use assert_error_traits;
