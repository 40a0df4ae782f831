//! Argument-list macros.

/// Build an array of [`Argument`](crate::Argument)s from native values.
///
/// Each value goes through `Argument::from`, so `i32`, `f32`, `&str`, `&[u8]`,
/// `bool`, `i64`, `f64`, `NtpTime` and `MidiFrame` can be mixed freely.
///
/// # Example
/// ```
/// use tjost_osc::{osc_args, Argument};
///
/// let args = osc_args![1i32, "gain", 0.5f32, true];
/// assert_eq!(args[1], Argument::String("gain"));
/// assert_eq!(args[3], Argument::True);
/// ```
#[macro_export]
macro_rules! osc_args {
    () => {{
        let args: [$crate::Argument<'static>; 0] = [];
        args
    }};
    ($($arg:expr),+ $(,)?) => {
        [$($crate::Argument::from($arg)),+]
    };
}
