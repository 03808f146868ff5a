//! Profiling support via Tracy.
//!
//! Instrumentation is enabled with the `profiling` Cargo feature. Without it,
//! every macro in this module expands to nothing.
//!
//! ```ignore
//! use lantern_core::{frame_mark, profile_scope};
//!
//! fn execute_frame() {
//!     profile_scope!("execute_frame");
//!     // ... run passes ...
//!     frame_mark!();
//! }
//! ```
//!
//! Connect the Tracy client (<https://github.com/wolfpld/tracy/releases>) to a
//! running process built with `--features profiling` to inspect the spans.

#[cfg(feature = "profiling")]
pub use tracy_client::{self, Client, frame_mark as tracy_frame_mark, plot as tracy_plot, span};

/// Start the Tracy client if profiling is enabled.
///
/// Safe to call more than once; returns `true` when a client is running.
pub fn start() -> bool {
    #[cfg(feature = "profiling")]
    {
        let _client = tracy_client::Client::start();
        log::info!("Tracy profiling client started");
        true
    }
    #[cfg(not(feature = "profiling"))]
    {
        false
    }
}

/// Mark the end of a frame.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! frame_mark {
    () => {
        $crate::profiling::tracy_frame_mark()
    };
}

/// Mark the end of a frame.
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! frame_mark {
    () => {};
}

/// Profile the enclosing scope under the given name.
///
/// The span ends when the scope ends.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope {
    ($name:expr) => {
        let _profile_span = $crate::profiling::span!($name);
    };
}

/// Profile the enclosing scope under the given name.
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope {
    ($name:expr) => {};
}

/// Profile the enclosing function.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_function {
    () => {
        let _profile_span = $crate::profiling::span!();
    };
}

/// Profile the enclosing function.
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_function {
    () => {};
}

/// Plot a numeric value over time.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_plot {
    ($name:expr, $value:expr) => {
        $crate::profiling::tracy_plot!($name, $value as f64)
    };
}

/// Plot a numeric value over time.
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_plot {
    ($name:expr, $value:expr) => {
        let _ = $value;
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_macros_compile_in_any_configuration() {
        fn instrumented() -> u32 {
            crate::profile_function!();
            crate::profile_scope!("inner");
            crate::profile_plot!("value", 3u32);
            crate::frame_mark!();
            7
        }
        assert_eq!(instrumented(), 7);
    }

    #[cfg(not(feature = "profiling"))]
    #[test]
    fn test_start_without_feature() {
        assert!(!super::start());
    }
}
