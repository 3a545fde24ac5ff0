// Logging is compiled out entirely unless the 'logging' feature is enabled.
// Arguments are still type checked by the 'log' macros when it is.

#[allow(unused_macros)]
macro_rules! log {
    ($($tt:tt)*) => {
        #[cfg(feature = "logging")]
        {
            $($tt)*
        }
    }
}

#[allow(unused_macros)]
macro_rules! debug {
    ($($tt:tt)*) => { log!(log::debug!($($tt)*)) }
}

#[allow(unused_macros)]
macro_rules! trace {
    ($($tt:tt)*) => { log!(log::trace!($($tt)*)) }
}
