//! Stderr reporting for failures that are contained rather than
//! propagated (failed async subtrees, unusable spread values).

#[macro_export]
macro_rules! warn {
    ($fmt:expr $(, $arg:expr)*) => {
        eprintln!(concat!("W: ", $fmt, " at {:?} line {}") $(, $arg)*,
                  file!(), line!())
    }
}

#[macro_export]
macro_rules! nowarn {
    ($fmt:expr $(, $arg:expr)*) => {};
}
