pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod friends;
pub mod identity;
pub mod mailer;
pub mod security;
pub mod storage;

// Test-only printing helper: expands to eprintln! during tests/debug and is
// a formatting-checked no-op otherwise.
// Usage in tests: tprintln!("debug: {}", value);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        // Preserve formatting checks in release without producing code
        if false { let _ = format!($($arg)*); }
    });
}
