use std::fmt::{self, Write};
use std::io::Write as _;
use std::sync::Arc;

use parking_lot::{Mutex, const_mutex};

pub trait ConsoleWrite: Send + Sync {
    fn write(&self, s: &str);
}

/// Writes everything to the process' standard error stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrConsole;

impl ConsoleWrite for StderrConsole {
    fn write(&self, s: &str) {
        let _ = std::io::stderr().lock().write_all(s.as_bytes());
    }
}

struct Console {
    console: Option<Arc<dyn ConsoleWrite>>,
}

static CONSOLE: Mutex<Console> = const_mutex(Console::new());

impl Console {
    const fn new() -> Self {
        Self { console: None }
    }
}

impl Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        match self.console.as_ref() {
            Some(console) => console.write(s),
            None => StderrConsole.write(s),
        }
        Ok(())
    }
}

/// Install `console` as the sink for every macro in this crate. Until one is
/// installed, output goes to [`StderrConsole`].
///
/// # Returns
/// The previously installed console, if any.
pub fn set_console(console: Arc<dyn ConsoleWrite>) -> Option<Arc<dyn ConsoleWrite>> {
    CONSOLE.lock().console.replace(console)
}

/// Remove the installed console. Output falls back to [`StderrConsole`].
pub fn take_console() -> Option<Arc<dyn ConsoleWrite>> {
    CONSOLE.lock().console.take()
}

#[doc(hidden)]
pub fn do_print(args: fmt::Arguments) {
    let _ = CONSOLE.lock().write_fmt(args);
}

#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        $crate::do_print(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! println {
    () => {
        $crate::print!("\n")
    };
    ($($arg:tt)*) => {
        $crate::print!("{}\n", format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! println_warn {
    ($($arg:tt)*) => {
        $crate::println!("[sync: warn] {}", format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! println_debug {
    ($($arg:tt)*) => {
        $crate::println!("[sync:debug] {}", format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! println_info {
    ($($arg:tt)*) => {
        $crate::println!("[sync: info] {}", format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! println_fatal {
    () => {
        $crate::println!("[sync:fatal] ")
    };
    ($($arg:tt)*) => {
        $crate::println!("[sync:fatal] {}", format_args!($($arg)*))
    };
}

/// Print only if the *calling* crate was built with feature `$feat`.
#[macro_export]
macro_rules! println_trace {
    ($feat:literal) => {{
        #[deny(unexpected_cfgs)]
        {
            #[cfg(feature = $feat)]
            $crate::println!("[sync:trace] ");
        }
    }};
    ($feat:literal, $($arg:tt)*) => {{
        #[deny(unexpected_cfgs)]
        {
            #[cfg(feature = $feat)]
            $crate::println!("[sync:trace] {}", format_args!($($arg)*));
        }
    }};
}
