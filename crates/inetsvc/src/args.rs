//! Conversion of invocation arguments into the daemon's string form.

use std::ffi::OsString;

/// Convert OS-native arguments to UTF-8, replacing unrepresentable data.
///
/// # Examples
/// ```
/// use inetsvc::args::to_narrow;
/// use std::ffi::OsString;
///
/// let args = to_narrow([OsString::from("inetsvc"), OsString::from("-p")]);
/// assert_eq!(args, vec!["inetsvc", "-p"]);
/// ```
pub fn to_narrow<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| arg.into_string().unwrap_or_else(|raw| raw.to_string_lossy().into_owned()))
        .collect()
}

/// The daemon's argument vector: `program` followed by `forwarded`.
pub fn daemon_argv(program: String, forwarded: Vec<String>) -> Vec<String> {
    std::iter::once(program).chain(forwarded).collect()
}

/// Name the process was invoked as, falling back to `default`.
#[must_use]
pub fn program_name(default: &str) -> String {
    std::env::args_os()
        .next()
        .map_or_else(|| default.to_owned(), |arg| arg.to_string_lossy().into_owned())
}
