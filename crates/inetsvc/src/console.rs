//! Operator-facing console text.

use std::fmt;
use std::io::Write;

/// Startup banner printed on every invocation.
#[must_use]
pub fn banner(service_name: &str) -> String {
    format!("({service_name}) version {}\n", inetsvc_lib::VERSION)
}

/// Usage text printed before handing the process to the service manager.
#[must_use]
pub fn usage(program: &str) -> String {
    format!(
        "{program} --install         to install the service\n\
         {program} --remove          to remove the service\n\
         {program} --debug <params>  to run as a console app for debugging\n"
    )
}

/// Write operator output, ignoring a console that cannot be written to.
pub(crate) fn say<W: Write + ?Sized>(out: &mut W, args: fmt::Arguments<'_>) {
    if let Err(e) = out.write_fmt(args).and_then(|()| out.flush()) {
        tracing::debug!(error = %e, "Console write failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banner_names_service_and_version() {
        assert_eq!(
            banner("inetsvc"),
            format!("(inetsvc) version {}\n", inetsvc_lib::VERSION)
        );
    }

    #[test]
    fn usage_lists_every_mode() {
        let text = usage("inetsvc");
        for flag in ["--install", "--remove", "--debug"] {
            assert!(text.contains(&format!("inetsvc {flag}")));
        }
    }
}
