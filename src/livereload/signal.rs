//! Interrupt interception.
//!
//! The first Ctrl+C cancels the live-reload engine so streams and the watcher
//! wind down, then the signal is handed back to the default disposition and
//! the process terminates as it would have without us.

use std::io;
use std::sync::Arc;

use super::shutdown::ShutdownTrigger;

#[cfg(unix)]
pub(crate) fn intercept_interrupt(trigger: Arc<ShutdownTrigger>) -> io::Result<()> {
    use signal_hook::consts::SIGINT;
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT])?;
    let handle = signals.handle();

    std::thread::Builder::new()
        .name("loadr-signal".into())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                crate::log!("reload"; "interrupt received, stopping live reload");
                trigger.cancel();
                handle.close();
                if let Err(e) = signal_hook::low_level::emulate_default_handler(signal) {
                    crate::log!("error"; "failed to re-raise interrupt: {}", e);
                    std::process::exit(130);
                }
            }
        })?;

    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn intercept_interrupt(trigger: Arc<ShutdownTrigger>) -> io::Result<()> {
    ctrlc::set_handler(move || {
        crate::log!("reload"; "interrupt received, stopping live reload");
        trigger.cancel();
        std::process::exit(130);
    })
    .map_err(io::Error::other)
}
