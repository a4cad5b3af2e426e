use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use tracing::info;

/// The single process-wide handle that lets the signal-handling thread reach
/// into the control thread's main loop. This is the only global in the
/// process; everything else is owned by `Graph`/`Supervisor` in `main`.
static MAIN_LOOP: OnceCell<glib::MainLoop> = OnceCell::new();

/// Register `main_loop` as the target for SIGINT/SIGTERM and spawn the
/// watcher thread. Must be called exactly once, before `main_loop.run()`.
pub fn install(main_loop: glib::MainLoop) -> Result<()> {
    MAIN_LOOP
        .set(main_loop)
        .map_err(|_| anyhow::anyhow!("signal handler already installed"))?;

    let mut signals = signal_hook::iterator::Signals::new([
        signal_hook::consts::SIGINT,
        signal_hook::consts::SIGTERM,
    ])
    .context("failed to register signal handlers")?;

    std::thread::Builder::new()
        .name("signal-watcher".into())
        .spawn(move || {
            if let Some(sig) = signals.forever().next() {
                info!(signal = sig, "received shutdown signal, stopping main loop");
                if let Some(main_loop) = MAIN_LOOP.get() {
                    main_loop.quit();
                }
            }
        })
        .context("failed to spawn signal watcher thread")?;

    Ok(())
}
