//! stdin/stdout passthrough loop
//!
//! Each stdin line becomes one frame; each received frame is printed as one
//! stdout line. The loop polls the channel with a short read timeout so the
//! stop flag (set by the signal handler in `main`) is observed promptly, and
//! closes the channel on the way out.

use anyhow::{Context, Result};
use aoa::AoaBridge;
use aoa::usb::UsbBackend;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, TryRecvError};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Read poll interval; bounds how long a stop request can go unnoticed
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Per-transfer timeout for outgoing frames
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

pub fn run<B: UsbBackend>(mut bridge: AoaBridge<B>, stop: Arc<AtomicBool>) -> Result<()> {
    let (tx, rx) = mpsc::channel::<String>();

    // Dedicated stdin reader; it parks on read_line and is simply abandoned
    // when the process exits.
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("stdin read failed: {}", e);
                    break;
                }
            }
        }
        debug!("stdin reached EOF");
    });

    let mut stdout = io::stdout();

    while !stop.load(Ordering::Relaxed) {
        loop {
            match rx.try_recv() {
                Ok(line) => {
                    // Empty messages are not framable (0 is the close
                    // sentinel); skip blank lines.
                    if line.is_empty() {
                        continue;
                    }
                    bridge
                        .write(line.as_bytes(), Some(WRITE_TIMEOUT))
                        .context("Failed to send frame")?;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        match bridge.read(Some(POLL_INTERVAL)).context("Failed to read frame")? {
            Some(payload) if payload.is_empty() => {
                info!("Peer closed the channel");
                bridge.close()?;
                return Ok(());
            }
            Some(payload) => {
                stdout.write_all(&payload).context("Failed to write to stdout")?;
                stdout.write_all(b"\n")?;
                stdout.flush()?;
            }
            None => {}
        }
    }

    debug!("Stop requested, closing channel");
    bridge.close()?;
    Ok(())
}
