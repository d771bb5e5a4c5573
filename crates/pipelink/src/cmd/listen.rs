use crate::cmd::ListenArgs;
use crate::exit::CliResult;
use crate::output::OutputFormat;

#[cfg(unix)]
pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    unix::run(args, format)
}

#[cfg(not(unix))]
pub fn run(_args: ListenArgs, _format: OutputFormat) -> CliResult<i32> {
    // Acting as the manager side requires a listener, which only the Unix
    // transport provides. The client side (send) works on all platforms.
    Err(crate::exit::CliError::new(
        crate::exit::TRANSPORT_ERROR,
        "listen requires a Unix domain socket listener; not available on this platform",
    ))
}

#[cfg(unix)]
mod unix {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use tracing::info;

    use pipelink_frame::{FrameError, FrameReader};
    use pipelink_transport::{Endpoint, UdsListener};

    use crate::cmd::ListenArgs;
    use crate::exit::{transport_error, CliError, CliResult, INTERNAL, SUCCESS};
    use crate::output::{print_message, OutputFormat};

    pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
        let endpoint = args
            .path
            .as_ref()
            .map(Endpoint::with_path)
            .unwrap_or_else(Endpoint::resolve);

        let listener =
            UdsListener::bind(&endpoint).map_err(|err| transport_error("bind failed", err))?;
        let endpoint_label = endpoint.to_string();

        let running = Arc::new(AtomicBool::new(true));
        install_ctrlc_handler(running.clone())?;

        let mut printed = 0usize;

        while running.load(Ordering::SeqCst) {
            let stream = match listener.accept() {
                Ok(stream) => stream,
                Err(err) => return Err(transport_error("accept failed", err)),
            };
            match stream.peer_credentials() {
                Some((uid, gid, pid)) => info!(uid, gid, pid, "client connected"),
                None => info!("client connected"),
            }

            let mut reader = FrameReader::new(stream);
            while running.load(Ordering::SeqCst) {
                let payload = match reader.read_frame() {
                    Ok(payload) => payload,
                    Err(FrameError::ConnectionClosed) => {
                        info!("client disconnected");
                        break;
                    }
                    Err(err) => return Err(crate::exit::frame_error("receive failed", err)),
                };

                print_message(&payload, printed, &endpoint_label, format);
                printed = printed.saturating_add(1);

                if let Some(count) = args.count {
                    if printed >= count {
                        return Ok(SUCCESS);
                    }
                }
            }
        }

        Ok(SUCCESS)
    }

    fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })
        .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
    }
}
