use std::fs;
use std::time::{Duration, Instant};

use bytes::Bytes;

use pipelink_channel::{Channel, ChannelConfig};
use pipelink_transport::Endpoint;

use crate::cmd::SendArgs;
use crate::exit::{channel_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::heartbeat::Heartbeat;
use crate::output::OutputFormat;

pub fn run(args: SendArgs, _format: OutputFormat) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let drain_timeout = parse_duration(&args.drain_timeout)?;
    if args.repeat == 0 {
        return Err(CliError::new(USAGE, "--repeat must be greater than zero"));
    }

    let config = ChannelConfig {
        endpoint: args
            .path
            .as_ref()
            .map(Endpoint::with_path)
            .unwrap_or_else(Endpoint::resolve),
        ..ChannelConfig::default()
    };
    let channel: Channel<Bytes> = Channel::with_config("pipelink-cli", config);

    channel
        .connect()
        .map_err(|err| channel_error("connect failed", err))?;

    for seq in 0..args.repeat {
        let payload = resolve_payload(&args, seq)?;
        channel
            .send(payload)
            .map_err(|err| channel_error("send failed", err))?;

        if !interval.is_zero() && seq + 1 < args.repeat {
            std::thread::sleep(interval);
        }
    }

    let drained = wait_for_drain(&channel, drain_timeout);
    channel.disconnect();

    if drained {
        Ok(SUCCESS)
    } else {
        Err(CliError::new(
            TIMEOUT,
            "outbound queue did not drain before timeout",
        ))
    }
}

fn resolve_payload(args: &SendArgs, seq: u64) -> CliResult<Bytes> {
    if args.heartbeat {
        return Ok(Bytes::from(Heartbeat::new(seq).to_bytes()));
    }
    if let Some(json) = &args.json {
        serde_json::from_str::<serde_json::Value>(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
        return Ok(Bytes::copy_from_slice(json.as_bytes()));
    }
    if let Some(data) = &args.data {
        return Ok(Bytes::copy_from_slice(data.as_bytes()));
    }
    if let Some(path) = &args.file {
        let data = fs::read(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        })?;
        return Ok(Bytes::from(data));
    }
    Ok(Bytes::new())
}

/// Poll until the writer thread has pushed every queued message onto the
/// wire, or the deadline passes. The channel offers no completion signal
/// per message, so the queue depth is the only observable.
fn wait_for_drain(channel: &Channel<Bytes>, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if channel.pending_outbound() == 0 {
            return true;
        }
        if !channel.is_connected() || Instant::now() >= deadline {
            return channel.pending_outbound() == 0;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}
