use serde::Serialize;

use pipelink_transport::{platform_transport, Endpoint};

use crate::cmd::EndpointArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct EndpointOutput {
    path: String,
    transport: &'static str,
    exists: bool,
    runtime_dir: Option<String>,
}

pub fn run(_args: EndpointArgs, format: OutputFormat) -> CliResult<i32> {
    let endpoint = Endpoint::resolve();
    let transport = platform_transport();

    let output = EndpointOutput {
        path: endpoint.to_string(),
        transport: transport.name(),
        exists: endpoint.path().exists(),
        runtime_dir: std::env::var("XDG_RUNTIME_DIR").ok(),
    };

    print_endpoint(&output, format);
    Ok(SUCCESS)
}

fn print_endpoint(output: &EndpointOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(output).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("manager endpoint\n");
            println!("  Path:        {}", output.path);
            println!("  Transport:   {}", output.transport);
            println!("  Exists:      {}", output.exists);
            println!(
                "  Runtime dir: {}",
                output.runtime_dir.as_deref().unwrap_or("(not set)")
            );
        }
        OutputFormat::Raw => println!("{}", output.path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_output_serializes() {
        let out = EndpointOutput {
            path: "/tmp/minecraft_manager".to_string(),
            transport: "unix-domain-socket",
            exists: false,
            runtime_dir: None,
        };
        let json = serde_json::to_string(&out).expect("endpoint output should serialize");
        assert!(json.contains("\"path\""));
        assert!(json.contains("\"transport\""));
    }
}
