use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;

use serde_json::json;

use carepath::config::{self, CareConfig};
use carepath::messaging::LoggingGateway;
use carepath::{CareCoordinator, InboundMessage};

fn main() -> ExitCode {
    carepath::init_tracing();
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = match CareConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    let care = match CareCoordinator::from_config(config, Arc::new(LoggingGateway)) {
        Ok(care) => care,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start care core");
            return ExitCode::FAILURE;
        }
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    match process_lines(&care, stdin.lock(), stdout.lock()) {
        Ok(handled) => {
            tracing::info!(handled, "Input closed");
            match care.flush_audit() {
                Ok(_) => ExitCode::SUCCESS,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to flush audit records");
                    ExitCode::FAILURE
                }
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "I/O failure");
            ExitCode::FAILURE
        }
    }
}

/// One JSON inbound message per line in, one JSON outcome per line out.
/// Bad lines produce an `{"error": ...}` line and processing continues.
fn process_lines<R: BufRead, W: Write>(
    care: &CareCoordinator,
    input: R,
    mut output: W,
) -> io::Result<usize> {
    let mut handled = 0;
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<InboundMessage>(&line) {
            Ok(message) => match care.handle_inbound(&message) {
                Ok(outcome) => {
                    handled += 1;
                    serde_json::to_value(&outcome)
                        .unwrap_or_else(|e| json!({ "error": e.to_string() }))
                }
                Err(e) => json!({ "error": e.to_string() }),
            },
            Err(e) => json!({ "error": format!("malformed message: {e}") }),
        };

        writeln!(output, "{reply}")?;
        output.flush()?;
    }
    Ok(handled)
}
