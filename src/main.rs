//! Binary entrypoint that launches the ReHomeBud chat server.

use std::process::ExitCode;

use rehomebud_chat::start_rehomebud_chat;

/// Start the chat server and block until shutdown.
fn main() -> ExitCode {
    start_rehomebud_chat::run()
}
