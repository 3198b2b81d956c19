//! Command dispatcher - parses operator lines and runs the matching handler

use super::handlers::{self, HandlerResult};
use crate::context::AppContext;
use std::sync::Arc;
use tf1_shared::operator::Reply;
use tracing::{debug, warn};

/// NACK reason for names missing from the command table
pub const UNKNOWN_COMMAND: &str = "unknown command";

/// Operator commands understood by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    Iden,
    GetInterval,
    GetWl,
    SetWl,
    Sweep,
    Powerup,
    GetPower,
    GetTemp,
    Reset,
    GetPos,
    SetPos,
    Stop,
    SweepStatus,
}

/// Name table, scanned in order
const COMMAND_TABLE: &[(&str, OperatorCommand)] = &[
    ("iden", OperatorCommand::Iden),
    ("get-interval", OperatorCommand::GetInterval),
    ("get-wl", OperatorCommand::GetWl),
    ("set-wl", OperatorCommand::SetWl),
    ("sweep", OperatorCommand::Sweep),
    ("powerup", OperatorCommand::Powerup),
    ("get-power", OperatorCommand::GetPower),
    ("get-temp", OperatorCommand::GetTemp),
    ("reset", OperatorCommand::Reset),
    ("get-pos", OperatorCommand::GetPos),
    ("set-pos", OperatorCommand::SetPos),
    ("stop", OperatorCommand::Stop),
    ("sweep-status", OperatorCommand::SweepStatus),
];

impl OperatorCommand {
    pub fn lookup(name: &str) -> Option<Self> {
        COMMAND_TABLE
            .iter()
            .find(|(entry, _)| *entry == name)
            .map(|(_, command)| *command)
    }

    pub fn name(self) -> &'static str {
        COMMAND_TABLE
            .iter()
            .find(|(_, command)| *command == self)
            .map_or("?", |(name, _)| name)
    }
}

/// Split a line into command name and argument text at the first `?`, `:`
/// or whitespace
pub fn split_command(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.find(|c: char| c == '?' || c == ':' || c.is_ascii_whitespace()) {
        Some(at) => (&line[..at], &line[at + 1..]),
        None => (line, ""),
    }
}

/// Runs operator command lines against the application context
#[derive(Clone)]
pub struct CommandDispatcher {
    ctx: Arc<AppContext>,
}

impl CommandDispatcher {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Run one command line and build its reply.
    ///
    /// Returns `None` for a line without a command name.
    pub async fn dispatch(&self, line: &str) -> Option<Reply> {
        let (name, args) = split_command(line);
        if name.is_empty() {
            warn!("Ignoring command line without a name: '{}'", line);
            return None;
        }

        let Some(command) = OperatorCommand::lookup(name) else {
            warn!("Unknown command: {}", name);
            return Some(Reply::nack(UNKNOWN_COMMAND));
        };

        debug!("Dispatching {:?} with args '{}'", command, args);
        let reply = match self.execute(command, args).await {
            Ok(text) => Reply::ack(text),
            Err(e) => {
                warn!("Command {} failed: {}", command.name(), e);
                Reply::nack(e.name())
            }
        };
        Some(reply)
    }

    async fn execute(&self, command: OperatorCommand, args: &str) -> HandlerResult {
        let ctx = self.ctx.as_ref();
        match command {
            OperatorCommand::Iden => handlers::handle_iden(ctx, args).await,
            OperatorCommand::GetInterval => handlers::handle_get_interval(ctx, args).await,
            OperatorCommand::GetWl => handlers::handle_get_wl(ctx, args).await,
            OperatorCommand::SetWl => handlers::handle_set_wl(ctx, args).await,
            OperatorCommand::Sweep => handlers::handle_sweep(ctx, args).await,
            OperatorCommand::Powerup => handlers::handle_powerup(ctx, args).await,
            OperatorCommand::GetPower => handlers::handle_get_power(ctx, args).await,
            OperatorCommand::GetTemp => handlers::handle_get_temp(ctx, args).await,
            OperatorCommand::Reset => handlers::handle_reset(ctx, args).await,
            OperatorCommand::GetPos => handlers::handle_get_pos(ctx, args).await,
            OperatorCommand::SetPos => handlers::handle_set_pos(ctx, args).await,
            OperatorCommand::Stop => handlers::handle_stop(ctx, args).await,
            OperatorCommand::SweepStatus => handlers::handle_sweep_status(ctx, args).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::SimulatedBus;
    use crate::context::testing::simulated_context;

    fn dispatcher() -> (CommandDispatcher, SimulatedBus) {
        let (ctx, sim) = simulated_context();
        (CommandDispatcher::new(Arc::new(ctx)), sim)
    }

    #[test]
    fn test_split_command() {
        assert_eq!(split_command("get-wl?C"), ("get-wl", "C"));
        assert_eq!(split_command("set-wl:C:1550.5"), ("set-wl", "C:1550.5"));
        assert_eq!(split_command("set-wl C:1550.0"), ("set-wl", "C:1550.0"));
        assert_eq!(split_command("iden"), ("iden", ""));
        assert_eq!(split_command(" powerup \r"), ("powerup", ""));
        assert_eq!(split_command("?C"), ("", "C"));
    }

    #[test]
    fn test_table_lookup() {
        for (name, command) in COMMAND_TABLE {
            assert_eq!(OperatorCommand::lookup(name), Some(*command));
            assert_eq!(command.name(), *name);
        }
        assert_eq!(OperatorCommand::lookup("GET-WL"), None);
        assert_eq!(OperatorCommand::lookup("get"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_command() {
        let (dispatcher, sim) = dispatcher();
        assert_eq!(
            dispatcher.dispatch("frobnicate?C").await,
            Some(Reply::nack("unknown command"))
        );
        assert!(sim.transfers().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_name_has_no_reply() {
        let (dispatcher, _) = dispatcher();
        assert_eq!(dispatcher.dispatch("?C").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_rendering() {
        let (dispatcher, _) = dispatcher();
        assert_eq!(
            dispatcher.dispatch("get-interval?C").await.unwrap().to_string(),
            ":ACK: (1527.608,1565.503)"
        );
        assert_eq!(
            dispatcher.dispatch("set-wl:C:1550.5").await.unwrap().to_string(),
            ":ACK"
        );
        assert_eq!(
            dispatcher.dispatch("get-wl?X").await.unwrap().to_string(),
            ":NACK: ArgumentError"
        );
        assert_eq!(
            dispatcher.dispatch("set-wl:C:1600").await.unwrap().to_string(),
            ":NACK: DeviceError"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_is_nacked() {
        let (dispatcher, sim) = dispatcher();
        sim.fail_next_read();
        assert_eq!(
            dispatcher.dispatch("get-temp?L").await,
            Some(Reply::nack("TransportError"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_protocol_failure_is_nacked() {
        let (dispatcher, sim) = dispatcher();
        sim.corrupt_next_reply();
        assert_eq!(
            dispatcher.dispatch("get-temp?C").await,
            Some(Reply::nack("ProtocolError"))
        );
    }
}
