use serde::{Deserialize, Serialize};

/// Tick-counted timing for one node.
///
/// Every ceiling is measured in ticks of `tick_ms`. All nodes on a bus are
/// expected to run with the same values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Tick period in milliseconds. Default: 50.
    pub tick_ms: u32,
    /// Ticks a received frame may hold the channel before it is force-released.
    pub send_reply_timeout: u8,
    /// Ticks to wait for the reply to an outbound request.
    pub receive_reply_timeout: u8,
    /// Upper bound of a slave's random backoff after bus activity.
    pub bus_wait_max: u8,
    /// Ticks per roster tick (one second at the default tick period).
    pub roster_tick_cycles: u8,
    /// Roster ticks between liveness pings.
    pub ping_period: u8,
    /// Consecutive unanswered pings before a slave is evicted.
    pub max_ping_errors: u8,
    /// Ticks of continuous bus presence before a slave tries to join.
    pub plug_in_ticks: u8,
    /// Ticks of lost presence before a slave resets.
    pub disconnect_ticks: u8,
    /// Ticks a slave may spend in the handshake before it resets.
    pub no_config_ticks: u8,
    /// Ticks a connected slave tolerates without being pinged.
    pub no_ping_ticks: u16,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_ms: 50,
            send_reply_timeout: 4,
            receive_reply_timeout: 4,
            bus_wait_max: 20,
            roster_tick_cycles: 20,
            ping_period: 5,
            max_ping_errors: 3,
            plug_in_ticks: 20,
            disconnect_ticks: 10,
            no_config_ticks: 40,
            no_ping_ticks: 1200,
        }
    }
}
