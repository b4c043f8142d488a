// MIT License - Copyright (c) 2026 Peter Wright
// Engine configuration

use std::time::Duration;

use crate::constants::{ACK_TIMEOUT_INBOUND, MAX_SEND_ATTEMPTS};

/// Device name that selects the in-memory link instead of a serial port.
pub const LOOPBACK_DEVICE: &str = "loopback";

/// Configuration for the protocol engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Serial device path, or [`LOOPBACK_DEVICE`]
    pub device: String,
    /// Idle backoff between loop iterations, also the per-byte read deadline
    pub poll_interval: Duration,
    /// How long to wait for the panel to ACK an outbound frame
    pub ack_timeout: Duration,
    /// Transmissions of one frame (first send included) before it is abandoned
    pub max_attempts: u32,
    /// Request the zone list and a dynamic refresh when the loop starts
    pub refresh_on_start: bool,
    /// Number of touchpad display messages to keep
    pub display_history: usize,
    /// Only touchpad messages for this partition (or partition 0) are recorded
    pub display_partition: u8,
    /// PIN keyed in for disarm and the master-code action
    pub master_pin: Option<String>,
    /// Key the master code back in after every arming level change
    pub resend_master_code_on_arm: bool,
    /// Answer CLEAR_IMAGE and EVENT_LOST with a full equipment list and refresh
    pub refresh_on_image_loss: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB0".to_string(),
            poll_interval: Duration::from_millis(250),
            ack_timeout: ACK_TIMEOUT_INBOUND,
            max_attempts: MAX_SEND_ATTEMPTS,
            refresh_on_start: true,
            display_history: 50,
            display_partition: 1,
            master_pin: None,
            resend_master_code_on_arm: false,
            refresh_on_image_loss: false,
        }
    }
}

impl EngineConfig {
    /// Create a new config builder starting from defaults.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    pub fn is_loopback(&self) -> bool {
        self.device == LOOPBACK_DEVICE
    }
}

/// Builder for EngineConfig.
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn device(mut self, device: impl Into<String>) -> Self {
        self.config.device = device.into();
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.config.ack_timeout = timeout;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts.max(1);
        self
    }

    pub fn refresh_on_start(mut self, refresh: bool) -> Self {
        self.config.refresh_on_start = refresh;
        self
    }

    pub fn display_history(mut self, capacity: usize) -> Self {
        self.config.display_history = capacity;
        self
    }

    pub fn display_partition(mut self, partition: u8) -> Self {
        self.config.display_partition = partition;
        self
    }

    pub fn master_pin(mut self, pin: impl Into<String>) -> Self {
        self.config.master_pin = Some(pin.into());
        self
    }

    pub fn resend_master_code_on_arm(mut self, resend: bool) -> Self {
        self.config.resend_master_code_on_arm = resend;
        self
    }

    pub fn refresh_on_image_loss(mut self, refresh: bool) -> Self {
        self.config.refresh_on_image_loss = refresh;
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = EngineConfig::builder().build();
        assert_eq!(config.device, "/dev/ttyUSB0");
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.ack_timeout, Duration::from_secs(1));
        assert_eq!(config.max_attempts, 3);
        assert!(config.refresh_on_start);
        assert_eq!(config.display_partition, 1);
        assert_eq!(config.master_pin, None);
        assert!(!config.is_loopback());
    }

    #[test]
    fn test_config_builder() {
        let config = EngineConfig::builder()
            .device(LOOPBACK_DEVICE)
            .poll_interval(Duration::from_millis(10))
            .master_pin("1234")
            .max_attempts(0)
            .refresh_on_image_loss(true)
            .build();

        assert!(config.is_loopback());
        assert_eq!(config.poll_interval, Duration::from_millis(10));
        assert_eq!(config.master_pin.as_deref(), Some("1234"));
        assert_eq!(config.max_attempts, 1);
        assert!(config.refresh_on_image_loss);
    }
}
