//! Default value functions for configuration.

pub fn default_port() -> u16 {
    6667
}

pub fn default_username() -> String {
    "slirc".to_string()
}

pub fn default_realname() -> String {
    "slirc-bot".to_string()
}

pub fn default_command_prefix() -> String {
    "!".to_string()
}

pub fn default_quit_message() -> String {
    "Shutting down".to_string()
}

pub fn default_bot_mode() -> String {
    "+B".to_string()
}

// =============================================================================
// Pipeline Defaults
// =============================================================================

pub fn default_workers() -> usize {
    5
}

pub fn default_message_timeout() -> u64 {
    45
}

// =============================================================================
// Schedule Defaults
// =============================================================================

pub fn default_keepalive() -> u64 {
    360
}

pub fn default_autosave() -> u64 {
    300
}
