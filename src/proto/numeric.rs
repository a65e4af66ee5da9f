//! Numeric replies the engine reacts to.

pub const RPL_WELCOME: &str = "001";
pub const RPL_MYINFO: &str = "004";
pub const RPL_ISUPPORT: &str = "005";
pub const RPL_CHANNELMODEIS: &str = "324";
pub const RPL_TOPIC: &str = "332";
pub const RPL_INVITELIST: &str = "346";
pub const RPL_EXCEPTLIST: &str = "348";
pub const RPL_WHOREPLY: &str = "352";
pub const RPL_BANLIST: &str = "367";
pub const RPL_MOTDSTART: &str = "375";
pub const RPL_ENDOFMOTD: &str = "376";
pub const ERR_NOMOTD: &str = "422";
