//! Server capability model built from RPL_MYINFO (004) and RPL_ISUPPORT (005).
//!
//! ISUPPORT may span several 005 lines; every line is applied on top of the
//! current snapshot and the last value seen for a key wins. Anything odd in a
//! token is reported as an [`IsupportWarning`] and otherwise skipped, so a
//! sloppy server never stops the connection from coming up.

use crate::proto::CaseMapping;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, warn};

/// Non-fatal problems found while applying an ISUPPORT line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IsupportWarning {
    #[error("PREFIX lists {modes} mode letters but {symbols} symbols")]
    PrefixLengthMismatch { modes: usize, symbols: usize },

    #[error("malformed PREFIX value: {0}")]
    MalformedPrefix(String),

    #[error("invalid MAXLIST parameter: {0}")]
    InvalidMaxList(String),

    #[error("malformed CHANMODES value: {0}")]
    MalformedChanModes(String),

    #[error("unknown CASEMAPPING: {0}")]
    UnknownCaseMapping(String),

    #[error("invalid number for {key}: {value}")]
    InvalidNumber { key: String, value: String },
}

/// How a channel mode letter consumes parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeClass {
    /// Per-member status mode from PREFIX (`o`, `v`, ...). Always takes a nick.
    Prefix,
    /// CHANMODES type A: list modes (`b`, `e`, `I`). Always takes a mask.
    List,
    /// CHANMODES type B: parameter on both set and unset (`k`).
    Always,
    /// CHANMODES type C: parameter only when set (`l`).
    SetOnly,
    /// CHANMODES type D: never takes a parameter (`n`, `t`, ...).
    Flag,
}

impl ModeClass {
    /// Whether a mode of this class consumes a parameter in the given direction.
    pub fn takes_param(&self, adding: bool) -> bool {
        match self {
            Self::Prefix | Self::List | Self::Always => true,
            Self::SetOnly => adding,
            Self::Flag => false,
        }
    }
}

/// The four CHANMODES groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChanModes {
    pub list: String,
    pub always: String,
    pub set_only: String,
    pub flags: String,
}

impl ChanModes {
    /// Parse a value like `beI,k,l,imnpst`. Extra groups are ignored.
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.splitn(5, ',');
        Some(Self {
            list: parts.next()?.to_string(),
            always: parts.next()?.to_string(),
            set_only: parts.next()?.to_string(),
            flags: parts.next()?.to_string(),
        })
    }
}

impl Default for ChanModes {
    fn default() -> Self {
        Self {
            list: "beI".to_string(),
            always: "k".to_string(),
            set_only: "l".to_string(),
            flags: "imnpst".to_string(),
        }
    }
}

/// Server-advertised limits and encodings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkCapabilities {
    pub server_name: String,
    pub software_version: String,
    pub network_name: String,
    pub max_channels: Option<u32>,
    pub max_channel_name_length: Option<u32>,
    pub max_topic_length: Option<u32>,
    pub max_kick_length: Option<u32>,
    pub max_away_length: Option<u32>,
    pub max_targets: Option<u32>,
    pub max_modes_per_command: Option<u32>,
    pub channel_types: BTreeSet<char>,
    pub channel_modes: ChanModes,
    pub case_mapping: CaseMapping,
    /// Mode letter → prefix symbol, highest rank first.
    pub nick_prefixes: Vec<(char, char)>,
    pub max_bans: Option<u32>,
    pub max_exempts: Option<u32>,
    pub max_invite_exempts: Option<u32>,
    /// Bumped on every 004/005 applied.
    revision: u64,
}

impl Default for NetworkCapabilities {
    fn default() -> Self {
        Self {
            server_name: String::new(),
            software_version: String::new(),
            network_name: String::new(),
            max_channels: None,
            max_channel_name_length: None,
            max_topic_length: None,
            max_kick_length: None,
            max_away_length: None,
            max_targets: None,
            max_modes_per_command: None,
            channel_types: ['#', '&'].into_iter().collect(),
            channel_modes: ChanModes::default(),
            case_mapping: CaseMapping::default(),
            nick_prefixes: vec![('o', '@'), ('v', '+')],
            max_bans: None,
            max_exempts: None,
            max_invite_exempts: None,
            revision: 0,
        }
    }
}

impl NetworkCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Changes whenever server info or ISUPPORT is applied. Events remember
    /// the revision they were classified under.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Apply an RPL_MYINFO (004) line: `<server> 004 <me> <servername> <version> ...`.
    pub fn apply_server_info<S: AsRef<str>>(&mut self, fields: &[S]) {
        if let Some(name) = fields.get(3) {
            self.server_name = name.as_ref().to_string();
        }
        if let Some(version) = fields.get(4) {
            self.software_version = version.as_ref().to_string();
        }
        self.revision += 1;
        debug!(server = %self.server_name, version = %self.software_version, "Server info");
    }

    /// Apply one RPL_ISUPPORT (005) line, given as whitespace-split fields.
    ///
    /// The prefix, numeric and target fields are skipped and parsing stops at
    /// the trailing `:are supported by this server` text.
    pub fn apply_isupport_line<S: AsRef<str>>(&mut self, fields: &[S]) -> Vec<IsupportWarning> {
        let mut warnings = Vec::new();
        self.revision += 1;

        for token in fields.iter().skip(3).map(AsRef::as_ref) {
            if token.starts_with(':') {
                break;
            }
            let (key, value) = token.split_once('=').unwrap_or((token, ""));
            self.apply_token(key, value, &mut warnings);
        }

        for warning in &warnings {
            warn!(warning = %warning, "Odd ISUPPORT token from server");
        }
        warnings
    }

    fn apply_token(&mut self, key: &str, value: &str, warnings: &mut Vec<IsupportWarning>) {
        match key {
            "NETWORK" => self.network_name = value.to_string(),
            "MAXCHANNELS" => set_number(&mut self.max_channels, key, value, warnings),
            "CHANLIMIT" => {
                if self.max_channels.is_none() {
                    self.max_channels = parse_chanlimit(value);
                }
            }
            "CHANNELLEN" => set_number(&mut self.max_channel_name_length, key, value, warnings),
            "TOPICLEN" => set_number(&mut self.max_topic_length, key, value, warnings),
            "KICKLEN" => set_number(&mut self.max_kick_length, key, value, warnings),
            "AWAYLEN" => set_number(&mut self.max_away_length, key, value, warnings),
            "MAXTARGETS" => set_number(&mut self.max_targets, key, value, warnings),
            "MODES" => set_number(&mut self.max_modes_per_command, key, value, warnings),
            "CHANTYPES" => self.channel_types = value.chars().collect(),
            "CHANMODES" => match ChanModes::parse(value) {
                Some(modes) => self.channel_modes = modes,
                None => warnings.push(IsupportWarning::MalformedChanModes(value.to_string())),
            },
            "CASEMAPPING" => match CaseMapping::parse(value) {
                Some(mapping) => self.case_mapping = mapping,
                None => warnings.push(IsupportWarning::UnknownCaseMapping(value.to_string())),
            },
            "PREFIX" => self.apply_prefix(value, warnings),
            "MAXLIST" => self.apply_maxlist(value, warnings),
            _ => {}
        }
    }

    fn apply_prefix(&mut self, value: &str, warnings: &mut Vec<IsupportWarning>) {
        if value.is_empty() {
            self.nick_prefixes.clear();
            return;
        }

        let Some((modes, symbols)) = value
            .strip_prefix('(')
            .and_then(|rest| rest.split_once(')'))
            .filter(|(modes, _)| !modes.is_empty())
        else {
            warnings.push(IsupportWarning::MalformedPrefix(value.to_string()));
            return;
        };

        let mode_count = modes.chars().count();
        let symbol_count = symbols.chars().count();
        if mode_count != symbol_count {
            warnings.push(IsupportWarning::PrefixLengthMismatch {
                modes: mode_count,
                symbols: symbol_count,
            });
        }

        self.nick_prefixes = modes.chars().zip(symbols.chars()).collect();
        debug!(prefixes = ?self.nick_prefixes, "Nick prefixes");
    }

    fn apply_maxlist(&mut self, value: &str, warnings: &mut Vec<IsupportWarning>) {
        for entry in value.split(',').filter(|e| !e.is_empty()) {
            let Some((letters, limit)) = entry.split_once(':') else {
                warnings.push(IsupportWarning::InvalidMaxList(entry.to_string()));
                continue;
            };
            let Ok(limit) = limit.parse::<u32>() else {
                warnings.push(IsupportWarning::InvalidNumber {
                    key: "MAXLIST".to_string(),
                    value: entry.to_string(),
                });
                continue;
            };

            for letter in letters.chars() {
                match letter {
                    'b' => self.max_bans = Some(limit),
                    'e' => self.max_exempts = Some(limit),
                    'I' => self.max_invite_exempts = Some(limit),
                    _ => warnings.push(IsupportWarning::InvalidMaxList(format!("{letter}:{limit}"))),
                }
            }
        }
    }

    /// Whether `name` starts with one of the advertised channel type prefixes.
    pub fn is_channel(&self, name: &str) -> bool {
        name.chars()
            .next()
            .is_some_and(|c| self.channel_types.contains(&c))
    }

    /// Reverse lookup: status symbol (`@`) → mode letter (`o`).
    pub fn mode_for_prefix(&self, symbol: char) -> Option<char> {
        self.nick_prefixes
            .iter()
            .find(|(_, s)| *s == symbol)
            .map(|(m, _)| *m)
    }

    /// Forward lookup: mode letter (`o`) → status symbol (`@`).
    pub fn prefix_for_mode(&self, mode: char) -> Option<char> {
        self.nick_prefixes
            .iter()
            .find(|(m, _)| *m == mode)
            .map(|(_, s)| *s)
    }

    /// Classify a channel mode letter. Unknown letters return `None`.
    pub fn mode_class(&self, mode: char) -> Option<ModeClass> {
        let groups = &self.channel_modes;
        if self.prefix_for_mode(mode).is_some() {
            Some(ModeClass::Prefix)
        } else if groups.list.contains(mode) {
            Some(ModeClass::List)
        } else if groups.always.contains(mode) {
            Some(ModeClass::Always)
        } else if groups.set_only.contains(mode) {
            Some(ModeClass::SetOnly)
        } else if groups.flags.contains(mode) {
            Some(ModeClass::Flag)
        } else {
            None
        }
    }
}

fn set_number(
    slot: &mut Option<u32>,
    key: &str,
    value: &str,
    warnings: &mut Vec<IsupportWarning>,
) {
    if value.is_empty() {
        *slot = None;
        return;
    }
    match value.parse() {
        Ok(n) => *slot = Some(n),
        Err(_) => warnings.push(IsupportWarning::InvalidNumber {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// `CHANLIMIT=#&:20,+:5` → the largest advertised limit.
fn parse_chanlimit(value: &str) -> Option<u32> {
    value
        .split(',')
        .filter_map(|entry| entry.split_once(':'))
        .filter_map(|(_, n)| n.parse().ok())
        .max()
}
