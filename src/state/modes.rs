//! Channel mode parsing against the server's advertised mode classes.

use crate::isupport::{ModeClass, NetworkCapabilities};
use std::collections::BTreeMap;
use std::iter::Peekable;
use tracing::debug;

/// One `+x`/`-x` step of a MODE line, with its parameter resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeDelta {
    pub adding: bool,
    pub mode: char,
    pub class: ModeClass,
    pub param: Option<String>,
}

/// Split MODE tokens (`+o-v alice bob`) into deltas.
///
/// Unknown letters are treated as parameterless flags. A mode whose
/// parameter is missing is dropped. Surplus parameters are ignored.
pub fn parse_mode_tokens<S: AsRef<str>>(tokens: &[S], caps: &NetworkCapabilities) -> Vec<ModeDelta> {
    let mut deltas = Vec::new();

    let Some((first, rest)) = tokens.split_first() else {
        return deltas;
    };

    let mut args = rest
        .iter()
        .map(|t| t.as_ref().trim_start_matches(':'))
        .peekable();
    let mut adding = true;

    for c in first.as_ref().trim_start_matches(':').chars() {
        match c {
            '+' => adding = true,
            '-' => adding = false,
            _ => {
                let class = caps.mode_class(c).unwrap_or_else(|| {
                    debug!(mode = %c, "Unknown channel mode, treating as flag");
                    ModeClass::Flag
                });
                let param = if class.takes_param(adding) {
                    match next_arg(&mut args) {
                        Some(arg) => Some(arg),
                        None => {
                            debug!(mode = %c, adding, "Mode parameter missing, skipping");
                            continue;
                        }
                    }
                } else {
                    None
                };
                deltas.push(ModeDelta {
                    adding,
                    mode: c,
                    class,
                    param,
                });
            }
        }
    }

    if args.peek().is_some() {
        debug!("Unused MODE parameters ignored");
    }

    deltas
}

fn next_arg<'a, I>(args: &mut Peekable<I>) -> Option<String>
where
    I: Iterator<Item = &'a str>,
{
    args.next().map(str::to_string)
}

/// Non-list channel modes, with parameters where the mode carries one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeSet {
    modes: BTreeMap<char, Option<String>>,
}

impl ModeSet {
    pub fn set(&mut self, mode: char, param: Option<String>) {
        self.modes.insert(mode, param);
    }

    pub fn unset(&mut self, mode: char) {
        self.modes.remove(&mode);
    }

    pub fn clear(&mut self) {
        self.modes.clear();
    }

    pub fn contains(&self, mode: char) -> bool {
        self.modes.contains_key(&mode)
    }

    pub fn param(&self, mode: char) -> Option<&str> {
        self.modes.get(&mode).and_then(|p| p.as_deref())
    }

    /// Render as a MODE string: `+klnt key 10`.
    pub fn render(&self) -> String {
        if self.modes.is_empty() {
            return String::new();
        }
        let mut letters = String::from("+");
        let mut params = Vec::new();
        for (mode, param) in &self.modes {
            letters.push(*mode);
            if let Some(p) = param {
                params.push(p.as_str());
            }
        }
        if params.is_empty() {
            letters
        } else {
            format!("{} {}", letters, params.join(" "))
        }
    }
}
