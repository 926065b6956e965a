//! Human-readable error descriptions, exit codes and structured JSON errors.

use std::fmt;
use std::path::PathBuf;

use pump_core::error::{BuildError, PumpError};
use pump_link::{BankError, LinkError};

/// Context attached to config load failures so they map to their own exit code.
#[derive(Debug)]
pub struct ConfigError {
    pub path: PathBuf,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid configuration in {}", self.path.display())
    }
}

pub const EXIT_GENERIC: i32 = 1;
pub const EXIT_LINK: i32 = 3;
pub const EXIT_CONFIG: i32 = 4;

fn link_error(err: &eyre::Report) -> Option<&LinkError> {
    err.downcast_ref::<LinkError>()
        .or_else(|| match err.downcast_ref::<BankError>() {
            Some(BankError::Link(e)) => Some(e),
            _ => None,
        })
}

fn pump_error(err: &eyre::Report) -> Option<&PumpError> {
    err.downcast_ref::<PumpError>()
        .or_else(|| match err.downcast_ref::<BankError>() {
            Some(BankError::Pump(e)) => Some(e),
            _ => None,
        })
}

fn root_cause(err: &eyre::Report) -> String {
    err.chain()
        .last()
        .map_or_else(|| err.to_string(), ToString::to_string)
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(ce) = err.downcast_ref::<ConfigError>() {
        return format!(
            "What happened: {ce}.\nCause: {}\nHow to fix: Edit the TOML file and rerun; every section is optional, so remove a key to fall back to its default.",
            root_cause(err)
        );
    }

    if let Some(le) = link_error(err) {
        return match le {
            LinkError::NoPeer => "What happened: No subordinate answered discovery.\nLikely causes: Peer not powered, wrong [link] address range, or bus wiring.\nHow to fix: Check address_from/address_to and the bus cabling, then retry.".to_string(),
            LinkError::Timeout => "What happened: The bus timed out.\nLikely causes: Peer busy or disconnected, or timeout_ms too low.\nHow to fix: Check the peer and consider raising link.timeout_ms.".to_string(),
            LinkError::Disconnected => "What happened: The link to the subordinate is down.\nLikely causes: A previous exchange failed.\nHow to fix: Wait for rediscovery or check the peer.".to_string(),
            LinkError::Disabled => "What happened: The link is disabled.\nHow to fix: Set link.enabled = true in the config.".to_string(),
            other => format!(
                "What happened: Link failure ({other}).\nHow to fix: Re-run with --log-level=debug for details."
            ),
        };
    }

    if let Some(pe) = pump_error(err) {
        return match pe {
            PumpError::Busy(id) => format!(
                "What happened: Motor {id} is already running.\nHow to fix: Stop it before starting a dose."
            ),
            PumpError::ZeroVolume => {
                "What happened: Dose volume is zero.\nHow to fix: Pass a volume of at least 1 ml.".to_string()
            }
            PumpError::UnknownMotor(id) => format!(
                "What happened: Motor {id} does not exist.\nLikely causes: Id beyond the local motors, or the remote peer is not connected.\nHow to fix: Check [motors] local_count and the link state."
            ),
            other => format!("What happened: {other}."),
        };
    }

    if let Some(be) = err.downcast_ref::<BuildError>() {
        return format!(
            "What happened: Could not assemble the controller ({be}).\nHow to fix: Check the config values for motors and link."
        );
    }

    let msg = err.to_string();
    let cause = err
        .source()
        .map(|src| format!(" Cause: {src}"))
        .unwrap_or_default();
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 3 for link failures, 4 for configuration, 1 otherwise.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<ConfigError>().is_some() {
        EXIT_CONFIG
    } else if link_error(err).is_some() {
        EXIT_LINK
    } else {
        EXIT_GENERIC
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<ConfigError>().is_some() {
        return "Config";
    }
    match link_error(err) {
        Some(LinkError::NoPeer) => "NoPeer",
        Some(LinkError::Timeout) => "Timeout",
        Some(_) => "Link",
        None if pump_error(err).is_some() => "Pump",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
        "detail": root_cause(err),
    })
    .to_string()
}
