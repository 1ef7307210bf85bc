//! Local key injection.
//!
//! Remote commands name keys by their `VK_*` code. [`platform_key`] maps
//! each supported code to the X keysym that is actually pressed; any other
//! code is refused before anything runs. The press itself is delegated to a
//! [`KeyInjector`]. Failures are reported to the caller, who logs them; they
//! never end a session.

use std::process::{Command, Stdio};

use crate::config::{InjectorKind, KeysConfig};
use crate::error::{AppError, Result};

/// Remote key codes and the keysyms they press.
const KEY_MAP: &[(&str, &str)] = &[
    ("VK_MEDIA_PLAY_PAUSE", "XF86AudioPlay"),
    ("VK_MEDIA_NEXT_TRACK", "XF86AudioNext"),
    ("VK_MEDIA_PREV_TRACK", "XF86AudioPrev"),
    ("VK_MEDIA_STOP", "XF86AudioStop"),
    ("VK_VOLUME_UP", "XF86AudioRaiseVolume"),
    ("VK_VOLUME_DOWN", "XF86AudioLowerVolume"),
    ("VK_VOLUME_MUTE", "XF86AudioMute"),
];

/// Looks up the keysym for a remote key code.
#[must_use]
pub fn platform_key(code: &str) -> Option<&'static str> {
    KEY_MAP
        .iter()
        .find(|(remote, _)| *remote == code)
        .map(|(_, keysym)| *keysym)
}

fn resolve(code: &str) -> Result<&'static str> {
    platform_key(code).ok_or_else(|| AppError::KeyInjection {
        code: code.to_string(),
        reason: "unknown key code".to_string(),
    })
}

/// Presses a key identified by its remote key code.
#[cfg_attr(test, mockall::automock)]
pub trait KeyInjector: Send + Sync {
    /// Injects one press of `code`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::KeyInjection`] if `code` is not a known key or
    /// the key could not be pressed.
    fn inject(&self, code: &str) -> Result<()>;
}

/// Records key presses in the log without pressing anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogInjector;

impl KeyInjector for LogInjector {
    fn inject(&self, code: &str) -> Result<()> {
        let keysym = resolve(code)?;
        tracing::info!(key_code = %code, keysym, "Key press received");
        Ok(())
    }
}

/// Runs an external program with the keysym as its last argument,
/// e.g. `xdotool key XF86AudioPlay`.
#[derive(Debug, Clone)]
pub struct CommandInjector {
    program: String,
    args: Vec<String>,
}

impl CommandInjector {
    /// Builds an injector from `[program, args...]`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if `command` is empty.
    pub fn new(command: &[String]) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| AppError::Config("keys.command must name a program".to_string()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl KeyInjector for CommandInjector {
    fn inject(&self, code: &str) -> Result<()> {
        let keysym = resolve(code)?;
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(keysym)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .map_err(|e| AppError::KeyInjection {
                code: code.to_string(),
                reason: format!("cannot run {}: {e}", self.program),
            })?;

        if status.success() {
            tracing::debug!(key_code = %code, keysym, "Key press sent");
            Ok(())
        } else {
            Err(AppError::KeyInjection {
                code: code.to_string(),
                reason: format!("{} exited with {status}", self.program),
            })
        }
    }
}

/// Builds the injector selected in configuration.
///
/// # Errors
///
/// Returns [`AppError::Config`] if the command injector is selected without a command.
pub fn injector_from_config(config: &KeysConfig) -> Result<Box<dyn KeyInjector>> {
    Ok(match config.injector {
        InjectorKind::Log => Box::new(LogInjector),
        InjectorKind::Command => Box::new(CommandInjector::new(&config.command)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_command_is_rejected() {
        assert!(matches!(
            CommandInjector::new(&[]),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn config_selects_injector() {
        let config = KeysConfig {
            injector: InjectorKind::Command,
            command: Vec::new(),
        };
        assert!(injector_from_config(&config).is_err());
        assert!(injector_from_config(&KeysConfig::default()).is_ok());
    }

    #[test]
    fn media_codes_map_to_keysyms() {
        assert_eq!(platform_key("VK_MEDIA_PLAY_PAUSE"), Some("XF86AudioPlay"));
        assert_eq!(platform_key("VK_MEDIA_PREV_TRACK"), Some("XF86AudioPrev"));
        assert_eq!(platform_key("VK_VOLUME_DOWN"), Some("XF86AudioLowerVolume"));
        assert_eq!(platform_key("VK_VOLUME_MUTE"), Some("XF86AudioMute"));
        assert_eq!(platform_key("VK_RETURN"), None);
        assert_eq!(platform_key("vk_media_play_pause"), None);
    }

    #[test]
    fn log_injector_accepts_known_codes() {
        assert!(LogInjector.inject("VK_MEDIA_PLAY_PAUSE").is_ok());
        assert!(matches!(
            LogInjector.inject("VK_LWIN"),
            Err(AppError::KeyInjection { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn command_injector_passes_keysym() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let out = temp_dir.path().join("keys");
        let script = format!("printf '%s' \"$0\" > '{}'", out.display());
        let injector =
            CommandInjector::new(&["sh".to_string(), "-c".to_string(), script]).unwrap();

        injector.inject("VK_VOLUME_UP").unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "XF86AudioRaiseVolume");
    }

    #[test]
    fn unknown_code_is_refused_before_running() {
        let injector =
            CommandInjector::new(&["mediactl-no-such-program-xyz".to_string()]).unwrap();
        match injector.inject("$(reboot)") {
            Err(AppError::KeyInjection { code, reason }) => {
                assert_eq!(code, "$(reboot)");
                assert_eq!(reason, "unknown key code");
            },
            other => panic!("expected unknown key code, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn command_injector_reports_exit_status() {
        let ok = CommandInjector::new(&["true".to_string()]).unwrap();
        assert!(ok.inject("VK_MEDIA_NEXT_TRACK").is_ok());

        let failing = CommandInjector::new(&["false".to_string()]).unwrap();
        assert!(matches!(
            failing.inject("VK_MEDIA_NEXT_TRACK"),
            Err(AppError::KeyInjection { .. })
        ));
    }

    #[test]
    fn missing_program_is_an_injection_error() {
        let injector =
            CommandInjector::new(&["mediactl-no-such-program-xyz".to_string()]).unwrap();
        assert!(matches!(
            injector.inject("VK_VOLUME_UP"),
            Err(AppError::KeyInjection { .. })
        ));
    }
}
