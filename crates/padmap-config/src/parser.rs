//! KDL configuration parser

use std::collections::HashSet;
use std::path::Path;

use crate::error::ConfigError;
use crate::model::*;

/// Parse a configuration file from the given path
pub fn parse_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Parse configuration from a string
pub fn parse_config_str(content: &str) -> Result<Config, ConfigError> {
    let doc: kdl::KdlDocument = content.parse().map_err(|e: kdl::KdlError| {
        let offset = e.span.offset();
        let len = e.span.len();
        let span = miette::SourceSpan::from((offset, len));
        ConfigError::ParseError {
            src: content.to_string(),
            span,
            source: e,
        }
    })?;

    let mut config = Config::default();

    for node in doc.nodes() {
        match node.name().value() {
            "global" => {
                config.global = parse_global(node)?;
            }
            "buttons" => {
                config.buttons.extend(parse_buttons(node)?);
            }
            "combo" => {
                config.combos.push(parse_combo(node)?);
            }
            name => {
                tracing::warn!("Unknown top-level node: {}", name);
            }
        }
    }

    validate(&config)?;

    Ok(config)
}

/// First positional (unnamed) argument of a node, as an integer.
fn first_arg_i64(node: &kdl::KdlNode) -> Option<i64> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_i64())
}

/// First positional (unnamed) argument of a node, as a string.
fn first_arg_str(node: &kdl::KdlNode) -> Option<&str> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
}

/// Named property of a node (`name=value`), as an integer.
fn prop_i64(node: &kdl::KdlNode, key: &str) -> Option<i64> {
    node.entries()
        .iter()
        .find(|e| e.name().map(|n| n.value()) == Some(key))
        .and_then(|e| e.value().as_i64())
}

fn check_pin(raw: i64) -> Result<u8, ConfigError> {
    if (0..=MAX_PIN as i64).contains(&raw) {
        Ok(raw as u8)
    } else {
        Err(ConfigError::PinOutOfRange { pin: raw })
    }
}

fn parse_global(node: &kdl::KdlNode) -> Result<GlobalConfig, ConfigError> {
    let mut global = GlobalConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "log-level" => {
                    if let Some(val) = first_arg_str(child) {
                        global.log_level = val
                            .parse()
                            .map_err(|e| ConfigError::Invalid { message: e })?;
                    }
                }
                "i2c-bus" => {
                    if let Some(val) = first_arg_i64(child) {
                        global.i2c_bus = val as u8;
                    }
                }
                "i2c-address" => {
                    if let Some(val) = first_arg_i64(child) {
                        global.i2c_address = val as u16;
                    }
                }
                "sampling" => {
                    global.sampling = parse_sampling(child)?;
                }
                name => {
                    tracing::warn!("Unknown global config option: {}", name);
                }
            }
        }
    }

    Ok(global)
}

fn parse_sampling(node: &kdl::KdlNode) -> Result<SamplingMode, ConfigError> {
    let mode = first_arg_str(node).ok_or_else(|| ConfigError::MissingField {
        field: "sampling mode (e.g., `sampling \"poll\" interval-ms=20`)".to_string(),
    })?;

    match mode {
        "poll" => {
            let interval_ms = prop_i64(node, "interval-ms").unwrap_or(20);
            if interval_ms <= 0 {
                return Err(ConfigError::Invalid {
                    message: format!("poll interval-ms must be positive, got {}", interval_ms),
                });
            }
            Ok(SamplingMode::Poll {
                interval_ms: interval_ms as u64,
            })
        }
        "interrupt" => {
            let gpio_pin = prop_i64(node, "gpio-pin").ok_or_else(|| ConfigError::MissingField {
                field: "gpio-pin (e.g., `sampling \"interrupt\" gpio-pin=4`)".to_string(),
            })?;
            if !(0..=255).contains(&gpio_pin) {
                return Err(ConfigError::Invalid {
                    message: format!("gpio-pin out of range: {}", gpio_pin),
                });
            }
            Ok(SamplingMode::Interrupt {
                gpio_pin: gpio_pin as u8,
            })
        }
        other => Err(ConfigError::Invalid {
            message: format!("Unknown sampling mode '{}' (expected \"poll\" or \"interrupt\")", other),
        }),
    }
}

fn parse_buttons(node: &kdl::KdlNode) -> Result<Vec<ButtonConfig>, ConfigError> {
    let mut buttons = Vec::new();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "pin" => {
                    let raw = first_arg_i64(child).ok_or_else(|| ConfigError::MissingField {
                        field: "pin number (e.g., `pin 0 \"1\"`)".to_string(),
                    })?;
                    let pin = check_pin(raw)?;

                    // Second positional argument is the key name.
                    let key = child
                        .entries()
                        .iter()
                        .filter(|e| e.name().is_none())
                        .nth(1)
                        .and_then(|e| e.value().as_string())
                        .ok_or_else(|| ConfigError::MissingField {
                            field: format!("key name for pin {} (e.g., `pin {} \"1\"`)", pin, pin),
                        })?;

                    if key.is_empty() {
                        return Err(ConfigError::Invalid {
                            message: format!("Empty key name for pin {}", pin),
                        });
                    }

                    buttons.push(ButtonConfig {
                        pin,
                        key: key.to_string(),
                    });
                }
                name => {
                    tracing::warn!("Unknown buttons entry: {}", name);
                }
            }
        }
    }

    Ok(buttons)
}

fn parse_combo(node: &kdl::KdlNode) -> Result<ComboConfig, ConfigError> {
    let name = first_arg_str(node)
        .ok_or_else(|| ConfigError::MissingField {
            field: "combo name (e.g., `combo \"coin\" { ... }`)".to_string(),
        })?
        .to_string();

    let mut pins: Option<(u8, u8)> = None;
    let mut hold_seconds = 0u64;
    let mut key: Option<String> = None;

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "pins" => {
                    let raw: Vec<i64> = child
                        .entries()
                        .iter()
                        .filter(|e| e.name().is_none())
                        .filter_map(|e| e.value().as_i64())
                        .collect();
                    if raw.len() != 2 {
                        return Err(ConfigError::Invalid {
                            message: format!(
                                "Combo '{}' must watch exactly two pins, got {}",
                                name,
                                raw.len()
                            ),
                        });
                    }
                    pins = Some((check_pin(raw[0])?, check_pin(raw[1])?));
                }
                "hold-seconds" => {
                    let val = first_arg_i64(child).unwrap_or(0);
                    if val < 0 {
                        return Err(ConfigError::Invalid {
                            message: format!(
                                "Combo '{}' hold-seconds must not be negative",
                                name
                            ),
                        });
                    }
                    hold_seconds = val as u64;
                }
                "key" => {
                    key = first_arg_str(child).map(|s| s.to_string());
                }
                other => {
                    tracing::warn!("Unknown combo option: {}", other);
                }
            }
        }
    }

    let pins = pins.ok_or_else(|| ConfigError::MissingField {
        field: format!("pins for combo '{}'", name),
    })?;
    let key = key
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ConfigError::MissingField {
            field: format!("key for combo '{}'", name),
        })?;

    Ok(ComboConfig {
        name,
        pins,
        hold_seconds,
        key,
    })
}

/// Cross-reference checks that must hold before sampling is allowed to start.
fn validate(config: &Config) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for button in &config.buttons {
        if !seen.insert(button.pin) {
            return Err(ConfigError::DuplicatePin { pin: button.pin });
        }
    }

    for combo in &config.combos {
        let (a, b) = combo.pins;
        if a == b {
            return Err(ConfigError::Invalid {
                message: format!("Combo '{}' watches pin {} twice", combo.name, a),
            });
        }
        for pin in [a, b] {
            if !seen.contains(&pin) {
                return Err(ConfigError::UnmappedComboPin {
                    combo: combo.name.clone(),
                    pin,
                });
            }
        }
    }

    Ok(())
}
