//! Startup configuration: parses the line-oriented config file into a
//! validated [`Config`]. Any problem here is fatal before the engine starts.

use crate::types::{Cost, Port, RouterId};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required directive: {0}")]
    Missing(&'static str),
    #[error("line {line}: malformed value for `{directive}`: {detail}")]
    Malformed {
        line: usize,
        directive: String,
        detail: String,
    },
    #[error("could not read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Maps to the CLI exit codes: 1 for an incomplete configuration, 11 for
    /// a malformed value. `Io` is treated as incomplete (file unreadable is,
    /// in effect, no configuration at all).
    pub fn exit_code(&self) -> i32 {
        match self {
            ConfigError::Missing(_) | ConfigError::Io { .. } => 1,
            ConfigError::Malformed { .. } => 11,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Neighbour {
    pub port: Port,
    pub cost: Cost,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub router_id: RouterId,
    pub input_ports: Vec<Port>,
    pub neighbours: HashMap<RouterId, Neighbour>,
    pub update_period_secs: u64,
}

impl Config {
    pub fn timeout_length_secs(&self) -> u64 {
        6 * self.update_period_secs
    }

    /// Not fixed by the directives this grammar exposes; this implementation
    /// uses `4 * update_period` (see the open question recorded for the
    /// protocol engine's holddown/garbage-collection timing).
    pub fn deletion_length_secs(&self) -> u64 {
        4 * self.update_period_secs
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut router_id = None;
        let mut input_ports = None;
        let mut neighbours = None;
        let mut update_period_secs = None;

        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = idx + 1;
            if raw_line.starts_with('#') || raw_line.trim().is_empty() {
                continue;
            }
            let mut parts = raw_line.trim().splitn(2, char::is_whitespace);
            let directive = parts.next().unwrap_or("");
            let rest = parts.next().unwrap_or("").trim();

            match directive {
                "router-id" => {
                    router_id = Some(parse_router_id(line_no, "router-id", rest)?);
                }
                "input-ports" => {
                    input_ports = Some(parse_port_list(line_no, "input-ports", rest)?);
                }
                "outputs" => {
                    neighbours = Some(parse_outputs(line_no, rest)?);
                }
                "update-period" => {
                    update_period_secs = Some(parse_positive_int(line_no, "update-period", rest)?);
                }
                "" => continue,
                other => {
                    return Err(ConfigError::Malformed {
                        line: line_no,
                        directive: other.to_string(),
                        detail: "unrecognised directive".to_string(),
                    });
                }
            }
        }

        let router_id = router_id.ok_or(ConfigError::Missing("router-id"))?;
        let input_ports = input_ports.ok_or(ConfigError::Missing("input-ports"))?;
        let neighbours = neighbours.ok_or(ConfigError::Missing("outputs"))?;
        let update_period_secs = update_period_secs.ok_or(ConfigError::Missing("update-period"))?;

        if input_ports.is_empty() {
            return Err(ConfigError::Missing("input-ports"));
        }
        if neighbours.is_empty() {
            return Err(ConfigError::Missing("outputs"));
        }

        Ok(Config {
            router_id,
            input_ports,
            neighbours,
            update_period_secs,
        })
    }
}

fn parse_router_id(line: usize, directive: &str, value: &str) -> Result<RouterId, ConfigError> {
    let raw: u16 = value.trim().parse().map_err(|_| ConfigError::Malformed {
        line,
        directive: directive.to_string(),
        detail: format!("`{value}` is not an integer"),
    })?;
    RouterId::new(raw).map_err(|e| ConfigError::Malformed {
        line,
        directive: directive.to_string(),
        detail: e.to_string(),
    })
}

fn parse_positive_int(line: usize, directive: &str, value: &str) -> Result<u64, ConfigError> {
    let raw: u64 = value.trim().parse().map_err(|_| ConfigError::Malformed {
        line,
        directive: directive.to_string(),
        detail: format!("`{value}` is not a positive integer"),
    })?;
    if raw == 0 {
        return Err(ConfigError::Malformed {
            line,
            directive: directive.to_string(),
            detail: "must be greater than zero".to_string(),
        });
    }
    Ok(raw)
}

fn parse_port_list(line: usize, directive: &str, value: &str) -> Result<Vec<Port>, ConfigError> {
    let mut ports = Vec::new();
    for token in value.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let raw: u16 = token.parse().map_err(|_| ConfigError::Malformed {
            line,
            directive: directive.to_string(),
            detail: format!("`{token}` is not an integer"),
        })?;
        let port = Port::new(raw).map_err(|e| ConfigError::Malformed {
            line,
            directive: directive.to_string(),
            detail: e.to_string(),
        })?;
        ports.push(port);
    }
    Ok(ports)
}

fn parse_outputs(
    line: usize,
    value: &str,
) -> Result<HashMap<RouterId, Neighbour>, ConfigError> {
    let mut neighbours = HashMap::new();
    for token in value.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let fields: Vec<&str> = token.split('/').collect();
        if fields.len() != 3 {
            return Err(ConfigError::Malformed {
                line,
                directive: "outputs".to_string(),
                detail: format!("`{token}` is not a <port>/<cost>/<router-id> triple"),
            });
        }
        let port_raw: u16 = fields[0].trim().parse().map_err(|_| ConfigError::Malformed {
            line,
            directive: "outputs".to_string(),
            detail: format!("`{}` is not an integer port", fields[0]),
        })?;
        let port = Port::new(port_raw).map_err(|e| ConfigError::Malformed {
            line,
            directive: "outputs".to_string(),
            detail: e.to_string(),
        })?;

        let cost_raw: i64 = fields[1].trim().parse().map_err(|_| ConfigError::Malformed {
            line,
            directive: "outputs".to_string(),
            detail: format!("`{}` is not an integer cost", fields[1]),
        })?;
        if !(0..=16).contains(&cost_raw) {
            return Err(ConfigError::Malformed {
                line,
                directive: "outputs".to_string(),
                detail: format!("cost {cost_raw} outside [0, 16]"),
            });
        }
        let cost = Cost::saturating(cost_raw);

        let id_raw: u16 = fields[2].trim().parse().map_err(|_| ConfigError::Malformed {
            line,
            directive: "outputs".to_string(),
            detail: format!("`{}` is not an integer router id", fields[2]),
        })?;
        let neighbour_id = RouterId::new(id_raw).map_err(|e| ConfigError::Malformed {
            line,
            directive: "outputs".to_string(),
            detail: e.to_string(),
        })?;

        neighbours.insert(neighbour_id, Neighbour { port, cost });
    }
    Ok(neighbours)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> &'static str {
        "router-id 1\n\
         input-ports 20001\n\
         outputs 20002/1/2, 20003/1/3\n\
         update-period 5\n"
    }

    #[test]
    fn parses_a_well_formed_config() {
        let cfg = Config::parse(sample()).unwrap();
        assert_eq!(cfg.router_id.get(), 1);
        assert_eq!(cfg.input_ports.len(), 1);
        assert_eq!(cfg.neighbours.len(), 2);
        assert_eq!(cfg.update_period_secs, 5);
        assert_eq!(cfg.timeout_length_secs(), 30);
        assert_eq!(cfg.deletion_length_secs(), 20);
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let text = "# a comment\n\nrouter-id 1\ninput-ports 20001\noutputs 20002/1/2\nupdate-period 5\n";
        assert!(Config::parse(text).is_ok());
    }

    #[test]
    fn missing_directive_is_incomplete() {
        let text = "input-ports 20001\noutputs 20002/1/2\nupdate-period 5\n";
        let err = Config::parse(text).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn out_of_range_router_id_is_malformed() {
        let text = "router-id 99999\ninput-ports 20001\noutputs 20002/1/2\nupdate-period 5\n";
        let err = Config::parse(text).unwrap_err();
        assert_eq!(err.exit_code(), 11);
    }

    #[test]
    fn zero_update_period_is_malformed() {
        let text = "router-id 1\ninput-ports 20001\noutputs 20002/1/2\nupdate-period 0\n";
        let err = Config::parse(text).unwrap_err();
        assert_eq!(err.exit_code(), 11);
    }

    #[test]
    fn malformed_output_triple_is_rejected() {
        let text = "router-id 1\ninput-ports 20001\noutputs 20002/1\nupdate-period 5\n";
        let err = Config::parse(text).unwrap_err();
        assert_eq!(err.exit_code(), 11);
    }

    #[test]
    fn unrecognised_directive_is_rejected() {
        let text = "router-id 1\ninput-ports 20001\noutputs 20002/1/2\nupdate-period 5\nbogus foo\n";
        let err = Config::parse(text).unwrap_err();
        assert_eq!(err.exit_code(), 11);
    }
}
