//! Parser for `/proc/loadavg`.
//!
//! Pure function over the file content so it can be tested with string inputs.

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Parsed data from `/proc/loadavg`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadAvg {
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
}

/// Parses `/proc/loadavg` content.
///
/// Format: `load1 load5 load15 running/total last_pid`. Only the three
/// averages are used; trailing fields are ignored and may be absent.
pub fn parse_loadavg(content: &str) -> Result<LoadAvg, ParseError> {
    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(ParseError::new("invalid loadavg format"));
    }

    let parse_load = |idx: usize, name: &str| -> Result<f64, ParseError> {
        let value: f64 = parts[idx]
            .parse()
            .map_err(|_| ParseError::new(format!("invalid {}", name)))?;
        if !value.is_finite() || value < 0.0 {
            return Err(ParseError::new(format!("invalid {}", name)));
        }
        Ok(value)
    };

    let load1 = parse_load(0, "load1")?;
    let load5 = parse_load(1, "load5")?;
    let load15 = parse_load(2, "load15")?;

    Ok(LoadAvg {
        load1,
        load5,
        load15,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_loadavg() {
        let content = "0.15 0.10 0.05 1/150 1234\n";
        let load = parse_loadavg(content).unwrap();

        assert!((load.load1 - 0.15).abs() < 0.001);
        assert!((load.load5 - 0.10).abs() < 0.001);
        assert!((load.load15 - 0.05).abs() < 0.001);
    }

    #[test]
    fn test_parse_loadavg_averages_only() {
        let load = parse_loadavg("1.00 2.00 3.00").unwrap();
        assert_eq!(
            load,
            LoadAvg {
                load1: 1.0,
                load5: 2.0,
                load15: 3.0
            }
        );
    }

    #[test]
    fn test_parse_loadavg_rejects_garbage() {
        assert!(parse_loadavg("").is_err());
        assert!(parse_loadavg("0.15 0.10").is_err());
        assert!(parse_loadavg("abc 0.10 0.05 1/150 1234").is_err());
        assert!(parse_loadavg("NaN 0.10 0.05 1/150 1234").is_err());
        assert!(parse_loadavg("-1.0 0.10 0.05 1/150 1234").is_err());
    }
}
