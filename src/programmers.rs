//! Programmer registration and dispatch
//!
//! Every programmer hands the CLI a boxed [`BusTransport`]; the bus session
//! on top of it is the same for all of them.

use wilcspi_core::BusTransport;

/// A transport picked at runtime
pub type Transport = Box<dyn BusTransport + Send>;

/// Errors from resolving a programmer string
#[derive(Debug, thiserror::Error)]
pub enum ProgrammerError {
    /// No programmer name before the options
    #[error("Empty programmer name")]
    EmptyName,
    /// An option without `=`
    #[error("Invalid parameter format: '{0}' (expected key=value)")]
    InvalidParameter(String),
    /// The name matches no programmer enabled in this build
    #[error("Unknown programmer: {name}\n\n{help}\nUse 'wilcspi list-programmers' for more details")]
    Unknown {
        /// Name as given
        name: String,
        /// Listing of the available programmers
        help: String,
    },
}

/// Information about a programmer
pub struct ProgrammerInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available programmers (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_programmers() -> Vec<ProgrammerInfo> {
    let mut programmers = Vec::new();

    #[cfg(feature = "dummy")]
    programmers.push(ProgrammerInfo {
        name: "dummy",
        aliases: &["emulator"],
        description: "In-memory WILC chip emulator (chip_id=<hex>,checksum=<on|off>,packet=<n>)",
    });

    #[cfg(feature = "linux-spi")]
    programmers.push(ProgrammerInfo {
        name: "linux_spi",
        aliases: &["linux-spi", "spidev"],
        description: "Linux spidev (dev=/dev/spidevX.Y,spispeed=<kHz>,mode=<0-3>)",
    });

    programmers
}

/// Comma separated list of programmer names for help texts
pub fn programmer_names_short() -> String {
    available_programmers()
        .iter()
        .map(|p| p.name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Full help text listing every programmer with its description
pub fn programmer_help() -> String {
    let mut help = String::from("Available programmers:\n");
    for p in available_programmers() {
        help.push_str(&format!("  {:<10} - {}\n", p.name, p.description));
        if !p.aliases.is_empty() {
            help.push_str(&format!("  {:<10}   aliases: {}\n", "", p.aliases.join(", ")));
        }
    }
    help
}

/// Resolve a name or alias to the canonical programmer name
pub fn find_programmer(name: &str) -> Option<&'static str> {
    available_programmers()
        .into_iter()
        .find(|p| p.name == name || p.aliases.contains(&name))
        .map(|p| p.name)
}

/// A parsed `name[:key=value,...]` programmer string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgrammerParams {
    /// Programmer name as given
    pub name: String,
    /// Options in the order they were given
    pub options: Vec<(String, String)>,
}

impl ProgrammerParams {
    /// Borrowed view of the options, as the transport crates take them
    pub fn option_pairs(&self) -> Vec<(&str, &str)> {
        self.options
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

/// Parse a programmer string
///
/// Format: `name` or `name:option1=value1,option2=value2`
pub fn parse_programmer_params(s: &str) -> Result<ProgrammerParams, ProgrammerError> {
    let (name, opts_str) = s.split_once(':').unwrap_or((s, ""));

    if name.is_empty() {
        return Err(ProgrammerError::EmptyName);
    }

    let mut options = Vec::new();
    if !opts_str.is_empty() {
        for opt in opts_str.split(',') {
            if let Some((key, value)) = opt.split_once('=') {
                options.push((key.to_string(), value.to_string()));
            } else {
                return Err(ProgrammerError::InvalidParameter(opt.to_string()));
            }
        }
    }

    Ok(ProgrammerParams {
        name: name.to_string(),
        options,
    })
}

/// Open the transport named by a programmer string
#[allow(unused_variables)]
pub fn open_programmer(programmer: &str) -> Result<Transport, Box<dyn std::error::Error>> {
    let params = parse_programmer_params(programmer)?;

    let canonical_name = match find_programmer(&params.name) {
        Some(n) => n,
        None => return Err(unknown_programmer_error(&params.name)),
    };

    match canonical_name {
        #[cfg(feature = "dummy")]
        "dummy" => {
            let config = wilcspi_dummy::parse_options(&params.option_pairs())
                .map_err(|e| format!("Invalid dummy parameters: {}", e))?;
            log::info!("Using emulated chip (chip id 0x{:08X})", config.chip_id);
            Ok(Box::new(wilcspi_dummy::DummyChip::new(config)))
        }

        #[cfg(feature = "linux-spi")]
        "linux_spi" => {
            log::info!("Opening Linux SPI programmer...");
            let transport =
                wilcspi_linux_spi::open_linux_spi(&params.option_pairs()).map_err(|e| {
                    format!(
                        "Failed to open Linux SPI device: {}\n\
                         Make sure the device exists and you have read/write permissions.",
                        e
                    )
                })?;
            Ok(transport)
        }

        _ => Err(unknown_programmer_error(&params.name)),
    }
}

fn unknown_programmer_error(name: &str) -> Box<dyn std::error::Error> {
    Box::new(ProgrammerError::Unknown {
        name: name.to_string(),
        help: programmer_help(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_programmer_params() {
        let p = parse_programmer_params("linux_spi:dev=/dev/spidev1.0,spispeed=12000").unwrap();
        assert_eq!(p.name, "linux_spi");
        assert_eq!(
            p.option_pairs(),
            vec![("dev", "/dev/spidev1.0"), ("spispeed", "12000")]
        );

        let p = parse_programmer_params("dummy").unwrap();
        assert_eq!(p.name, "dummy");
        assert!(p.options.is_empty());
    }

    #[test]
    fn test_parse_programmer_params_errors() {
        assert!(matches!(
            parse_programmer_params("dummy:checksum"),
            Err(ProgrammerError::InvalidParameter(opt)) if opt == "checksum"
        ));
        assert!(matches!(
            parse_programmer_params(":dev=x"),
            Err(ProgrammerError::EmptyName)
        ));
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_open_dummy() {
        assert_eq!(find_programmer("emulator"), Some("dummy"));
        assert!(open_programmer("dummy:checksum=off").is_ok());
        assert!(open_programmer("dummy:checksum=maybe").is_err());
        assert!(open_programmer("nonexistent").is_err());
    }
}
