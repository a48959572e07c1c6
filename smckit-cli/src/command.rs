use clap::{Parser, Subcommand, ValueEnum};
use smckit::ByteOrder;

use crate::{
    logging::{LogFormat, LogLevel},
    output::OutputFormat,
};

#[derive(Parser, Debug)]
#[command(
    name = "smckit",
    version,
    about = "Apple System Management Controller (SMC) tool"
)]
pub struct CliArgs {
    /// Output format (stdout).
    #[arg(
        long,
        value_name = "FORMAT",
        env = "SMCKIT_FORMAT",
        default_value = "text",
        global = true
    )]
    pub format: OutputFormat,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        env = "SMCKIT_LOG_LEVEL",
        default_value = "warn",
        global = true
    )]
    pub log_level: LogLevel,

    /// Byte order of integer and float keys.
    #[arg(
        long,
        value_name = "ORDER",
        env = "SMCKIT_BYTE_ORDER",
        default_value = "auto",
        global = true
    )]
    pub byte_order: ByteOrderArg,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ByteOrderArg {
    /// Follow the machine: big-endian on Intel, little-endian on Apple silicon
    Auto,
    Little,
    Big,
}

impl From<ByteOrderArg> for ByteOrder {
    fn from(arg: ByteOrderArg) -> Self {
        match arg {
            ByteOrderArg::Auto => ByteOrder::native(),
            ByteOrderArg::Little => ByteOrder::Little,
            ByteOrderArg::Big => ByteOrder::Big,
        }
    }
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// List all SMC keys and their values
    List,
    /// Read a single SMC key and display its value
    Read {
        #[arg(help = "Four-character SMC key name (e.g. TB0T, TCHP)")]
        key: String,
    },
    /// Show the data type, size and attributes of a key
    Info {
        #[arg(help = "Four-character SMC key name (e.g. TB0T, TCHP)")]
        key: String,
    },
    /// Write a value to a SMC key
    Write {
        #[arg(help = "Four-character SMC key name (e.g. TB0T, TCHP)")]
        key: String,
        #[arg(
            help = "Hexadecimal value to write, `0x` prefix optional; for 0x031000, write 031000"
        )]
        value: String,
    },
    /// Show fan speeds and limits
    Fans {
        /// Set the minimum speed of fan INDEX to RPM
        #[arg(long, num_args = 2, value_names = ["INDEX", "RPM"])]
        set_min: Option<Vec<u32>>,
    },
    /// Show every known temperature sensor present on this machine
    Temps,
    /// Show battery and AC status
    Power,
}
