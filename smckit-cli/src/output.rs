use std::{fmt, io::Write};

use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value;
use smckit::{
    KeyInfo, RawValue, SmcKey, SmcValue,
    sensors::{FanReading, PowerStatus, TemperatureReading},
};

use crate::exit::{CliResult, io_error};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Writes one record, as a line of text or a JSON object.
pub fn emit<T>(out: &mut impl Write, format: OutputFormat, item: &T) -> CliResult<()>
where
    T: Serialize + fmt::Display,
{
    let written = match format {
        OutputFormat::Text => writeln!(out, "{item}"),
        OutputFormat::Json => serde_json::to_writer(&mut *out, item)
            .map_err(std::io::Error::from)
            .and_then(|()| writeln!(out)),
    };
    written.map_err(|e| io_error("write output", e))
}

/// Writes a list, one line per record in text mode or a single JSON array.
pub fn emit_all<T>(out: &mut impl Write, format: OutputFormat, items: &[T]) -> CliResult<()>
where
    T: Serialize + fmt::Display,
{
    match format {
        OutputFormat::Text => {
            for item in items {
                emit(&mut *out, format, item)?;
            }
            Ok(())
        }
        OutputFormat::Json => {
            let written = serde_json::to_writer(&mut *out, items)
                .map_err(std::io::Error::from)
                .and_then(|()| writeln!(out));
            written.map_err(|e| io_error("write output", e))
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn value_json(value: &SmcValue) -> Value {
    match value {
        SmcValue::Bool(v) => Value::from(*v),
        SmcValue::U8(v) => Value::from(*v),
        SmcValue::I8(v) => Value::from(*v),
        SmcValue::U16(v) => Value::from(*v),
        SmcValue::I16(v) => Value::from(*v),
        SmcValue::U32(v) => Value::from(*v),
        SmcValue::I32(v) => Value::from(*v),
        SmcValue::U64(v) => Value::from(*v),
        SmcValue::I64(v) => Value::from(*v),
        SmcValue::F32(v) => Value::from(*v),
        SmcValue::Fixed(v) => Value::from(*v),
        SmcValue::Chars(s) => Value::from(s.as_str()),
        SmcValue::Bytes(b) => Value::from(hex(b)),
        other => other.as_f64().map(Value::from).unwrap_or(Value::Null),
    }
}

#[derive(Debug, Serialize)]
pub struct KeyReport {
    pub key: String,
    pub data_type: String,
    pub size: u32,
    pub bytes: String,
    pub value: Option<Value>,
    #[serde(skip)]
    raw: RawValue,
}

impl From<RawValue> for KeyReport {
    fn from(raw: RawValue) -> Self {
        Self {
            key: raw.key.to_string(),
            data_type: raw.info.data_type.to_string(),
            size: raw.info.data_size,
            bytes: hex(raw.valid_bytes()),
            value: raw.decode().ok().as_ref().map(value_json),
            raw,
        }
    }
}

impl fmt::Display for KeyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.raw, f)
    }
}

#[derive(Debug, Serialize)]
pub struct InfoReport {
    pub key: String,
    pub data_type: String,
    pub size: u32,
    pub attributes: u8,
}

impl InfoReport {
    pub fn new(key: SmcKey, info: &KeyInfo) -> Self {
        Self {
            key: key.to_string(),
            data_type: info.data_type.to_string(),
            size: info.data_size,
            attributes: info.data_attributes,
        }
    }
}

impl fmt::Display for InfoReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} type: {} size: {} attributes: {:#04x}",
            self.key, self.data_type, self.size, self.attributes
        )
    }
}

#[derive(Debug, Serialize)]
pub struct FanReport {
    pub index: u32,
    pub current_rpm: u32,
    pub min_rpm: u32,
    pub max_rpm: u32,
}

impl From<FanReading> for FanReport {
    fn from(fan: FanReading) -> Self {
        Self {
            index: fan.index,
            current_rpm: fan.current_rpm,
            min_rpm: fan.min_rpm,
            max_rpm: fan.max_rpm,
        }
    }
}

impl fmt::Display for FanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fan {}: {} rpm (min {}, max {})",
            self.index, self.current_rpm, self.min_rpm, self.max_rpm
        )
    }
}

#[derive(Debug, Serialize)]
pub struct TemperatureReport {
    pub key: &'static str,
    pub name: &'static str,
    pub celsius: f64,
}

impl From<TemperatureReading> for TemperatureReport {
    fn from(reading: TemperatureReading) -> Self {
        Self {
            key: reading.sensor.key,
            name: reading.sensor.name,
            celsius: reading.celsius,
        }
    }
}

impl fmt::Display for TemperatureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:<24} {:6.2} °C", self.key, self.name, self.celsius)
    }
}

#[derive(Debug, Serialize)]
pub struct PowerReport {
    pub battery_powered: bool,
    pub ac_present: bool,
    pub charging: bool,
    pub battery_ok: bool,
    pub battery_count: u32,
}

impl From<PowerStatus> for PowerReport {
    fn from(status: PowerStatus) -> Self {
        Self {
            battery_powered: status.battery_powered,
            ac_present: status.ac_present,
            charging: status.charging,
            battery_ok: status.battery_ok,
            battery_count: status.battery_count,
        }
    }
}

impl fmt::Display for PowerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "battery powered: {}", self.battery_powered)?;
        writeln!(f, "AC present:      {}", self.ac_present)?;
        writeln!(f, "charging:        {}", self.charging)?;
        writeln!(f, "battery ok:      {}", self.battery_ok)?;
        write!(f, "batteries:       {}", self.battery_count)
    }
}
