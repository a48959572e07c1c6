use std::io::Write;

use smckit::{Smc, SmcKey, channel::SmcChannel, structs::SMC_BYTES_LEN};
use tracing::{info, warn};

use crate::{
    command::Commands,
    exit::{CliError, CliResult, smc_error},
    output::{
        FanReport, InfoReport, KeyReport, OutputFormat, PowerReport, TemperatureReport, emit,
        emit_all,
    },
};

pub fn run<C: SmcChannel>(
    smc: &Smc<C>,
    command: Commands,
    format: OutputFormat,
    out: &mut impl Write,
) -> CliResult<()> {
    match command {
        Commands::List => list(smc, format, out),
        Commands::Read { key } => read(smc, &key, format, out),
        Commands::Info { key } => key_info(smc, &key, format, out),
        Commands::Write { key, value } => write(smc, &key, &value),
        Commands::Fans { set_min } => {
            if let Some([index, rpm]) = set_min.as_deref() {
                set_fan_min(smc, *index, *rpm)?;
            }
            fans(smc, format, out)
        }
        Commands::Temps => temps(smc, format, out),
        Commands::Power => power(smc, format, out),
    }
}

fn parse_key(key: &str) -> CliResult<SmcKey> {
    SmcKey::new(key).map_err(|e| CliError::usage(format!("invalid key {key:?}: {e}")))
}

pub fn list<C: SmcChannel>(
    smc: &Smc<C>,
    format: OutputFormat,
    out: &mut impl Write,
) -> CliResult<()> {
    let values = smc.values().map_err(|e| smc_error("count keys", e))?;
    let mut reports = Vec::with_capacity(values.size_hint().0);
    for v in values {
        match v {
            Ok(v) => reports.push(KeyReport::from(v)),
            Err(e) => warn!(index = e.index, "{e}"),
        }
    }
    emit_all(out, format, &reports)
}

pub fn read<C: SmcChannel>(
    smc: &Smc<C>,
    key: &str,
    format: OutputFormat,
    out: &mut impl Write,
) -> CliResult<()> {
    let key = parse_key(key)?;
    let val = smc
        .read_raw_for(key)
        .map_err(|e| smc_error(&format!("read {key}"), e))?;
    emit(out, format, &KeyReport::from(val))
}

pub fn key_info<C: SmcChannel>(
    smc: &Smc<C>,
    key: &str,
    format: OutputFormat,
    out: &mut impl Write,
) -> CliResult<()> {
    let key = parse_key(key)?;
    let info = smc
        .key_info_for(key)
        .map_err(|e| smc_error(&format!("info {key}"), e))?;
    emit(out, format, &InfoReport::new(key, &info))
}

/// Parses hex digits, two per byte, with an optional `0x` prefix.
pub fn parse_hex(value: &str) -> CliResult<Vec<u8>> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    if !digits.is_ascii() {
        return Err(CliError::usage("value should be ascii"));
    }
    let (chunks, rest) = digits.as_bytes().as_chunks::<2>();
    if !rest.is_empty() || chunks.is_empty() {
        return Err(CliError::usage(format!(
            "invalid value {value:?}: expected an even number of hex digits"
        )));
    }
    if chunks.len() > SMC_BYTES_LEN {
        return Err(CliError::usage(format!(
            "value is too long: {} bytes, at most {SMC_BYTES_LEN}",
            chunks.len()
        )));
    }
    chunks
        .iter()
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| {
                    CliError::usage(format!(
                        "can not parse {} as hex",
                        String::from_utf8_lossy(pair)
                    ))
                })
        })
        .collect()
}

pub fn write<C: SmcChannel>(smc: &Smc<C>, key: &str, value: &str) -> CliResult<()> {
    let key = parse_key(key)?;
    let bytes = parse_hex(value)?;
    smc.write_for(key, &smckit::SmcValue::Bytes(bytes))
        .map_err(|e| smc_error(&format!("write {key}"), e))?;
    info!(%key, value, "key written");
    Ok(())
}

pub fn set_fan_min<C: SmcChannel>(smc: &Smc<C>, index: u32, rpm: u32) -> CliResult<()> {
    smc.sensors()
        .set_fan_min_speed(index, rpm)
        .map_err(|e| smc_error(&format!("set fan {index} minimum"), e))?;
    info!(index, rpm, "fan minimum speed set");
    Ok(())
}

pub fn fans<C: SmcChannel>(
    smc: &Smc<C>,
    format: OutputFormat,
    out: &mut impl Write,
) -> CliResult<()> {
    let fans = smc.sensors().fans().map_err(|e| smc_error("read fans", e))?;
    let reports: Vec<_> = fans.into_iter().map(FanReport::from).collect();
    emit_all(out, format, &reports)
}

pub fn temps<C: SmcChannel>(
    smc: &Smc<C>,
    format: OutputFormat,
    out: &mut impl Write,
) -> CliResult<()> {
    let readings = smc
        .sensors()
        .all_temperatures()
        .map_err(|e| smc_error("read temperatures", e))?;
    let reports: Vec<_> = readings.into_iter().map(TemperatureReport::from).collect();
    emit_all(out, format, &reports)
}

pub fn power<C: SmcChannel>(
    smc: &Smc<C>,
    format: OutputFormat,
    out: &mut impl Write,
) -> CliResult<()> {
    let status = smc
        .sensors()
        .power()
        .map_err(|e| smc_error("read power status", e))?;
    emit(out, format, &PowerReport::from(status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit::{DATA_INVALID, NOT_FOUND, USAGE};
    use rstest::{fixture, rstest};
    use smckit::{ByteOrder, SmcConfig, memory::MemoryChannel};

    #[fixture]
    fn channel() -> MemoryChannel {
        MemoryChannel::new()
            .with_key("FNum", b"ui8 ", &[1])
            .with_key("F0Ac", b"fpe2", &[31, 64])
            .with_key("F0Mn", b"fpe2", &[18, 192])
            .with_key("F0Mx", b"fpe2", &[96, 220])
            .with_key("TC0P", b"sp78", &[0x2a, 0x80])
            .with_key("BATP", b"flag", &[1])
    }

    fn connect(channel: &MemoryChannel) -> Smc<MemoryChannel> {
        let config = SmcConfig::default().with_byte_order(ByteOrder::Big);
        Smc::connect(channel.clone(), config).expect("open")
    }

    fn run_to_string(smc: &Smc<MemoryChannel>, command: Commands, format: OutputFormat) -> String {
        let mut out = Vec::new();
        run(smc, command, format, &mut out).expect("command");
        String::from_utf8(out).expect("utf8")
    }

    #[rstest]
    #[case("031000", vec![0x03, 0x10, 0x00])]
    #[case("0x1f40", vec![0x1f, 0x40])]
    #[case("FF", vec![0xff])]
    fn parses_hex_values(#[case] input: &str, #[case] expected: Vec<u8>) {
        assert_eq!(parse_hex(input).expect("hex"), expected);
    }

    #[rstest]
    #[case("")]
    #[case("abc")]
    #[case("zz")]
    #[case("é0")]
    fn rejects_bad_hex(#[case] input: &str) {
        assert_eq!(parse_hex(input).expect_err("bad hex").code, USAGE);
    }

    #[test]
    fn rejects_values_longer_than_a_transfer() {
        let long = "00".repeat(SMC_BYTES_LEN + 1);
        assert_eq!(parse_hex(&long).expect_err("too long").code, USAGE);
    }

    #[rstest]
    fn read_prints_raw_and_decoded_value(channel: MemoryChannel) {
        let smc = connect(&channel);
        let text = run_to_string(
            &smc,
            Commands::Read { key: "F0Ac".into() },
            OutputFormat::Text,
        );
        assert_eq!(text, "F0Ac fpe2 size: 2(bytes 1f 40) value: 2000\n");
    }

    #[rstest]
    fn read_as_json(channel: MemoryChannel) {
        let smc = connect(&channel);
        let text = run_to_string(
            &smc,
            Commands::Read { key: "TC0P".into() },
            OutputFormat::Json,
        );
        let json: serde_json::Value = serde_json::from_str(&text).expect("json");
        assert_eq!(json["key"], "TC0P");
        assert_eq!(json["data_type"], "sp78");
        assert_eq!(json["bytes"], "2a80");
        assert_eq!(json["value"], 42.5);
    }

    #[rstest]
    fn write_then_read_back(channel: MemoryChannel) {
        let smc = connect(&channel);
        run_to_string(
            &smc,
            Commands::Write {
                key: "F0Mn".into(),
                value: "38f4".into(),
            },
            OutputFormat::Text,
        );
        assert_eq!(channel.value("F0Mn"), Some(vec![0x38, 0xf4]));
    }

    #[rstest]
    fn write_with_wrong_length_is_data_invalid(channel: MemoryChannel) {
        let smc = connect(&channel);
        let err = write(&smc, "F0Mn", "000000").expect_err("size");
        assert_eq!(err.code, DATA_INVALID);
        assert_eq!(channel.stats().writes, 0);
    }

    #[rstest]
    fn missing_key_is_not_found(channel: MemoryChannel) {
        let smc = connect(&channel);
        let mut out = Vec::new();
        let err = read(&smc, "ZZZZ", OutputFormat::Text, &mut out).expect_err("missing");
        assert_eq!(err.code, NOT_FOUND);
        let err = read(&smc, "Vim", OutputFormat::Text, &mut out).expect_err("malformed");
        assert_eq!(err.code, USAGE);
    }

    #[rstest]
    fn list_covers_every_key(channel: MemoryChannel) {
        let smc = connect(&channel);
        let text = run_to_string(&smc, Commands::List, OutputFormat::Json);
        let json: serde_json::Value = serde_json::from_str(&text).expect("json");
        assert_eq!(json.as_array().map(Vec::len), Some(7));
        assert_eq!(json[0]["key"], "#KEY");
    }

    #[rstest]
    fn fans_and_set_min(channel: MemoryChannel) {
        let smc = connect(&channel);
        let text = run_to_string(
            &smc,
            Commands::Fans {
                set_min: Some(vec![0, 2000]),
            },
            OutputFormat::Text,
        );
        assert_eq!(text, "fan 0: 2000 rpm (min 2000, max 6199)\n");
    }

    #[rstest]
    fn temps_and_power(channel: MemoryChannel) {
        let smc = connect(&channel);
        let text = run_to_string(&smc, Commands::Temps, OutputFormat::Json);
        let json: serde_json::Value = serde_json::from_str(&text).expect("json");
        assert_eq!(json[0]["key"], "TC0P");
        assert_eq!(json[0]["celsius"], 42.5);

        let text = run_to_string(&smc, Commands::Power, OutputFormat::Json);
        let json: serde_json::Value = serde_json::from_str(&text).expect("json");
        assert_eq!(json["battery_powered"], true);
        assert_eq!(json["battery_count"], 0);
        assert_eq!(json["battery_ok"], false);
        assert_eq!(json["ac_present"], true);
    }
}
