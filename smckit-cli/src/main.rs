use clap::Parser;
use smckit::{Smc, SmcConfig};
use smckit_cli::{
    command::CliArgs,
    exit::{CliResult, SUCCESS, smc_error},
    func,
    logging::init_logging,
};

fn run(cli: CliArgs) -> CliResult<()> {
    let config = SmcConfig::default().with_byte_order(cli.byte_order.into());
    let smc = Smc::open_with(config).map_err(|e| smc_error("open AppleSMC", e))?;
    let mut stdout = std::io::stdout().lock();
    func::run(&smc, cli.command, cli.format, &mut stdout)
}

fn main() {
    let cli = CliArgs::parse();
    init_logging(cli.log_format, cli.log_level);

    match run(cli) {
        Ok(()) => std::process::exit(SUCCESS),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
