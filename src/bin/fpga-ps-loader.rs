#[macro_use]
extern crate clap;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

extern crate fpga_ps_loader;
use fpga_ps_loader::*;

use std::fs;
use std::process::exit;

use clap::{
	App,
	Arg,
	ArgMatches,
};

use fpga_ps_loader::pins::{
	Pins,
	Simulated,
	mpc52xx::{
		self,
		Mpc52xxPins,
	},
	sysfs::{
		GpioNumbers,
		SysfsPins,
	},
};

// exit code for a bit overrun with --strict
const EXIT_OVERRUN: i32 = 3;

fn get_param<T>(matches: &ArgMatches, name: &str) -> AResult<T>
where
	T: std::str::FromStr,
	failure::Error: From<<T as std::str::FromStr>::Err>,
{
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => bail!("missing parameter {}", name),
	};
	param.parse::<T>().map_err(|e| {
		let e = failure::Error::from(e);
		let msg = format!("invalid paramater {}: {}", name, e);
		e.context(msg).into()
	})
}

// physical addresses are usually given in hex
fn get_address(matches: &ArgMatches, name: &str) -> AResult<u64> {
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => bail!("missing parameter {}", name),
	};
	let parsed = if param.starts_with("0x") || param.starts_with("0X") {
		u64::from_str_radix(&param[2..], 16)
	} else {
		param.parse::<u64>()
	};
	parsed.map_err(|e| format_err!("invalid address {} {:?}: {}", name, param, e))
}

fn open_pins(matches: &ArgMatches, image_len: usize) -> AResult<Box<dyn Pins>> {
	let backend = matches.value_of("backend").unwrap_or("mpc52xx");
	let pins: Box<dyn Pins> = match backend {
		"mpc52xx" => {
			let gpio_base = get_address(matches, "gpio-base")?;
			let wkup_base = get_address(matches, "wkup-base")?;
			info!("using MPC5200 GPIO registers at 0x{:08x} / 0x{:08x}", gpio_base, wkup_base);
			Box::new(Mpc52xxPins::open(gpio_base, wkup_base)?)
		},
		"sysfs" => {
			let numbers = GpioNumbers {
				nconfig: get_param(matches, "nconfig")?,
				nstatus: get_param(matches, "nstatus")?,
				dclk: get_param(matches, "dclk")?,
				data0: get_param(matches, "data0")?,
				conf_done: get_param(matches, "conf-done")?,
			};
			info!("using sysfs GPIOs {}", numbers);
			Box::new(SysfsPins::new(numbers))
		},
		"simulate" => {
			let done_after = if matches.is_present("simulate-done-after") {
				get_param(matches, "simulate-done-after")?
			} else {
				image_len * 8
			};
			info!("simulating a device asserting CONF_DONE after {} bits", done_after);
			Box::new(Simulated::new().done_after_bits(done_after))
		},
		b => bail!("unknown backend {:?}", b),
	};
	Ok(pins)
}

fn main_app() -> AResult<i32> {
	let gpio_base = format!("0x{:08x}", mpc52xx::GPIO_STD_BASE);
	let wkup_base = format!("0x{:08x}", mpc52xx::GPIO_WKUP_BASE);
	let max_size = config::PCM032_MAX_FIRMWARE_SIZE.to_string();
	let timeout = config::DEFAULT_READY_POLLS.to_string();
	let sysfs_line = |name: &'static str, help: &'static str| {
		Arg::with_name(name)
			.long(name)
			.value_name("GPIO")
			.takes_value(true)
			.required_if("backend", "sysfs")
			.help(help)
	};

	let matches = App::new(crate_name!())
		.version(crate_version!())
		.author(crate_authors!())
		.about("Load a bitstream (.rbf) into an FPGA over passive serial")
		.arg(Arg::with_name("backend")
			.long("backend")
			.short("b")
			.takes_value(true)
			.possible_values(&["mpc52xx", "sysfs", "simulate"])
			.default_value("mpc52xx")
			.help("How the configuration lines are driven"))
		.arg(Arg::with_name("gpio-base")
			.long("gpio-base")
			.value_name("ADDRESS")
			.default_value(&gpio_base)
			.help("Physical address of the MPC5200 GPIO registers"))
		.arg(Arg::with_name("wkup-base")
			.long("wkup-base")
			.value_name("ADDRESS")
			.default_value(&wkup_base)
			.help("Physical address of the MPC5200 GPIO_WKUP registers"))
		.arg(sysfs_line("nconfig", "GPIO driving nCONFIG"))
		.arg(sysfs_line("nstatus", "GPIO reading nSTATUS"))
		.arg(sysfs_line("dclk", "GPIO driving DCLK"))
		.arg(sysfs_line("data0", "GPIO driving DATA0"))
		.arg(sysfs_line("conf-done", "GPIO reading CONF_DONE"))
		.arg(Arg::with_name("simulate-done-after")
			.long("simulate-done-after")
			.value_name("BITS")
			.takes_value(true)
			.help("Simulated device raises CONF_DONE after that many bits (default: whole image)"))
		.arg(Arg::with_name("max-size")
			.long("max-size")
			.value_name("BYTES")
			.default_value(&max_size)
			.help("Largest accepted bitstream"))
		.arg(Arg::with_name("timeout")
			.long("timeout")
			.value_name("POLLS")
			.default_value(&timeout)
			.help("How often nSTATUS is polled (1us apart) before giving up"))
		.arg(Arg::with_name("strict")
			.long("strict")
			.help("Fail if CONF_DONE didn't come up (bit overrun)"))
		.arg(Arg::with_name("RBF")
			.required(true)
			.help("Bitstream to load"))
		.get_matches();

	let profile = Profile::pcm032()
		.with_max_firmware_size(get_param(&matches, "max-size")?)
		.with_ready_polls(get_param(&matches, "timeout")?);
	let strict = matches.is_present("strict");

	let path = matches.value_of("RBF").unwrap_or_default();
	let image = fs::read(path).map_err(|e| format_err!("couldn't read bitstream {}: {}", path, e))?;

	let mut pins = open_pins(&matches, image.len())?;

	match load_bitstream(&mut pins, &profile, &image) {
		Err(e) => {
			error!("{}", e);
			Ok(e.errno())
		},
		Ok(written) => {
			if written.report.is_overrun() {
				warn!("{}: {}", path, written);
				if strict {
					return Ok(EXIT_OVERRUN);
				}
			} else {
				info!("{}: {}", path, written);
			}
			Ok(0)
		},
	}
}

fn main() {
	env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

	match main_app() {
		Ok(code) => exit(code),
		Err(e) => {
			error!("Error: {}", e);
			exit(1);
		},
	}
}
