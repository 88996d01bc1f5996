#[macro_use]
extern crate clap;

use clap::Arg;
use fv1asm::{Options, Warning};
use std::fs::File;
use std::io::prelude::*;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Debug)]
enum IOErrorContext {
    ReadInput,
    WriteOutput,
}

#[derive(Debug)]
enum Error {
    Asm(fv1asm::Error),
    Io(std::io::Error, IOErrorContext, PathBuf),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err, context, path) => write!(
                f,
                "{} file \"{}\" failed: {}",
                match context {
                    IOErrorContext::ReadInput => "Reading input",
                    IOErrorContext::WriteOutput => "Writing output",
                },
                path.display(),
                err
            ),
            Error::Asm(err) => write!(f, "{}", err),
        }
    }
}

fn main() {
    let matches = app_from_crate!()
        .arg(Arg::with_name("INPUT").help("Assembly source file").required(true).index(1))
        .arg(Arg::with_name("OUTPUT").help("Output file (defaults to INPUT with a .bin/.hex extension)").index(2))
        .arg(Arg::with_name("quiet").short("q").help("Suppress warnings"))
        .arg(Arg::with_name("verbose").short("v").help("Verbose diagnostic output"))
        .arg(Arg::with_name("clamp").short("c").help("Clamp out-of-range operands instead of erroring"))
        .arg(Arg::with_name("nopfill").short("n").help("Fill unused program slots with explicit skp 0,0"))
        .arg(Arg::with_name("spinreals").short("s").help("Treat integer literals 1/-1/2/-2 as real"))
        .arg(
            Arg::with_name("slot")
                .short("p")
                .takes_value(true)
                .value_name("SLOT")
                .help("Program slot 0-7 (Intel HEX base address, ignored in binary mode)"),
        )
        .arg(Arg::with_name("binary").short("b").help("Force binary output regardless of output file extension"))
        .get_matches();

    let input = matches.value_of("INPUT").unwrap();
    let output = matches.value_of("OUTPUT");
    let quiet = matches.is_present("quiet");
    let force_binary = matches.is_present("binary");
    let slot: u8 = matches
        .value_of("slot")
        .map(|s| s.parse().unwrap_or_else(|_| {
            eprintln!("error: -p expects an integer 0-7");
            process::exit(1);
        }))
        .unwrap_or(0);

    let options = Options {
        clamp: matches.is_present("clamp"),
        spinreals: matches.is_present("spinreals"),
        explicit_nop_fill: matches.is_present("nopfill"),
    };

    if let Err(err) = run(input, output, force_binary, slot, quiet, &options) {
        eprintln!("{}", err);
        process::exit(1);
    }
}

fn run(
    input: &str,
    output: Option<&str>,
    force_binary: bool,
    slot: u8,
    quiet: bool,
    options: &Options,
) -> Result<(), Error> {
    let input_path = Path::new(input);
    let source = read_source(input_path)?;

    let assembly = fv1asm::assemble(&source, options).map_err(Error::Asm)?;

    if !quiet {
        for warning in &assembly.warnings {
            print_warning(warning);
        }
    }

    let output_path: PathBuf = output.map(PathBuf::from).unwrap_or_else(|| {
        let ext = if force_binary { "bin" } else { "hex" };
        input_path.with_extension(ext)
    });
    let binary_mode = force_binary
        || output_path.extension().map(|ext| ext == "bin").unwrap_or(false);

    let output_file = File::create(&output_path)
        .map_err(|err| Error::Io(err, IOErrorContext::WriteOutput, output_path.clone()))?;
    let mut writer = BufWriter::new(output_file);

    let result = if binary_mode {
        fv1asm::output::write_binary(&assembly.program, &mut writer)
    } else {
        fv1asm::output::write_intel_hex(&assembly.program, slot, &mut writer)
    };
    result.map_err(|err| Error::Io(err, IOErrorContext::WriteOutput, output_path))?;

    Ok(())
}

fn print_warning(warning: &Warning) {
    eprintln!("{}", warning);
}

/// Reads the input file as text, tolerating a UTF-8 or UTF-16 byte-order
/// mark.
fn read_source(path: &Path) -> Result<String, Error> {
    let file = File::open(path).map_err(|err| Error::Io(err, IOErrorContext::ReadInput, path.to_owned()))?;
    let mut buf_reader = BufReader::new(file);
    let mut bytes = Vec::new();
    buf_reader
        .read_to_end(&mut bytes)
        .map_err(|err| Error::Io(err, IOErrorContext::ReadInput, path.to_owned()))?;

    if bytes.starts_with(&[0xFF, 0xFE]) {
        let units: Vec<u16> = bytes[2..]
            .chunks(2)
            .map(|pair| u16::from_le_bytes([pair[0], *pair.get(1).unwrap_or(&0)]))
            .collect();
        return Ok(String::from_utf16_lossy(&units));
    }
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks(2)
            .map(|pair| u16::from_be_bytes([pair[0], *pair.get(1).unwrap_or(&0)]))
            .collect();
        return Ok(String::from_utf16_lossy(&units));
    }
    let text = if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        String::from_utf8_lossy(&bytes[3..]).into_owned()
    } else {
        String::from_utf8_lossy(&bytes).into_owned()
    };
    Ok(text)
}
