#![forbid(unsafe_code)]
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use gifcodec::stream::{ByteReader, ByteWriter};
use gifcodec::{lzw, Algorithm, Decoder, EncoderOptions, Frame};

/// Inspect, re-encode and LZW-code GIF data
#[derive(Parser)]
#[command(name = "gifcodec")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the block structure of a GIF file
    Info {
        /// Filepath or '-' for stdin
        #[arg(default_value = "-")]
        file: PathBuf,
    },
    /// Decode a GIF and encode it again with a new palette
    Requantize {
        /// Filepath or '-' for stdin
        input: PathBuf,
        /// Filepath or '-' for stdout
        output: PathBuf,
        /// Colors of the shared palette
        #[arg(short, long, default_value_t = 255, value_parser = clap::value_parser!(u16).range(2..=255))]
        colors: u16,
        #[arg(short, long, value_enum, default_value_t = AlgorithmArg::NeuQuant)]
        algorithm: AlgorithmArg,
        /// NeuQuant learns from every n-th pixel
        #[arg(short, long, default_value_t = 10)]
        sample_factor: usize,
    },
    /// Compress or decompress a raw stream of color indices
    Lzw {
        #[arg(short, long, conflicts_with = "encode")]
        decode: bool,
        #[arg(short, long)]
        encode: bool,
        /// Minimum code size of the stream, the first byte when decoding
        #[arg(short = 'w', long, default_value_t = 8, value_parser = clap::value_parser!(u8).range(2..=8))]
        min_code: u8,
        /// Number of indices to decode
        #[arg(short = 'n', long)]
        count: Option<usize>,
        /// Filepath or '-' for stdin
        #[arg(default_value = "-")]
        file: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum AlgorithmArg {
    MedianCut,
    NeuQuant,
}

fn main() -> CodingResult {
    CodingResult::catch_panic(|| run(Cli::parse()))
}

fn run(cli: Cli) -> Result<(), io::Error> {
    match cli.command {
        Command::Info { file } => info(&read_input(&file)?),
        Command::Requantize {
            input,
            output,
            colors,
            algorithm,
            sample_factor,
        } => {
            let algorithm = match algorithm {
                AlgorithmArg::MedianCut => Algorithm::MedianCut,
                AlgorithmArg::NeuQuant => Algorithm::NeuQuant,
            };
            let data = read_input(&input)?;
            let bytes = requantize(&data, usize::from(colors), algorithm, sample_factor)?;
            write_output(&output, &bytes)
        }
        Command::Lzw {
            decode,
            encode,
            min_code,
            count,
            file,
        } => {
            let data = read_input(&file)?;
            let out = if decode && !encode {
                let count = count.ok_or_else(|| invalid("decoding needs --count"))?;
                let mut reader = ByteReader::new(&data);
                let min_code = reader.read_u8().map_err(invalid)?;
                let payload = reader.read_sub_blocks().map_err(invalid)?;
                lzw::decode(min_code, &payload, count)
            } else {
                let indices: Vec<u8> = data.iter().map(|&b| b & ((1 << min_code) - 1) as u8).collect();
                let mut writer = ByteWriter::new();
                lzw::encode(min_code, &indices, &mut writer);
                writer.finish()
            };
            io::stdout().lock().write_all(&out)
        }
    }
}

fn info(data: &[u8]) -> Result<(), io::Error> {
    let decoder = Decoder::new(data).map_err(invalid)?;
    let gif = decoder.gif();
    let out = io::stdout();
    let mut out = out.lock();

    writeln!(out, "GIF{} {}x{}", gif.version.as_str(), gif.width, gif.height)?;
    match &gif.global_color_table {
        Some(table) => writeln!(
            out,
            "global color table: {} colors, background {}",
            table.len(),
            gif.background_color_index
        )?,
        None => writeln!(out, "global color table: none")?,
    }
    if gif.looped {
        writeln!(out, "loop count: {}", gif.loop_count)?;
    }

    for (i, frame) in gif.frames.iter().enumerate() {
        write!(
            out,
            "frame {}: {}x{} at ({}, {}), {} ms, {:?}",
            i,
            frame.width,
            frame.height,
            frame.left,
            frame.top,
            frame.delay_ms,
            frame.disposal()
        )?;
        if let Some(index) = frame.transparent_index() {
            write!(out, ", transparent {}", index)?;
        }
        if let Some(table) = &frame.local_color_table {
            write!(out, ", local table {} colors", table.len())?;
        }
        if frame.interlaced {
            write!(out, ", interlaced")?;
        }
        writeln!(out, ", {} bytes of image data", frame.data_len())?;
        if let Some(comment) = &frame.comment {
            writeln!(out, "  comment: {}", comment)?;
        }
    }

    for warning in &gif.warnings {
        writeln!(out, "warning: {}", warning)?;
    }
    Ok(())
}

fn requantize(
    data: &[u8],
    colors: usize,
    algorithm: Algorithm,
    sample_factor: usize,
) -> Result<Vec<u8>, io::Error> {
    let decoder = Decoder::new(data).map_err(invalid)?;
    let gif = decoder.gif();
    let mut options = EncoderOptions::new(u32::from(gif.width), u32::from(gif.height))
        .with_max_colors(colors)
        .with_algorithm(algorithm)
        .with_sample_factor(sample_factor)
        .with_version(gif.version);
    if gif.looped {
        options = options.with_loop_count(gif.loop_count);
    } else {
        options = options.without_looping();
    }

    let frames = decoder
        .frames()
        .map(|frame| Frame::new(frame.rgba).with_delay_ms(frame.delay_ms));
    gifcodec::encode(&options, frames).map_err(invalid)
}

fn read_input(path: &Path) -> Result<Vec<u8>, io::Error> {
    if path == Path::new("-") {
        let mut data = Vec::new();
        io::stdin().lock().read_to_end(&mut data)?;
        Ok(data)
    } else {
        fs::read(path)
    }
}

fn write_output(path: &Path, data: &[u8]) -> Result<(), io::Error> {
    if path == Path::new("-") {
        io::stdout().lock().write_all(data)
    } else {
        fs::write(path, data)
    }
}

fn invalid(err: impl ToString) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err.to_string())
}

enum CodingResult {
    Ok,
    Err(io::Error),
    Panic,
}

impl CodingResult {
    fn catch_panic(op: fn() -> Result<(), io::Error>) -> Self {
        std::panic::catch_unwind(|| match op() {
            Ok(()) => CodingResult::Ok,
            Err(err) => CodingResult::Err(err),
        })
        .unwrap_or(CodingResult::Panic)
    }
}

impl std::process::Termination for CodingResult {
    fn report(self) -> std::process::ExitCode {
        match self {
            CodingResult::Ok => std::process::ExitCode::SUCCESS,
            CodingResult::Err(err) => {
                eprintln!("{}", err);
                std::process::ExitCode::FAILURE
            }
            CodingResult::Panic => {
                eprintln!("gifcodec {} failed irrecoverably, this is a bug.", env!("CARGO_PKG_VERSION"));
                std::process::ExitCode::from(128)
            }
        }
    }
}
