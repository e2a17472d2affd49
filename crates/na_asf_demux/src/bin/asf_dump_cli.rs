//! Dump the media objects of an ASF file.
//!
//! Usage:
//!   asf-dump <input.asf> [--stream N] [--quiet]

use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};

use anyhow::{bail, Context};

use asf_demux::header::StreamKind;
use asf_demux::{AsfDemuxer, AsfHeader, DemuxHost, FragmentChain, ReaderSource};

#[derive(Default)]
struct DumpHost {
    stream: Option<u8>,
    quiet: bool,
    objects: u64,
    bytes: u64,
}

impl DemuxHost for DumpHost {
    fn send(&mut self, stream_id: u8, object: FragmentChain) {
        self.objects += 1;
        self.bytes += object.data_len() as u64;
        if self.quiet {
            return;
        }
        println!(
            "stream {:3}  pts {:>12}  dts {:>12}  size {:>7}  frags {:>2}{}",
            stream_id,
            object.pts_us().unwrap_or_default(),
            object.dts_us().unwrap_or_default(),
            object.data_len(),
            object.len(),
            if object.is_key_frame() { "  key" } else { "" }
        );
    }

    fn should_skip(&mut self, stream_id: u8, _is_key_frame: bool) -> bool {
        self.stream.is_some_and(|s| s != stream_id)
    }

    fn set_aspect_ratio(&mut self, stream_id: u8, num: u8, den: u8) {
        log::info!("stream {stream_id}: pixel aspect ratio {num}:{den}");
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if let Err(e) = run(&args) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn usage(prog: &str) -> String {
    format!("Usage: {prog} <input.asf> [--stream N] [--quiet]")
}

fn run(args: &[String]) -> anyhow::Result<()> {
    let prog = args.first().map(String::as_str).unwrap_or("asf-dump");

    let mut input_path: Option<&str> = None;
    let mut host = DumpHost::default();

    let mut it = args.iter().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--quiet" => host.quiet = true,
            "--stream" => {
                let n = it.next().with_context(|| usage(prog))?;
                host.stream = Some(n.parse().with_context(|| format!("bad stream number {n}"))?);
            }
            _ if input_path.is_none() => input_path = Some(arg),
            _ => bail!("Unexpected argument: {arg}\n{}", usage(prog)),
        }
    }

    let Some(input_path) = input_path else {
        bail!("{}", usage(prog));
    };

    let mut reader = BufReader::new(File::open(input_path).with_context(|| input_path.to_string())?);
    let header = AsfHeader::read(&mut reader)?;

    println!(
        "packets {}  size {}..{}  preroll {} ms",
        header.data_packet_count,
        header.file.min_packet_size,
        header.file.max_packet_size,
        header.file.preroll_ms
    );
    for s in &header.streams {
        let kind = match &s.kind {
            StreamKind::Video { width, height, codec_four_cc } => {
                format!("video {}x{} {}", width, height, String::from_utf8_lossy(codec_four_cc))
            }
            StreamKind::Audio { format_tag, channels, sample_rate } => {
                format!("audio 0x{format_tag:04x} {channels}ch {sample_rate} Hz")
            }
            StreamKind::Other(guid) => format!("other {guid}"),
        };
        println!("stream {:3}  {kind}  extensions {}", s.stream_number, s.extensions.len());
    }

    reader.seek(SeekFrom::Start(header.data_offset))?;
    let source = ReaderSource::with_position(reader, header.data_offset);

    let mut demuxer = AsfDemuxer::new(source, host, header.track_table(), header.demux_config());
    let stats = demuxer.run()?;
    let host = demuxer.host();

    println!(
        "{} packets ({} damaged, {} recovered), {} objects, {} bytes",
        stats.packets, stats.damaged, stats.recovered, host.objects, host.bytes
    );
    Ok(())
}
