//! FFmpeg-backed local video decode and H.264 encode.
//!
//! Frames are decoded in-memory and converted to packed RGB24; the sink converts
//! back to YUV420P and encodes H.264 into whatever container the output path's
//! extension selects.

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;
use image::RgbImage;

use super::{FrameSink, FrameSource, OutputFormat, StreamInfo, OUTPUT_FOURCC};
use crate::frame::Frame;

pub(crate) struct FfmpegFileSource {
    path: String,
    info: StreamInfo,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    frame_count: u64,
    flushed: bool,
}

impl FfmpegFileSource {
    pub(crate) fn new(path: &str) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&path)
            .with_context(|| format!("failed to open video input '{}' with ffmpeg", path))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow!("'{}' has no video track", path))?;
        let stream_index = input_stream.index();
        let rate = input_stream.avg_frame_rate();
        let fps = if rate.numerator() > 0 && rate.denominator() > 0 {
            Some(f64::from(rate))
        } else {
            None
        };
        let frame_count = u64::try_from(input_stream.frames()).ok().filter(|n| *n > 0);
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        let info = StreamInfo {
            width: decoder.width(),
            height: decoder.height(),
            fps,
            frame_count,
        };
        log::info!(
            "FfmpegFileSource: opened {} ({}x{}, fps={:?})",
            path,
            info.width,
            info.height,
            info.fps
        );

        Ok(Self {
            path: path.to_string(),
            info,
            input,
            stream_index,
            decoder,
            scaler,
            frame_count: 0,
            flushed: false,
        })
    }

    fn next_packet(&mut self) -> Option<ffmpeg::Packet> {
        let stream_index = self.stream_index;
        self.input
            .packets()
            .find_map(|(stream, packet)| (stream.index() == stream_index).then_some(packet))
    }
}

impl FrameSource for FfmpegFileSource {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            let received = receive_outcome(self.decoder.receive_frame(&mut decoded))
                .with_context(|| format!("decode frame {} of {}", self.frame_count, self.path))?;
            if received == Receive::Frame {
                let mut rgb_frame = ffmpeg::frame::Video::empty();
                self.scaler
                    .run(&decoded, &mut rgb_frame)
                    .context("scale frame to RGB")?;
                let image = frame_to_image(&rgb_frame)?;
                let frame = Frame::new(self.frame_count, image);
                self.frame_count += 1;
                return Ok(Some(frame));
            }
            if received == Receive::Drained || self.flushed {
                log::debug!("FfmpegFileSource: {} ended after {} frames", self.path, self.frame_count);
                return Ok(None);
            }
            match self.next_packet() {
                Some(packet) => self
                    .decoder
                    .send_packet(&packet)
                    .context("send packet to ffmpeg decoder")?,
                None => {
                    self.decoder.send_eof().context("flush ffmpeg decoder")?;
                    self.flushed = true;
                }
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Receive {
    Frame,
    /// Decoder wants more input (EAGAIN).
    NeedInput,
    /// Decoder is fully flushed.
    Drained,
}

/// Only EAGAIN and EOF are flow control; every other decoder error is real.
fn receive_outcome(result: Result<(), ffmpeg::Error>) -> Result<Receive> {
    match result {
        Ok(()) => Ok(Receive::Frame),
        Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::util::error::EAGAIN => {
            Ok(Receive::NeedInput)
        }
        Err(ffmpeg::Error::Eof) => Ok(Receive::Drained),
        Err(e) => Err(anyhow!("ffmpeg decoder error: {}", e)),
    }
}

fn frame_to_image(frame: &ffmpeg::frame::Video) -> Result<RgbImage> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    if stride == row_bytes {
        pixels.extend_from_slice(
            data.get(..row_bytes * height as usize)
                .context("ffmpeg frame is shorter than its dimensions")?,
        );
    } else {
        for row in 0..height as usize {
            let start = row * stride;
            let end = start + row_bytes;
            pixels.extend_from_slice(
                data.get(start..end)
                    .context("ffmpeg frame row is out of bounds")?,
            );
        }
    }

    RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| anyhow!("decoded frame buffer does not match {}x{}", width, height))
}

// ----------------------------------------------------------------------------
// H.264 sink
// ----------------------------------------------------------------------------

pub(crate) struct FfmpegFileSink {
    path: String,
    output: ffmpeg::format::context::Output,
    encoder: ffmpeg::codec::encoder::video::Encoder,
    scaler: ffmpeg::software::scaling::Context,
    stream_index: usize,
    encoder_time_base: ffmpeg::Rational,
    stream_time_base: ffmpeg::Rational,
    width: u32,
    height: u32,
    next_pts: i64,
    finished: bool,
}

impl FfmpegFileSink {
    pub(crate) fn new(path: &str, format: &OutputFormat) -> Result<Self> {
        if format.fourcc != OUTPUT_FOURCC {
            return Err(anyhow!(
                "unsupported output fourcc '{}' (only avc1/H.264)",
                format.fourcc_str()
            ));
        }
        ffmpeg::init().context("initialize ffmpeg")?;
        let mut output = ffmpeg::format::output(&path)
            .with_context(|| format!("failed to open video output '{}' with ffmpeg", path))?;
        let global_header = output
            .format()
            .flags()
            .contains(ffmpeg::format::flag::Flags::GLOBAL_HEADER);

        let codec = ffmpeg::encoder::find(ffmpeg::codec::Id::H264)
            .ok_or_else(|| anyhow!("ffmpeg has no H.264 encoder"))?;
        let mut stream = output.add_stream(codec).context("add output video stream")?;
        let stream_index = stream.index();

        // Millisecond-resolution frame rate keeps 29.97 and friends exact enough.
        let rate = ffmpeg::Rational::new((format.fps * 1000.0).round() as i32, 1000);
        let encoder_time_base = rate.invert();

        let mut encoder = ffmpeg::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .context("create H.264 encoder context")?;
        encoder.set_width(format.width);
        encoder.set_height(format.height);
        encoder.set_format(ffmpeg::util::format::pixel::Pixel::YUV420P);
        encoder.set_time_base(encoder_time_base);
        encoder.set_frame_rate(Some(rate));
        if global_header {
            encoder.set_flags(ffmpeg::codec::flag::Flags::GLOBAL_HEADER);
        }
        let encoder = encoder.open_as(codec).context("open H.264 encoder")?;
        stream.set_parameters(&encoder);
        stream.set_time_base(encoder_time_base);

        output
            .write_header()
            .with_context(|| format!("write container header for '{}'", path))?;
        let stream_time_base = output
            .stream(stream_index)
            .map(|s| s.time_base())
            .ok_or_else(|| anyhow!("output stream vanished after header write"))?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            ffmpeg::util::format::pixel::Pixel::RGB24,
            format.width,
            format.height,
            ffmpeg::util::format::pixel::Pixel::YUV420P,
            format.width,
            format.height,
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg output scaler")?;

        log::info!(
            "FfmpegFileSink: writing {} ({}x{} @ {:.3} fps, {})",
            path,
            format.width,
            format.height,
            format.fps,
            format.fourcc_str()
        );

        Ok(Self {
            path: path.to_string(),
            output,
            encoder,
            scaler,
            stream_index,
            encoder_time_base,
            stream_time_base,
            width: format.width,
            height: format.height,
            next_pts: 0,
            finished: false,
        })
    }

    fn drain_packets(&mut self) -> Result<()> {
        let mut packet = ffmpeg::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
            packet
                .write_interleaved(&mut self.output)
                .with_context(|| format!("write packet to '{}'", self.path))?;
        }
        Ok(())
    }
}

impl FrameSink for FfmpegFileSink {
    fn write(&mut self, frame: &Frame) -> Result<()> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(anyhow!(
                "frame {} is {}x{}, encoder expects {}x{}",
                frame.index,
                frame.width(),
                frame.height(),
                self.width,
                self.height
            ));
        }

        let mut rgb = ffmpeg::frame::Video::new(
            ffmpeg::util::format::pixel::Pixel::RGB24,
            self.width,
            self.height,
        );
        let row_bytes = self.width as usize * 3;
        let stride = rgb.stride(0);
        let src = frame.pixels();
        let dst = rgb.data_mut(0);
        for row in 0..self.height as usize {
            dst[row * stride..row * stride + row_bytes]
                .copy_from_slice(&src[row * row_bytes..(row + 1) * row_bytes]);
        }

        let mut yuv = ffmpeg::frame::Video::empty();
        self.scaler
            .run(&rgb, &mut yuv)
            .context("scale frame to YUV420P")?;
        yuv.set_pts(Some(self.next_pts));
        self.next_pts += 1;

        self.encoder
            .send_frame(&yuv)
            .context("send frame to H.264 encoder")?;
        self.drain_packets()
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.encoder.send_eof().context("flush H.264 encoder")?;
        self.drain_packets()?;
        self.output
            .write_trailer()
            .with_context(|| format!("write container trailer for '{}'", self.path))?;
        self.finished = true;
        Ok(())
    }
}
