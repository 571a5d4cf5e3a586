//! Byte-level validation of downloaded audio payloads.
//!
//! The dictionary site occasionally serves an HTML error page where audio is
//! expected; a corrupt file silently added to a user's Anki collection is
//! worse than a reported failure, so anything ambiguous is rejected.

use std::io::Cursor;

use hound::WavReader;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::probe::Hint;

use crate::models::AudioFormat;

/// Anything below this is an error page or a truncated download, not audio.
pub const MIN_AUDIO_BYTES: usize = 1024;

/// Validate a downloaded payload and return its detected container format.
///
/// Checks, in order: minimum size, container magic, and a cheap decode of the
/// formats that expose one (MP3 first frame via symphonia, WAV header via
/// hound).
pub fn validate(bytes: &[u8]) -> Result<AudioFormat, String> {
    if bytes.is_empty() {
        return Err("payload is empty".to_string());
    }
    if bytes.len() < MIN_AUDIO_BYTES {
        return Err(format!(
            "payload too small to be audio ({} bytes)",
            bytes.len()
        ));
    }

    match detect_format(bytes) {
        Some(AudioFormat::Mp3) => {
            check_mp3(bytes)?;
            Ok(AudioFormat::Mp3)
        }
        Some(AudioFormat::Wav) => {
            check_wav(bytes)?;
            Ok(AudioFormat::Wav)
        }
        Some(AudioFormat::Ogg) => Ok(AudioFormat::Ogg),
        None => Err("unrecognized container signature".to_string()),
    }
}

/// Match the payload's leading bytes against the accepted container magics.
fn detect_format(bytes: &[u8]) -> Option<AudioFormat> {
    if bytes.starts_with(b"ID3") {
        return Some(AudioFormat::Mp3);
    }
    // Bare MPEG frame sync: 11 set bits
    if bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0 {
        return Some(AudioFormat::Mp3);
    }
    if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WAVE" {
        return Some(AudioFormat::Wav);
    }
    if bytes.starts_with(b"OggS") {
        return Some(AudioFormat::Ogg);
    }
    None
}

/// Probe the payload as MP3 and decode its first packet. A sync word can
/// occur in arbitrary binary data, so detection alone is not enough.
fn check_mp3(bytes: &[u8]) -> Result<(), String> {
    let cursor = Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    hint.with_extension("mp3");

    let format_opts = FormatOptions {
        enable_gapless: false,
        ..Default::default()
    };

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &Default::default())
        .map_err(|e| format!("not a decodable MP3 stream: {e}"))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| "no audio track in MP3 payload".to_string())?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions { verify: true })
        .map_err(|e| format!("failed to create MP3 decoder: {e}"))?;

    let track_id = track.id;
    loop {
        let packet = format
            .next_packet()
            .map_err(|e| format!("no decodable MP3 frame: {e}"))?;
        if packet.track_id() != track_id {
            continue;
        }
        decoder
            .decode(&packet)
            .map_err(|e| format!("first MP3 frame failed to decode: {e}"))?;
        return Ok(());
    }
}

/// Parse the WAV header and require at least one sample.
fn check_wav(bytes: &[u8]) -> Result<(), String> {
    let reader =
        WavReader::new(Cursor::new(bytes)).map_err(|e| format!("invalid WAV header: {e}"))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err("WAV header declares zero sample rate".to_string());
    }
    if reader.duration() == 0 {
        return Err("WAV payload contains no samples".to_string());
    }
    Ok(())
}
