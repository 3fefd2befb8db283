//! Speech synthesis against DashScope CosyVoice and buffer chunking.
//!
//! The vendor call is synchronous: one request, one complete audio buffer.
//! "Streaming" to the browser is purely the proxy splitting that buffer
//! into fixed-size chunks for incremental delivery.

use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::config::TtsConfig;

/// Chunk size for incremental delivery of the synthesized buffer.
pub const CHUNK_SIZE: usize = 8192;

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("request to DashScope failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("DashScope returned status {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("synthesis returned no audio data")]
    EmptyAudio,
}

/// Speech synthesizer bound to fixed server-side model/voice/rate settings.
/// The caller-supplied text is the only per-request variable; each call is
/// one request-scoped exchange, released by ownership on every exit path.
pub struct SpeechSynthesizer {
    base_url: String,
    api_key: String,
    model: String,
    voice: String,
    speech_rate: f32,
    client: Client,
}

impl SpeechSynthesizer {
    pub fn new(api_key: &str, base_url: &str, config: &TtsConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: config.model.clone(),
            voice: config.voice.clone(),
            speech_rate: config.speech_rate,
            client,
        })
    }

    /// Synthesize validated text into one complete audio buffer.
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>, TtsError> {
        let body = json!({
            "model": self.model,
            "input": text,
            "voice": self.voice,
            "speed": self.speech_rate,
        });

        let url = format!("{}/audio/speech", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(TtsError::Api { status, body });
        }

        let audio = resp.bytes().await?;
        if audio.is_empty() {
            return Err(TtsError::EmptyAudio);
        }
        debug!("Synthesized {} bytes of audio", audio.len());
        Ok(audio.to_vec())
    }
}

/// Split a complete audio buffer into ordered fixed-size chunks.
/// An empty buffer yields no chunks.
pub fn chunk_audio(audio: &[u8]) -> Vec<Vec<u8>> {
    audio.chunks(CHUNK_SIZE).map(<[u8]>::to_vec).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_multiple_splits_into_full_chunks() {
        let audio = vec![7u8; CHUNK_SIZE * 2];
        let chunks = chunk_audio(&audio);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.len() == CHUNK_SIZE));
    }

    #[test]
    fn reassembly_is_byte_identical() {
        let audio: Vec<u8> = (0..20000u32).map(|i| (i % 251) as u8).collect();
        let chunks = chunk_audio(&audio);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].len(), 20000 - 2 * CHUNK_SIZE);
        let rebuilt: Vec<u8> = chunks.concat();
        assert_eq!(rebuilt, audio);
    }

    #[test]
    fn empty_buffer_yields_nothing() {
        assert!(chunk_audio(&[]).is_empty());
    }

    #[test]
    fn trailing_partial_chunk_is_kept() {
        let audio = vec![1u8; CHUNK_SIZE + 1];
        let chunks = chunk_audio(&audio);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), CHUNK_SIZE);
        assert_eq!(chunks[1].len(), 1);
    }
}
