//! Fixed persona and provider parameters of the KB assistant.
//!
//! None of these are configurable at runtime: the persona, voice and model
//! are part of the product, not of the deployment.

use serde::Serialize;

/// Chat model used for every reply.
pub const LLM_MODEL: &str = "gpt-3.5-turbo-0125";
/// Upper bound on tokens in a single reply.
pub const MAX_TOK: u32 = 90;
pub const TEMPERATURE: f32 = 0.7;

/// Number of user/assistant exchanges retained per session.
pub const MAX_TURNS: usize = 12;

pub const VOICE_ID: &str = "IvLWq57RKibBrqZGpQrC";
pub const TTS_MODEL: &str = "eleven_multilingual_v2";
/// mp3, 22050 Hz, 32 kbps.
pub const BATCH_OUTPUT_FORMAT: &str = "mp3_22050_32";

/// Controls how many characters the realtime provider buffers before each audio chunk.
pub const CHUNK_LENGTH_SCHEDULE: [u32; 4] = [120, 160, 250, 290];

pub const SYSTEM_PROMPT: &str = "Sei KB, consulente bancario empatico. \
    Rispondi in italiano, in massimo DUE frasi concise, \
    e proponi l'appuntamento.";

/// Voice-quality settings sent with every synthesis request.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
    pub use_speaker_boost: bool,
    pub style: f32,
}

pub const VOICE_SETTINGS: VoiceSettings = VoiceSettings {
    stability: 0.28,
    similarity_boost: 0.95,
    use_speaker_boost: true,
    style: 0.65,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_settings_wire_shape() {
        let json = serde_json::to_value(VOICE_SETTINGS).unwrap();
        assert_eq!(json["use_speaker_boost"], true);
        assert!((json["stability"].as_f64().unwrap() - 0.28).abs() < 1e-6);
        assert!((json["style"].as_f64().unwrap() - 0.65).abs() < 1e-6);
    }

    #[test]
    fn test_system_prompt_is_italian_two_sentence_persona() {
        assert!(SYSTEM_PROMPT.starts_with("Sei KB"));
        assert!(SYSTEM_PROMPT.contains("massimo DUE frasi"));
        assert!(SYSTEM_PROMPT.ends_with("proponi l'appuntamento."));
    }
}
