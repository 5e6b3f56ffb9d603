//! Narration core for the PDF narrator.
//!
//! The crate owns the TTS playback state machine and everything it needs that
//! does not touch audio hardware or the filesystem:
//! - `controller`: the `NarrationController` and its background narration loop.
//! - `segment`: page-text preparation and splitting into narration units.
//! - `voice`: voice records and the preference-based selection strategy.
//! - `range`: page-range clamping and reader read modes.
//! - `services`: the document and speech collaborator traits.

pub mod cancellation;
pub mod controller;
pub mod error;
pub mod events;
pub mod range;
pub mod segment;
pub mod services;
pub mod settings;
pub mod voice;

pub use controller::{NarrationController, NarrationState, NarrationStatus};
pub use error::SpeechError;
pub use events::{ChannelListener, NarrationEvent, NarrationListener};
pub use range::{PageRange, ReadMode};
pub use services::{DocumentSource, SpeechService};
pub use settings::NarrationSettings;
pub use voice::{SubstringMatcher, Voice, VoiceId, VoiceMatcher, VoicePreference, select_voice};
