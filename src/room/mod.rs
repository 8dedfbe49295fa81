//! Abstracted room-service surface
//!
//! The real-time room vendor SDK is reduced to the three events the session
//! core cares about, delivered over a channel by whatever adapter owns the
//! actual connection.

use crate::audio::AudioTrack;

/// One event from the room service
pub enum RoomEvent {
    /// The candidate joined; `identity` resolves which campaign/submission
    /// this session belongs to
    ParticipantJoined { identity: String },

    /// A new audio track was subscribed
    TrackSubscribed(AudioTrack),

    /// The candidate left the room
    ParticipantDisconnected { identity: String },
}
