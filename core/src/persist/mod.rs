//! Saving effects across logout and restart.
//!
//! Effects are written as [`EffectRecord`]s: the family plus an ordered list
//! of named fields, with every cycle turned into a remaining tick count. A
//! whole world's worth is bundled into a versioned JSON [`EffectSnapshot`].

mod codecs;
mod record;
mod snapshot;

pub use codecs::{DecodeFn, EffectCodecs, encode_effect};
pub use record::{CodecError, EffectRecord, FieldValue, RecordField, RecordReader, RecordWriter};
pub use snapshot::{
    EffectSnapshot, EntityEffects, LockoutRecord, SNAPSHOT_VERSION, default_snapshot_path,
};
