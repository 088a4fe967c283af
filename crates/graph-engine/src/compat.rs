//! Port-type compatibility lattice
//!
//! Compatibility is defined per *target* type as the set of source types
//! allowed to feed it, so the relation is deliberately asymmetric: a
//! `Garment` output may feed an `Image` port, and an `Image` output may
//! feed a `Garment` port, but neither implies anything about `Video`.
//!
//! The lattice is a static lookup table: adding a port type means adding
//! one match arm listing what it accepts.

use crate::types::PortType;

/// The source types a target port of the given type accepts.
///
/// `Any` as a target is special-cased in [`compatible`] — it accepts every
/// known type and its slice here is empty. Every concrete type accepts
/// itself, its natural base type(s), and `Any`.
pub fn accepted_sources(target: PortType) -> &'static [PortType] {
    use PortType::*;
    match target {
        Any => &[],
        Text => &[Text, Prompt, Any],
        Prompt => &[Prompt, Text, Any],
        Image => &[Image, Mask, Depth, Pose, Garment, Face, Texture, Any],
        Mask => &[Mask, Image, Any],
        Depth => &[Depth, Image, Any],
        Pose => &[Pose, Image, Any],
        Garment => &[Garment, Image, Any],
        Face => &[Face, Image, Any],
        Texture => &[Texture, Image, Any],
        Video => &[Video, Motion, Any],
        Motion => &[Motion, Video, Any],
        Audio => &[Audio, Voice, Music, Any],
        Voice => &[Voice, Audio, Any],
        Music => &[Music, Audio, Any],
        Mesh => &[Mesh, Material, Any],
        Material => &[Material, Mesh, Any],
        Style => &[Style, Palette, Image, Any],
        Palette => &[Palette, Style, Any],
        Number => &[Number, Any],
        Boolean => &[Boolean, Any],
        Json => &[Json, Any],
    }
}

/// Can a value of `source` type feed a port of `target` type?
///
/// Pure predicate; never errors.
pub fn compatible(source: PortType, target: PortType) -> bool {
    if target == PortType::Any {
        return true;
    }
    accepted_sources(target).contains(&source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_type_accepts_itself() {
        for t in PortType::ALL {
            assert!(compatible(t, t), "{:?} should accept itself", t);
        }
    }

    #[test]
    fn test_any_target_accepts_everything() {
        for t in PortType::ALL {
            assert!(compatible(t, PortType::Any));
        }
    }

    #[test]
    fn test_any_source_feeds_types_that_list_any() {
        for t in PortType::ALL {
            if t == PortType::Any || accepted_sources(t).contains(&PortType::Any) {
                assert!(compatible(PortType::Any, t));
            }
        }
    }

    #[test]
    fn test_domain_type_accepts_its_base() {
        assert!(compatible(PortType::Image, PortType::Garment));
        assert!(compatible(PortType::Image, PortType::Mask));
        assert!(compatible(PortType::Audio, PortType::Voice));
        assert!(compatible(PortType::Video, PortType::Motion));
        assert!(compatible(PortType::Text, PortType::Prompt));
    }

    #[test]
    fn test_base_accepts_its_subtypes() {
        assert!(compatible(PortType::Garment, PortType::Image));
        assert!(compatible(PortType::Voice, PortType::Audio));
    }

    #[test]
    fn test_asymmetry_across_families() {
        // An image cannot feed an audio port, and vice versa
        assert!(!compatible(PortType::Image, PortType::Audio));
        assert!(!compatible(PortType::Audio, PortType::Image));
        // A garment is image-family, not video-family
        assert!(!compatible(PortType::Garment, PortType::Video));
        // Subtype siblings do not accept each other
        assert!(!compatible(PortType::Mask, PortType::Garment));
    }

    #[test]
    fn test_scalars_only_accept_themselves_and_any() {
        assert!(compatible(PortType::Number, PortType::Number));
        assert!(!compatible(PortType::Text, PortType::Number));
        assert!(!compatible(PortType::Boolean, PortType::Number));
    }
}
