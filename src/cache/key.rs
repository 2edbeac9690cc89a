use std::path::Path;

/// Derive the stable cache key for a preview frame request.
///
/// The timestamp is formatted to 3 decimal places before hashing, so requests
/// within the same millisecond (slider-drag previews, for example) coalesce
/// into one entry. Two independently seeded 64-bit FNV-1a lanes give a
/// 128-bit key, emitted as 32 lowercase hex chars.
pub(crate) fn preview_cache_key(path: &Path, timestamp: f64, width: u32, quality: u8) -> String {
    let material = format!("{}:{timestamp:.3}:{width}:{quality}", path.display());

    let mut hi = Fnv1a64::new(0xcbf29ce484222325);
    let mut lo = Fnv1a64::new(0x9ae16a3b2f90404f);
    hi.write_bytes(material.as_bytes());
    lo.write_bytes(material.as_bytes());

    format!("{:016x}{:016x}", hi.finish(), lo.finish())
}

#[derive(Clone, Copy)]
struct Fnv1a64(u64);

impl Fnv1a64 {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        let mut h = self.0;
        for &b in bytes {
            h ^= b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        self.0 = h;
    }

    fn finish(self) -> u64 {
        self.0
    }
}
