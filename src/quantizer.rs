use crate::{color::Candidate, error::Result};

/// A color clustering engine.
///
/// Given packed RGB8 pixels and a cluster budget, a quantizer returns up to `max_clusters` candidates ordered by
/// descending score. It may return fewer when the pixels don't have that many distinct clusters.
///
/// Engines that report their own errors should wrap them in [`crate::Error::Quantize`].
pub trait Quantizer {
    fn quantize(&self, rgb: &[u8], max_clusters: usize) -> Result<Vec<Candidate>>;
}

impl<F> Quantizer for F
where
    F: Fn(&[u8], usize) -> Result<Vec<Candidate>>,
{
    fn quantize(&self, rgb: &[u8], max_clusters: usize) -> Result<Vec<Candidate>> {
        self(rgb, max_clusters)
    }
}
