//! The image-rendering collaborator used by the code issuer.

/// Turns an arbitrary string payload into a renderable image, e.g. a
/// `data:` URL. Failures are reported to the caller, never retried.
pub trait CodeRenderer: Send + Sync {
  fn render(&self, payload: &str) -> Result<String, String>;
}
