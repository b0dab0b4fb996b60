use async_trait::async_trait;
use scanmap_protocol::LocalUri;

/// Interactive fallback collaborator. `seed_name` is the artifact's base file
/// name, used to pre-fill the host's open-file affordance. `None` means the
/// user cancelled.
#[async_trait]
pub trait FilePicker: Send + Sync {
    async fn pick_file(&self, seed_name: &str) -> Option<LocalUri>;
}

/// Picker that always cancels; used when running non-interactively.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPicker;

#[async_trait]
impl FilePicker for NoPicker {
    async fn pick_file(&self, _seed_name: &str) -> Option<LocalUri> {
        None
    }
}
