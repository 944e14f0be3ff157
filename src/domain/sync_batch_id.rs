use uuid::Uuid;

/// Groups subscribers exported together so the batch can later be confirmed
/// as delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncBatchId(Uuid);

impl SyncBatchId {
    pub fn generate() -> Self { Self(Uuid::new_v4()) }

    /// Accepts only the hyphenated form, e.g. `67e55044-10b1-426f-9247-bb680e5fe0c8`.
    pub fn parse(s: &str) -> Result<Self, String> {
        Uuid::try_parse(s)
            .ok()
            .filter(|_| s.len() == 36)
            .map(Self)
            .ok_or_else(|| "batchId must be a valid UUID".to_string())
    }
}

impl AsRef<Uuid> for SyncBatchId {
    fn as_ref(&self) -> &Uuid { &self.0 }
}

impl std::fmt::Display for SyncBatchId {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
